//! 旧版本数据修复
//!
//! 修复按顺序执行，每个文件只执行一次：
//! 1. v3：给增量加上方块自身的基准旋转/位置
//! 2. v1 以下与 v3：把绝对目标转换为叠加增量
//! 3. v3 及以下：裁剪同层重叠的关键帧
//! 4. v4 及以下：从镜像坐标约定重建增量

use std::collections::HashMap;

use glam::Vec3;

use super::FormatVersion;
use crate::animation::{DeltaMap, Keyframe};
use crate::config::get_config;
use crate::geometry::{mirror, LockMode, TransformLocker};
use crate::skeleton::CubeManager;

/// 对导入的关键帧执行所有适用于 `version` 的修复
pub(crate) fn repair(version: FormatVersion, keyframes: &mut [Keyframe], host: &CubeManager) {
    let mut host = host.clone();
    host.reset_to_bind_pose();

    let mut authoring = if version.is_mirrored() {
        authoring_model(&host)
    } else {
        host.clone()
    };

    if version.has_baseline_offset() {
        log::debug!("Repair: adding baseline offsets");
        add_baseline(keyframes, &authoring);
    }
    if version.has_absolute_deltas() {
        log::debug!("Repair: converting absolute targets to deltas");
        let targets: Vec<Targets> = keyframes.iter().map(Targets::from_keyframe).collect();
        to_additive(keyframes, &targets, &mut authoring);
    }
    if version.allows_overlap() {
        log::debug!("Repair: trimming overlapping keyframes");
        trim_overlaps(keyframes);
    }
    if version.is_mirrored() {
        log::debug!("Repair: rebuilding mirrored keyframes");
        rebuild_mirrored(keyframes, &mut host, &mut authoring);
    }
}

/// 每个关键帧在结束时的绝对旋转 / 位置目标
struct Targets {
    rotation: DeltaMap,
    position: DeltaMap,
}

impl Targets {
    fn from_keyframe(keyframe: &Keyframe) -> Self {
        Self {
            rotation: keyframe.rotation_map.clone(),
            position: keyframe.rotation_point_map.clone(),
        }
    }
}

/// 旧文件编写时使用的模型：宿主模型沿固定轴心先关于 Y 平面、再关于 X 平面镜像
fn authoring_model(host: &CubeManager) -> CubeManager {
    let pivot = get_config().legacy_mirror_pivot;
    let mut model = host.clone();
    mirror(&mut model, pivot, Vec3::Y, None);
    mirror(&mut model, pivot, Vec3::X, None);
    model.capture_bind_pose();
    model
}

fn add_baseline(keyframes: &mut [Keyframe], model: &CubeManager) {
    for keyframe in keyframes.iter_mut() {
        for (name, value) in keyframe.rotation_map.iter_mut() {
            match model.find_cube_by_name(name) {
                Some(index) => *value += model.rotation(index),
                None => log::debug!("Repair: unknown cube '{}'", name),
            }
        }
        for (name, value) in keyframe.rotation_point_map.iter_mut() {
            if let Some(index) = model.find_cube_by_name(name) {
                *value += model.position(index);
            }
        }
    }
}

/// 按开始时间顺序重放：在每个关键帧开始时记录实际姿态，增量 = 目标 - 实际
///
/// 找不到的方块保留原值。
fn to_additive(keyframes: &mut [Keyframe], targets: &[Targets], model: &mut CubeManager) {
    let mut order: Vec<usize> = (0..keyframes.len()).collect();
    order.sort_by(|&a, &b| keyframes[a].start_time.total_cmp(&keyframes[b].start_time));

    let debug = get_config().debug_log;
    for (done, &index) in order.iter().enumerate() {
        let start = keyframes[index].start_time;
        model.reset_to_bind_pose();
        for &previous in &order[..done] {
            keyframes[previous].animate(start, model);
        }

        let keyframe = &mut keyframes[index];
        for (name, target) in &targets[index].rotation {
            if let Some(cube) = model.find_cube_by_name(name) {
                keyframe.rotation_map.insert(name.clone(), *target - model.rotation(cube));
            }
        }
        for (name, target) in &targets[index].position {
            if let Some(cube) = model.find_cube_by_name(name) {
                keyframe.rotation_point_map.insert(name.clone(), *target - model.position(cube));
            }
        }
        if debug {
            log::debug!("Repair: keyframe at {} converted to deltas", start);
        }
    }
    model.reset_to_bind_pose();
}

/// 同层中下一个关键帧在当前关键帧结束前开始时，把当前关键帧裁剪到间隔长度，增量按比例缩放
fn trim_overlaps(keyframes: &mut [Keyframe]) {
    let mut layers: HashMap<u32, Vec<usize>> = HashMap::new();
    for (index, keyframe) in keyframes.iter().enumerate() {
        layers.entry(keyframe.layer).or_default().push(index);
    }

    for indices in layers.values_mut() {
        indices.sort_by(|&a, &b| keyframes[a].start_time.total_cmp(&keyframes[b].start_time));
        for pair in indices.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let next_start = keyframes[next].start_time;
            let keyframe = &mut keyframes[current];
            let gap = next_start - keyframe.start_time;
            if next_start < keyframe.end_time() && gap > 0.0 && keyframe.duration > 0.0 {
                keyframe.scale_deltas(gap / keyframe.duration);
                keyframe.duration = gap;
            }
        }
    }
}

/// 镜像约定重建
///
/// 在编写模型上重放每个关键帧的结束时刻，把世界姿态移植到宿主模型副本上，
/// 再把副本镜像回来，读出的旋转 / 位置作为绝对目标，最后对宿主模型重新转换为增量。
fn rebuild_mirrored(keyframes: &mut [Keyframe], host: &mut CubeManager, authoring: &mut CubeManager) {
    let config = get_config();
    let pivot = config.legacy_mirror_pivot;

    let mut order: Vec<usize> = (0..keyframes.len()).collect();
    order.sort_by(|&a, &b| keyframes[a].end_time().total_cmp(&keyframes[b].end_time()));

    let mut previous: HashMap<String, Vec3> = host
        .cubes()
        .iter()
        .map(|cube| (cube.name.clone(), cube.rotation))
        .collect();
    let mut targets: Vec<Targets> = keyframes
        .iter()
        .map(|_| Targets {
            rotation: DeltaMap::new(),
            position: DeltaMap::new(),
        })
        .collect();

    let mut working = host.clone();
    for &index in &order {
        let end = keyframes[index].end_time();
        authoring.reset_to_bind_pose();
        for keyframe in keyframes.iter() {
            keyframe.animate(end, authoring);
        }
        authoring.update_world_transforms();

        working.reset_to_bind_pose();
        let sorted = working.sorted_indices().to_vec();
        for cube in sorted {
            TransformLocker::with_world(cube, LockMode::PositionRotation, authoring.world_matrix(cube))
                .reconstruct(&mut working);
        }
        mirror(&mut working, pivot, Vec3::Y, None);
        mirror(&mut working, pivot, Vec3::X, None);

        let keyframe = &keyframes[index];
        let target = &mut targets[index];
        for name in keyframe.rotation_map.keys() {
            if let Some(cube) = working.find_cube_by_name(name) {
                let last = previous.get(name).copied().unwrap_or(Vec3::ZERO);
                let rotation = unwrap_degrees(working.rotation(cube), last, config.wraparound_threshold);
                previous.insert(name.clone(), rotation);
                target.rotation.insert(name.clone(), rotation);
            }
        }
        for name in keyframe.rotation_point_map.keys() {
            if let Some(cube) = working.find_cube_by_name(name) {
                target.position.insert(name.clone(), working.position(cube));
            }
        }
    }

    to_additive(keyframes, &targets, host);
}

/// 与上一个值相比跳变超过阈值的分量加减 360°
fn unwrap_degrees(value: Vec3, previous: Vec3, threshold: f32) -> Vec3 {
    let fix = |mut v: f32, p: f32| {
        if !v.is_finite() || !p.is_finite() {
            return v;
        }
        while v - p > threshold {
            v -= 360.0;
        }
        while v - p < -threshold {
            v += 360.0;
        }
        v
    };
    Vec3::new(
        fix(value.x, previous.x),
        fix(value.y, previous.y),
        fix(value.z, previous.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::KeyframeId;
    use crate::skeleton::Cube;

    fn model() -> CubeManager {
        let mut manager = CubeManager::new();
        let body = manager.add_cube(
            Cube::new("body")
                .with_position(Vec3::new(0.0, 12.0, 0.0))
                .with_geometry(Vec3::new(-4.0, 0.0, -2.0), Vec3::new(8.0, 12.0, 4.0), Vec3::ZERO),
        );
        manager.add_cube(
            Cube::new("arm")
                .with_parent(body)
                .with_position(Vec3::new(5.0, 10.0, 0.0))
                .with_rotation(Vec3::new(0.0, 0.0, 10.0))
                .with_geometry(Vec3::new(-1.0, -10.0, -1.0), Vec3::new(2.0, 12.0, 2.0), Vec3::ZERO),
        );
        manager.build_hierarchy();
        manager
    }

    fn keyframe(id: u64, start: f32, duration: f32, cube: &str, rotation: Vec3) -> Keyframe {
        let mut keyframe = Keyframe::new(KeyframeId(id));
        keyframe.start_time = start;
        keyframe.duration = duration;
        keyframe.rotation_map.insert(cube.into(), rotation);
        keyframe
    }

    #[test]
    fn test_unwrap_degrees() {
        let fixed = unwrap_degrees(Vec3::new(-170.0, 175.0, 10.0), Vec3::new(170.0, -175.0, 0.0), 180.0);
        assert_eq!(fixed, Vec3::new(190.0, -185.0, 10.0));
    }

    #[test]
    fn test_trim_overlaps() {
        let mut keyframes = vec![
            keyframe(0, 0.0, 10.0, "body", Vec3::new(10.0, 0.0, 0.0)),
            keyframe(1, 6.0, 5.0, "body", Vec3::new(0.0, 5.0, 0.0)),
        ];
        trim_overlaps(&mut keyframes);
        assert_eq!(keyframes[0].duration, 6.0);
        assert!((keyframes[0].rotation_map["body"].x - 6.0).abs() < 1e-6);
        assert_eq!(keyframes[1].duration, 5.0);
    }

    #[test]
    fn test_trim_ignores_other_layers() {
        let mut keyframes = vec![
            keyframe(0, 0.0, 10.0, "body", Vec3::ONE),
            keyframe(1, 6.0, 5.0, "body", Vec3::ONE),
        ];
        keyframes[1].layer = 1;
        trim_overlaps(&mut keyframes);
        assert_eq!(keyframes[0].duration, 10.0);
    }

    #[test]
    fn test_to_additive() {
        let mut manager = model();
        let mut keyframes = vec![
            keyframe(0, 0.0, 5.0, "arm", Vec3::new(0.0, 0.0, 30.0)),
            keyframe(1, 5.0, 5.0, "arm", Vec3::new(0.0, 0.0, 45.0)),
        ];
        let targets: Vec<Targets> = keyframes.iter().map(Targets::from_keyframe).collect();
        to_additive(&mut keyframes, &targets, &mut manager);
        assert!((keyframes[0].rotation_map["arm"].z - 20.0).abs() < 1e-5);
        assert!((keyframes[1].rotation_map["arm"].z - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_overlap_trimming_import() {
        let mut keyframes = vec![
            keyframe(0, 0.0, 10.0, "body", Vec3::new(10.0, 0.0, 0.0)),
            keyframe(1, 6.0, 5.0, "body", Vec3::new(0.0, 4.0, 0.0)),
        ];
        repair(FormatVersion::V2, &mut keyframes, &model());

        assert_eq!(keyframes[0].duration, 6.0);
        let first = keyframes[0].rotation_map["body"];
        assert!((first - Vec3::new(6.0, 0.0, 0.0)).length() < 1e-3, "{:?}", first);
        let second = keyframes[1].rotation_map["body"];
        assert!((second - Vec3::new(0.0, 4.0, 0.0)).length() < 1e-3, "{:?}", second);
    }

    #[test]
    fn test_mirrored_rebuild_keeps_rotation_deltas() {
        let host = model();
        let mut keyframes = vec![keyframe(0, 0.0, 4.0, "arm", Vec3::new(15.0, 0.0, 0.0))];
        repair(FormatVersion::V4, &mut keyframes, &host);

        let mut manager = host.clone();
        keyframes[0].animate(4.0, &mut manager);
        let rotation = manager.rotation(1);
        assert!((rotation - Vec3::new(15.0, 0.0, 10.0)).length() < 1e-3, "{:?}", rotation);
    }

    #[test]
    fn test_unknown_cube_kept() {
        let mut keyframes = vec![keyframe(0, 0.0, 4.0, "ghost", Vec3::new(1.0, 2.0, 3.0))];
        repair(FormatVersion::V1, &mut keyframes, &model());
        assert_eq!(keyframes[0].rotation_map["ghost"], Vec3::new(1.0, 2.0, 3.0));
    }

    fn tilted() -> CubeManager {
        let mut manager = CubeManager::new();
        manager.add_cube(
            Cube::new("a")
                .with_position(Vec3::new(3.0, 4.0, 0.0))
                .with_rotation(Vec3::new(0.0, 0.0, 20.0))
                .with_geometry(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(2.0, 6.0, 2.0), Vec3::ZERO),
        );
        manager.build_hierarchy();
        manager
    }

    #[test]
    fn test_add_baseline() {
        let mut keyframes = vec![keyframe(0, 0.0, 4.0, "arm", Vec3::new(1.0, 2.0, 3.0))];
        keyframes[0].rotation_point_map.insert("arm".into(), Vec3::new(0.0, 1.0, 0.0));
        add_baseline(&mut keyframes, &model());
        assert_eq!(keyframes[0].rotation_map["arm"], Vec3::new(1.0, 2.0, 13.0));
        assert_eq!(keyframes[0].rotation_point_map["arm"], Vec3::new(5.0, 11.0, 0.0));
    }

    #[test]
    fn test_v3_baseline_import() {
        let host = tilted();
        let mut keyframes = vec![keyframe(0, 0.0, 5.0, "a", Vec3::new(10.0, 0.0, 0.0))];
        keyframes[0].rotation_point_map.insert("a".into(), Vec3::new(0.0, 2.0, 1.0));
        repair(FormatVersion::V3, &mut keyframes, &host);

        // 基准偏移与绝对值转换相互抵消；不加基准时 z 会多出 160°
        let rotation = keyframes[0].rotation_map["a"];
        assert!((rotation - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-3, "{:?}", rotation);
        // 镜像约定下位置增量的 X/Y 反向
        let position = keyframes[0].rotation_point_map["a"];
        assert!((position - Vec3::new(0.0, -2.0, 1.0)).length() < 1e-3, "{:?}", position);

        let mut manager = host.clone();
        keyframes[0].animate(5.0, &mut manager);
        assert!((manager.rotation(0) - Vec3::new(10.0, 0.0, 20.0)).length() < 1e-3);
    }

    #[test]
    fn test_v3_baseline_with_following_keyframe() {
        let host = tilted();
        let mut keyframes = vec![
            keyframe(0, 0.0, 5.0, "a", Vec3::new(10.0, 0.0, 0.0)),
            keyframe(1, 5.0, 5.0, "a", Vec3::new(25.0, 0.0, 0.0)),
        ];
        repair(FormatVersion::V3, &mut keyframes, &host);

        assert_eq!(keyframes[0].duration, 5.0);
        let first = keyframes[0].rotation_map["a"];
        let second = keyframes[1].rotation_map["a"];
        assert!((first - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-3, "{:?}", first);
        assert!((second - Vec3::new(15.0, 0.0, 0.0)).length() < 1e-3, "{:?}", second);

        let mut manager = host.clone();
        for keyframe in &keyframes {
            keyframe.animate(10.0, &mut manager);
        }
        assert!((manager.rotation(0) - Vec3::new(25.0, 0.0, 20.0)).length() < 1e-3);
    }
}
