//! 镜像：把方块层级沿世界空间平面反射

use std::collections::HashSet;

use glam::{Mat3, Mat4, Vec3};

use super::locker::{LockMode, TransformLocker};
use crate::skeleton::{CubeManager, CubePose};

/// 把点沿平面（过 pivot，法线 normal）反射
pub fn reflect_point(point: Vec3, pivot: Vec3, normal: Vec3) -> Vec3 {
    let normal = normal.normalize_or_zero();
    let distance = (point - pivot).dot(normal);
    point - normal * (2.0 * distance)
}

/// 单个方块的镜像目标（在任何修改之前由原始世界矩阵算出）
struct MirrorTarget {
    index: usize,
    world: Mat4,
    corners: (Vec3, Vec3),
    grow: Vec3,
}

fn mirror_target(manager: &CubeManager, index: usize, pivot: Vec3, normal: Vec3) -> Option<MirrorTarget> {
    let cube = manager.get_cube(index)?;
    let world = manager.world_matrix(index);

    let origin = reflect_point(world.transform_point3(Vec3::ZERO), pivot, normal);
    let axis = |local: Vec3| {
        (reflect_point(world.transform_point3(local), pivot, normal) - origin).normalize_or_zero()
    };
    let mut basis = Mat3::from_cols(axis(Vec3::X), axis(Vec3::Y), axis(Vec3::Z));
    // 反射后的基是左手系，翻转 X 轴得到合法旋转
    if basis.determinant() < 0.0 {
        basis.x_axis = -basis.x_axis;
    }

    let (low, high) = cube.mesh_corners();
    let corners = (
        reflect_point(world.transform_point3(low), pivot, normal),
        reflect_point(world.transform_point3(high), pivot, normal),
    );

    Some(MirrorTarget {
        index,
        world: Mat4::from_translation(origin) * Mat4::from_mat3(basis),
        corners,
        grow: cube.current_grow(),
    })
}

fn selection(manager: &CubeManager, cubes: Option<&[usize]>) -> HashSet<usize> {
    match cubes {
        Some(list) => list.iter().copied().filter(|&i| i < manager.cube_count()).collect(),
        None => (0..manager.cube_count()).collect(),
    }
}

/// 未选中、但有被修改祖先的方块，用锁定器保持世界姿态
pub(crate) fn lock_unselected(manager: &CubeManager, selected: &HashSet<usize>) -> Vec<Option<TransformLocker>> {
    (0..manager.cube_count())
        .map(|i| {
            let locked = !selected.contains(&i)
                && selected.iter().any(|&s| manager.is_ancestor(s, i));
            locked.then(|| TransformLocker::capture(manager, i, LockMode::PositionRotation))
        })
        .collect()
}

/// 沿平面镜像方块（`cubes` 为 None 时镜像整个层级）
pub fn mirror(manager: &mut CubeManager, world_pivot: Vec3, world_normal: Vec3, cubes: Option<&[usize]>) {
    manager.update_world_transforms();
    let selected = selection(manager, cubes);

    let mut targets: Vec<Option<MirrorTarget>> = (0..manager.cube_count()).map(|_| None).collect();
    for &index in &selected {
        targets[index] = mirror_target(manager, index, world_pivot, world_normal);
    }
    let lockers = lock_unselected(manager, &selected);

    let order = manager.sorted_indices().to_vec();
    for index in order {
        if let Some(target) = &targets[index] {
            TransformLocker::with_world(target.index, LockMode::PositionRotation, target.world)
                .reconstruct(manager);

            let inverse = manager.world_matrix(index).inverse();
            let a = inverse.transform_point3(target.corners.0);
            let b = inverse.transform_point3(target.corners.1);
            manager.set_offset(index, a.min(b) + target.grow);
        } else if let Some(locker) = &lockers[index] {
            locker.reconstruct(manager);
        }
    }
}

/// 镜像预览（dry run）
///
/// 计算结果被缓存，可以每帧 `apply` 用于预览，最后 `commit` 或 `rollback`。
#[derive(Clone, Debug)]
pub struct MirrorPreview {
    original: Vec<CubePose>,
    mirrored: Vec<CubePose>,
}

impl MirrorPreview {
    /// 计算镜像结果，层级保持调用前的状态
    pub fn compute(
        manager: &mut CubeManager,
        world_pivot: Vec3,
        world_normal: Vec3,
        cubes: Option<&[usize]>,
    ) -> Self {
        let original = snapshot(manager);
        mirror(manager, world_pivot, world_normal, cubes);
        let mirrored = snapshot(manager);
        restore(manager, &original);
        Self { original, mirrored }
    }

    /// 把镜像结果写入层级
    pub fn apply(&self, manager: &mut CubeManager) {
        restore(manager, &self.mirrored);
    }

    /// 提交镜像结果
    pub fn commit(self, manager: &mut CubeManager) {
        self.apply(manager);
    }

    /// 回滚到调用前的状态
    pub fn rollback(self, manager: &mut CubeManager) {
        restore(manager, &self.original);
    }
}

fn snapshot(manager: &CubeManager) -> Vec<CubePose> {
    manager.cubes().iter().map(|c| c.pose()).collect()
}

fn restore(manager: &mut CubeManager, poses: &[CubePose]) {
    for (index, pose) in poses.iter().enumerate() {
        manager.set_rotation(index, pose.rotation);
        manager.set_position(index, pose.position);
        manager.set_offset(index, pose.offset);
    }
    manager.update_world_transforms();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Cube;

    fn model() -> CubeManager {
        let mut manager = CubeManager::new();
        let body = manager.add_cube(
            Cube::new("body")
                .with_position(Vec3::new(3.0, 12.0, -2.0))
                .with_rotation(Vec3::new(15.0, -30.0, 45.0))
                .with_geometry(Vec3::new(-4.0, 0.0, -2.0), Vec3::new(8.0, 12.0, 4.0), Vec3::ZERO),
        );
        let arm = manager.add_cube(
            Cube::new("arm")
                .with_parent(body)
                .with_position(Vec3::new(5.0, 10.0, 0.0))
                .with_rotation(Vec3::new(-20.0, 10.0, 5.0))
                .with_geometry(Vec3::new(-1.0, -10.0, -1.0), Vec3::new(3.0, 12.0, 4.0), Vec3::splat(0.25)),
        );
        manager.add_cube(
            Cube::new("hand")
                .with_parent(arm)
                .with_position(Vec3::new(0.0, -10.0, 1.0))
                .with_rotation(Vec3::new(0.0, 90.0, 0.0))
                .with_geometry(Vec3::new(-1.0, -2.0, -1.0), Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO),
        );
        manager.build_hierarchy();
        manager
    }

    fn max_diff(a: Mat4, b: Mat4) -> f32 {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }

    fn mesh_corners_world(manager: &CubeManager, index: usize) -> (Vec3, Vec3) {
        let m = manager.mesh_world_matrix(index);
        (m.transform_point3(Vec3::ZERO), m.transform_point3(Vec3::ONE))
    }

    #[test]
    fn test_mirror_twice_restores_offsets() {
        let mut manager = model();
        let offsets: Vec<Vec3> = (0..3).map(|i| manager.offset(i)).collect();
        mirror(&mut manager, Vec3::ZERO, Vec3::Y, None);
        mirror(&mut manager, Vec3::ZERO, Vec3::Y, None);
        for (i, offset) in offsets.iter().enumerate() {
            assert!((manager.offset(i) - *offset).length() < 1e-3);
        }
    }

    #[test]
    fn test_reflect_point() {
        let p = reflect_point(Vec3::new(1.0, 5.0, 2.0), Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        assert!((p - Vec3::new(1.0, -1.0, 2.0)).length() < 1e-6);
    }

    #[test]
    fn test_mirror_moves_origin() {
        let mut manager = model();
        let before = manager.world_matrix(0).transform_point3(Vec3::ZERO);
        mirror(&mut manager, Vec3::ZERO, Vec3::X, None);
        let after = manager.world_matrix(0).transform_point3(Vec3::ZERO);
        assert!((after - Vec3::new(-before.x, before.y, before.z)).length() < 1e-4);
    }

    #[test]
    fn test_mirror_reflects_mesh_volume() {
        let mut manager = model();
        let pivot = Vec3::new(1.0, 0.0, 0.0);
        let (a, b) = mesh_corners_world(&manager, 1);
        let reflected = [reflect_point(a, pivot, Vec3::X), reflect_point(b, pivot, Vec3::X)];

        mirror(&mut manager, pivot, Vec3::X, None);

        // 反射后的两个对角仍是新网格的角点（单位立方体坐标为 0 或 1）
        let inverse = manager.mesh_world_matrix(1).inverse();
        for corner in reflected {
            let unit = inverse.transform_point3(corner);
            for component in unit.to_array() {
                assert!(component.abs() < 1e-3 || (component - 1.0).abs() < 1e-3, "{:?}", unit);
            }
        }
        let unit_a = inverse.transform_point3(reflected[0]);
        let unit_b = inverse.transform_point3(reflected[1]);
        assert!(((unit_a - unit_b).abs() - Vec3::ONE).length() < 1e-3);
    }

    #[test]
    fn test_mirror_involution() {
        let mut manager = model();
        let pivot = Vec3::new(0.5, 3.0, -1.0);
        let normal = Vec3::new(1.0, 1.0, 0.0);
        let worlds: Vec<Mat4> = (0..3).map(|i| manager.world_matrix(i)).collect();
        let meshes: Vec<Mat4> = (0..3).map(|i| manager.mesh_world_matrix(i)).collect();

        mirror(&mut manager, pivot, normal, None);
        mirror(&mut manager, pivot, normal, None);

        for i in 0..3 {
            assert!(max_diff(manager.world_matrix(i), worlds[i]) < 1e-4);
            assert!(max_diff(manager.mesh_world_matrix(i), meshes[i]) < 1e-4);
        }
    }

    #[test]
    fn test_mixed_selection_keeps_unselected_child() {
        let mut manager = model();
        let hand_world = manager.world_matrix(2);
        mirror(&mut manager, Vec3::ZERO, Vec3::Z, Some(&[0, 1]));
        assert!(max_diff(manager.world_matrix(2), hand_world) < 1e-4);
    }

    #[test]
    fn test_preview_rollback_and_commit() {
        let mut manager = model();
        let original = manager.world_matrix(1);

        let preview = MirrorPreview::compute(&mut manager, Vec3::ZERO, Vec3::X, None);
        assert!(max_diff(manager.world_matrix(1), original) < 1e-6);

        preview.apply(&mut manager);
        let mirrored = manager.world_matrix(1);
        assert!(max_diff(mirrored, original) > 1e-3);

        preview.clone().rollback(&mut manager);
        assert!(max_diff(manager.world_matrix(1), original) < 1e-4);

        preview.commit(&mut manager);
        assert!(max_diff(manager.world_matrix(1), mirrored) < 1e-4);
    }
}
