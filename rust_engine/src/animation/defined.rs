//! 定义模式层
//!
//! 定义模式下，关键帧的结束姿态被记录为绝对目标。编辑某个关键帧后，
//! 依赖它的关键帧通过"目标 - 实际"的差值修正自己的增量，从而保持姿态连续。

use super::capture::{is_negligible, PoseCapture};
use super::handler::AnimationHandler;
use super::keyframe::{DeltaMap, KeyframeId};
use crate::config::get_config;
use crate::skeleton::CubeManager;
use crate::{AnimError, Result};

impl AnimationHandler {
    /// 定义姿态
    pub fn defined_target(&self, id: KeyframeId) -> Option<&PoseCapture> {
        self.defined_keyframe_info.get(&id)
    }

    /// 为定义模式层上还没有目标的关键帧记录结束姿态
    pub fn ensure_defined_layers(&mut self, manager: &mut CubeManager) {
        let missing: Vec<(KeyframeId, f32)> = self
            .keyframes
            .iter()
            .filter(|k| self.is_defined_layer(k.layer) && !self.defined_keyframe_info.contains_key(&k.id))
            .map(|k| (k.id, k.end_time()))
            .collect();

        for (id, end) in missing {
            let target = self.pose_at(end, manager);
            self.defined_keyframe_info.insert(id, target);
        }
        manager.reset_to_bind_pose();
    }

    /// 关键帧被编辑后：重新记录它的目标，并修正依赖它的关键帧
    pub fn update_defined_keyframe(&mut self, id: KeyframeId, manager: &mut CubeManager) -> Result<()> {
        let keyframe = self.keyframe(id).ok_or_else(|| unknown_keyframe(id))?;
        if !self.is_defined_layer(keyframe.layer) {
            return Ok(());
        }
        let end = keyframe.end_time();
        let target = self.pose_at(end, manager);
        self.defined_keyframe_info.insert(id, target);
        self.fix_defined_layers(id, manager)
    }

    /// 修正依赖 `id` 的关键帧
    ///
    /// 依赖关系：同层、结束时间严格落在被编辑关键帧区间内的关键帧，
    /// 加上同层结束时间在区间之后、距离最近的一个关键帧。按结束时间升序逐个修正。
    pub fn fix_defined_layers(&mut self, id: KeyframeId, manager: &mut CubeManager) -> Result<()> {
        let edited = self.keyframe(id).ok_or_else(|| unknown_keyframe(id))?;
        let (layer, start, end) = (edited.layer, edited.start_time, edited.end_time());
        if !self.is_defined_layer(layer) {
            return Ok(());
        }

        let same_layer = || self.keyframes.iter().filter(move |k| k.layer == layer && k.id != id);
        let mut dependents: Vec<(KeyframeId, f32)> = same_layer()
            .filter(|k| k.end_time() > start && k.end_time() < end)
            .map(|k| (k.id, k.end_time()))
            .collect();
        if let Some(next) = same_layer()
            .filter(|k| k.end_time() > end)
            .min_by(|a, b| a.end_time().total_cmp(&b.end_time()))
        {
            dependents.push((next.id, next.end_time()));
        }
        dependents.sort_by(|a, b| a.1.total_cmp(&b.1));

        let epsilon = get_config().defined_epsilon;
        for (dependent, dependent_end) in dependents {
            let Some(target) = self.defined_keyframe_info.get(&dependent).cloned() else {
                continue;
            };
            let live = self.pose_at(dependent_end, manager);
            let diff = target.difference(&live);

            let Some(keyframe) = self.keyframe_mut(dependent) else {
                continue;
            };
            add_into(&mut keyframe.rotation_map, &diff.rotation, epsilon);
            add_into(&mut keyframe.rotation_point_map, &diff.position, epsilon);
            log::debug!("Defined keyframe {:?} corrected after edit of {:?}", dependent, id);
        }
        manager.reset_to_bind_pose();
        Ok(())
    }

    fn is_defined_layer(&self, layer: u32) -> bool {
        self.layer_info(layer).map_or(false, |info| info.defined_mode)
    }

    /// 从绑定姿态求值到 `ticks` 并记录
    fn pose_at(&self, ticks: f32, manager: &mut CubeManager) -> PoseCapture {
        manager.reset_to_bind_pose();
        self.animate_at(ticks, manager);
        PoseCapture::capture(manager)
    }
}

fn unknown_keyframe(id: KeyframeId) -> AnimError {
    AnimError::Animation(format!("Unknown keyframe {:?}", id))
}

fn add_into(map: &mut DeltaMap, diff: &DeltaMap, epsilon: f32) {
    for (name, value) in diff {
        if is_negligible(*value, epsilon) {
            continue;
        }
        *map.entry(name.clone()).or_default() += *value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Cube;
    use glam::Vec3;

    fn manager() -> CubeManager {
        let mut manager = CubeManager::new();
        manager.add_cube(Cube::new("head"));
        manager.add_cube(Cube::new("tail").with_position(Vec3::new(0.0, 0.0, -4.0)));
        manager.build_hierarchy();
        manager
    }

    fn add(handler: &mut AnimationHandler, start: f32, duration: f32, cube: &str, rotation: Vec3) -> KeyframeId {
        let id = handler.create_keyframe(0);
        let keyframe = handler.keyframe_mut(id).unwrap();
        keyframe.start_time = start;
        keyframe.duration = duration;
        keyframe.rotation_map.insert(cube.into(), rotation);
        id
    }

    fn rotation_at(handler: &AnimationHandler, manager: &mut CubeManager, ticks: f32, cube: usize) -> Vec3 {
        manager.reset_to_bind_pose();
        handler.animate_at(ticks, manager);
        manager.rotation(cube)
    }

    #[test]
    fn test_next_keyframe_keeps_target() {
        let mut manager = manager();
        let mut handler = AnimationHandler::new();
        let first = add(&mut handler, 0.0, 10.0, "head", Vec3::new(10.0, 0.0, 0.0));
        let second = add(&mut handler, 10.0, 10.0, "head", Vec3::new(5.0, 0.0, 0.0));
        handler.layer_info_mut(0).unwrap().defined_mode = true;
        handler.ensure_defined_layers(&mut manager);
        assert_eq!(handler.defined_target(second).unwrap().rotation["head"].x, 15.0);

        handler.keyframe_mut(first).unwrap().rotation_map.insert("head".into(), Vec3::new(20.0, 0.0, 0.0));
        handler.update_defined_keyframe(first, &mut manager).unwrap();

        assert_eq!(handler.defined_target(first).unwrap().rotation["head"].x, 20.0);
        assert_eq!(handler.keyframe(second).unwrap().rotation_map["head"].x, -5.0);
        assert!((rotation_at(&handler, &mut manager, 20.0, 0).x - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_inner_keyframe_and_new_entry() {
        let mut manager = manager();
        let mut handler = AnimationHandler::new();
        let outer = add(&mut handler, 0.0, 20.0, "head", Vec3::ZERO);
        let inner = add(&mut handler, 0.0, 5.0, "tail", Vec3::new(0.0, 30.0, 0.0));
        handler.layer_info_mut(0).unwrap().defined_mode = true;
        handler.ensure_defined_layers(&mut manager);

        handler.keyframe_mut(outer).unwrap().rotation_map.insert("tail".into(), Vec3::new(0.0, 40.0, 0.0));
        handler.update_defined_keyframe(outer, &mut manager).unwrap();

        // outer 在 t=5 时贡献 10°，inner 需要抵消
        let inner_keyframe = handler.keyframe(inner).unwrap();
        assert!((inner_keyframe.rotation_map["tail"].y - 20.0).abs() < 1e-4);
        assert!((rotation_at(&handler, &mut manager, 5.0, 1).y - 30.0).abs() < 1e-4);
        assert!(!inner_keyframe.rotation_map.contains_key("head"));
    }

    #[test]
    fn test_non_defined_layer_untouched() {
        let mut manager = manager();
        let mut handler = AnimationHandler::new();
        let first = add(&mut handler, 0.0, 10.0, "head", Vec3::new(10.0, 0.0, 0.0));
        let second = add(&mut handler, 10.0, 10.0, "head", Vec3::new(5.0, 0.0, 0.0));
        handler.ensure_defined_layers(&mut manager);
        handler.update_defined_keyframe(first, &mut manager).unwrap();
        assert!(handler.defined_target(first).is_none());
        assert_eq!(handler.keyframe(second).unwrap().rotation_map["head"].x, 5.0);
    }

    #[test]
    fn test_unknown_keyframe() {
        let mut manager = manager();
        let mut handler = AnimationHandler::new();
        let result = handler.fix_defined_layers(KeyframeId(42), &mut manager);
        assert!(matches!(result, Err(AnimError::Animation(_))));
    }
}
