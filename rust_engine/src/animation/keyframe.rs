//! 动画关键帧
//!
//! 关键帧存的是**增量**：`animate` 把增量叠加到方块当前的姿态上，而不是覆盖。

use std::collections::BTreeMap;

use glam::Vec3;

use super::progression::{self, ProgressionPoint};
use crate::config::get_config;
use crate::skeleton::CubeManager;

/// 关键帧标识（在所属 AnimationHandler 内唯一）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyframeId(pub u64);

/// 方块名 -> 三分量增量
pub type DeltaMap = BTreeMap<String, Vec3>;

/// 关键帧
#[derive(Clone, Debug)]
pub struct Keyframe {
    pub id: KeyframeId,
    pub layer: u32,
    pub start_time: f32,
    /// 持续时间（tick），必须大于 0 才有效果
    pub duration: f32,
    /// 旋转增量（角度）
    pub rotation_map: DeltaMap,
    /// 位置（旋转点）增量
    pub rotation_point_map: DeltaMap,
    /// cube grow 增量，只在循环关键帧中使用
    pub cube_grow_map: DeltaMap,
    pub progression_points: Vec<ProgressionPoint>,
    /// 跳过此关键帧（不产生任何贡献）
    pub skip: bool,
}

impl Keyframe {
    pub fn new(id: KeyframeId) -> Self {
        Self {
            id,
            layer: 0,
            start_time: 0.0,
            duration: 0.0,
            rotation_map: DeltaMap::new(),
            rotation_point_map: DeltaMap::new(),
            cube_grow_map: DeltaMap::new(),
            progression_points: ProgressionPoint::defaults(),
            skip: false,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.start_time + self.duration
    }

    /// 进度曲线求值（反向存储，返回实际进度）
    pub fn get_progression_value(&self, t: f32) -> f32 {
        progression::progression_value(&self.progression_points, t)
    }

    /// 替换进度曲线（排序并补齐端点）
    pub fn set_progression_points(&mut self, mut points: Vec<ProgressionPoint>) {
        progression::normalize_points(&mut points);
        self.progression_points = points;
    }

    pub fn add_progression_point(&mut self, x: f32, y: f32) {
        let mut points = std::mem::take(&mut self.progression_points);
        points.retain(|p| p.x != x);
        points.push(ProgressionPoint::new(x, y));
        self.set_progression_points(points);
    }

    /// 删除控制点，端点不可删除
    pub fn remove_progression_point(&mut self, index: usize) -> bool {
        match self.progression_points.get(index) {
            Some(point) if !point.required => {
                self.progression_points.remove(index);
                true
            }
            _ => false,
        }
    }

    /// 在指定 tick 处求值并叠加到方块上
    pub fn animate(&self, ticks: f32, manager: &mut CubeManager) {
        if self.skip || self.duration <= 0.0 {
            return;
        }
        let mut percentage = (ticks - self.start_time) / self.duration;
        if percentage <= 0.0 {
            return;
        }
        if percentage > 1.0 {
            percentage = 1.0;
        }
        self.animate_percentage(self.get_progression_value(percentage), manager);
    }

    /// 把 `delta * percentage` 叠加到方块当前姿态
    pub fn animate_percentage(&self, percentage: f32, manager: &mut CubeManager) {
        for (name, delta) in &self.rotation_map {
            if let Some(index) = manager.find_cube_by_name(name) {
                let rotation = manager.rotation(index) + *delta * percentage;
                manager.set_rotation(index, rotation);
            }
        }

        for (name, delta) in &self.rotation_point_map {
            if let Some(index) = manager.find_cube_by_name(name) {
                let position = manager.position(index) + *delta * percentage;
                manager.set_position(index, position);
            }
        }

        if self.cube_grow_map.is_empty() {
            return;
        }
        let epsilon = get_config().grow_scale_epsilon;
        for (name, delta) in &self.cube_grow_map {
            if let Some(index) = manager.find_cube_by_name(name) {
                let grow = *delta * percentage;
                manager.set_mesh_position(index, manager.mesh_position(index) - grow);

                // 缩放为 0 会导致几何退化
                let scale = manager.mesh_scale(index) + grow * 2.0;
                let scale = Vec3::select(scale.cmpeq(Vec3::ZERO), Vec3::splat(epsilon), scale);
                manager.set_mesh_scale(index, scale);
            }
        }
    }

    /// 深拷贝时间、旋转/位置增量和进度曲线（不含 grow 增量）
    pub fn clone_keyframe(&self, id: KeyframeId) -> Keyframe {
        Keyframe {
            id,
            layer: self.layer,
            start_time: self.start_time,
            duration: self.duration,
            rotation_map: self.rotation_map.clone(),
            rotation_point_map: self.rotation_point_map.clone(),
            cube_grow_map: DeltaMap::new(),
            progression_points: self.progression_points.clone(),
            skip: false,
        }
    }

    /// 方块改名时同步重建三个增量表的键
    pub fn rename(&mut self, old_name: &str, new_name: &str) {
        for map in [
            &mut self.rotation_map,
            &mut self.rotation_point_map,
            &mut self.cube_grow_map,
        ] {
            if let Some(value) = map.remove(old_name) {
                map.insert(new_name.to_string(), value);
            }
        }
    }

    /// 所有增量乘以 factor
    pub fn scale_deltas(&mut self, factor: f32) {
        for map in [
            &mut self.rotation_map,
            &mut self.rotation_point_map,
            &mut self.cube_grow_map,
        ] {
            for value in map.values_mut() {
                *value *= factor;
            }
        }
    }

    /// 关键帧涉及的所有方块名
    pub fn cube_names(&self) -> impl Iterator<Item = &String> {
        self.rotation_map
            .keys()
            .chain(self.rotation_point_map.keys())
            .chain(self.cube_grow_map.keys())
    }
}
