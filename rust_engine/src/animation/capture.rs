//! 姿态快照

use glam::Vec3;

use super::keyframe::DeltaMap;
use crate::skeleton::CubeManager;

/// 按方块名记录的姿态快照（旋转 / 位置 / cube grow）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseCapture {
    pub rotation: DeltaMap,
    pub position: DeltaMap,
    pub cube_grow: DeltaMap,
}

impl PoseCapture {
    /// 记录全部方块的当前姿态
    pub fn capture(manager: &CubeManager) -> Self {
        let mut capture = Self::default();
        for cube in manager.cubes() {
            capture.rotation.insert(cube.name.clone(), cube.rotation);
            capture.position.insert(cube.name.clone(), cube.position);
            capture.cube_grow.insert(cube.name.clone(), cube.current_grow());
        }
        capture
    }

    /// 逐字段计算 `self - other`，只保留两边都存在的方块
    pub fn difference(&self, other: &PoseCapture) -> PoseCapture {
        PoseCapture {
            rotation: subtract(&self.rotation, &other.rotation),
            position: subtract(&self.position, &other.position),
            cube_grow: subtract(&self.cube_grow, &other.cube_grow),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty() && self.position.is_empty() && self.cube_grow.is_empty()
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) {
        for map in [&mut self.rotation, &mut self.position, &mut self.cube_grow] {
            if let Some(value) = map.remove(old_name) {
                map.insert(new_name.to_string(), value);
            }
        }
    }
}

fn subtract(a: &DeltaMap, b: &DeltaMap) -> DeltaMap {
    a.iter()
        .filter_map(|(name, value)| b.get(name).map(|other| (name.clone(), *value - *other)))
        .collect()
}

/// 近似相等（用于跳过极小的修正量）
pub(crate) fn is_negligible(value: Vec3, epsilon: f32) -> bool {
    value.abs().max_element() <= epsilon
}
