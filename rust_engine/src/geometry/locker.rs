//! 变换锁定器
//!
//! 记录节点的世界变换，在父节点（或坐标约定）改变后反推出能还原该世界变换的本地值。

use glam::Mat4;

use crate::skeleton::{quat_to_euler_degrees, CubeManager};

/// 锁定模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// 方块本体：写回 position 和 rotation
    PositionRotation,
    /// 网格：只写回 offset
    OffsetOnly,
}

/// 变换锁定器
#[derive(Clone, Debug)]
pub struct TransformLocker {
    index: usize,
    mode: LockMode,
    world: Mat4,
}

impl TransformLocker {
    /// 记录当前世界变换（调用方需保证世界矩阵是最新的）
    pub fn capture(manager: &CubeManager, index: usize, mode: LockMode) -> Self {
        let world = match mode {
            LockMode::PositionRotation => manager.world_matrix(index),
            LockMode::OffsetOnly => offset_world_matrix(manager, index),
        };
        Self { index, mode, world }
    }

    /// 用指定的目标世界矩阵创建锁定器
    pub fn with_world(index: usize, mode: LockMode, world: Mat4) -> Self {
        Self { index, mode, world }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn world(&self) -> Mat4 {
        self.world
    }

    /// 反推本地值并写回：local = inverse(parent_world) * captured
    pub fn reconstruct(&self, manager: &mut CubeManager) {
        if manager.get_cube(self.index).is_none() {
            return;
        }
        match self.mode {
            LockMode::PositionRotation => {
                let parent = manager.parent_world_matrix(self.index);
                let local = parent.inverse() * self.world;
                let (_, rotation, translation) = local.to_scale_rotation_translation();
                manager.set_position(self.index, translation);
                manager.set_rotation(self.index, quat_to_euler_degrees(rotation));
            }
            LockMode::OffsetOnly => {
                let parent = manager.world_matrix(self.index);
                let local = parent.inverse() * self.world;
                let (_, _, translation) = local.to_scale_rotation_translation();
                manager.set_offset(self.index, translation);
            }
        }
        manager.update_subtree(self.index);
    }
}

/// 网格 offset 点的世界变换（方块本体世界矩阵 * T(offset)）
fn offset_world_matrix(manager: &CubeManager, index: usize) -> Mat4 {
    manager.world_matrix(index) * Mat4::from_translation(manager.offset(index))
}
