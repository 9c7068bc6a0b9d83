//! 方块节点

use glam::{Mat4, Vec3};

use super::{euler_degrees_to_quat, CubePose};

/// 方块节点
///
/// 方块本体（group）的本地变换由 `position` 和 `rotation` 决定；
/// 网格是一个单位立方体，放在 `offset - cube_grow`，缩放为 `dimension + 2 * cube_grow`。
#[derive(Clone, Debug)]
pub struct Cube {
    pub name: String,
    pub parent_index: Option<usize>,
    /// 层级深度（根为 0，在 build_hierarchy 中计算）
    pub depth: usize,

    // 本地状态
    pub rotation: Vec3,
    pub position: Vec3,
    pub offset: Vec3,
    pub dimension: Vec3,
    pub cube_grow: Vec3,

    // 网格状态（cube grow 动画直接修改这两个值）
    pub mesh_position: Vec3,
    pub mesh_scale: Vec3,

    // 绑定姿态
    pub bind: CubePose,

    // 变换结果
    pub local_transform: Mat4,
    pub global_transform: Mat4,
}

impl Cube {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_index: None,
            depth: 0,
            rotation: Vec3::ZERO,
            position: Vec3::ZERO,
            offset: Vec3::ZERO,
            dimension: Vec3::ONE,
            cube_grow: Vec3::ZERO,
            mesh_position: Vec3::ZERO,
            mesh_scale: Vec3::ONE,
            bind: CubePose::default(),
            local_transform: Mat4::IDENTITY,
            global_transform: Mat4::IDENTITY,
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent_index = Some(parent);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// 设置几何（偏移、尺寸、膨胀），同时重建网格
    pub fn with_geometry(mut self, offset: Vec3, dimension: Vec3, cube_grow: Vec3) -> Self {
        self.offset = offset;
        self.dimension = dimension;
        self.cube_grow = cube_grow;
        self.rebuild_mesh();
        self
    }

    /// 按 offset / dimension / cube_grow 重建网格
    pub fn rebuild_mesh(&mut self) {
        self.mesh_position = self.offset - self.cube_grow;
        self.mesh_scale = self.dimension + self.cube_grow * 2.0;
    }

    /// 修改偏移，保留网格上已有的 grow 动画
    pub fn set_offset(&mut self, offset: Vec3) {
        self.mesh_position += offset - self.offset;
        self.offset = offset;
    }

    /// 当前（含动画的）cube grow
    pub fn current_grow(&self) -> Vec3 {
        self.offset - self.mesh_position
    }

    /// 当前状态快照
    pub fn pose(&self) -> CubePose {
        CubePose {
            rotation: self.rotation,
            position: self.position,
            offset: self.offset,
            cube_grow: self.current_grow(),
        }
    }

    /// 把当前状态记为绑定姿态
    pub fn capture_bind(&mut self) {
        self.bind = CubePose {
            rotation: self.rotation,
            position: self.position,
            offset: self.offset,
            cube_grow: self.cube_grow,
        };
    }

    /// 恢复到绑定姿态
    pub fn reset_to_bind(&mut self) {
        self.rotation = self.bind.rotation;
        self.position = self.bind.position;
        self.offset = self.bind.offset;
        self.cube_grow = self.bind.cube_grow;
        self.rebuild_mesh();
    }

    /// 更新本地变换：T(position) * R(rotation)
    pub fn update_local_transform(&mut self) {
        self.local_transform = Mat4::from_rotation_translation(
            euler_degrees_to_quat(self.rotation),
            self.position,
        );
    }

    /// 网格相对方块本体的变换
    pub fn mesh_local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.mesh_scale,
            glam::Quat::IDENTITY,
            self.mesh_position,
        )
    }

    /// 网格包围盒的两个对角（方块本地空间，含 grow）
    pub fn mesh_corners(&self) -> (Vec3, Vec3) {
        let grow = self.current_grow();
        (
            self.offset - grow,
            self.offset + self.dimension + grow,
        )
    }
}

impl Default for Cube {
    fn default() -> Self {
        Self::new(String::new())
    }
}
