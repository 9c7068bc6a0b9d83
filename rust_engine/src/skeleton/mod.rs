//! 方块层级系统

mod cube;
mod manager;

pub use cube::Cube;
pub use manager::CubeManager;

use glam::{EulerRot, Quat, Vec3};

/// 方块的可动画状态（绑定姿态 / 快照）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubePose {
    /// 本地旋转（角度制，ZYX 顺序）
    pub rotation: Vec3,
    /// 旋转点（本地位置）
    pub position: Vec3,
    pub offset: Vec3,
    pub cube_grow: Vec3,
}

impl Default for CubePose {
    fn default() -> Self {
        Self {
            rotation: Vec3::ZERO,
            position: Vec3::ZERO,
            offset: Vec3::ZERO,
            cube_grow: Vec3::ZERO,
        }
    }
}

/// 角度制欧拉角（x, y, z）转四元数，旋转顺序 ZYX
pub fn euler_degrees_to_quat(rotation: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::ZYX,
        rotation.z.to_radians(),
        rotation.y.to_radians(),
        rotation.x.to_radians(),
    )
}

/// 四元数转角度制欧拉角（x, y, z），旋转顺序 ZYX
pub fn quat_to_euler_degrees(rotation: Quat) -> Vec3 {
    let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euler_round_trip() {
        let rotation = Vec3::new(30.0, -20.0, 75.0);
        let back = quat_to_euler_degrees(euler_degrees_to_quat(rotation));
        assert!((back - rotation).abs().max_element() < 1e-3);
    }

    #[test]
    fn test_rotation_order_is_zyx() {
        let q = euler_degrees_to_quat(Vec3::new(90.0, 0.0, 90.0));
        // 先绕 X 再绕 Z：X 轴先保持不变，再被 Z 转到 Y
        let x_axis = q * Vec3::X;
        assert!((x_axis - Vec3::Y).length() < 1e-5);
    }
}
