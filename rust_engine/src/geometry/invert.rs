//! 轴反转：在两种建模坐标约定之间转换方块

use std::collections::HashSet;

use glam::Vec3;

use super::mirror::lock_unselected;
use crate::skeleton::CubeManager;

/// Z 旋转翻转 180°，sign(0) 视为 -1
fn flip_z(z: f32) -> f32 {
    let sign = if z > 0.0 { 1.0 } else { -1.0 };
    z - 180.0 * sign
}

/// 反转选中方块（`cubes` 为 None 时反转全部）
///
/// 旋转 X/Y 取反，Z 翻转 180°；offset 重新映射为 `(-x - dx, -y - dy, z)`，网格的世界位置不变。
/// 未选中的子孙方块通过锁定器保持世界姿态。
pub fn invert(manager: &mut CubeManager, cubes: Option<&[usize]>) {
    manager.update_world_transforms();
    let selected: HashSet<usize> = match cubes {
        Some(list) => list.iter().copied().filter(|&i| i < manager.cube_count()).collect(),
        None => (0..manager.cube_count()).collect(),
    };
    let lockers = lock_unselected(manager, &selected);

    let order = manager.sorted_indices().to_vec();
    for index in order {
        if selected.contains(&index) {
            let Some(cube) = manager.get_cube(index) else {
                continue;
            };
            let rotation = cube.rotation;
            let offset = cube.offset;
            let dimension = cube.dimension;

            manager.set_rotation(index, Vec3::new(-rotation.x, -rotation.y, flip_z(rotation.z)));
            manager.set_offset(
                index,
                Vec3::new(-offset.x - dimension.x, -offset.y - dimension.y, offset.z),
            );
            manager.update_subtree(index);
        } else if let Some(locker) = &lockers[index] {
            locker.reconstruct(manager);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Cube;
    use glam::Mat4;

    fn model() -> CubeManager {
        let mut manager = CubeManager::new();
        let root = manager.add_cube(
            Cube::new("root")
                .with_position(Vec3::new(0.0, 8.0, 0.0))
                .with_rotation(Vec3::new(10.0, 20.0, 30.0))
                .with_geometry(Vec3::new(-2.0, -3.0, -1.0), Vec3::new(4.0, 5.0, 2.0), Vec3::ZERO),
        );
        manager.add_cube(
            Cube::new("child")
                .with_parent(root)
                .with_position(Vec3::new(1.0, 2.0, 3.0))
                .with_rotation(Vec3::new(0.0, 0.0, -40.0)),
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

    #[test]
    fn test_flip_z_sign_convention() {
        assert_eq!(flip_z(0.0), 180.0);
        assert_eq!(flip_z(30.0), -150.0);
        assert_eq!(flip_z(-30.0), 150.0);
    }

    #[test]
    fn test_invert_values() {
        let mut manager = model();
        invert(&mut manager, Some(&[0]));
        assert_eq!(manager.rotation(0), Vec3::new(-10.0, -20.0, -150.0));
        assert_eq!(manager.offset(0), Vec3::new(-2.0, -2.0, -1.0));
    }

    #[test]
    fn test_invert_keeps_mesh_in_place() {
        let mut manager = model();
        let before = manager.mesh_world_matrix(0);

        invert(&mut manager, Some(&[0]));

        // 绕本地 Z 轴转了 180°，网格角点在 XY 方向交换
        let after = manager.mesh_world_matrix(0);
        let a = after.transform_point3(Vec3::ZERO);
        let b = after.transform_point3(Vec3::ONE);
        assert!((a - before.transform_point3(Vec3::new(1.0, 1.0, 0.0))).length() < 1e-4);
        assert!((b - before.transform_point3(Vec3::new(0.0, 0.0, 1.0))).length() < 1e-4);
    }

    #[test]
    fn test_unselected_child_world_preserved() {
        let mut manager = model();
        let child_world = manager.world_matrix(1);
        invert(&mut manager, Some(&[0]));
        assert!(max_diff(manager.world_matrix(1), child_world) < 1e-4);
    }
}
