//! 方块管理器

use glam::{Mat4, Vec3};
use std::collections::HashMap;

use super::Cube;

/// 方块管理器
///
/// 持有整棵方块树。动画引擎只通过名称读写方块的姿态字段。
#[derive(Clone, Debug, Default)]
pub struct CubeManager {
    cubes: Vec<Cube>,
    name_to_index: HashMap<String, usize>,
    /// 按层级深度升序排列的索引
    sorted_indices: Vec<usize>,
    children: Vec<Vec<usize>>,
}

impl CubeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加方块，返回索引
    pub fn add_cube(&mut self, cube: Cube) -> usize {
        let index = self.cubes.len();
        self.name_to_index.insert(cube.name.clone(), index);
        self.cubes.push(cube);
        index
    }

    /// 构建层级：计算深度、子节点列表、绑定姿态和世界变换
    pub fn build_hierarchy(&mut self) {
        let cube_count = self.cubes.len();

        for i in 0..cube_count {
            if let Some(parent) = self.cubes[i].parent_index {
                if parent >= cube_count || parent == i {
                    log::warn!("Cube '{}' has invalid parent {}, treated as root", self.cubes[i].name, parent);
                    self.cubes[i].parent_index = None;
                }
            }
        }

        // 环上回到自身的方块断开父链接，之后每条父链都以根结束
        for i in 0..cube_count {
            let mut current = self.cubes[i].parent_index;
            let mut steps = 0;
            while let Some(parent) = current {
                if parent == i {
                    log::warn!("Cube '{}' is part of a parent cycle, treated as root", self.cubes[i].name);
                    self.cubes[i].parent_index = None;
                    break;
                }
                steps += 1;
                if steps > cube_count {
                    break;
                }
                current = self.cubes[parent].parent_index;
            }
        }

        self.children = vec![Vec::new(); cube_count];
        for i in 0..cube_count {
            if let Some(parent) = self.cubes[i].parent_index {
                self.children[parent].push(i);
            }
        }

        for i in 0..cube_count {
            let mut depth = 0;
            let mut current = self.cubes[i].parent_index;
            while let Some(parent) = current {
                depth += 1;
                if depth > cube_count {
                    break;
                }
                current = self.cubes[parent].parent_index;
            }
            self.cubes[i].depth = depth;
        }

        self.sorted_indices = (0..cube_count).collect();
        self.sorted_indices.sort_by_key(|&i| self.cubes[i].depth);

        for cube in &mut self.cubes {
            cube.capture_bind();
        }
        self.update_world_transforms();
    }

    /// 通过名称查找方块
    pub fn find_cube_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    pub fn get_cube(&self, index: usize) -> Option<&Cube> {
        self.cubes.get(index)
    }

    pub fn get_cube_mut(&mut self, index: usize) -> Option<&mut Cube> {
        self.cubes.get_mut(index)
    }

    pub fn cubes(&self) -> &[Cube] {
        &self.cubes
    }

    pub fn cube_names(&self) -> impl Iterator<Item = &str> {
        self.cubes.iter().map(|c| c.name.as_str())
    }

    /// 按深度升序的索引（父节点总在子节点之前）
    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn depth(&self, index: usize) -> usize {
        self.cubes.get(index).map(|c| c.depth).unwrap_or(0)
    }

    /// `ancestor` 是否是 `index` 的祖先
    pub fn is_ancestor(&self, ancestor: usize, index: usize) -> bool {
        let mut current = self.cubes.get(index).and_then(|c| c.parent_index);
        // 未经 build_hierarchy 的父链可能成环，最多走 cube_count 步
        for _ in 0..self.cubes.len() {
            match current {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = self.cubes.get(parent).and_then(|c| c.parent_index),
                None => return false,
            }
        }
        false
    }

    /// 重命名方块
    pub fn rename_cube(&mut self, old_name: &str, new_name: &str) -> bool {
        if self.name_to_index.contains_key(new_name) {
            return false;
        }
        match self.name_to_index.remove(old_name) {
            Some(index) => {
                self.cubes[index].name = new_name.to_string();
                self.name_to_index.insert(new_name.to_string(), index);
                true
            }
            None => false,
        }
    }

    pub fn rotation(&self, index: usize) -> Vec3 {
        self.cubes.get(index).map(|c| c.rotation).unwrap_or(Vec3::ZERO)
    }

    pub fn set_rotation(&mut self, index: usize, rotation: Vec3) {
        if let Some(cube) = self.cubes.get_mut(index) {
            cube.rotation = rotation;
        }
    }

    pub fn position(&self, index: usize) -> Vec3 {
        self.cubes.get(index).map(|c| c.position).unwrap_or(Vec3::ZERO)
    }

    pub fn set_position(&mut self, index: usize, position: Vec3) {
        if let Some(cube) = self.cubes.get_mut(index) {
            cube.position = position;
        }
    }

    pub fn offset(&self, index: usize) -> Vec3 {
        self.cubes.get(index).map(|c| c.offset).unwrap_or(Vec3::ZERO)
    }

    pub fn set_offset(&mut self, index: usize, offset: Vec3) {
        if let Some(cube) = self.cubes.get_mut(index) {
            cube.set_offset(offset);
        }
    }

    pub fn mesh_scale(&self, index: usize) -> Vec3 {
        self.cubes.get(index).map(|c| c.mesh_scale).unwrap_or(Vec3::ONE)
    }

    pub fn set_mesh_scale(&mut self, index: usize, scale: Vec3) {
        if let Some(cube) = self.cubes.get_mut(index) {
            cube.mesh_scale = scale;
        }
    }

    pub fn mesh_position(&self, index: usize) -> Vec3 {
        self.cubes.get(index).map(|c| c.mesh_position).unwrap_or(Vec3::ZERO)
    }

    pub fn set_mesh_position(&mut self, index: usize, position: Vec3) {
        if let Some(cube) = self.cubes.get_mut(index) {
            cube.mesh_position = position;
        }
    }

    /// 恢复所有方块到绑定姿态并刷新世界变换
    pub fn reset_to_bind_pose(&mut self) {
        for cube in &mut self.cubes {
            cube.reset_to_bind();
        }
        self.update_world_transforms();
    }

    /// 把当前姿态记为新的绑定姿态（模型编辑提交后调用）
    pub fn capture_bind_pose(&mut self) {
        for cube in &mut self.cubes {
            cube.capture_bind();
        }
    }

    /// 按深度顺序更新全部世界变换
    pub fn update_world_transforms(&mut self) {
        let sorted_indices = std::mem::take(&mut self.sorted_indices);
        for &idx in &sorted_indices {
            self.update_single(idx);
        }
        self.sorted_indices = sorted_indices;
    }

    /// 更新一个方块及其所有子孙的世界变换
    pub fn update_subtree(&mut self, index: usize) {
        if index >= self.cubes.len() {
            return;
        }
        self.update_single(index);
        let children = self.children(index).to_vec();
        for child in children {
            self.update_subtree(child);
        }
    }

    fn update_single(&mut self, index: usize) {
        self.cubes[index].update_local_transform();
        let parent_global = self.parent_world_matrix(index);
        self.cubes[index].global_transform = parent_global * self.cubes[index].local_transform;
    }

    /// 世界变换（需先调用 update_world_transforms）
    pub fn world_matrix(&self, index: usize) -> Mat4 {
        self.cubes.get(index).map(|c| c.global_transform).unwrap_or(Mat4::IDENTITY)
    }

    /// 父节点世界变换，根节点返回单位矩阵
    pub fn parent_world_matrix(&self, index: usize) -> Mat4 {
        self.cubes
            .get(index)
            .and_then(|c| c.parent_index)
            .map(|p| self.cubes[p].global_transform)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// 网格的世界变换
    pub fn mesh_world_matrix(&self, index: usize) -> Mat4 {
        self.cubes
            .get(index)
            .map(|c| c.global_transform * c.mesh_local_transform())
            .unwrap_or(Mat4::IDENTITY)
    }
}
