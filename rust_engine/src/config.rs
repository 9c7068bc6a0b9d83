//! 动画引擎配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use glam::Vec3;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 动画配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct AnimationConfig {
    // ========== 关键帧 ==========
    /// cube grow 混合后网格缩放的最小分量，默认 1e-5
    /// 缩放为 0 时替换成此值，避免退化几何
    pub grow_scale_epsilon: f32,

    // ========== 旧版本修复 ==========
    /// 旧版 (v <= 4) 镜像修复使用的世界空间枢轴点
    pub legacy_mirror_pivot: Vec3,
    /// 相邻关键帧旋转分量跳变超过此角度（度）时视为 360° 回绕
    pub wraparound_threshold: f32,

    // ========== Defined 图层 ==========
    /// Defined 图层修正时，小于此值的差异不写入关键帧
    pub defined_epsilon: f32,

    // ========== 调试 ==========
    /// 是否输出修复流程的调试日志，默认 false
    pub debug_log: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            grow_scale_epsilon: 1e-5,

            // 旧版模型在 Y 方向以 1.5 个方块（24 像素）为中心翻转，
            // 沿用旧文件中的字面常量
            legacy_mirror_pivot: Vec3::new(0.0, 24.0, 0.0),
            wraparound_threshold: 180.0,

            defined_epsilon: 1e-6,

            debug_log: false,
        }
    }
}

/// 全局配置实例
static ANIMATION_CONFIG: Lazy<RwLock<AnimationConfig>> =
    Lazy::new(|| RwLock::new(AnimationConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> AnimationConfig {
    ANIMATION_CONFIG
        .read()
        .map(|config| config.clone())
        .unwrap_or_default()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: AnimationConfig) {
    if let Ok(mut guard) = ANIMATION_CONFIG.write() {
        *guard = config;
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(AnimationConfig::default());
}
