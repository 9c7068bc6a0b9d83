//! Cube Animation Engine - 方块模型关键帧动画引擎
//!
//! 提供：
//! - 方块层级（Cube 树）与世界变换
//! - 变换锁定器、镜像与轴反转
//! - 关键帧 / 时间轴播放（循环、图层、Defined 图层）
//! - DCA 二进制动画格式的读写与多版本修复

pub mod animation;
pub mod codec;
pub mod config;
pub mod dca;
pub mod geometry;
pub mod skeleton;

pub use animation::{
    AnimationEvent, AnimationHandler, EventData, Keyframe, KeyframeId, LayerInfo, LoopData,
    PlayState, PoseCapture, ProgressionPoint,
};
pub use codec::ByteBuffer;
pub use config::AnimationConfig;
pub use dca::{export_dca, import_dca, DcaFile, DcaKeyframe, FormatVersion};
pub use geometry::{invert, mirror, LockMode, MirrorPreview, TransformLocker};
pub use skeleton::{Cube, CubeManager};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DCA decode error: {0}")]
    Decode(String),

    #[error("DCA encode error: {0}")]
    Encode(String),

    #[error("Unsupported DCA version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Animation error: {0}")]
    Animation(String),
}

pub type Result<T> = std::result::Result<T, AnimError>;
