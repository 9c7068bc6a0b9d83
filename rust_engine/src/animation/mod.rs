//! 动画系统
//!
//! 关键帧增量、进度曲线、时间轴播放（循环混合、图层）与定义模式层。

mod capture;
mod defined;
mod handler;
mod keyframe;
mod progression;

pub use capture::PoseCapture;
pub use handler::{AnimationEvent, AnimationHandler, EventData, LayerInfo, LoopData, PlayState};
pub use keyframe::{DeltaMap, Keyframe, KeyframeId};
pub use progression::{normalize_points, progression_value, stored_value, ProgressionPoint};
