//! 几何工具：变换锁定器、镜像、轴反转

mod invert;
mod locker;
mod mirror;

pub use invert::invert;
pub use locker::{LockMode, TransformLocker};
pub use mirror::{mirror, reflect_point, MirrorPreview};
