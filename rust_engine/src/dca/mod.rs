//! DCA 二进制动画格式
//!
//! 读取时按版本分派解码，得到统一的 `DcaFile`；旧版本数据在导入时经过一次修复，
//! 转换为当前版本的增量语义。写出总是使用当前版本。

mod reader;
mod repair;
mod writer;

use glam::Vec3;

use crate::animation::{AnimationEvent, AnimationHandler, DeltaMap, Keyframe, KeyframeId, ProgressionPoint};
use crate::codec::ByteBuffer;
use crate::skeleton::CubeManager;
use crate::{AnimError, Result};

/// 格式版本
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// 字符串长度为浮点
    V0,
    /// 无进度曲线，增量为绝对值
    V1,
    /// 增加进度曲线
    V2,
    /// 增量为绝对值且带有基准偏移
    V3,
    /// 增加图层和事件
    V4,
    /// 当前版本
    V5,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion::V5;

    /// 解析版本字段；高于当前版本的文件无法读取
    pub fn from_raw(value: f32) -> Result<Self> {
        if !value.is_finite() || value < 0.0 || value >= u32::MAX as f32 {
            return Err(AnimError::Decode(format!("Invalid DCA version {}", value)));
        }
        let number = value.round() as u32;
        match number {
            0 => Ok(FormatVersion::V0),
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            3 => Ok(FormatVersion::V3),
            4 => Ok(FormatVersion::V4),
            5 => Ok(FormatVersion::V5),
            found => Err(AnimError::UnsupportedVersion {
                found,
                supported: FormatVersion::CURRENT.number(),
            }),
        }
    }

    pub fn number(self) -> u32 {
        match self {
            FormatVersion::V0 => 0,
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
            FormatVersion::V3 => 3,
            FormatVersion::V4 => 4,
            FormatVersion::V5 => 5,
        }
    }

    pub fn legacy_strings(self) -> bool {
        self < FormatVersion::V1
    }

    pub fn has_progression(self) -> bool {
        self >= FormatVersion::V2
    }

    pub fn has_layers(self) -> bool {
        self >= FormatVersion::V4
    }

    pub fn has_events(self) -> bool {
        self >= FormatVersion::V4
    }

    /// v3 的增量带有每个方块自身的基准旋转/位置
    pub fn has_baseline_offset(self) -> bool {
        self == FormatVersion::V3
    }

    /// 增量存的是绝对目标，需要转换为叠加增量
    pub fn has_absolute_deltas(self) -> bool {
        self < FormatVersion::V2 || self == FormatVersion::V3
    }

    /// 同层关键帧允许重叠
    pub fn allows_overlap(self) -> bool {
        self <= FormatVersion::V3
    }

    /// 以镜像坐标约定编写
    pub fn is_mirrored(self) -> bool {
        self <= FormatVersion::V4
    }
}

/// 文件中的关键帧
#[derive(Clone, Debug, PartialEq)]
pub struct DcaKeyframe {
    pub start_time: f32,
    pub duration: f32,
    pub layer: u32,
    pub rotation_map: DeltaMap,
    pub rotation_point_map: DeltaMap,
    pub progression_points: Vec<ProgressionPoint>,
}

impl DcaKeyframe {
    pub fn from_keyframe(keyframe: &Keyframe) -> Self {
        Self {
            start_time: keyframe.start_time,
            duration: keyframe.duration,
            layer: keyframe.layer,
            rotation_map: keyframe.rotation_map.clone(),
            rotation_point_map: keyframe.rotation_point_map.clone(),
            progression_points: keyframe.progression_points.clone(),
        }
    }

    pub fn to_keyframe(&self, id: KeyframeId) -> Keyframe {
        let mut keyframe = Keyframe::new(id);
        keyframe.start_time = self.start_time;
        keyframe.duration = self.duration;
        keyframe.layer = self.layer;
        keyframe.rotation_map = self.rotation_map.clone();
        keyframe.rotation_point_map = self.rotation_point_map.clone();
        keyframe.progression_points = self.progression_points.clone();
        keyframe
    }
}

/// 解码后的 DCA 文件（与版本无关的统一表示）
#[derive(Clone, Debug, PartialEq)]
pub struct DcaFile {
    /// 文件原始版本
    pub version: FormatVersion,
    pub keyframes: Vec<DcaKeyframe>,
    pub events: Vec<AnimationEvent>,
}

impl DcaFile {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::from_bytes(bytes);
        reader::read_dca(&mut buffer)
    }

    /// 按当前版本编码
    pub fn encode(&self) -> Result<Vec<u8>> {
        writer::write_dca(self)
    }

    pub fn from_handler(handler: &AnimationHandler) -> Self {
        Self {
            version: FormatVersion::CURRENT,
            keyframes: handler.keyframes().iter().map(DcaKeyframe::from_keyframe).collect(),
            events: handler.events().to_vec(),
        }
    }
}

/// 导入 DCA 数据
///
/// 旧版本数据在 `manager` 的副本上重放修复，`manager` 本身不会被修改。
pub fn import_dca(bytes: &[u8], manager: &CubeManager) -> Result<AnimationHandler> {
    let file = DcaFile::decode(bytes)?;
    log::info!(
        "DCA v{}: {} keyframes, {} events",
        file.version.number(),
        file.keyframes.len(),
        file.events.len()
    );

    let mut keyframes: Vec<Keyframe> = file
        .keyframes
        .iter()
        .enumerate()
        .map(|(i, k)| k.to_keyframe(KeyframeId(i as u64)))
        .collect();
    if file.version < FormatVersion::CURRENT {
        repair::repair(file.version, &mut keyframes, manager);
    }

    let mut handler = AnimationHandler::new();
    for keyframe in keyframes {
        handler.add_keyframe(keyframe);
    }
    for event in file.events {
        handler.add_event(event);
    }
    Ok(handler)
}

/// 导出为当前版本的 DCA 数据
pub fn export_dca(handler: &AnimationHandler) -> Result<Vec<u8>> {
    DcaFile::from_handler(handler).encode()
}

fn read_vec3(buffer: &mut ByteBuffer) -> Result<Vec3> {
    Ok(Vec3::new(buffer.read_f32()?, buffer.read_f32()?, buffer.read_f32()?))
}

fn write_vec3(buffer: &mut ByteBuffer, value: Vec3) -> Result<()> {
    buffer.write_f32(value.x)?;
    buffer.write_f32(value.y)?;
    buffer.write_f32(value.z)
}
