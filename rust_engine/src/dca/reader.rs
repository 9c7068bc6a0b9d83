//! DCA 解码

use super::{read_vec3, DcaFile, DcaKeyframe, FormatVersion};
use crate::animation::{AnimationEvent, DeltaMap, EventData, ProgressionPoint};
use crate::codec::ByteBuffer;
use crate::{AnimError, Result};

pub(crate) fn read_dca(buffer: &mut ByteBuffer) -> Result<DcaFile> {
    let version = FormatVersion::from_raw(buffer.read_f32()?)?;
    buffer.set_legacy_strings(version.legacy_strings());

    let keyframe_count = buffer.read_count()?;
    let mut keyframes = Vec::with_capacity(keyframe_count);
    for _ in 0..keyframe_count {
        keyframes.push(read_keyframe(buffer, version)?);
    }

    let events = match version {
        FormatVersion::V4 | FormatVersion::V5 => read_events(buffer)?,
        FormatVersion::V0 | FormatVersion::V1 | FormatVersion::V2 | FormatVersion::V3 => Vec::new(),
    };

    if buffer.remaining() > 0 {
        log::warn!("Ignoring {} trailing bytes after DCA data", buffer.remaining());
    }

    Ok(DcaFile {
        version,
        keyframes,
        events,
    })
}

fn read_keyframe(buffer: &mut ByteBuffer, version: FormatVersion) -> Result<DcaKeyframe> {
    let start_time = buffer.read_f32()?;
    let duration = buffer.read_f32()?;
    let layer = if version.has_layers() {
        read_layer(buffer)?
    } else {
        0
    };

    let rotation_map = read_delta_map(buffer)?;
    let rotation_point_map = read_delta_map(buffer)?;

    let progression_points = if version.has_progression() {
        let count = buffer.read_count()?;
        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            let x = buffer.read_f32()?;
            let y = buffer.read_f32()?;
            points.push(ProgressionPoint {
                x,
                y,
                required: x == 0.0 || x == 1.0,
            });
        }
        points
    } else {
        ProgressionPoint::defaults()
    };

    Ok(DcaKeyframe {
        start_time,
        duration,
        layer,
        rotation_map,
        rotation_point_map,
        progression_points,
    })
}

fn read_layer(buffer: &mut ByteBuffer) -> Result<u32> {
    let value = buffer.read_f32()?;
    if !value.is_finite() || value < 0.0 || value >= u32::MAX as f32 {
        return Err(AnimError::Decode(format!("Invalid layer id {}", value)));
    }
    Ok(value.round() as u32)
}

fn read_delta_map(buffer: &mut ByteBuffer) -> Result<DeltaMap> {
    let count = buffer.read_count()?;
    let mut map = DeltaMap::new();
    for _ in 0..count {
        let name = buffer.read_string()?;
        let value = read_vec3(buffer)?;
        if map.insert(name.clone(), value).is_some() {
            log::warn!("Duplicate entry for cube '{}', keeping the last one", name);
        }
    }
    Ok(map)
}

fn read_events(buffer: &mut ByteBuffer) -> Result<Vec<AnimationEvent>> {
    let count = buffer.read_count()?;
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        let time = buffer.read_f32()?;
        let data_count = buffer.read_count()?;
        let mut data = Vec::with_capacity(data_count);
        for _ in 0..data_count {
            let event_type = buffer.read_string()?;
            let value = buffer.read_string()?;
            data.push(EventData::new(event_type, value));
        }
        events.push(AnimationEvent { time, data });
    }
    Ok(events)
}
