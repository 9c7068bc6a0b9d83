//! DCA 编码（总是写出当前版本）

use super::{write_vec3, DcaFile, DcaKeyframe, FormatVersion};
use crate::animation::{AnimationEvent, DeltaMap};
use crate::codec::ByteBuffer;
use crate::Result;

pub(crate) fn write_dca(file: &DcaFile) -> Result<Vec<u8>> {
    let mut buffer = ByteBuffer::new();
    buffer.write_f32(FormatVersion::CURRENT.number() as f32)?;

    buffer.write_count(file.keyframes.len())?;
    for keyframe in &file.keyframes {
        write_keyframe(&mut buffer, keyframe)?;
    }
    write_events(&mut buffer, &file.events)?;

    Ok(buffer.into_bytes())
}

fn write_keyframe(buffer: &mut ByteBuffer, keyframe: &DcaKeyframe) -> Result<()> {
    buffer.write_f32(keyframe.start_time)?;
    buffer.write_f32(keyframe.duration)?;
    buffer.write_f32(keyframe.layer as f32)?;

    write_delta_map(buffer, &keyframe.rotation_map)?;
    write_delta_map(buffer, &keyframe.rotation_point_map)?;

    buffer.write_count(keyframe.progression_points.len())?;
    for point in &keyframe.progression_points {
        buffer.write_f32(point.x)?;
        buffer.write_f32(point.y)?;
    }
    Ok(())
}

fn write_delta_map(buffer: &mut ByteBuffer, map: &DeltaMap) -> Result<()> {
    buffer.write_count(map.len())?;
    for (name, value) in map {
        buffer.write_string(name)?;
        write_vec3(buffer, *value)?;
    }
    Ok(())
}

fn write_events(buffer: &mut ByteBuffer, events: &[AnimationEvent]) -> Result<()> {
    buffer.write_count(events.len())?;
    for event in events {
        buffer.write_f32(event.time)?;
        buffer.write_count(event.data.len())?;
        for data in &event.data {
            buffer.write_string(&data.event_type)?;
            buffer.write_string(&data.data)?;
        }
    }
    Ok(())
}
