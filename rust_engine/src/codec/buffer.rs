//! 可增长字节缓冲区
//!
//! 数字一律为 4 字节 IEEE-754 浮点（计数和整数也按浮点写入，读取时取整）；
//! 字符串为 2 字节有符号长度 + UTF-8，旧格式使用浮点长度；布尔值为 1 个有符号字节。
//! 字节序为大端，与 JVM 端的读取器一致。

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{AnimError, Result};

/// 带读游标的字节缓冲区，写入追加到末尾
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    cursor: Cursor<Vec<u8>>,
    /// 旧格式（v < 1）字符串长度使用浮点编码
    legacy_strings: bool,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有字节创建，游标位于开头
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: Cursor::new(bytes.into()),
            legacy_strings: false,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    pub fn rewind(&mut self) {
        self.cursor.set_position(0);
    }

    pub fn set_legacy_strings(&mut self, legacy: bool) {
        self.legacy_strings = legacy;
    }

    pub fn legacy_strings(&self) -> bool {
        self.legacy_strings
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.cursor
            .read_f32::<BigEndian>()
            .map_err(|e| AnimError::Decode(format!("Failed to read float at {}: {}", self.position(), e)))
    }

    /// 读取以浮点存储的计数
    pub fn read_count(&mut self) -> Result<usize> {
        let value = self.read_f32()?;
        if !value.is_finite() || value < 0.0 {
            return Err(AnimError::Decode(format!("Invalid count {}", value)));
        }
        let count = value.round() as usize;
        // 每个元素至少占 1 字节，超过剩余长度的计数必然是损坏的数据
        if count > self.remaining() {
            return Err(AnimError::Decode(format!(
                "Count {} exceeds remaining {} bytes",
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let length = if self.legacy_strings {
            let value = self.read_f32()?;
            if !value.is_finite() || value < 0.0 {
                return Err(AnimError::Decode(format!("Invalid string length {}", value)));
            }
            value.round() as usize
        } else {
            let value = self
                .cursor
                .read_i16::<BigEndian>()
                .map_err(|e| AnimError::Decode(format!("Failed to read string length: {}", e)))?;
            if value < 0 {
                return Err(AnimError::Decode(format!("Negative string length {}", value)));
            }
            value as usize
        };

        if length > self.remaining() {
            return Err(AnimError::Decode(format!(
                "String length {} exceeds remaining {} bytes",
                length,
                self.remaining()
            )));
        }
        let mut bytes = vec![0u8; length];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|e| AnimError::Decode(format!("Failed to read string: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AnimError::Decode(format!("Invalid UTF-8 string: {}", e)))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let value = self
            .cursor
            .read_i8()
            .map_err(|e| AnimError::Decode(format!("Failed to read bool: {}", e)))?;
        Ok(value != 0)
    }

    // 写操作总是追加到末尾，不移动读游标

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.cursor.get_mut().write_f32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_count(&mut self, count: usize) -> Result<()> {
        self.write_f32(count as f32)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let out = self.cursor.get_mut();
        if self.legacy_strings {
            out.write_f32::<BigEndian>(bytes.len() as f32)?;
        } else {
            let length = i16::try_from(bytes.len()).map_err(|_| {
                AnimError::Encode(format!("String of {} bytes is too long to encode", bytes.len()))
            })?;
            out.write_i16::<BigEndian>(length)?;
        }
        out.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.cursor.get_mut().write_i8(if value { 1 } else { 0 })?;
        Ok(())
    }
}
