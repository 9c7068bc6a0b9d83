//! 二进制编解码基础

mod buffer;

pub use buffer::ByteBuffer;
