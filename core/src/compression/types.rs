//! compression/types.rs
//! Codec traits and errors.
use std::fmt;

#[derive(Debug)]
pub enum CompressionError {
    InvalidLevel { level: u32 },
    CodecProcessFailed { codec: String, msg: String },
    StateError(String),
}

impl From<std::io::Error> for CompressionError {
    fn from(e: std::io::Error) -> Self {
        CompressionError::StateError(e.to_string())
    }
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CompressionError::*;
        match self {
            InvalidLevel { level } =>
                write!(f, "invalid compression level: {}", level),
            CodecProcessFailed { codec, msg } =>
                write!(f, "codec {} process failed: {}", codec, msg),
            StateError(msg) =>
                write!(f, "compression state error: {}", msg),
        }
    }
}

impl std::error::Error for CompressionError {}

// Require Send so trait objects can cross thread boundaries.
// Both directions are one continuous stream: chunk boundaries carry no framing.
pub trait Compressor: Send {
    /// Compress a chunk, appending every byte that can be emitted so far.
    fn compress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), CompressionError>;
    /// Terminate the stream.
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), CompressionError>;
}

pub trait Decompressor: Send {
    /// Inflate a chunk of the stream into out buffer.
    fn decompress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), CompressionError>;
    /// Drain whatever the codec still holds.
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), CompressionError>;
}
