// ## src/compression/registry.rs

//! compression/registry.rs
//! Codec factory functions.

use crate::config::CodecKind;
use crate::compression::types::{Compressor, Decompressor, CompressionError};
use crate::compression::codecs::deflate;

pub fn create_compressor(codec: CodecKind, level: u32)
    -> Result<Box<dyn Compressor + Send>, CompressionError>
{
    match codec {
        CodecKind::Deflate => deflate::DeflateCompressor::new(level),
    }
}

pub fn create_decompressor(codec: CodecKind)
    -> Result<Box<dyn Decompressor + Send>, CompressionError>
{
    match codec {
        CodecKind::Deflate => deflate::DeflateDecompressor::new(),
    }
}
