//! Deflate (zlib wrapper) via flate2 with streaming enc/dec.
//!
//! The encoder sync-flushes after every chunk so each chunk's compressed
//! bytes can be encrypted before the next chunk is read.

use std::io::Write;
use flate2::{Compression, write::{ZlibDecoder, ZlibEncoder}};

use crate::compression::types::{Compressor, Decompressor, CompressionError};

fn process_err(e: std::io::Error) -> CompressionError {
    CompressionError::CodecProcessFailed { codec: "deflate".into(), msg: e.to_string() }
}

pub struct DeflateCompressor {
    enc: Option<ZlibEncoder<Vec<u8>>>,
}

impl DeflateCompressor {
    pub fn new(level: u32) -> Result<Box<dyn Compressor + Send>, CompressionError> {
        if level > 9 {
            return Err(CompressionError::InvalidLevel { level });
        }
        Ok(Box::new(Self { enc: Some(ZlibEncoder::new(Vec::new(), Compression::new(level))) }))
    }
}

impl Compressor for DeflateCompressor {
    fn compress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), CompressionError> {
        let enc = self.enc.as_mut()
            .ok_or_else(|| CompressionError::StateError("deflate stream already finished".into()))?;
        enc.write_all(input).map_err(process_err)?;
        enc.flush().map_err(process_err)?;
        out.append(enc.get_mut());
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), CompressionError> {
        let enc = self.enc.take()
            .ok_or_else(|| CompressionError::StateError("deflate stream already finished".into()))?;
        let mut tail = enc.finish().map_err(process_err)?;
        out.append(&mut tail);
        Ok(())
    }
}

pub struct DeflateDecompressor {
    dec: Option<ZlibDecoder<Vec<u8>>>,
}

impl DeflateDecompressor {
    pub fn new() -> Result<Box<dyn Decompressor + Send>, CompressionError> {
        Ok(Box::new(Self { dec: Some(ZlibDecoder::new(Vec::new())) }))
    }
}

impl Decompressor for DeflateDecompressor {
    fn decompress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), CompressionError> {
        let dec = self.dec.as_mut()
            .ok_or_else(|| CompressionError::StateError("inflate stream already finished".into()))?;
        dec.write_all(input).map_err(process_err)?;
        dec.flush().map_err(process_err)?;
        out.append(dec.get_mut());
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), CompressionError> {
        let dec = self.dec.take()
            .ok_or_else(|| CompressionError::StateError("inflate stream already finished".into()))?;
        let mut tail = dec.finish().map_err(process_err)?;
        out.append(&mut tail);
        Ok(())
    }
}
