//! headers/block.rs
//! Raw header block framing: `[type u8][payload length u32 LE][payload]`.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::constants::BLOCK_PREFIX_LEN;
use crate::headers::types::{BlockType, HeaderError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderBlock {
    block_type: BlockType,
    payload: Vec<u8>,
}

impl HeaderBlock {
    pub fn new(block_type: BlockType, payload: Vec<u8>) -> Self {
        Self { block_type, payload }
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Bytes this block occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        BLOCK_PREFIX_LEN + self.payload.len()
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        Self::write_raw(w, self.block_type, &self.payload)
    }

    /// Frame `payload` as a block without taking ownership of it.
    pub fn write_raw<W: Write + ?Sized>(w: &mut W, block_type: BlockType, payload: &[u8]) -> io::Result<()> {
        w.write_u8(block_type as u8)?;
        w.write_u32::<LittleEndian>(payload.len() as u32)?;
        w.write_all(payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.block_type as u8);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Read one block, rejecting unknown tags and payloads above `max_len`.
    pub fn read_from<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<Self, HeaderError> {
        let raw = r.read_u8().map_err(|e| HeaderError::from_read(e, "block prefix"))?;
        let block_type = BlockType::verify(raw)?;
        let len = r
            .read_u32::<LittleEndian>()
            .map_err(|e| HeaderError::from_read(e, "block prefix"))? as usize;
        if len > max_len {
            return Err(HeaderError::BlockTooLarge { block_type: raw, len, max: max_len });
        }
        let mut payload = vec![0u8; len];
        r.read_exact(&mut payload)
            .map_err(|e| HeaderError::from_read(e, "block payload"))?;
        Ok(Self { block_type, payload })
    }
}

/// Magic GUID followed by `blocks`, as written at the start of a document.
pub fn encode_document_prefix(blocks: &[HeaderBlock]) -> Vec<u8> {
    let len = crate::constants::MAGIC_GUID.len() + blocks.iter().map(HeaderBlock::encoded_len).sum::<usize>();
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&crate::constants::MAGIC_GUID);
    for block in blocks {
        out.extend_from_slice(&block.to_bytes());
    }
    out
}
