//! headers/raw.rs
//! Structural, generation-agnostic header parse.
//!
//! Reads the magic GUID and then blocks until the Data block, enforcing
//! ordering and uniqueness. No keys are involved; the generation-specific
//! loaders decrypt and type the blocks afterwards.

use std::io::Read;

use tracing::debug;

use crate::constants::MAGIC_GUID;
use crate::headers::block::HeaderBlock;
use crate::headers::payload::{BlockPayload, VersionInfo};
use crate::headers::types::{BlockType, HeaderError, LoadState};

#[derive(Clone, Debug)]
pub struct RawHeaders {
    blocks: Vec<HeaderBlock>,
    state: LoadState,
    max_block_len: usize,
}

impl RawHeaders {
    /// Read the magic, the Preamble and the Version block only.
    ///
    /// Callers inspect [`RawHeaders::version`] and then continue with
    /// [`RawHeaders::read_remaining`] on the same reader.
    pub fn read_prologue<R: Read + ?Sized>(r: &mut R, max_block_len: usize) -> Result<Self, HeaderError> {
        let mut raw = Self { blocks: Vec::new(), state: LoadState::Start, max_block_len };
        let mut magic = [0u8; 16];
        r.read_exact(&mut magic)
            .map_err(|e| HeaderError::from_read(e, "magic"))?;
        if magic != MAGIC_GUID {
            return Err(HeaderError::InvalidMagic { have: magic });
        }
        raw.state = LoadState::MagicRead;

        raw.state = LoadState::HeaderBlocksReading;
        for _ in 0..2 {
            let block = HeaderBlock::read_from(r, max_block_len)?;
            raw.push(block)?;
        }
        Ok(raw)
    }

    /// Continue reading blocks until the Data block.
    pub fn read_remaining<R: Read + ?Sized>(&mut self, r: &mut R) -> Result<(), HeaderError> {
        while self.state == LoadState::HeaderBlocksReading {
            let block = HeaderBlock::read_from(r, self.max_block_len)?;
            self.push(block)?;
        }
        debug!(blocks = self.blocks.len(), "header blocks read");
        Ok(())
    }

    /// Full structural parse of a stream positioned at its start.
    pub fn parse<R: Read + ?Sized>(r: &mut R, max_block_len: usize) -> Result<Self, HeaderError> {
        let mut raw = Self::read_prologue(r, max_block_len)?;
        raw.read_remaining(r)?;
        Ok(raw)
    }

    fn push(&mut self, block: HeaderBlock) -> Result<(), HeaderError> {
        let t = block.block_type();
        match self.blocks.len() {
            0 if t != BlockType::Preamble => {
                return Err(HeaderError::OutOfOrder { block_type: t as u8, expected: BlockType::Preamble as u8 });
            }
            1 if t != BlockType::Version => {
                return Err(HeaderError::OutOfOrder { block_type: t as u8, expected: BlockType::Version as u8 });
            }
            _ => {}
        }
        if t.is_trailing() {
            return Err(HeaderError::TrailingBeforeData { block_type: t as u8 });
        }
        if self.blocks.iter().any(|b| b.block_type() == t) {
            return Err(HeaderError::DuplicateBlock { block_type: t as u8 });
        }
        if t == BlockType::Data {
            if self.blocks.len() < 2 {
                return Err(HeaderError::MissingBlock { block_type: BlockType::Version as u8 });
            }
            self.state = LoadState::DataReached;
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn blocks(&self) -> &[HeaderBlock] {
        &self.blocks
    }

    pub fn find(&self, block_type: BlockType) -> Option<&HeaderBlock> {
        self.blocks.iter().find(|b| b.block_type() == block_type)
    }

    pub fn require(&self, block_type: BlockType) -> Result<&HeaderBlock, HeaderError> {
        self.find(block_type)
            .ok_or(HeaderError::MissingBlock { block_type: block_type as u8 })
    }

    pub fn version(&self) -> Result<VersionInfo, HeaderError> {
        VersionInfo::from_block(self.require(BlockType::Version)?)
    }

    /// Reject blocks that belong to the other generation.
    pub fn forbid(&self, block_type: BlockType, context: &'static str) -> Result<(), HeaderError> {
        match self.find(block_type) {
            Some(_) => Err(HeaderError::UnexpectedBlock { block_type: block_type as u8, context }),
            None => Ok(()),
        }
    }

    /// Header bytes from the magic through the Data block.
    pub fn encoded_len(&self) -> u64 {
        (MAGIC_GUID.len() + self.blocks.iter().map(HeaderBlock::encoded_len).sum::<usize>()) as u64
    }

    pub fn into_blocks(self) -> Vec<HeaderBlock> {
        self.blocks
    }
}
