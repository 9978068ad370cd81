use std::fmt;
use std::io;

use num_enum::TryFromPrimitive;

use crate::utils::{enum_name_or_hex, fmt_bytes};

/// Header block tags as they appear on the wire.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum BlockType {
    Preamble = 2,
    Version = 3,
    KeyWrap1 = 4,
    Data = 63,
    FileNameInfo = 64,
    EncryptionInfo = 65,
    CompressionFlag = 66,
    FileInfo = 67,
    CompressionInfo = 68,
    UnicodeFileNameInfo = 69,
    KeyWrap2 = 80,
    EncryptedDataPart = 81,
    PlaintextLengths = 82,
    V2Hmac = 83,
}

impl BlockType {
    /// Payload is zero-padded and AES-CBC encrypted under the Headers subkey.
    pub fn is_encrypted(self) -> bool {
        matches!(
            self,
            BlockType::FileNameInfo
                | BlockType::EncryptionInfo
                | BlockType::CompressionFlag
                | BlockType::FileInfo
                | BlockType::CompressionInfo
                | BlockType::UnicodeFileNameInfo
                | BlockType::PlaintextLengths
        )
    }

    /// Only legal after the Data block.
    pub fn is_trailing(self) -> bool {
        matches!(
            self,
            BlockType::EncryptedDataPart | BlockType::PlaintextLengths | BlockType::V2Hmac
        )
    }

    pub fn verify(raw: u8) -> Result<BlockType, HeaderError> {
        BlockType::try_from_primitive(raw).map_err(|_| HeaderError::UnknownBlockType { raw })
    }
}

/// Lifecycle of a document's header load.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Start,
    MagicRead,
    HeaderBlocksReading,
    DataReached,
    /// Passphrase unwrapped the master key.
    Valid,
    /// Headers are well-formed but the passphrase is wrong.
    Invalid,
    /// Parse or I/O failure; the document cannot be used.
    Failed,
}

#[derive(Debug)]
pub enum HeaderError {
    /// Stream ended inside the magic or a block.
    Truncated { context: &'static str },

    /// The first 16 bytes are not the document GUID.
    InvalidMagic { have: [u8; 16] },

    /// Tag outside the known set.
    UnknownBlockType { raw: u8 },

    /// Payload length above the configured bound.
    BlockTooLarge { block_type: u8, len: usize, max: usize },

    /// Preamble must come first, Version second.
    OutOfOrder { block_type: u8, expected: u8 },

    /// Block type appears twice.
    DuplicateBlock { block_type: u8 },

    /// Data-part or trailer block seen before the Data block.
    TrailingBeforeData { block_type: u8 },

    /// Required block absent.
    MissingBlock { block_type: u8 },

    /// Block not allowed at this position or in this generation.
    UnexpectedBlock { block_type: u8, context: &'static str },

    /// Payload cannot be decoded.
    InvalidPayload { block_type: u8, msg: String },

    /// File version not handled by this loader.
    UnsupportedVersion { major: u8, accepted: &'static str },

    /// Length recorded in the headers disagrees with the stream.
    LengthMismatch { what: &'static str, expected: u64, actual: u64 },

    /// Underlying I/O failure other than end of stream.
    Io(io::Error),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use HeaderError::*;
        match self {
            Truncated { context } =>
                write!(f, "stream truncated while reading {}", context),
            InvalidMagic { have } =>
                write!(f, "invalid magic: not a document ({})", fmt_bytes(have)),
            UnknownBlockType { raw } =>
                write!(f, "unknown header block type: {}", raw),
            BlockTooLarge { block_type, len, max } =>
                write!(f, "{} block too large: {} > {}",
                    enum_name_or_hex::<BlockType>(*block_type), len, max),
            OutOfOrder { block_type, expected } =>
                write!(f, "header block {} out of order, expected {}",
                    enum_name_or_hex::<BlockType>(*block_type),
                    enum_name_or_hex::<BlockType>(*expected)),
            DuplicateBlock { block_type } =>
                write!(f, "duplicate header block: {}",
                    enum_name_or_hex::<BlockType>(*block_type)),
            TrailingBeforeData { block_type } =>
                write!(f, "{} block before the data block",
                    enum_name_or_hex::<BlockType>(*block_type)),
            MissingBlock { block_type } =>
                write!(f, "missing header block: {}",
                    enum_name_or_hex::<BlockType>(*block_type)),
            UnexpectedBlock { block_type, context } =>
                write!(f, "unexpected {} block {}",
                    enum_name_or_hex::<BlockType>(*block_type), context),
            InvalidPayload { block_type, msg } =>
                write!(f, "invalid {} payload: {}",
                    enum_name_or_hex::<BlockType>(*block_type), msg),
            UnsupportedVersion { major, accepted } =>
                write!(f, "unsupported file version {} (accepted: {})", major, accepted),
            LengthMismatch { what, expected, actual } =>
                write!(f, "{} mismatch: expected {}, got {}", what, expected, actual),
            Io(e) =>
                write!(f, "I/O error while reading headers: {}", e),
        }
    }
}

impl HeaderError {
    /// Map a read failure, treating early end of stream as truncation.
    pub fn from_read(e: io::Error, context: &'static str) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HeaderError::Truncated { context }
        } else {
            HeaderError::Io(e)
        }
    }

    pub fn payload(block_type: BlockType, msg: impl Into<String>) -> Self {
        HeaderError::InvalidPayload { block_type: block_type as u8, msg: msg.into() }
    }
}

impl std::error::Error for HeaderError {}
