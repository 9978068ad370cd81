use std::io;

use thiserror::Error;

use crate::{
    compression::CompressionError,
    crypto::CryptoError,
    headers::HeaderError,
};

/// Unified document error covering I/O, header format, crypto, compression,
/// integrity and caller misuse.
/// - `From<T>` impls enable `?` across the pipeline.
/// - A wrong passphrase is not an error during load; see `Document::load`.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed magic, blocks, ordering or payloads.
    #[error("format error: {0}")]
    Format(#[source] HeaderError),

    /// The file was written by a newer format generation.
    #[error("file format version {major} is newer than supported; upgrade required")]
    UpgradeRequired { major: u8 },

    /// HMAC over headers and ciphertext does not match the stored value.
    #[error("integrity check failed: the file is corrupt or has been tampered with")]
    Integrity,

    /// Cipher-level failure (padding, key sizes).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Compression/decompression error.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// Cooperative cancellation was requested through the progress context.
    #[error("operation canceled")]
    Cancelled,

    /// The current key-encrypting key does not unwrap the master key.
    #[error("the current passphrase does not unwrap the master key")]
    WrongPassphrase,

    /// V1 encryption needs to seek back and patch its headers.
    #[error("output stream is not seekable")]
    NonSeekableOutput,

    /// Caller misuse: wrong call order, document state or arguments.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic validation with a descriptive message.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Coarse classification used by front ends to pick a user-facing message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    UpgradeRequired,
    WrongKey,
    Integrity,
    Crypto,
    Cancelled,
    InvalidOperation,
}

impl DocumentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentError::Io(_) => ErrorKind::Io,
            DocumentError::Format(_) => ErrorKind::Format,
            DocumentError::Compression(_) => ErrorKind::Format,
            DocumentError::UpgradeRequired { .. } => ErrorKind::UpgradeRequired,
            DocumentError::Integrity => ErrorKind::Integrity,
            DocumentError::Crypto(_) => ErrorKind::Crypto,
            DocumentError::Cancelled => ErrorKind::Cancelled,
            DocumentError::WrongPassphrase => ErrorKind::WrongKey,
            DocumentError::NonSeekableOutput
            | DocumentError::InvalidOperation(_)
            | DocumentError::Validation(_) => ErrorKind::InvalidOperation,
        }
    }

    pub(crate) fn invalid_op(msg: impl Into<String>) -> Self {
        DocumentError::InvalidOperation(msg.into())
    }
}

/// Header read failures other than truncation surface as plain I/O errors.
impl From<HeaderError> for DocumentError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::Io(io) => DocumentError::Io(io),
            other => DocumentError::Format(other),
        }
    }
}

pub type Result<T, E = DocumentError> = std::result::Result<T, E>;
