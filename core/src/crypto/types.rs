// ## 📂 File: `src/crypto/types.rs`

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-128 key length.
pub const KEY_LEN_16: usize = 16;

/// AES-256 key length.
pub const KEY_LEN_32: usize = 32;

/// CBC initialization vector length.
pub const IV_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length provided to a primitive.
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    /// Invalid IV length.
    #[error("invalid IV length: expected={expected}, actual={actual}")]
    InvalidIvLen { expected: usize, actual: usize },

    /// Input is not a whole number of cipher blocks.
    #[error("input length {len} is not a multiple of the block size")]
    NotBlockAligned { len: usize },

    /// PKCS#7 padding of the final block is malformed (wrong key or corrupt tail).
    #[error("bad padding in final cipher block")]
    Padding,

    /// Malformed key wrap structure (not a wrong key, which is not an error).
    #[error("malformed wrapped key: {0}")]
    MalformedWrap(String),

    /// General derivation or runtime error with context.
    #[error("crypto failure: {0}")]
    Failure(String),
}

/// Owned symmetric key material, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
}

impl SymmetricKey {
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self { bytes: bytes.to_vec() }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Never print key bytes.
impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({} bytes)", self.bytes.len())
    }
}
