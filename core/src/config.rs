//! config.rs
//! Document configuration and the crypto suites that name each generation's
//! capabilities explicitly.

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{
    cipher_ids, codec_ids, kek_kdf_ids, mac_ids, subkey_kdf_ids, DEFAULT_CHUNK_SIZE,
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_HEADER_BLOCK_LEN, DEFAULT_V2_WRAP_ITERATIONS,
    MAX_CHUNK_SIZE, MAX_V2_WRAP_ITERATIONS, MIN_CHUNK_SIZE, MIN_V2_WRAP_ITERATIONS,
};
use crate::types::DocumentError;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum CipherKind {
    Aes128Cbc = cipher_ids::AES128_CBC,
    Aes256Cbc = cipher_ids::AES256_CBC,
}

impl CipherKind {
    pub fn key_len(self) -> usize {
        match self {
            CipherKind::Aes128Cbc => 16,
            CipherKind::Aes256Cbc => 32,
        }
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum MacKind {
    /// HMAC-SHA1 truncated to 128 bits.
    HmacSha1_128 = mac_ids::HMAC_SHA1_128,
    HmacSha512 = mac_ids::HMAC_SHA512,
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum SubkeyKdfKind {
    /// AES-ECB of a purpose-tagged block under the master key.
    AesPrf = subkey_kdf_ids::AES_PRF,
    HkdfSha512 = subkey_kdf_ids::HKDF_SHA512,
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum KekKdfKind {
    /// First 16 bytes of SHA-1(passphrase), salted by XOR at wrap time.
    Sha1Truncated = kek_kdf_ids::SHA1_TRUNCATED,
    /// SHA-512(passphrase) hardened with PBKDF2-HMAC-SHA512 at wrap time.
    Pbkdf2Sha512 = kek_kdf_ids::PBKDF2_SHA512,
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum CodecKind {
    Deflate = codec_ids::DEFLATE,
}

/// Capability set of a format generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSuite {
    pub cipher: CipherKind,
    pub mac: MacKind,
    pub subkey_kdf: SubkeyKdfKind,
    pub kek_kdf: KekKdfKind,
    pub codec: CodecKind,
}

impl CryptoSuite {
    pub const V1: CryptoSuite = CryptoSuite {
        cipher: CipherKind::Aes128Cbc,
        mac: MacKind::HmacSha1_128,
        subkey_kdf: SubkeyKdfKind::AesPrf,
        kek_kdf: KekKdfKind::Sha1Truncated,
        codec: CodecKind::Deflate,
    };

    pub const V2: CryptoSuite = CryptoSuite {
        cipher: CipherKind::Aes256Cbc,
        mac: MacKind::HmacSha512,
        subkey_kdf: SubkeyKdfKind::HkdfSha512,
        kek_kdf: KekKdfKind::Pbkdf2Sha512,
        codec: CodecKind::Deflate,
    };

    /// Reject suites whose parts do not belong together.
    pub fn ensure_matches(&self, expected: &CryptoSuite) -> Result<(), DocumentError> {
        if self != expected {
            return Err(DocumentError::Validation(format!(
                "crypto suite {:?} does not match the document generation ({:?})",
                self, expected
            )));
        }
        Ok(())
    }
}

/// Tunables shared by both document generations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Plaintext bytes read per pipeline step; also the V2 data part size.
    pub chunk_size: usize,
    /// PBKDF2 rounds applied to new V2 key wraps.
    pub v2_wrap_iterations: u32,
    /// zlib level used when compression is requested.
    pub compression_level: u32,
    /// Upper bound for a single header block payload.
    pub max_header_block_len: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            v2_wrap_iterations: DEFAULT_V2_WRAP_ITERATIONS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_header_block_len: DEFAULT_MAX_HEADER_BLOCK_LEN,
        }
    }
}

impl DocumentConfig {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let cfg: DocumentConfig = serde_json::from_str(json)
            .map_err(|e| DocumentError::Validation(format!("config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(DocumentError::Validation(format!(
                "chunk_size {} outside [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]",
                self.chunk_size
            )));
        }
        if !(MIN_V2_WRAP_ITERATIONS..=MAX_V2_WRAP_ITERATIONS).contains(&self.v2_wrap_iterations) {
            return Err(DocumentError::Validation(format!(
                "v2_wrap_iterations {} outside [{MIN_V2_WRAP_ITERATIONS}, {MAX_V2_WRAP_ITERATIONS}]",
                self.v2_wrap_iterations
            )));
        }
        if self.compression_level > 9 {
            return Err(DocumentError::Validation(format!(
                "compression_level {} outside [0, 9]",
                self.compression_level
            )));
        }
        if self.max_header_block_len < 1024 {
            return Err(DocumentError::Validation(
                "max_header_block_len must be at least 1 KiB".into(),
            ));
        }
        Ok(())
    }
}
