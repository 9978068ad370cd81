//! constants.rs
//! Wire-level constants shared by both document generations.

/// Magic GUID that opens every document, V1 and V2 alike.
pub const MAGIC_GUID: [u8; 16] = [
    0xc0, 0xb9, 0x07, 0x2e, 0x4f, 0x93, 0xf1, 0x46,
    0xa0, 0x15, 0x79, 0x2c, 0xa1, 0xd9, 0xe8, 0x21,
];

/// Block prefix: `[type: u8][payload length: u32 LE]`.
pub const BLOCK_PREFIX_LEN: usize = 1 + 4;

/// AES block size, also the padding granularity of encrypted header payloads.
pub const AES_BLOCK_LEN: usize = 16;

/// File versions accepted by each generation's loader.
pub mod versions {
    pub const V1_MIN_MAJOR: u8 = 1;
    pub const V1_MAX_MAJOR: u8 = 3;
    pub const V2_MAJOR: u8 = 4;

    /// Versions written for new documents.
    pub const V1_WRITE: (u8, u8) = (3, 2);
    pub const V2_WRITE: (u8, u8) = (4, 0);

    /// Program version stamped into the Version block.
    pub const PROGRAM: (u8, u8, u8) = (0, 1, 0);
}

/// Key sizes per generation.
pub mod key_lens {
    pub const V1_MASTER: usize = 16;
    pub const V2_MASTER: usize = 32;
    pub const V1_SALT: usize = 16;
    pub const V2_SALT: usize = 32;
    /// RFC 3394 integrity block.
    pub const WRAP_IV: usize = 8;
}

/// Integrity tag sizes.
pub mod mac_lens {
    /// HMAC-SHA1 truncated to 128 bits.
    pub const V1_HMAC: usize = 16;
    /// Full HMAC-SHA512.
    pub const V2_HMAC: usize = 64;
}

/// V1 preamble carries the HMAC; V2 preamble is random filler of the same width.
pub const PREAMBLE_LEN: usize = 16;

/// RFC 3394 rounds. V1 files may store more, never fewer.
pub const KEY_WRAP_MIN_ITERATIONS: u32 = 6;
/// Upper bound on stored V1 wrap rounds; anything above is a malformed file.
pub const MAX_KEY_WRAP_ITERATIONS: u32 = 10_000_000;

/// PBKDF2 rounds for new V2 key wraps.
pub const DEFAULT_V2_WRAP_ITERATIONS: u32 = 100_000;
pub const MIN_V2_WRAP_ITERATIONS: u32 = 1_000;
/// Upper bound on stored and configured PBKDF2 rounds.
pub const MAX_V2_WRAP_ITERATIONS: u32 = 5_000_000;

/// Streaming chunk size defaults.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024; // 64 KiB
pub const MIN_CHUNK_SIZE: usize = 512;
/// Max chunk size sanity bound (32 MiB).
pub const MAX_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Header block payloads above this size are rejected as malformed.
pub const DEFAULT_MAX_HEADER_BLOCK_LEN: usize = 1024 * 1024;

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Capability identifiers named by a [`crate::config::CryptoSuite`].
pub mod cipher_ids {
    pub const AES128_CBC: u16 = 0x0001;
    pub const AES256_CBC: u16 = 0x0002;
}

pub mod mac_ids {
    pub const HMAC_SHA1_128: u16 = 0x0001;
    pub const HMAC_SHA512: u16 = 0x0002;
}

pub mod subkey_kdf_ids {
    pub const AES_PRF: u16 = 0x0001;
    pub const HKDF_SHA512: u16 = 0x0002;
}

pub mod kek_kdf_ids {
    pub const SHA1_TRUNCATED: u16 = 0x0001;
    pub const PBKDF2_SHA512: u16 = 0x0002;
}

pub mod codec_ids {
    pub const DEFLATE: u16 = 0x0003;
}
