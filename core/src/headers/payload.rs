//! headers/payload.rs
//! Typed header payloads and their byte encodings.
//!
//! Encrypted payloads are decoded after decryption, so decoders ignore the
//! zero padding that follows the encoded fields.

use std::ops::RangeInclusive;

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};

use crate::constants::{
    key_lens, mac_lens, KEY_WRAP_MIN_ITERATIONS, MAX_KEY_WRAP_ITERATIONS, MAX_V2_WRAP_ITERATIONS,
    PREAMBLE_LEN,
};
use crate::crypto::IV_LEN;
use crate::headers::block::HeaderBlock;
use crate::headers::types::{BlockType, HeaderError};
use crate::utils::{from_filetime, from_latin1, to_filetime, to_latin1};

/// A value stored in exactly one header block type.
pub trait BlockPayload: Sized {
    const BLOCK_TYPE: BlockType;

    fn encode(&self) -> Vec<u8>;

    fn decode(payload: &[u8]) -> Result<Self, HeaderError>;

    fn to_block(&self) -> HeaderBlock {
        HeaderBlock::new(Self::BLOCK_TYPE, self.encode())
    }

    fn from_block(block: &HeaderBlock) -> Result<Self, HeaderError> {
        if block.block_type() != Self::BLOCK_TYPE {
            return Err(HeaderError::UnexpectedBlock {
                block_type: block.block_type() as u8,
                context: "for this payload type",
            });
        }
        Self::decode(block.payload())
    }
}

fn short<T: BlockPayload>(_: std::io::Error) -> HeaderError {
    HeaderError::payload(T::BLOCK_TYPE, "payload too short")
}

fn read_array<T: BlockPayload, const N: usize>(cur: &mut &[u8]) -> Result<[u8; N], HeaderError> {
    if cur.len() < N {
        return Err(HeaderError::payload(T::BLOCK_TYPE, "payload too short"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&cur[..N]);
    *cur = &cur[N..];
    Ok(out)
}

fn read_prefixed<T: BlockPayload>(cur: &mut &[u8]) -> Result<Vec<u8>, HeaderError> {
    let len = cur.read_u32::<LittleEndian>().map_err(short::<T>)? as usize;
    if len > cur.len() {
        return Err(HeaderError::payload(
            T::BLOCK_TYPE,
            format!("declared length {} exceeds payload ({})", len, cur.len()),
        ));
    }
    let bytes = cur[..len].to_vec();
    *cur = &cur[len..];
    Ok(bytes)
}

fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

// -----------------------------------------------------------------------------
// Plaintext blocks
// -----------------------------------------------------------------------------

/// V1: the HMAC of the document. V2: random filler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preamble {
    pub bytes: [u8; PREAMBLE_LEN],
}

impl BlockPayload for Preamble {
    const BLOCK_TYPE: BlockType = BlockType::Preamble;

    fn encode(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        if payload.len() != PREAMBLE_LEN {
            return Err(HeaderError::payload(Self::BLOCK_TYPE, format!("length {}", payload.len())));
        }
        let mut cur = payload;
        Ok(Self { bytes: read_array::<Self, PREAMBLE_LEN>(&mut cur)? })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VersionInfo {
    pub file_major: u8,
    pub file_minor: u8,
    pub program_major: u8,
    pub program_minor: u8,
    pub program_patch: u8,
}

impl VersionInfo {
    pub fn new(file: (u8, u8), program: (u8, u8, u8)) -> Self {
        Self {
            file_major: file.0,
            file_minor: file.1,
            program_major: program.0,
            program_minor: program.1,
            program_patch: program.2,
        }
    }
}

impl BlockPayload for VersionInfo {
    const BLOCK_TYPE: BlockType = BlockType::Version;

    fn encode(&self) -> Vec<u8> {
        vec![
            self.file_major,
            self.file_minor,
            self.program_major,
            self.program_minor,
            self.program_patch,
        ]
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let [file_major, file_minor, program_major, program_minor, program_patch] =
            read_array::<Self, 5>(&mut cur)?;
        Ok(Self { file_major, file_minor, program_major, program_minor, program_patch })
    }
}

/// Wrapped master key with the salt and rounds needed to unwrap it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyWrapParams {
    pub wrapped: Vec<u8>,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl KeyWrapParams {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wrapped.len() + self.salt.len() + 4);
        out.extend_from_slice(&self.wrapped);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iterations.to_le_bytes());
        out
    }

    fn decode(
        block_type: BlockType,
        payload: &[u8],
        wrapped_len: usize,
        salt_len: usize,
        iterations_range: RangeInclusive<u32>,
    ) -> Result<Self, HeaderError> {
        let need = wrapped_len + salt_len + 4;
        if payload.len() != need {
            return Err(HeaderError::payload(
                block_type,
                format!("length {} (expected {})", payload.len(), need),
            ));
        }
        let wrapped = payload[..wrapped_len].to_vec();
        let salt = payload[wrapped_len..wrapped_len + salt_len].to_vec();
        let mut cur = &payload[wrapped_len + salt_len..];
        let iterations = cur
            .read_u32::<LittleEndian>()
            .map_err(|_| HeaderError::payload(block_type, "missing iterations"))?;
        if !iterations_range.contains(&iterations) {
            return Err(HeaderError::payload(
                block_type,
                format!(
                    "iterations {} outside {}..={}",
                    iterations,
                    iterations_range.start(),
                    iterations_range.end()
                ),
            ));
        }
        Ok(Self { wrapped, salt, iterations })
    }
}

/// V1 key wrap: 24-byte wrapped AES-128 key, 16-byte salt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyWrap1(pub KeyWrapParams);

impl BlockPayload for KeyWrap1 {
    const BLOCK_TYPE: BlockType = BlockType::KeyWrap1;

    fn encode(&self) -> Vec<u8> {
        self.0.encode()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        KeyWrapParams::decode(
            Self::BLOCK_TYPE,
            payload,
            key_lens::V1_MASTER + key_lens::WRAP_IV,
            key_lens::V1_SALT,
            KEY_WRAP_MIN_ITERATIONS..=MAX_KEY_WRAP_ITERATIONS,
        )
        .map(KeyWrap1)
    }
}

/// V2 key wrap: 40-byte wrapped AES-256 key, 32-byte salt, PBKDF2 rounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyWrap2(pub KeyWrapParams);

impl BlockPayload for KeyWrap2 {
    const BLOCK_TYPE: BlockType = BlockType::KeyWrap2;

    fn encode(&self) -> Vec<u8> {
        self.0.encode()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        KeyWrapParams::decode(
            Self::BLOCK_TYPE,
            payload,
            key_lens::V2_MASTER + key_lens::WRAP_IV,
            key_lens::V2_SALT,
            1..=MAX_V2_WRAP_ITERATIONS,
        )
        .map(KeyWrap2)
    }
}

/// V1 Data block: ciphertext length that follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct V1DataInfo {
    pub cipher_len: u64,
}

impl BlockPayload for V1DataInfo {
    const BLOCK_TYPE: BlockType = BlockType::Data;

    fn encode(&self) -> Vec<u8> {
        self.cipher_len.to_le_bytes().to_vec()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let cipher_len = cur.read_u64::<LittleEndian>().map_err(short::<Self>)?;
        Ok(Self { cipher_len })
    }
}

/// V2 Data block: empty marker, data parts follow.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct V2DataMarker;

impl BlockPayload for V2DataMarker {
    const BLOCK_TYPE: BlockType = BlockType::Data;

    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        if !payload.is_empty() {
            return Err(HeaderError::payload(Self::BLOCK_TYPE, "V2 data marker must be empty"));
        }
        Ok(Self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct V2HmacTag {
    pub tag: [u8; mac_lens::V2_HMAC],
}

impl BlockPayload for V2HmacTag {
    const BLOCK_TYPE: BlockType = BlockType::V2Hmac;

    fn encode(&self) -> Vec<u8> {
        self.tag.to_vec()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        if payload.len() != mac_lens::V2_HMAC {
            return Err(HeaderError::payload(Self::BLOCK_TYPE, format!("length {}", payload.len())));
        }
        let mut cur = payload;
        Ok(Self { tag: read_array::<Self, { mac_lens::V2_HMAC }>(&mut cur)? })
    }
}

// -----------------------------------------------------------------------------
// Encrypted blocks (see `Encrypted<T>`)
// -----------------------------------------------------------------------------

/// V1: length of the bytes fed to the cipher, and the data IV.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct V1EncryptionInfo {
    pub plaintext_len: u64,
    pub iv: [u8; IV_LEN],
}

impl BlockPayload for V1EncryptionInfo {
    const BLOCK_TYPE: BlockType = BlockType::EncryptionInfo;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + IV_LEN);
        out.extend_from_slice(&self.plaintext_len.to_le_bytes());
        out.extend_from_slice(&self.iv);
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let plaintext_len = cur.read_u64::<LittleEndian>().map_err(short::<Self>)?;
        let iv = read_array::<Self, IV_LEN>(&mut cur)?;
        Ok(Self { plaintext_len, iv })
    }
}

/// V2: data IV only; lengths live in the trailer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct V2EncryptionInfo {
    pub iv: [u8; IV_LEN],
}

impl BlockPayload for V2EncryptionInfo {
    const BLOCK_TYPE: BlockType = BlockType::EncryptionInfo;

    fn encode(&self) -> Vec<u8> {
        self.iv.to_vec()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        Ok(Self { iv: read_array::<Self, IV_LEN>(&mut cur)? })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompressionFlag {
    pub compressed: bool,
}

impl BlockPayload for CompressionFlag {
    const BLOCK_TYPE: BlockType = BlockType::CompressionFlag;

    fn encode(&self) -> Vec<u8> {
        i32::from(self.compressed).to_le_bytes().to_vec()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let raw = cur.read_i32::<LittleEndian>().map_err(short::<Self>)?;
        Ok(Self { compressed: raw != 0 })
    }
}

/// Original (uncompressed) plaintext size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompressionInfo {
    pub normal_size: u64,
}

impl BlockPayload for CompressionInfo {
    const BLOCK_TYPE: BlockType = BlockType::CompressionInfo;

    fn encode(&self) -> Vec<u8> {
        self.normal_size.to_le_bytes().to_vec()
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let normal_size = cur.read_u64::<LittleEndian>().map_err(short::<Self>)?;
        Ok(Self { normal_size })
    }
}

/// File timestamps, stored as Windows FILETIME ticks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub last_written: DateTime<Utc>,
}

impl FileInfo {
    pub fn now() -> Self {
        let now = Utc::now();
        Self { created: now, last_accessed: now, last_written: now }
    }

    /// All three timestamps at the Unix epoch; reported when a loaded
    /// document carries no FileInfo block.
    pub fn epoch() -> Self {
        let t = DateTime::<Utc>::UNIX_EPOCH;
        Self { created: t, last_accessed: t, last_written: t }
    }
}

impl BlockPayload for FileInfo {
    const BLOCK_TYPE: BlockType = BlockType::FileInfo;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(24);
        for ts in [&self.created, &self.last_accessed, &self.last_written] {
            out.extend_from_slice(&to_filetime(ts).to_le_bytes());
        }
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let mut next = || -> Result<DateTime<Utc>, HeaderError> {
            let ticks = cur.read_i64::<LittleEndian>().map_err(short::<Self>)?;
            from_filetime(ticks)
                .ok_or_else(|| HeaderError::payload(Self::BLOCK_TYPE, "timestamp out of range"))
        };
        let created = next()?;
        let last_accessed = next()?;
        let last_written = next()?;
        Ok(Self { created, last_accessed, last_written })
    }
}

/// Legacy single-byte file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNameInfo {
    pub name: String,
}

impl BlockPayload for FileNameInfo {
    const BLOCK_TYPE: BlockType = BlockType::FileNameInfo;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_prefixed(&mut out, &to_latin1(&self.name));
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let bytes = read_prefixed::<Self>(&mut cur)?;
        Ok(Self { name: from_latin1(&bytes) })
    }
}

/// File name as UTF-16LE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnicodeFileNameInfo {
    pub name: String,
}

impl BlockPayload for UnicodeFileNameInfo {
    const BLOCK_TYPE: BlockType = BlockType::UnicodeFileNameInfo;

    fn encode(&self) -> Vec<u8> {
        let utf16: Vec<u8> = self.name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let mut out = Vec::with_capacity(utf16.len() + 4);
        write_prefixed(&mut out, &utf16);
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let bytes = read_prefixed::<Self>(&mut cur)?;
        if bytes.len() % 2 != 0 {
            return Err(HeaderError::payload(Self::BLOCK_TYPE, "odd UTF-16 byte count"));
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let name = String::from_utf16(&units)
            .map_err(|_| HeaderError::payload(Self::BLOCK_TYPE, "invalid UTF-16"))?;
        Ok(Self { name })
    }
}

/// V2 trailer: final plaintext and compressed byte counts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextLengths {
    pub plaintext_len: u64,
    pub compressed_len: u64,
}

impl BlockPayload for PlaintextLengths {
    const BLOCK_TYPE: BlockType = BlockType::PlaintextLengths;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.plaintext_len.to_le_bytes());
        out.extend_from_slice(&self.compressed_len.to_le_bytes());
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, HeaderError> {
        let mut cur = payload;
        let plaintext_len = cur.read_u64::<LittleEndian>().map_err(short::<Self>)?;
        let compressed_len = cur.read_u64::<LittleEndian>().map_err(short::<Self>)?;
        Ok(Self { plaintext_len, compressed_len })
    }
}
