//! document/headers_v1.rs
//! Typed V1 document headers.
//!
//! Layout written:
//! ```text
//! magic | Preamble(hmac) | Version(3.2) | KeyWrap1 | EncryptionInfo* | CompressionFlag* |
//! CompressionInfo* | FileInfo* | FileNameInfo* | UnicodeFileNameInfo* | Data(len) | ciphertext
//! ```
//! `*` blocks are encrypted under the Headers subkey.

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::config::CryptoSuite;
use crate::constants::{mac_lens, versions, BLOCK_PREFIX_LEN, KEY_WRAP_MIN_ITERATIONS, MAGIC_GUID, PREAMBLE_LEN};
use crate::crypto::IV_LEN;
use crate::document::check_version;
use crate::document::session::KeySession;
use crate::headers::{
    encode_document_prefix, open_optional, BlockPayload, BlockType, CompressionFlag,
    CompressionInfo, Encrypted, FileInfo, FileNameInfo, HeaderBlock, KeyWrap1, Preamble,
    RawHeaders, UnicodeFileNameInfo, V1DataInfo, V1EncryptionInfo, VersionInfo,
};
use crate::keys::{Passphrase, Subkeys};
use crate::types::DocumentError;

#[derive(Clone, Debug)]
pub struct V1DocumentHeaders {
    session: KeySession,
    version: VersionInfo,
    iv: [u8; IV_LEN],
    /// Bytes fed to the cipher (compressed size when compressed).
    cipher_input_len: u64,
    normal_size: u64,
    compressed: bool,
    file_info: FileInfo,
    file_name: String,
    cipher_len: u64,
    hmac: [u8; mac_lens::V1_HMAC],
    /// Blocks exactly as read, Preamble through Data. Empty for new documents.
    loaded: Vec<HeaderBlock>,
}

impl V1DocumentHeaders {
    /// Headers for a new document with a fresh master key and IV.
    pub fn create<R: RngCore + CryptoRng>(
        passphrase: &Passphrase,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let session = KeySession::create(
            CryptoSuite::V1,
            passphrase,
            KEY_WRAP_MIN_ITERATIONS,
            versions::V1_WRITE.0,
            rng,
        )?;
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut iv);
        Ok(Self {
            session,
            version: VersionInfo::new(versions::V1_WRITE, versions::PROGRAM),
            iv,
            cipher_input_len: 0,
            normal_size: 0,
            compressed: false,
            file_info: FileInfo::now(),
            file_name: String::new(),
            cipher_len: 0,
            hmac: [0u8; mac_lens::V1_HMAC],
            loaded: Vec::new(),
        })
    }

    /// Decrypt and type parsed headers. `Ok(None)` for a wrong passphrase.
    pub fn load(raw: &RawHeaders, passphrase: &Passphrase) -> Result<Option<Self>, DocumentError> {
        let version = raw.version()?;
        check_version(version.file_major, versions::V1_MIN_MAJOR, versions::V1_MAX_MAJOR, "1..=3")?;
        raw.forbid(BlockType::KeyWrap2, "in a V1 document")?;
        for t in [BlockType::PlaintextLengths, BlockType::V2Hmac] {
            raw.forbid(t, "in a V1 document")?;
        }

        let preamble = Preamble::from_block(raw.require(BlockType::Preamble)?)?;
        let key_wrap = KeyWrap1::from_block(raw.require(BlockType::KeyWrap1)?)?.0;
        let data = V1DataInfo::from_block(raw.require(BlockType::Data)?)?;

        let session = match KeySession::open(CryptoSuite::V1, passphrase, key_wrap, version.file_major)? {
            Some(s) => s,
            None => return Ok(None),
        };
        let crypto = session.crypto();

        let enc = Encrypted::<V1EncryptionInfo>::from_block(
            raw.require(BlockType::EncryptionInfo)?.clone(),
        )?
        .open(crypto)?;
        let compressed = open_optional::<CompressionFlag>(raw, crypto)?
            .map(|f| f.compressed)
            .unwrap_or(false);
        let normal_size = open_optional::<CompressionInfo>(raw, crypto)?
            .map(|c| c.normal_size)
            .unwrap_or(enc.plaintext_len);
        let file_info = open_optional::<FileInfo>(raw, crypto)?.unwrap_or_else(FileInfo::epoch);
        let file_name = match open_optional::<UnicodeFileNameInfo>(raw, crypto)? {
            Some(n) => n.name,
            None => open_optional::<FileNameInfo>(raw, crypto)?
                .map(|n| n.name)
                .unwrap_or_default(),
        };

        let mut hmac = [0u8; mac_lens::V1_HMAC];
        hmac.copy_from_slice(&preamble.bytes[..mac_lens::V1_HMAC]);

        debug!(
            major = version.file_major,
            minor = version.file_minor,
            compressed,
            cipher_len = data.cipher_len,
            "V1 headers loaded"
        );
        Ok(Some(Self {
            session,
            version,
            iv: enc.iv,
            cipher_input_len: enc.plaintext_len,
            normal_size,
            compressed,
            file_info,
            file_name,
            cipher_len: data.cipher_len,
            hmac,
            loaded: raw.blocks().to_vec(),
        }))
    }

    /// Blocks to write, Preamble through Data, from the current values.
    pub fn to_blocks(&self) -> Result<Vec<HeaderBlock>, DocumentError> {
        let crypto = self.session.crypto();
        let mut preamble = [0u8; PREAMBLE_LEN];
        preamble[..mac_lens::V1_HMAC].copy_from_slice(&self.hmac);
        Ok(vec![
            Preamble { bytes: preamble }.to_block(),
            self.version.to_block(),
            KeyWrap1(self.session.key_wrap().clone()).to_block(),
            Encrypted::seal(
                &V1EncryptionInfo { plaintext_len: self.cipher_input_len, iv: self.iv },
                crypto,
            )?
            .into_block(),
            Encrypted::seal(&CompressionFlag { compressed: self.compressed }, crypto)?.into_block(),
            Encrypted::seal(&CompressionInfo { normal_size: self.normal_size }, crypto)?.into_block(),
            Encrypted::seal(&self.file_info, crypto)?.into_block(),
            Encrypted::seal(&FileNameInfo { name: self.file_name.clone() }, crypto)?.into_block(),
            Encrypted::seal(&UnicodeFileNameInfo { name: self.file_name.clone() }, crypto)?
                .into_block(),
            V1DataInfo { cipher_len: self.cipher_len }.to_block(),
        ])
    }

    /// Magic plus header blocks.
    pub fn encode(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(encode_document_prefix(&self.to_blocks()?))
    }

    /// Offset of the first HMAC-covered byte, relative to the magic.
    pub fn hmac_start() -> u64 {
        (MAGIC_GUID.len() + BLOCK_PREFIX_LEN + PREAMBLE_LEN) as u64
    }

    /// Offset of the stored HMAC inside the Preamble, relative to the magic.
    pub fn hmac_offset() -> u64 {
        (MAGIC_GUID.len() + BLOCK_PREFIX_LEN) as u64
    }

    /// Same headers with the master key wrapped under `new_passphrase`.
    /// Fails with `WrongPassphrase` unless `current` opens the stored wrap;
    /// `self` is left untouched.
    pub fn rewrap_master_key<R: RngCore + CryptoRng>(
        &self,
        current: &Passphrase,
        new_passphrase: &Passphrase,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let mut next = self.clone();
        next.session = self.session.rewrap(current, new_passphrase, rng)?;
        next.hmac = [0u8; mac_lens::V1_HMAC];
        next.loaded.clear();
        Ok(next)
    }

    // ---- accessors ----

    pub fn file_version(&self) -> VersionInfo {
        self.version
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = name.into();
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.file_info.created
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        self.file_info.last_accessed
    }

    pub fn last_write_time(&self) -> DateTime<Utc> {
        self.file_info.last_written
    }

    pub fn set_file_info(&mut self, info: FileInfo) {
        self.file_info = info;
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub(crate) fn set_compressed(&mut self, compressed: bool) {
        self.compressed = compressed;
    }

    /// Original plaintext size.
    pub fn plaintext_length(&self) -> u64 {
        self.normal_size
    }

    /// Size of the deflated stream, or `None` when stored uncompressed.
    pub fn compressed_length(&self) -> Option<u64> {
        self.compressed.then_some(self.cipher_input_len)
    }

    pub fn cipher_len(&self) -> u64 {
        self.cipher_len
    }

    pub(crate) fn set_lengths(&mut self, normal_size: u64, cipher_input_len: u64, cipher_len: u64) {
        self.normal_size = normal_size;
        self.cipher_input_len = cipher_input_len;
        self.cipher_len = cipher_len;
    }

    pub fn stored_hmac(&self) -> &[u8] {
        &self.hmac
    }

    pub(crate) fn set_hmac(&mut self, tag: &[u8]) {
        self.hmac.copy_from_slice(&tag[..mac_lens::V1_HMAC]);
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn subkeys(&self) -> &Subkeys {
        self.session.subkeys()
    }

    pub fn session(&self) -> &KeySession {
        &self.session
    }

    pub(crate) fn loaded_blocks(&self) -> &[HeaderBlock] {
        &self.loaded
    }

    /// Header bytes from the magic through the Data block as loaded.
    pub fn loaded_len(&self) -> u64 {
        (MAGIC_GUID.len() + self.loaded.iter().map(HeaderBlock::encoded_len).sum::<usize>()) as u64
    }
}
