//! document/headers_v2.rs
//! Typed V2 document headers and trailer.
//!
//! ```text
//! magic | Preamble(random) | Version(4.0) | KeyWrap2 | EncryptionInfo* | CompressionFlag* |
//! FileInfo* | UnicodeFileNameInfo* | Data() | EncryptedDataPart... | PlaintextLengths* | V2Hmac
//! ```
//! The HMAC covers everything from the magic through the PlaintextLengths block.

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::config::CryptoSuite;
use crate::constants::{versions, MAGIC_GUID, PREAMBLE_LEN};
use crate::crypto::IV_LEN;
use crate::document::check_version;
use crate::document::session::KeySession;
use crate::headers::{
    encode_document_prefix, open_optional, BlockPayload, BlockType, CompressionFlag, Encrypted,
    FileInfo, HeaderBlock, HeaderError, KeyWrap2, PlaintextLengths, Preamble, RawHeaders,
    UnicodeFileNameInfo, V2DataMarker, V2EncryptionInfo, VersionInfo,
};
use crate::keys::{Passphrase, Subkeys};
use crate::types::DocumentError;

#[derive(Clone, Debug)]
pub struct V2DocumentHeaders {
    session: KeySession,
    version: VersionInfo,
    preamble: [u8; PREAMBLE_LEN],
    iv: [u8; IV_LEN],
    compressed: bool,
    file_info: FileInfo,
    file_name: String,
    /// Known after a full encrypt or decrypt pass.
    lengths: Option<PlaintextLengths>,
    loaded: Vec<HeaderBlock>,
}

impl V2DocumentHeaders {
    pub fn create<R: RngCore + CryptoRng>(
        passphrase: &Passphrase,
        wrap_iterations: u32,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let session = KeySession::create(
            CryptoSuite::V2,
            passphrase,
            wrap_iterations,
            versions::V2_WRITE.0,
            rng,
        )?;
        let mut preamble = [0u8; PREAMBLE_LEN];
        rng.fill_bytes(&mut preamble);
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut iv);
        Ok(Self {
            session,
            version: VersionInfo::new(versions::V2_WRITE, versions::PROGRAM),
            preamble,
            iv,
            compressed: false,
            file_info: FileInfo::now(),
            file_name: String::new(),
            lengths: None,
            loaded: Vec::new(),
        })
    }

    /// `Ok(None)` for a wrong passphrase.
    pub fn load(raw: &RawHeaders, passphrase: &Passphrase) -> Result<Option<Self>, DocumentError> {
        let version = raw.version()?;
        check_version(version.file_major, versions::V2_MAJOR, versions::V2_MAJOR, "4")?;
        for t in [
            BlockType::KeyWrap1,
            BlockType::CompressionInfo,
            BlockType::FileNameInfo,
        ] {
            raw.forbid(t, "in a V2 document")?;
        }

        let preamble = Preamble::from_block(raw.require(BlockType::Preamble)?)?;
        let key_wrap = KeyWrap2::from_block(raw.require(BlockType::KeyWrap2)?)?.0;
        V2DataMarker::from_block(raw.require(BlockType::Data)?)?;

        let Some(session) = KeySession::open(CryptoSuite::V2, passphrase, key_wrap, version.file_major)? else {
            return Ok(None);
        };
        let crypto = session.crypto();

        let enc = Encrypted::<V2EncryptionInfo>::from_block(
            raw.require(BlockType::EncryptionInfo)?.clone(),
        )?
        .open(crypto)?;
        let compressed = open_optional::<CompressionFlag>(raw, crypto)?
            .map(|f| f.compressed)
            .unwrap_or(false);
        let file_info = open_optional::<FileInfo>(raw, crypto)?.unwrap_or_else(FileInfo::epoch);
        let file_name = open_optional::<UnicodeFileNameInfo>(raw, crypto)?
            .map(|n| n.name)
            .unwrap_or_default();

        debug!(major = version.file_major, compressed, "V2 headers loaded");
        Ok(Some(Self {
            session,
            version,
            preamble: preamble.bytes,
            iv: enc.iv,
            compressed,
            file_info,
            file_name,
            lengths: None,
            loaded: raw.blocks().to_vec(),
        }))
    }

    /// Header blocks, Preamble through the Data marker.
    pub fn to_blocks(&self) -> Result<Vec<HeaderBlock>, DocumentError> {
        let crypto = self.session.crypto();
        Ok(vec![
            Preamble { bytes: self.preamble }.to_block(),
            self.version.to_block(),
            KeyWrap2(self.session.key_wrap().clone()).to_block(),
            Encrypted::seal(&V2EncryptionInfo { iv: self.iv }, crypto)?.into_block(),
            Encrypted::seal(&CompressionFlag { compressed: self.compressed }, crypto)?.into_block(),
            Encrypted::seal(&self.file_info, crypto)?.into_block(),
            Encrypted::seal(&UnicodeFileNameInfo { name: self.file_name.clone() }, crypto)?
                .into_block(),
            V2DataMarker.to_block(),
        ])
    }

    pub fn encode(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(encode_document_prefix(&self.to_blocks()?))
    }

    /// Encrypted PlaintextLengths block for the trailer.
    pub fn seal_lengths(&self, lengths: &PlaintextLengths) -> Result<HeaderBlock, DocumentError> {
        Ok(Encrypted::seal(lengths, self.session.crypto())?.into_block())
    }

    pub fn open_lengths(&self, block: HeaderBlock) -> Result<PlaintextLengths, HeaderError> {
        Encrypted::<PlaintextLengths>::from_block(block)?.open(self.session.crypto())
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
        next.loaded.clear();
        Ok(next)
    }

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

    /// `None` until the trailer has been read or written.
    pub fn plaintext_length(&self) -> Option<u64> {
        self.lengths.map(|l| l.plaintext_len)
    }

    /// `None` until known, and for uncompressed documents.
    pub fn compressed_length(&self) -> Option<u64> {
        self.lengths.filter(|_| self.compressed).map(|l| l.compressed_len)
    }

    pub(crate) fn set_lengths(&mut self, lengths: PlaintextLengths) {
        self.lengths = Some(lengths);
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

    /// Header bytes from the magic through the Data marker as loaded.
    pub fn loaded_len(&self) -> u64 {
        (MAGIC_GUID.len() + self.loaded.iter().map(HeaderBlock::encoded_len).sum::<usize>()) as u64
    }
}
