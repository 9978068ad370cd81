//! document/factory.rs
//! Version dispatch and whole-file helpers.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info};

use crate::config::DocumentConfig;
use crate::constants::{versions, DEFAULT_MAX_HEADER_BLOCK_LEN};
use crate::document::{EncryptOptions, V1Document, V2Document};
use crate::headers::{FileInfo, HeaderError, LoadState, RawHeaders, VersionInfo};
use crate::keys::Passphrase;
use crate::stream::{open_input, CountingWriter, InputSource, OutputSink, ProgressContext};
use crate::telemetry::TelemetrySnapshot;
use crate::types::DocumentError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DocumentVersion {
    V1,
    V2,
}

/// A document of either generation.
#[derive(Debug)]
pub enum Document {
    V1(V1Document),
    V2(V2Document),
}

macro_rules! dispatch {
    ($self:expr, $doc:ident => $body:expr) => {
        match $self {
            Document::V1($doc) => $body,
            Document::V2($doc) => $body,
        }
    };
}

macro_rules! header_field {
    ($self:expr, $h:ident => $body:expr) => {
        match $self {
            Document::V1(d) => d.headers().map(|$h| $body),
            Document::V2(d) => d.headers().map(|$h| $body),
        }
    };
}

impl Document {
    /// New document of the given generation, ready for `encrypt_to`.
    pub fn create<R: RngCore + CryptoRng>(
        version: DocumentVersion,
        passphrase: &Passphrase,
        config: DocumentConfig,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        Ok(match version {
            DocumentVersion::V1 => Document::V1(V1Document::create(passphrase, config, rng)?),
            DocumentVersion::V2 => Document::V2(V2Document::create(passphrase, config, rng)?),
        })
    }

    pub fn version(&self) -> DocumentVersion {
        match self {
            Document::V1(_) => DocumentVersion::V1,
            Document::V2(_) => DocumentVersion::V2,
        }
    }

    pub fn passphrase_is_valid(&self) -> bool {
        dispatch!(self, d => d.passphrase_is_valid())
    }

    pub fn state(&self) -> LoadState {
        dispatch!(self, d => d.state())
    }

    pub fn encrypt_to(
        &mut self,
        input: &mut dyn Read,
        output: OutputSink<'_>,
        options: EncryptOptions,
        progress: &mut ProgressContext,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        dispatch!(self, d => d.encrypt_to(input, output, options, progress))
    }

    pub fn decrypt_to(
        &mut self,
        output: &mut dyn Write,
        progress: &mut ProgressContext,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        dispatch!(self, d => d.decrypt_to(output, progress))
    }

    /// Copy under `new_passphrase`; `passphrase` must open the current wrap.
    pub fn rewrap_to<R: RngCore + CryptoRng>(
        &mut self,
        passphrase: &Passphrase,
        new_passphrase: &Passphrase,
        output: OutputSink<'_>,
        progress: &mut ProgressContext,
        rng: &mut R,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        dispatch!(self, d => d.rewrap_to(passphrase, new_passphrase, output, progress, rng))
    }

    pub fn file_version(&self) -> Option<VersionInfo> {
        header_field!(self, h => h.file_version())
    }

    pub fn file_name(&self) -> Option<&str> {
        header_field!(self, h => h.file_name())
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) -> Result<(), DocumentError> {
        let name = name.into();
        match self {
            Document::V1(d) => d.headers_mut().map(|h| h.set_file_name(name)),
            Document::V2(d) => d.headers_mut().map(|h| h.set_file_name(name)),
        }
        .ok_or_else(|| DocumentError::invalid_op("no headers"))
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        header_field!(self, h => h.creation_time())
    }

    pub fn last_access_time(&self) -> Option<DateTime<Utc>> {
        header_field!(self, h => h.last_access_time())
    }

    pub fn last_write_time(&self) -> Option<DateTime<Utc>> {
        header_field!(self, h => h.last_write_time())
    }

    pub fn set_file_info(&mut self, info: FileInfo) -> Result<(), DocumentError> {
        match self {
            Document::V1(d) => d.headers_mut().map(|h| h.set_file_info(info)),
            Document::V2(d) => d.headers_mut().map(|h| h.set_file_info(info)),
        }
        .ok_or_else(|| DocumentError::invalid_op("no headers"))
    }

    pub fn is_compressed(&self) -> Option<bool> {
        header_field!(self, h => h.is_compressed())
    }

    /// V2 lengths are only known once the trailer has been processed.
    pub fn plaintext_length(&self) -> Option<u64> {
        match self {
            Document::V1(d) => d.headers().map(|h| h.plaintext_length()),
            Document::V2(d) => d.headers().and_then(|h| h.plaintext_length()),
        }
    }

    pub fn compressed_length(&self) -> Option<u64> {
        match self {
            Document::V1(d) => d.headers().and_then(|h| h.compressed_length()),
            Document::V2(d) => d.headers().and_then(|h| h.compressed_length()),
        }
    }

    pub fn ciphertext_offset(&self) -> Option<u64> {
        dispatch!(self, d => d.ciphertext_offset())
    }

    pub fn dispose(&mut self) {
        dispatch!(self, d => d.dispose())
    }
}

/// Read the prologue of `source` and hand it to the loader for its version.
///
/// A wrong passphrase is not an error: the returned document reports
/// `passphrase_is_valid() == false`.
pub fn open_document(
    passphrase: &Passphrase,
    source: InputSource,
    config: &DocumentConfig,
) -> Result<Document, DocumentError> {
    config.validate()?;
    let mut reader = open_input(source)?;
    let raw = RawHeaders::read_prologue(&mut reader, config.max_header_block_len)?;
    let version = raw.version()?;
    debug!(major = version.file_major, minor = version.file_minor, "dispatching document");
    match version.file_major {
        versions::V1_MIN_MAJOR..=versions::V1_MAX_MAJOR => {
            let mut doc = V1Document::new(config.clone())?;
            doc.load_from_prologue(raw, reader, passphrase)?;
            Ok(Document::V1(doc))
        }
        versions::V2_MAJOR => {
            let mut doc = V2Document::new(config.clone())?;
            doc.load_from_prologue(raw, reader, passphrase)?;
            Ok(Document::V2(doc))
        }
        major if major > versions::V2_MAJOR => Err(DocumentError::UpgradeRequired { major }),
        major => Err(HeaderError::UnsupportedVersion { major, accepted: "1..=4" }.into()),
    }
}

/// Version of a document without touching any key material.
pub fn detect_version<R: Read + ?Sized>(reader: &mut R) -> Result<VersionInfo, DocumentError> {
    let raw = RawHeaders::read_prologue(reader, DEFAULT_MAX_HEADER_BLOCK_LEN)?;
    Ok(raw.version()?)
}

fn file_info_of(path: &Path) -> FileInfo {
    let now = FileInfo::now();
    match fs::metadata(path) {
        Ok(meta) => FileInfo {
            created: meta.created().map(DateTime::<Utc>::from).unwrap_or(now.created),
            last_accessed: meta.accessed().map(DateTime::<Utc>::from).unwrap_or(now.last_accessed),
            last_written: meta.modified().map(DateTime::<Utc>::from).unwrap_or(now.last_written),
        },
        Err(_) => now,
    }
}

/// Encrypt the file at `src` into `dst`, recording its name and timestamps.
pub fn encrypt_file(
    passphrase: &Passphrase,
    src: &Path,
    dst: &Path,
    version: DocumentVersion,
    options: EncryptOptions,
    config: &DocumentConfig,
) -> Result<TelemetrySnapshot, DocumentError> {
    let mut doc = Document::create(version, passphrase, config.clone(), &mut OsRng)?;
    if let Some(name) = src.file_name() {
        doc.set_file_name(name.to_string_lossy())?;
    }
    doc.set_file_info(file_info_of(src))?;

    let mut input = BufReader::new(File::open(src)?);
    let mut out = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(dst)?;
    let result = doc.encrypt_to(&mut input, OutputSink::Seekable(&mut out), options, &mut ProgressContext::new());
    if result.is_err() {
        drop(out);
        let _ = fs::remove_file(dst);
    }
    let snapshot = result?;
    info!(src = %src.display(), dst = %dst.display(), "file encrypted");
    Ok(snapshot)
}

/// Decrypt the document at `src` into `dst`.
///
/// A wrong passphrase fails with `WrongPassphrase`; partial output is removed.
pub fn decrypt_file(
    passphrase: &Passphrase,
    src: &Path,
    dst: &Path,
    config: &DocumentConfig,
) -> Result<TelemetrySnapshot, DocumentError> {
    let mut doc = open_document(passphrase, InputSource::File(src.to_path_buf()), config)?;
    if !doc.passphrase_is_valid() {
        return Err(DocumentError::WrongPassphrase);
    }
    let mut out = CountingWriter::new(BufWriter::new(File::create(dst)?));
    let result = doc
        .decrypt_to(&mut out, &mut ProgressContext::new())
        .and_then(|snapshot| {
            out.flush()?;
            Ok(snapshot)
        });
    if result.is_err() {
        drop(out);
        let _ = fs::remove_file(dst);
        return result;
    }
    info!(src = %src.display(), dst = %dst.display(), written = out.count(), "file decrypted");
    result
}
