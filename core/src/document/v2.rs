//! document/v2.rs
//! V2 documents: AES-256-CBC, HMAC-SHA512 in a trailer block.
//!
//! Everything is written in one forward pass: ciphertext goes out as
//! EncryptedDataPart blocks and the lengths and HMAC follow as trailer
//! blocks, so any `Write` works as output.

use std::io::{self, Read, Write};

use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use crate::config::{CryptoSuite, DocumentConfig};
use crate::constants::{BLOCK_PREFIX_LEN, MAGIC_GUID, MAX_CHUNK_SIZE};
use crate::crypto::{tags_match, HmacWriter, IntegrityMac};
use crate::document::headers_v2::V2DocumentHeaders;
use crate::document::{EncryptOptions, Origin};
use crate::headers::{
    BlockPayload, BlockType, HeaderBlock, HeaderError, LoadState, PlaintextLengths, RawHeaders,
    V2HmacTag,
};
use crate::keys::Passphrase;
use crate::stream::{open_input, run_encrypt, DecryptPipeline, EncryptPipeline, InputSource, OutputSink, ProgressContext};
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::DocumentError;

/// Emit `pending` as data parts of `part_len` bytes. A short final part is
/// written only when `all` is set. Returns the number of parts written.
fn write_parts<W: Write + ?Sized>(
    w: &mut W,
    pending: &mut Vec<u8>,
    part_len: usize,
    all: bool,
) -> io::Result<usize> {
    let mut parts = 0;
    let mut off = 0;
    while pending.len() - off >= part_len || (all && off < pending.len()) {
        let end = (off + part_len).min(pending.len());
        HeaderBlock::write_raw(w, BlockType::EncryptedDataPart, &pending[off..end])?;
        off = end;
        parts += 1;
    }
    pending.drain(..off);
    Ok(parts)
}

/// The data region is covered by the HMAC, so a framing failure there is
/// tampering rather than a malformed header. Device errors stay I/O errors.
fn region_error(e: HeaderError) -> DocumentError {
    match e {
        HeaderError::Io(e) => DocumentError::Io(e),
        other => {
            warn!(error = %other, "V2 data region is malformed");
            DocumentError::Integrity
        }
    }
}

/// Blocks that follow the Data marker of a V2 document.
struct DataRegion {
    lengths: HeaderBlock,
    tag: V2HmacTag,
}

pub struct V2Document {
    config: DocumentConfig,
    suite: CryptoSuite,
    headers: Option<V2DocumentHeaders>,
    input: Option<Box<dyn Read + Send>>,
    state: LoadState,
    origin: Origin,
    consumed: bool,
    disposed: bool,
}

impl std::fmt::Debug for V2Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V2Document")
            .field("state", &self.state)
            .field("origin", &self.origin)
            .field("consumed", &self.consumed)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl V2Document {
    pub fn new(config: DocumentConfig) -> Result<Self, DocumentError> {
        Self::with_suite(CryptoSuite::V2, config)
    }

    /// Fails unless `suite` is the V2 suite.
    pub fn with_suite(suite: CryptoSuite, config: DocumentConfig) -> Result<Self, DocumentError> {
        suite.ensure_matches(&CryptoSuite::V2)?;
        config.validate()?;
        Ok(Self {
            config,
            suite,
            headers: None,
            input: None,
            state: LoadState::Start,
            origin: Origin::Empty,
            consumed: false,
            disposed: false,
        })
    }

    /// New document; the master key is wrapped with `config.v2_wrap_iterations`.
    pub fn create<R: RngCore + CryptoRng>(
        passphrase: &Passphrase,
        config: DocumentConfig,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let iterations = config.v2_wrap_iterations;
        let mut doc = Self::new(config)?;
        doc.headers = Some(V2DocumentHeaders::create(passphrase, iterations, rng)?);
        doc.state = LoadState::Valid;
        doc.origin = Origin::Created;
        Ok(doc)
    }

    /// `Ok(false)` for a wrong passphrase.
    pub fn load(&mut self, passphrase: &Passphrase, source: InputSource) -> Result<bool, DocumentError> {
        self.ensure_fresh()?;
        let mut reader = open_input(source)?;
        let raw = match RawHeaders::read_prologue(&mut reader, self.config.max_header_block_len) {
            Ok(raw) => raw,
            Err(e) => {
                self.state = LoadState::Failed;
                return Err(e.into());
            }
        };
        self.load_from_prologue(raw, reader, passphrase)
    }

    pub(crate) fn load_from_prologue(
        &mut self,
        mut raw: RawHeaders,
        mut reader: Box<dyn Read + Send>,
        passphrase: &Passphrase,
    ) -> Result<bool, DocumentError> {
        self.ensure_fresh()?;
        let loaded = raw
            .read_remaining(&mut reader)
            .map_err(DocumentError::from)
            .and_then(|()| V2DocumentHeaders::load(&raw, passphrase));
        match loaded {
            Ok(Some(headers)) => {
                info!(version = ?headers.file_version(), "V2 document loaded");
                self.headers = Some(headers);
                self.input = Some(reader);
                self.state = LoadState::Valid;
                self.origin = Origin::Loaded;
                Ok(true)
            }
            Ok(None) => {
                info!("V2 document passphrase rejected");
                self.state = LoadState::Invalid;
                Ok(false)
            }
            Err(e) => {
                self.state = LoadState::Failed;
                Err(e)
            }
        }
    }

    fn ensure_fresh(&self) -> Result<(), DocumentError> {
        if self.disposed {
            return Err(DocumentError::invalid_op("document has been disposed"));
        }
        if self.origin != Origin::Empty {
            return Err(DocumentError::invalid_op("document is already loaded or created"));
        }
        Ok(())
    }

    fn ready(&self, want: Origin, op: &str) -> Result<&V2DocumentHeaders, DocumentError> {
        if self.disposed {
            return Err(DocumentError::invalid_op("document has been disposed"));
        }
        if self.state != LoadState::Valid || self.origin != want {
            return Err(DocumentError::invalid_op(format!("{op} in state {:?}", self.state)));
        }
        if self.consumed {
            return Err(DocumentError::invalid_op(format!("{op}: data has already been processed")));
        }
        let headers = self
            .headers
            .as_ref()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;
        headers.session().suite().ensure_matches(&self.suite)?;
        Ok(headers)
    }

    fn part_max_len(&self) -> usize {
        MAX_CHUNK_SIZE.max(self.config.max_header_block_len)
    }

    /// Read data parts up to and including the trailer, feeding each part's
    /// payload to `on_part` and every block's bytes to `on_bytes`.
    fn read_data_region(
        input: &mut dyn Read,
        part_max: usize,
        progress: &mut ProgressContext,
        timer: &mut TelemetryTimer,
        mut on_bytes: impl FnMut(&HeaderBlock),
        mut on_part: impl FnMut(&[u8], &mut TelemetryTimer) -> Result<(), DocumentError>,
    ) -> Result<DataRegion, DocumentError> {
        let lengths = loop {
            progress.check_cancelled()?;
            let block = timer
                .time(Stage::Read, || HeaderBlock::read_from(input, part_max))
                .map_err(region_error)?;
            match block.block_type() {
                BlockType::EncryptedDataPart => {
                    on_bytes(&block);
                    on_part(block.payload(), timer)?;
                    progress.advance(block.payload().len() as u64)?;
                }
                BlockType::PlaintextLengths => {
                    on_bytes(&block);
                    break block;
                }
                other => {
                    return Err(region_error(HeaderError::UnexpectedBlock {
                        block_type: other as u8,
                        context: "in the data region",
                    }))
                }
            }
        };
        let tag = HeaderBlock::read_from(input, part_max)
            .and_then(|block| V2HmacTag::from_block(&block))
            .map_err(region_error)?;
        Ok(DataRegion { lengths, tag })
    }

    /// Compress (optionally) and encrypt `input` into `output`. Any sink works.
    pub fn encrypt_to(
        &mut self,
        input: &mut dyn Read,
        mut output: OutputSink<'_>,
        options: EncryptOptions,
        progress: &mut ProgressContext,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        let compress = options.compression()?;
        self.ready(Origin::Created, "encrypt_to")?;
        self.consumed = true;
        let config = self.config.clone();
        let suite = self.suite;
        let headers = self
            .headers
            .as_mut()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;

        let mut counters = TelemetryCounters::default();
        let mut timer = TelemetryTimer::new();

        let mac = IntegrityMac::new(suite.mac, &headers.subkeys().hmac)?;
        let mut writer = HmacWriter::new(output.as_write(), mac);

        headers.set_compressed(compress);
        let prefix = timer.time(Stage::Headers, || headers.encode())?;
        writer.write_all(&prefix)?;
        counters.add_header(prefix.len());

        let pipeline = EncryptPipeline::new(
            &suite,
            &headers.subkeys().data,
            headers.iv(),
            compress,
            config.compression_level,
        )?;
        let part_len = config.chunk_size;
        let mut pending = Vec::with_capacity(part_len * 2);
        let mut parts = 0usize;
        run_encrypt(
            input,
            pipeline,
            config.chunk_size,
            progress,
            &mut counters,
            &mut timer,
            |ct, timer| {
                pending.extend_from_slice(ct);
                parts += timer.time(Stage::Write, || write_parts(&mut writer, &mut pending, part_len, false))?;
                Ok(())
            },
        )?;
        parts += write_parts(&mut writer, &mut pending, part_len, true)?;
        counters.add_header(parts * BLOCK_PREFIX_LEN);

        let lengths = PlaintextLengths {
            plaintext_len: counters.bytes_plaintext,
            compressed_len: counters.bytes_compressed,
        };
        let trailer = headers.seal_lengths(&lengths)?;
        trailer.write_to(&mut writer)?;
        let (out, tag) = writer.finalize();
        HeaderBlock::write_raw(out, BlockType::V2Hmac, &tag)?;
        out.flush()?;
        counters.add_header(trailer.encoded_len() + BLOCK_PREFIX_LEN + tag.len());
        headers.set_lengths(lengths);

        timer.finish();
        let snapshot = TelemetrySnapshot::from(&counters, &timer);
        info!(
            plaintext = snapshot.bytes_plaintext,
            ciphertext = snapshot.bytes_ciphertext,
            parts,
            compressed = compress,
            "V2 document encrypted"
        );
        Ok(snapshot)
    }

    /// Decrypt the loaded document into `output`.
    ///
    /// An HMAC mismatch takes precedence over padding, inflate and trailer
    /// decoding failures.
    pub fn decrypt_to(
        &mut self,
        output: &mut dyn Write,
        progress: &mut ProgressContext,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        self.ready(Origin::Loaded, "decrypt_to")?;
        self.consumed = true;
        let part_max = self.part_max_len();
        let mut input = self
            .input
            .take()
            .ok_or_else(|| DocumentError::invalid_op("input already consumed"))?;
        let suite = self.suite;
        let headers = self
            .headers
            .as_mut()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;

        let mut counters = TelemetryCounters::default();
        let mut timer = TelemetryTimer::new();
        counters.add_header(headers.loaded_len() as usize);

        let mut mac = IntegrityMac::new(suite.mac, &headers.subkeys().hmac)?;
        mac.update(&MAGIC_GUID);
        for block in headers.loaded_blocks() {
            mac.update(&block.to_bytes());
        }

        let mut pipeline = DecryptPipeline::new(
            &suite,
            &headers.subkeys().data,
            headers.iv(),
            headers.is_compressed(),
        )?;

        let mut framing = 0usize;
        let region = {
            let mac = &mut mac;
            let pipeline = &mut pipeline;
            let counters = &mut counters;
            let framing = &mut framing;
            Self::read_data_region(
                &mut input,
                part_max,
                progress,
                &mut timer,
                |block| {
                    mac.update(&block.to_bytes());
                    *framing += BLOCK_PREFIX_LEN;
                },
                |payload, timer| pipeline.push(payload, output, counters, timer),
            )?
        };
        counters.add_header(framing + region.lengths.payload().len() + BLOCK_PREFIX_LEN + region.tag.tag.len());
        let deferred = pipeline.finish(output, &mut counters, &mut timer)?;

        let tag = mac.finalize();
        if !tags_match(&region.tag.tag, &tag) {
            warn!("V2 document HMAC mismatch");
            return Err(DocumentError::Integrity);
        }
        if let Some(e) = deferred {
            warn!(error = %e, "V2 document failed after a valid HMAC");
            return Err(e);
        }
        let lengths = headers.open_lengths(region.lengths)?;
        if counters.bytes_plaintext != lengths.plaintext_len {
            return Err(HeaderError::LengthMismatch {
                what: "plaintext length",
                expected: lengths.plaintext_len,
                actual: counters.bytes_plaintext,
            }
            .into());
        }
        headers.set_lengths(lengths);
        output.flush()?;

        timer.finish();
        let snapshot = TelemetrySnapshot::from(&counters, &timer);
        info!(plaintext = snapshot.bytes_plaintext, "V2 document decrypted");
        Ok(snapshot)
    }

    /// Stream a copy of the loaded document whose master key is wrapped
    /// under `new_passphrase`. Data parts and the lengths trailer are copied
    /// verbatim; the source HMAC is verified and a new one is written.
    ///
    /// `passphrase` must open the stored key wrap; nothing is written when it
    /// does not.
    pub fn rewrap_to<R: RngCore + CryptoRng>(
        &mut self,
        passphrase: &Passphrase,
        new_passphrase: &Passphrase,
        mut output: OutputSink<'_>,
        progress: &mut ProgressContext,
        rng: &mut R,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        let next = self
            .ready(Origin::Loaded, "rewrap_to")?
            .rewrap_master_key(passphrase, new_passphrase, rng)?;
        self.consumed = true;
        let part_max = self.part_max_len();
        let mut input = self
            .input
            .take()
            .ok_or_else(|| DocumentError::invalid_op("input already consumed"))?;
        let suite = self.suite;
        let current = self
            .headers
            .as_ref()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;

        let mut counters = TelemetryCounters::default();
        let mut timer = TelemetryTimer::new();

        let mut old_mac = IntegrityMac::new(suite.mac, &current.subkeys().hmac)?;
        old_mac.update(&MAGIC_GUID);
        for block in current.loaded_blocks() {
            old_mac.update(&block.to_bytes());
        }

        let new_mac = IntegrityMac::new(suite.mac, &next.subkeys().hmac)?;
        let mut writer = HmacWriter::new(output.as_write(), new_mac);
        let prefix = timer.time(Stage::Headers, || next.encode())?;
        writer.write_all(&prefix)?;
        counters.add_header(prefix.len());

        let mut write_err: Option<io::Error> = None;
        let region = {
            let writer = &mut writer;
            let counters = &mut counters;
            let old_mac = &mut old_mac;
            let write_err = &mut write_err;
            Self::read_data_region(
                &mut input,
                part_max,
                progress,
                &mut timer,
                |block| {
                    old_mac.update(&block.to_bytes());
                    if write_err.is_none() {
                        if let Err(e) = block.write_to(writer) {
                            *write_err = Some(e);
                        }
                    }
                },
                |payload, _timer| {
                    counters.add_chunk(0, 0, payload.len());
                    Ok(())
                },
            )?
        };
        if let Some(e) = write_err {
            return Err(e.into());
        }

        if !tags_match(&region.tag.tag, &old_mac.finalize()) {
            warn!("V2 document HMAC mismatch during rewrap");
            return Err(DocumentError::Integrity);
        }
        let (out, tag) = writer.finalize();
        HeaderBlock::write_raw(out, BlockType::V2Hmac, &tag)?;
        out.flush()?;

        timer.finish();
        debug!(ciphertext = counters.bytes_ciphertext, "V2 document rewrapped");
        Ok(TelemetrySnapshot::from(&counters, &timer))
    }

    pub fn headers(&self) -> Option<&V2DocumentHeaders> {
        self.headers.as_ref()
    }

    pub fn headers_mut(&mut self) -> Option<&mut V2DocumentHeaders> {
        self.headers.as_mut()
    }

    pub fn passphrase_is_valid(&self) -> bool {
        self.state == LoadState::Valid
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Offset of the first data part in the loaded stream.
    pub fn ciphertext_offset(&self) -> Option<u64> {
        match self.origin {
            Origin::Loaded => self.headers.as_ref().map(V2DocumentHeaders::loaded_len),
            _ => None,
        }
    }

    /// Drop key material and the input stream. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.headers = None;
        self.input = None;
        self.disposed = true;
        debug!("V2 document disposed");
    }
}

impl Drop for V2Document {
    fn drop(&mut self) {
        self.dispose();
    }
}
