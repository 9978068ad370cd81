//! document/v1.rs
//! V1 documents: AES-128-CBC, HMAC-SHA1/128 stored in the Preamble.
//!
//! Encryption is a two-pass write. Headers are written with placeholder
//! lengths, the ciphertext is streamed, then the headers are rewritten in
//! place and the HMAC is computed by re-reading the output. The sink must
//! therefore be seekable.

use std::io::{Read, SeekFrom, Write};

use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use crate::config::{CryptoSuite, DocumentConfig};
use crate::crypto::{tags_match, HmacReader, IntegrityMac};
use crate::document::headers_v1::V1DocumentHeaders;
use crate::document::{mac_region, EncryptOptions, Origin};
use crate::headers::{HeaderError, LoadState, RawHeaders};
use crate::keys::Passphrase;
use crate::stream::{open_input, run_encrypt, DecryptPipeline, EncryptPipeline, InputSource, OutputSink, ProgressContext};
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::DocumentError;

pub struct V1Document {
    config: DocumentConfig,
    suite: CryptoSuite,
    headers: Option<V1DocumentHeaders>,
    input: Option<Box<dyn Read + Send>>,
    state: LoadState,
    origin: Origin,
    /// The single data pass (encrypt or decrypt) has run.
    consumed: bool,
    disposed: bool,
}

impl std::fmt::Debug for V1Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V1Document")
            .field("state", &self.state)
            .field("origin", &self.origin)
            .field("consumed", &self.consumed)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl V1Document {
    /// Empty document, ready for [`V1Document::load`].
    pub fn new(config: DocumentConfig) -> Result<Self, DocumentError> {
        Self::with_suite(CryptoSuite::V1, config)
    }

    /// Fails unless `suite` is the V1 suite.
    pub fn with_suite(suite: CryptoSuite, config: DocumentConfig) -> Result<Self, DocumentError> {
        suite.ensure_matches(&CryptoSuite::V1)?;
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

    /// New document with a fresh master key, ready for [`V1Document::encrypt_to`].
    pub fn create<R: RngCore + CryptoRng>(
        passphrase: &Passphrase,
        config: DocumentConfig,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let mut doc = Self::new(config)?;
        doc.headers = Some(V1DocumentHeaders::create(passphrase, rng)?);
        doc.state = LoadState::Valid;
        doc.origin = Origin::Created;
        Ok(doc)
    }

    /// Parse the headers of `source` and try to unwrap its master key.
    ///
    /// Returns `Ok(false)` for a wrong passphrase; format and version
    /// problems are errors.
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

    /// Continue a load after the dispatcher has read the prologue.
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
            .and_then(|()| V1DocumentHeaders::load(&raw, passphrase));
        match loaded {
            Ok(Some(headers)) => {
                info!(version = ?headers.file_version(), "V1 document loaded");
                self.headers = Some(headers);
                self.input = Some(reader);
                self.state = LoadState::Valid;
                self.origin = Origin::Loaded;
                Ok(true)
            }
            Ok(None) => {
                info!("V1 document passphrase rejected");
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

    fn ready(&self, want: Origin, op: &str) -> Result<&V1DocumentHeaders, DocumentError> {
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

    /// Compress (optionally) and encrypt `input` into `output`.
    pub fn encrypt_to(
        &mut self,
        input: &mut dyn Read,
        output: OutputSink<'_>,
        options: EncryptOptions,
        progress: &mut ProgressContext,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        let compress = options.compression()?;
        self.ready(Origin::Created, "encrypt_to")?;
        let out = match output {
            OutputSink::Seekable(s) => s,
            OutputSink::Stream(_) => return Err(DocumentError::NonSeekableOutput),
        };
        self.consumed = true;
        let config = self.config.clone();
        let suite = self.suite;
        let headers = self
            .headers
            .as_mut()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;

        let mut counters = TelemetryCounters::default();
        let mut timer = TelemetryTimer::new();

        let start = out.stream_position()?;
        headers.set_compressed(compress);
        let prefix = timer.time(Stage::Headers, || headers.encode())?;
        out.write_all(&prefix)?;
        counters.add_header(prefix.len());

        let pipeline = EncryptPipeline::new(
            &suite,
            &headers.subkeys().data,
            headers.iv(),
            compress,
            config.compression_level,
        )?;
        run_encrypt(
            input,
            pipeline,
            config.chunk_size,
            progress,
            &mut counters,
            &mut timer,
            |ct, timer| {
                timer.time(Stage::Write, || out.write_all(ct))?;
                Ok(())
            },
        )?;

        headers.set_lengths(
            counters.bytes_plaintext,
            counters.bytes_compressed,
            counters.bytes_ciphertext,
        );
        let patched = timer.time(Stage::Headers, || headers.encode())?;
        if patched.len() != prefix.len() {
            return Err(HeaderError::LengthMismatch {
                what: "rewritten header size",
                expected: prefix.len() as u64,
                actual: patched.len() as u64,
            }
            .into());
        }
        out.seek(SeekFrom::Start(start))?;
        out.write_all(&patched)?;

        let hmac_start = V1DocumentHeaders::hmac_start();
        let covered = patched.len() as u64 - hmac_start + counters.bytes_ciphertext;
        let mut mac = IntegrityMac::new(suite.mac, &headers.subkeys().hmac)?;
        out.seek(SeekFrom::Start(start + hmac_start))?;
        timer.time(Stage::Validate, || mac_region(&mut *out, covered, config.chunk_size, &mut mac))?;
        let tag = mac.finalize();
        headers.set_hmac(&tag);

        out.seek(SeekFrom::Start(start + V1DocumentHeaders::hmac_offset()))?;
        out.write_all(headers.stored_hmac())?;
        out.seek(SeekFrom::Start(start + patched.len() as u64 + counters.bytes_ciphertext))?;
        out.flush()?;

        timer.finish();
        let snapshot = TelemetrySnapshot::from(&counters, &timer);
        info!(
            plaintext = snapshot.bytes_plaintext,
            ciphertext = snapshot.bytes_ciphertext,
            compressed = compress,
            "V1 document encrypted"
        );
        Ok(snapshot)
    }

    /// Decrypt (and inflate) the loaded document into `output`.
    ///
    /// The whole ciphertext is MACed before any padding or inflate failure is
    /// reported, so a tampered file always yields `Integrity`.
    pub fn decrypt_to(
        &mut self,
        output: &mut dyn Write,
        progress: &mut ProgressContext,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        self.ready(Origin::Loaded, "decrypt_to")?;
        self.consumed = true;
        let mut input = self
            .input
            .take()
            .ok_or_else(|| DocumentError::invalid_op("input already consumed"))?;
        let chunk_size = self.config.chunk_size;
        let suite = self.suite;
        let headers = self
            .headers
            .as_ref()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;

        let mut counters = TelemetryCounters::default();
        let mut timer = TelemetryTimer::new();
        counters.add_header(headers.loaded_len() as usize);

        let mut mac = IntegrityMac::new(suite.mac, &headers.subkeys().hmac)?;
        for block in headers.loaded_blocks().iter().skip(1) {
            mac.update(&block.to_bytes());
        }

        let mut pipeline = DecryptPipeline::new(
            &suite,
            &headers.subkeys().data,
            headers.iv(),
            headers.is_compressed(),
        )?;
        progress.set_total(Some(headers.cipher_len()));

        let mut reader = HmacReader::new(&mut input, mac);
        let mut remaining = headers.cipher_len();
        let mut buf = vec![0u8; chunk_size];
        while remaining > 0 {
            progress.check_cancelled()?;
            let want = remaining.min(chunk_size as u64) as usize;
            timer
                .time(Stage::Read, || reader.read_exact(&mut buf[..want]))
                .map_err(|e| HeaderError::from_read(e, "ciphertext"))?;
            pipeline.push(&buf[..want], output, &mut counters, &mut timer)?;
            remaining -= want as u64;
            progress.advance(want as u64)?;
        }
        let deferred = pipeline.finish(output, &mut counters, &mut timer)?;

        debug!(ciphertext = reader.bytes_read(), "V1 ciphertext read");
        let (_, tag) = reader.finalize();
        if !tags_match(headers.stored_hmac(), &tag) {
            warn!("V1 document HMAC mismatch");
            return Err(DocumentError::Integrity);
        }
        if let Some(e) = deferred {
            warn!(error = %e, "V1 document failed after a valid HMAC");
            return Err(e);
        }
        if counters.bytes_plaintext != headers.plaintext_length() {
            return Err(HeaderError::LengthMismatch {
                what: "plaintext length",
                expected: headers.plaintext_length(),
                actual: counters.bytes_plaintext,
            }
            .into());
        }
        output.flush()?;

        timer.finish();
        let snapshot = TelemetrySnapshot::from(&counters, &timer);
        info!(plaintext = snapshot.bytes_plaintext, "V1 document decrypted");
        Ok(snapshot)
    }

    /// Write a copy of the loaded document whose master key is wrapped under
    /// `new_passphrase`. The ciphertext is copied verbatim and the stored
    /// HMAC of the source is verified on the way.
    ///
    /// `passphrase` must open the stored key wrap; nothing is written when it
    /// does not.
    pub fn rewrap_to<R: RngCore + CryptoRng>(
        &mut self,
        passphrase: &Passphrase,
        new_passphrase: &Passphrase,
        output: OutputSink<'_>,
        progress: &mut ProgressContext,
        rng: &mut R,
    ) -> Result<TelemetrySnapshot, DocumentError> {
        let current = self.ready(Origin::Loaded, "rewrap_to")?;
        let out = match output {
            OutputSink::Seekable(s) => s,
            OutputSink::Stream(_) => return Err(DocumentError::NonSeekableOutput),
        };
        let mut next = current.rewrap_master_key(passphrase, new_passphrase, rng)?;
        self.consumed = true;
        let mut input = self
            .input
            .take()
            .ok_or_else(|| DocumentError::invalid_op("input already consumed"))?;
        let chunk_size = self.config.chunk_size;
        let suite = self.suite;
        let current = self
            .headers
            .as_ref()
            .ok_or_else(|| DocumentError::invalid_op("no headers"))?;

        let mut counters = TelemetryCounters::default();
        let mut timer = TelemetryTimer::new();

        let start = out.stream_position()?;
        let prefix = timer.time(Stage::Headers, || next.encode())?;
        out.write_all(&prefix)?;
        counters.add_header(prefix.len());

        let hmac_start = V1DocumentHeaders::hmac_start() as usize;
        let mut old_mac = IntegrityMac::new(suite.mac, &current.subkeys().hmac)?;
        for block in current.loaded_blocks().iter().skip(1) {
            old_mac.update(&block.to_bytes());
        }
        let mut new_mac = IntegrityMac::new(suite.mac, &next.subkeys().hmac)?;
        new_mac.update(&prefix[hmac_start..]);

        progress.set_total(Some(current.cipher_len()));
        let mut remaining = current.cipher_len();
        let mut buf = vec![0u8; chunk_size];
        while remaining > 0 {
            progress.check_cancelled()?;
            let want = remaining.min(chunk_size as u64) as usize;
            timer
                .time(Stage::Read, || input.read_exact(&mut buf[..want]))
                .map_err(|e| HeaderError::from_read(e, "ciphertext"))?;
            let ct = &buf[..want];
            old_mac.update(ct);
            new_mac.update(ct);
            timer.time(Stage::Write, || out.write_all(ct))?;
            counters.add_chunk(0, 0, want);
            remaining -= want as u64;
            progress.advance(want as u64)?;
        }

        if !tags_match(current.stored_hmac(), &old_mac.finalize()) {
            warn!("V1 document HMAC mismatch during rewrap");
            return Err(DocumentError::Integrity);
        }
        next.set_hmac(&new_mac.finalize());
        let end = out.stream_position()?;
        out.seek(SeekFrom::Start(start + V1DocumentHeaders::hmac_offset()))?;
        out.write_all(next.stored_hmac())?;
        out.seek(SeekFrom::Start(end))?;
        out.flush()?;

        timer.finish();
        debug!(ciphertext = counters.bytes_ciphertext, "V1 document rewrapped");
        Ok(TelemetrySnapshot::from(&counters, &timer))
    }

    pub fn headers(&self) -> Option<&V1DocumentHeaders> {
        self.headers.as_ref()
    }

    pub fn headers_mut(&mut self) -> Option<&mut V1DocumentHeaders> {
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

    /// Offset of the first ciphertext byte in the loaded stream.
    pub fn ciphertext_offset(&self) -> Option<u64> {
        match self.origin {
            Origin::Loaded => self.headers.as_ref().map(V1DocumentHeaders::loaded_len),
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
        debug!("V1 document disposed");
    }
}

impl Drop for V1Document {
    fn drop(&mut self) {
        self.dispose();
    }
}
