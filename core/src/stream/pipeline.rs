// ## 📂 File: `src/stream/pipeline.rs`

//! Chunked compress + encrypt and decrypt + inflate pipelines.
//!
//! Encrypt: plaintext chunk -> (zlib, sync flush) -> AES-CBC -> ciphertext.
//! Decrypt: ciphertext -> AES-CBC -> (inflate) -> plaintext.
//!
//! Decrypt failures from the cipher padding or the inflater are deferred:
//! the caller keeps feeding ciphertext so the HMAC covers the whole region,
//! and an HMAC mismatch takes precedence over the deferred failure.

use std::io::{Read, Write};

use tracing::debug;

use crate::compression::{create_compressor, create_decompressor, Compressor, Decompressor};
use crate::config::CryptoSuite;
use crate::crypto::{CbcDecryptor, CbcEncryptor, SymmetricKey};
use crate::stream::io::read_exact_or_eof;
use crate::stream::progress::ProgressContext;
use crate::telemetry::{Stage, TelemetryCounters, TelemetryTimer};
use crate::types::DocumentError;

pub struct EncryptPipeline {
    compressor: Option<Box<dyn Compressor + Send>>,
    encryptor: CbcEncryptor,
    scratch: Vec<u8>,
}

impl EncryptPipeline {
    pub fn new(
        suite: &CryptoSuite,
        data_key: &SymmetricKey,
        iv: &[u8],
        compress: bool,
        level: u32,
    ) -> Result<Self, DocumentError> {
        let compressor = if compress { Some(create_compressor(suite.codec, level)?) } else { None };
        Ok(Self {
            compressor,
            encryptor: CbcEncryptor::new(suite.cipher, data_key, iv)?,
            scratch: Vec::new(),
        })
    }

    /// Process one plaintext chunk, appending ciphertext to `out`.
    pub fn push(
        &mut self,
        chunk: &[u8],
        out: &mut Vec<u8>,
        counters: &mut TelemetryCounters,
        timer: &mut TelemetryTimer,
    ) -> Result<(), DocumentError> {
        let before = out.len();
        let comp_len = match self.compressor.as_mut() {
            Some(c) => {
                self.scratch.clear();
                let scratch = &mut self.scratch;
                timer.time(Stage::Compress, || c.compress_chunk(chunk, scratch))?;
                let encryptor = &mut self.encryptor;
                let compressed = &self.scratch;
                timer.time(Stage::Encrypt, || encryptor.update(compressed, out));
                self.scratch.len()
            }
            None => {
                let encryptor = &mut self.encryptor;
                timer.time(Stage::Encrypt, || encryptor.update(chunk, out));
                chunk.len()
            }
        };
        counters.add_chunk(chunk.len(), comp_len, out.len() - before);
        Ok(())
    }

    /// Flush the codec and pad the final cipher block.
    pub fn finish(
        mut self,
        out: &mut Vec<u8>,
        counters: &mut TelemetryCounters,
        timer: &mut TelemetryTimer,
    ) -> Result<(), DocumentError> {
        let before = out.len();
        let mut comp_len = 0;
        if let Some(mut c) = self.compressor.take() {
            let mut tail = Vec::new();
            timer.time(Stage::Compress, || c.finish(&mut tail))?;
            comp_len = tail.len();
            self.encryptor.update(&tail, out);
        }
        timer.time(Stage::Encrypt, || self.encryptor.finish(out))?;
        counters.add_tail(0, comp_len, out.len() - before);
        Ok(())
    }
}

/// Read `input` to the end in `chunk_size` steps, handing each ciphertext
/// slice to `emit`. Progress advances once per plaintext chunk.
pub fn run_encrypt<F>(
    input: &mut dyn Read,
    mut pipeline: EncryptPipeline,
    chunk_size: usize,
    progress: &mut ProgressContext,
    counters: &mut TelemetryCounters,
    timer: &mut TelemetryTimer,
    mut emit: F,
) -> Result<(), DocumentError>
where
    F: FnMut(&[u8], &mut TelemetryTimer) -> Result<(), DocumentError>,
{
    let mut ct = Vec::with_capacity(chunk_size + 32);
    loop {
        progress.check_cancelled()?;
        let chunk = timer.time(Stage::Read, || read_exact_or_eof(input, chunk_size))?;
        if chunk.is_empty() {
            break;
        }
        ct.clear();
        pipeline.push(&chunk, &mut ct, counters, timer)?;
        emit(&ct, timer)?;
        progress.advance(chunk.len() as u64)?;
    }
    ct.clear();
    pipeline.finish(&mut ct, counters, timer)?;
    emit(&ct, timer)?;
    debug!(
        plaintext = counters.bytes_plaintext,
        compressed = counters.bytes_compressed,
        ciphertext = counters.bytes_ciphertext,
        "encrypt pipeline finished"
    );
    Ok(())
}

pub struct DecryptPipeline {
    decryptor: Option<CbcDecryptor>,
    decompressor: Option<Box<dyn Decompressor + Send>>,
    failure: Option<DocumentError>,
    scratch: Vec<u8>,
    plain: Vec<u8>,
}

impl DecryptPipeline {
    pub fn new(
        suite: &CryptoSuite,
        data_key: &SymmetricKey,
        iv: &[u8],
        compressed: bool,
    ) -> Result<Self, DocumentError> {
        let decompressor = if compressed { Some(create_decompressor(suite.codec)?) } else { None };
        Ok(Self {
            decryptor: Some(CbcDecryptor::new(suite.cipher, data_key, iv)?),
            decompressor,
            failure: None,
            scratch: Vec::new(),
            plain: Vec::new(),
        })
    }

    /// Hand decrypted bytes to the inflater (if any) and the output.
    /// Only output I/O errors are returned; codec errors are deferred.
    fn emit(
        &mut self,
        out: &mut dyn Write,
        counters: &mut TelemetryCounters,
        timer: &mut TelemetryTimer,
        ct_len: usize,
        last: bool,
    ) -> Result<(), DocumentError> {
        let comp_len = self.scratch.len();
        let mut pt_len = 0;
        if self.failure.is_none() {
            match self.decompressor.as_mut() {
                Some(d) => {
                    self.plain.clear();
                    let (scratch, plain) = (&self.scratch, &mut self.plain);
                    let mut res = timer.time(Stage::Decompress, || d.decompress_chunk(scratch, plain));
                    if res.is_ok() && last {
                        res = timer.time(Stage::Decompress, || d.finish(plain));
                    }
                    match res {
                        Ok(()) => {
                            let plain = &self.plain;
                            timer.time(Stage::Write, || out.write_all(plain))?;
                            pt_len = self.plain.len();
                        }
                        Err(e) => self.failure = Some(e.into()),
                    }
                }
                None => {
                    let scratch = &self.scratch;
                    timer.time(Stage::Write, || out.write_all(scratch))?;
                    pt_len = comp_len;
                }
            }
        }
        if last {
            counters.add_tail(pt_len, comp_len, ct_len);
        } else {
            counters.add_chunk(pt_len, comp_len, ct_len);
        }
        Ok(())
    }

    /// Feed one ciphertext slice.
    pub fn push(
        &mut self,
        ct: &[u8],
        out: &mut dyn Write,
        counters: &mut TelemetryCounters,
        timer: &mut TelemetryTimer,
    ) -> Result<(), DocumentError> {
        self.scratch.clear();
        if self.failure.is_none() {
            if let Some(decryptor) = self.decryptor.as_mut() {
                let scratch = &mut self.scratch;
                timer.time(Stage::Decrypt, || decryptor.update(ct, scratch));
            }
        }
        self.emit(out, counters, timer, ct.len(), false)
    }

    /// Strip the padding and drain the inflater.
    ///
    /// Returns the deferred failure, if any, for the caller to report after
    /// the integrity check.
    pub fn finish(
        mut self,
        out: &mut dyn Write,
        counters: &mut TelemetryCounters,
        timer: &mut TelemetryTimer,
    ) -> Result<Option<DocumentError>, DocumentError> {
        self.scratch.clear();
        if let Some(decryptor) = self.decryptor.take() {
            if self.failure.is_none() {
                let mut tail = Vec::new();
                match timer.time(Stage::Decrypt, || decryptor.finish(&mut tail)) {
                    Ok(()) => self.scratch = tail,
                    Err(e) => self.failure = Some(e.into()),
                }
            }
        }
        self.emit(out, counters, timer, 0, true)?;
        Ok(self.failure)
    }
}
