// ## 📂 File: `src/crypto/mac.rs`

//! Document integrity MACs and the reader/writer adapters that feed them.

use std::io::{self, Read, Write};

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::config::MacKind;
use crate::constants::mac_lens;
use crate::crypto::types::{CryptoError, SymmetricKey};

/// Running HMAC selected by [`MacKind`].
#[derive(Clone)]
pub enum IntegrityMac {
    HmacSha1(Hmac<Sha1>),
    HmacSha512(Hmac<Sha512>),
}

impl IntegrityMac {
    pub fn new(kind: MacKind, key: &SymmetricKey) -> Result<Self, CryptoError> {
        let bad = |_| CryptoError::Failure("HMAC key rejected".into());
        Ok(match kind {
            MacKind::HmacSha1_128 => {
                IntegrityMac::HmacSha1(Hmac::<Sha1>::new_from_slice(key.as_bytes()).map_err(bad)?)
            }
            MacKind::HmacSha512 => IntegrityMac::HmacSha512(
                Hmac::<Sha512>::new_from_slice(key.as_bytes()).map_err(bad)?,
            ),
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            IntegrityMac::HmacSha1(m) => m.update(data),
            IntegrityMac::HmacSha512(m) => m.update(data),
        }
    }

    /// Length of the stored tag.
    pub fn tag_len(&self) -> usize {
        match self {
            IntegrityMac::HmacSha1(_) => mac_lens::V1_HMAC,
            IntegrityMac::HmacSha512(_) => mac_lens::V2_HMAC,
        }
    }

    /// Final tag; HMAC-SHA1 is truncated to 128 bits.
    pub fn finalize(self) -> Vec<u8> {
        match self {
            IntegrityMac::HmacSha1(m) => m.finalize().into_bytes()[..mac_lens::V1_HMAC].to_vec(),
            IntegrityMac::HmacSha512(m) => m.finalize().into_bytes().to_vec(),
        }
    }
}

/// Constant-time tag comparison. Length mismatch is a mismatch.
pub fn tags_match(expected: &[u8], actual: &[u8]) -> bool {
    expected.ct_eq(actual).into()
}

/// Writer that MACs every byte it forwards.
pub struct HmacWriter<W: Write> {
    inner: W,
    mac: IntegrityMac,
    written: u64,
}

impl<W: Write> HmacWriter<W> {
    pub fn new(inner: W, mac: IntegrityMac) -> Self {
        Self { inner, mac, written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Bypass the MAC (for the tag itself).
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn finalize(self) -> (W, Vec<u8>) {
        (self.inner, self.mac.finalize())
    }
}

impl<W: Write> Write for HmacWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.mac.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that MACs every byte it returns.
pub struct HmacReader<R: Read> {
    inner: R,
    mac: IntegrityMac,
    read: u64,
}

impl<R: Read> HmacReader<R> {
    pub fn new(inner: R, mac: IntegrityMac) -> Self {
        Self { inner, mac, read: 0 }
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    /// Bypass the MAC (for the tag itself).
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn finalize(self) -> (R, Vec<u8>) {
        (self.inner, self.mac.finalize())
    }
}

impl<R: Read> Read for HmacReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.mac.update(&buf[..n]);
        self.read += n as u64;
        Ok(n)
    }
}
