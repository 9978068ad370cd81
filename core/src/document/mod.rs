//! document/mod.rs
//! Loadable, decryptable and re-encryptable documents for both container
//! generations, plus the version dispatcher.
//!
//! Typical use:
//! ```no_run
//! use axcrypt_core::prelude::*;
//!
//! # fn main() -> Result<(), DocumentError> {
//! let pass = Passphrase::new("secret");
//! let mut doc = open_document(&pass, InputSource::File("a.axx".into()), &DocumentConfig::default())?;
//! if doc.passphrase_is_valid() {
//!     let mut out = Vec::new();
//!     doc.decrypt_to(&mut out, &mut ProgressContext::new())?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod headers_v1;
pub mod headers_v2;
pub mod session;
pub mod v1;
pub mod v2;

pub use factory::*;
pub use headers_v1::*;
pub use headers_v2::*;
pub use session::*;
pub use v1::*;
pub use v2::*;

use std::io::Read;

use crate::crypto::IntegrityMac;
use crate::headers::HeaderError;
use crate::types::DocumentError;

bitflags::bitflags! {
    /// Encryption options. Exactly one of the compression flags must be set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EncryptOptions: u8 {
        /// Deflate the plaintext before encryption.
        const COMPRESS = 0b0000_0001;

        /// Store the plaintext uncompressed.
        const NO_COMPRESS = 0b0000_0010;
    }
}

impl EncryptOptions {
    /// Resolve the compression choice, rejecting neither or both.
    pub fn compression(self) -> Result<bool, DocumentError> {
        match (self.contains(Self::COMPRESS), self.contains(Self::NO_COMPRESS)) {
            (true, false) => Ok(true),
            (false, true) => Ok(false),
            _ => Err(DocumentError::invalid_op(
                "exactly one of COMPRESS and NO_COMPRESS must be given",
            )),
        }
    }
}

/// Where a document's state came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    Empty,
    Created,
    Loaded,
}

/// Loader version gate: newer majors need an upgrade, older ones are foreign.
pub(crate) fn check_version(
    major: u8,
    min: u8,
    max: u8,
    accepted: &'static str,
) -> Result<(), DocumentError> {
    if major > max {
        return Err(DocumentError::UpgradeRequired { major });
    }
    if major < min {
        return Err(HeaderError::UnsupportedVersion { major, accepted }.into());
    }
    Ok(())
}

/// Feed exactly `len` bytes of `reader` to `mac`.
pub(crate) fn mac_region<R: Read + ?Sized>(
    reader: &mut R,
    len: u64,
    chunk_size: usize,
    mac: &mut IntegrityMac,
) -> Result<(), DocumentError> {
    let mut remaining = len;
    let mut buf = vec![0u8; chunk_size];
    while remaining > 0 {
        let want = remaining.min(chunk_size as u64) as usize;
        reader
            .read_exact(&mut buf[..want])
            .map_err(|e| HeaderError::from_read(e, "document body"))?;
        mac.update(&buf[..want]);
        remaining -= want as u64;
    }
    Ok(())
}
