// ## src/crypto/kdf.rs

//! crypto/kdf.rs
//! Passphrase to key-encrypting key, KEK hardening and master to subkey
//! derivation.
//!
//! Design:
//! - V1: KEK = SHA-1(passphrase)[..16], subkey = AES-ECB(master, purpose block)
//! - V2: KEK = PBKDF2-HMAC-SHA512(SHA-512(passphrase)[..32], salt, rounds),
//!   subkey = HKDF-SHA512(master, info = domain || purpose)
//!
//! Subkeys are separate per purpose so the same master key never directly
//! keys two different primitives.

use hkdf::Hkdf;
use digest::Digest;
use sha1::Sha1;
use sha2::Sha512;

use crate::config::{KekKdfKind, SubkeyKdfKind};
use crate::constants::AES_BLOCK_LEN;
use crate::crypto::cipher::AesCipher;
use crate::crypto::types::{CryptoError, SymmetricKey, KEY_LEN_16, KEY_LEN_32};

/// HKDF info prefix for V2 subkeys.
pub const SUBKEY_INFO_DOMAIN: &[u8] = b"axcrypt-document-subkey:";

/// What a derived subkey is used for.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubkeyPurpose {
    Hmac = 0,
    Headers = 2,
    Data = 3,
}

impl SubkeyPurpose {
    pub fn label(self) -> &'static [u8] {
        match self {
            SubkeyPurpose::Hmac => b"hmac",
            SubkeyPurpose::Headers => b"headers",
            SubkeyPurpose::Data => b"data",
        }
    }
}

/// Derive a purpose-bound subkey from the master key.
pub fn derive_subkey(
    kind: SubkeyKdfKind,
    master: &SymmetricKey,
    purpose: SubkeyPurpose,
) -> Result<SymmetricKey, CryptoError> {
    match kind {
        SubkeyKdfKind::AesPrf => {
            if master.len() != KEY_LEN_16 {
                return Err(CryptoError::InvalidKeyLen { expected: KEY_LEN_16, actual: master.len() });
            }
            let cipher = AesCipher::new(master)?;
            let mut block = [0u8; AES_BLOCK_LEN];
            block[0] = purpose as u8;
            cipher.encrypt_block(&mut block);
            Ok(SymmetricKey::from_slice(&block))
        }
        SubkeyKdfKind::HkdfSha512 => {
            let hk = Hkdf::<Sha512>::new(None, master.as_bytes());
            let mut info = Vec::with_capacity(SUBKEY_INFO_DOMAIN.len() + 16);
            info.extend_from_slice(SUBKEY_INFO_DOMAIN);
            info.extend_from_slice(purpose.label());
            let mut okm = vec![0u8; KEY_LEN_32];
            hk.expand(&info, &mut okm)
                .map_err(|_| CryptoError::Failure("HKDF expand failed (SHA-512)".into()))?;
            Ok(SymmetricKey::from_vec(okm))
        }
    }
}

/// Base key-encrypting key from a passphrase, before any salting.
pub fn passphrase_kek(kind: KekKdfKind, passphrase: &[u8]) -> SymmetricKey {
    match kind {
        KekKdfKind::Sha1Truncated => {
            let digest = Sha1::digest(passphrase);
            SymmetricKey::from_slice(&digest[..KEY_LEN_16])
        }
        KekKdfKind::Pbkdf2Sha512 => {
            let digest = Sha512::digest(passphrase);
            SymmetricKey::from_slice(&digest[..KEY_LEN_32])
        }
    }
}

/// KEK actually used for wrapping, given the salt and rounds stored in the
/// key wrap block.
///
/// `salted` is false only for the oldest V1 files, which predate salting.
pub fn salted_kek(
    kind: KekKdfKind,
    kek: &SymmetricKey,
    salt: &[u8],
    iterations: u32,
    salted: bool,
) -> Result<SymmetricKey, CryptoError> {
    match kind {
        KekKdfKind::Sha1Truncated => {
            if !salted {
                return Ok(kek.clone());
            }
            if salt.len() != kek.len() {
                return Err(CryptoError::MalformedWrap(format!(
                    "salt length {} does not match key length {}",
                    salt.len(),
                    kek.len()
                )));
            }
            let xored: Vec<u8> = kek.as_bytes().iter().zip(salt).map(|(k, s)| k ^ s).collect();
            Ok(SymmetricKey::from_vec(xored))
        }
        KekKdfKind::Pbkdf2Sha512 => {
            if iterations == 0 {
                return Err(CryptoError::MalformedWrap("zero PBKDF2 iterations".into()));
            }
            let mut out = vec![0u8; KEY_LEN_32];
            pbkdf2::pbkdf2_hmac::<Sha512>(kek.as_bytes(), salt, iterations, &mut out);
            Ok(SymmetricKey::from_vec(out))
        }
    }
}
