//! keys/hierarchy.rs
//! Key hierarchy driven by a [`CryptoSuite`].
//!
//! passphrase -> KEK -> (unwrap) master key -> subkeys per purpose
//!
//! The same type serves both generations; which KDFs and key widths apply is
//! read from the suite, never from the file.

use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::config::{CryptoSuite, KekKdfKind};
use crate::constants::{key_lens, KEY_WRAP_MIN_ITERATIONS};
use crate::crypto::{
    derive_subkey, passphrase_kek, salted_kek, unwrap_key, wrap_key, AesCipher, CryptoError,
    SubkeyPurpose, SymmetricKey,
};
use crate::headers::KeyWrapParams;
use crate::keys::passphrase::Passphrase;

/// Document master key. Never stored in clear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterKey(SymmetricKey);

impl MasterKey {
    pub fn from_key(key: SymmetricKey) -> Self {
        MasterKey(key)
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.0
    }
}

/// Key-encrypting key derived from a passphrase, before salting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kek(SymmetricKey);

impl Kek {
    pub fn key(&self) -> &SymmetricKey {
        &self.0
    }
}

/// The subkeys a document pass needs.
#[derive(Clone, Debug)]
pub struct Subkeys {
    pub headers: SymmetricKey,
    pub data: SymmetricKey,
    pub hmac: SymmetricKey,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyHierarchy {
    suite: CryptoSuite,
}

impl KeyHierarchy {
    pub const fn new(suite: CryptoSuite) -> Self {
        Self { suite }
    }

    pub fn suite(&self) -> &CryptoSuite {
        &self.suite
    }

    pub fn master_key_len(&self) -> usize {
        self.suite.cipher.key_len()
    }

    pub fn salt_len(&self) -> usize {
        match self.suite.kek_kdf {
            KekKdfKind::Sha1Truncated => key_lens::V1_SALT,
            KekKdfKind::Pbkdf2Sha512 => key_lens::V2_SALT,
        }
    }

    pub fn kek_from_passphrase(&self, passphrase: &Passphrase) -> Kek {
        Kek(passphrase_kek(self.suite.kek_kdf, passphrase.as_bytes()))
    }

    pub fn generate_master_key<R: RngCore + CryptoRng>(&self, rng: &mut R) -> MasterKey {
        let mut bytes = vec![0u8; self.master_key_len()];
        rng.fill_bytes(&mut bytes);
        MasterKey(SymmetricKey::from_vec(bytes))
    }

    /// RFC 3394 rounds and the effective wrapping key for the stored params.
    fn wrapping_cipher(
        &self,
        kek: &Kek,
        salt: &[u8],
        iterations: u32,
        file_major: u8,
    ) -> Result<(AesCipher, u32), CryptoError> {
        match self.suite.kek_kdf {
            KekKdfKind::Sha1Truncated => {
                // Unsalted before file version 2.
                let key = salted_kek(self.suite.kek_kdf, kek.key(), salt, iterations, file_major >= 2)?;
                Ok((AesCipher::new(&key)?, iterations))
            }
            KekKdfKind::Pbkdf2Sha512 => {
                let key = salted_kek(self.suite.kek_kdf, kek.key(), salt, iterations, true)?;
                Ok((AesCipher::new(&key)?, KEY_WRAP_MIN_ITERATIONS))
            }
        }
    }

    /// Wrap `master` under `kek` with a fresh salt.
    ///
    /// `iterations` are the wrap rounds for V1 and the PBKDF2 rounds for V2;
    /// both are stored with the wrapped key.
    pub fn wrap_master_key<R: RngCore + CryptoRng>(
        &self,
        master: &MasterKey,
        kek: &Kek,
        iterations: u32,
        file_major: u8,
        rng: &mut R,
    ) -> Result<KeyWrapParams, CryptoError> {
        if master.key().len() != self.master_key_len() {
            return Err(CryptoError::InvalidKeyLen {
                expected: self.master_key_len(),
                actual: master.key().len(),
            });
        }
        let mut salt = vec![0u8; self.salt_len()];
        rng.fill_bytes(&mut salt);
        let (cipher, rounds) = self.wrapping_cipher(kek, &salt, iterations, file_major)?;
        let wrapped = wrap_key(&cipher, master.key().as_bytes(), rounds)?;
        debug!(kek_kdf = ?self.suite.kek_kdf, iterations, "master key wrapped");
        Ok(KeyWrapParams { wrapped, salt, iterations })
    }

    /// `Ok(None)` when `kek` is not the key the master key was wrapped under.
    pub fn unwrap_master_key(
        &self,
        params: &KeyWrapParams,
        kek: &Kek,
        file_major: u8,
    ) -> Result<Option<MasterKey>, CryptoError> {
        if params.wrapped.len() != self.master_key_len() + key_lens::WRAP_IV {
            return Err(CryptoError::MalformedWrap(format!(
                "wrapped key length {} for a {}-byte master key",
                params.wrapped.len(),
                self.master_key_len()
            )));
        }
        let (cipher, rounds) =
            self.wrapping_cipher(kek, &params.salt, params.iterations, file_major)?;
        Ok(unwrap_key(&cipher, &params.wrapped, rounds)?
            .map(|bytes| MasterKey(SymmetricKey::from_vec(bytes))))
    }

    pub fn derive_subkey(
        &self,
        master: &MasterKey,
        purpose: SubkeyPurpose,
    ) -> Result<SymmetricKey, CryptoError> {
        derive_subkey(self.suite.subkey_kdf, master.key(), purpose)
    }

    pub fn derive_subkeys(&self, master: &MasterKey) -> Result<Subkeys, CryptoError> {
        Ok(Subkeys {
            headers: self.derive_subkey(master, SubkeyPurpose::Headers)?,
            data: self.derive_subkey(master, SubkeyPurpose::Data)?,
            hmac: self.derive_subkey(master, SubkeyPurpose::Hmac)?,
        })
    }
}
