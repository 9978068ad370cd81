//! document/session.rs
//! Unlocked key material of one document: wrapped and clear master key,
//! subkeys and the header cipher.

use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::config::CryptoSuite;
use crate::headers::{HeaderCrypto, KeyWrapParams};
use crate::keys::{KeyHierarchy, MasterKey, Passphrase, Subkeys};
use crate::types::DocumentError;

#[derive(Clone, Debug)]
pub struct KeySession {
    hierarchy: KeyHierarchy,
    file_major: u8,
    key_wrap: KeyWrapParams,
    master_key: MasterKey,
    subkeys: Subkeys,
    crypto: HeaderCrypto,
}

impl KeySession {
    fn assemble(
        hierarchy: KeyHierarchy,
        file_major: u8,
        key_wrap: KeyWrapParams,
        master_key: MasterKey,
    ) -> Result<Self, DocumentError> {
        let subkeys = hierarchy.derive_subkeys(&master_key)?;
        let crypto = HeaderCrypto::new(hierarchy.suite().cipher, &subkeys.headers)?;
        Ok(Self { hierarchy, file_major, key_wrap, master_key, subkeys, crypto })
    }

    /// Fresh master key wrapped under `passphrase`.
    pub fn create<R: RngCore + CryptoRng>(
        suite: CryptoSuite,
        passphrase: &Passphrase,
        iterations: u32,
        file_major: u8,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let hierarchy = KeyHierarchy::new(suite);
        let kek = hierarchy.kek_from_passphrase(passphrase);
        let master_key = hierarchy.generate_master_key(rng);
        let key_wrap = hierarchy.wrap_master_key(&master_key, &kek, iterations, file_major, rng)?;
        Self::assemble(hierarchy, file_major, key_wrap, master_key)
    }

    /// Unwrap a stored master key; `Ok(None)` for a wrong passphrase.
    pub fn open(
        suite: CryptoSuite,
        passphrase: &Passphrase,
        key_wrap: KeyWrapParams,
        file_major: u8,
    ) -> Result<Option<Self>, DocumentError> {
        let hierarchy = KeyHierarchy::new(suite);
        let kek = hierarchy.kek_from_passphrase(passphrase);
        match hierarchy.unwrap_master_key(&key_wrap, &kek, file_major)? {
            Some(master_key) => {
                debug!(file_major, "master key unwrapped");
                Self::assemble(hierarchy, file_major, key_wrap, master_key).map(Some)
            }
            None => {
                warn!(file_major, "passphrase does not unwrap the master key");
                Ok(None)
            }
        }
    }

    /// Same master key wrapped under `new_passphrase` with a fresh salt.
    ///
    /// `current` must unwrap the stored key wrap to this session's master
    /// key, otherwise `WrongPassphrase`. The stored iteration count is kept.
    pub fn rewrap<R: RngCore + CryptoRng>(
        &self,
        current: &Passphrase,
        new_passphrase: &Passphrase,
        rng: &mut R,
    ) -> Result<Self, DocumentError> {
        let kek = self.hierarchy.kek_from_passphrase(current);
        match self.hierarchy.unwrap_master_key(&self.key_wrap, &kek, self.file_major)? {
            Some(key) if key == self.master_key => {}
            _ => {
                warn!("current passphrase rejected for rewrap");
                return Err(DocumentError::WrongPassphrase);
            }
        }
        let kek = self.hierarchy.kek_from_passphrase(new_passphrase);
        let key_wrap = self.hierarchy.wrap_master_key(
            &self.master_key,
            &kek,
            self.key_wrap.iterations,
            self.file_major,
            rng,
        )?;
        let mut next = self.clone();
        next.key_wrap = key_wrap;
        Ok(next)
    }

    pub fn suite(&self) -> &CryptoSuite {
        self.hierarchy.suite()
    }

    pub fn key_wrap(&self) -> &KeyWrapParams {
        &self.key_wrap
    }

    pub fn master_key(&self) -> &MasterKey {
        &self.master_key
    }

    pub fn subkeys(&self) -> &Subkeys {
        &self.subkeys
    }

    pub fn crypto(&self) -> &HeaderCrypto {
        &self.crypto
    }
}
