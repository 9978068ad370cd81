//! headers/crypto.rs
//! Header payload encryption and the typed `Encrypted<T>` block wrapper.
//!
//! Encrypted payloads are zero-padded to the AES block size and encrypted
//! with AES-CBC under the Headers subkey with an all-zero IV. Each payload
//! carries its own lengths so the padding is never interpreted.

use std::fmt;
use std::marker::PhantomData;

use crate::config::CipherKind;
use crate::constants::AES_BLOCK_LEN;
use crate::crypto::{CbcDecryptor, CbcEncryptor, CryptoError, SymmetricKey, IV_LEN};
use crate::headers::block::HeaderBlock;
use crate::headers::payload::BlockPayload;
use crate::headers::raw::RawHeaders;
use crate::headers::types::HeaderError;

const ZERO_IV: [u8; IV_LEN] = [0u8; IV_LEN];

/// Encrypts and decrypts header payloads under the Headers subkey.
#[derive(Clone)]
pub struct HeaderCrypto {
    cipher: CipherKind,
    key: SymmetricKey,
}

impl fmt::Debug for HeaderCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderCrypto").field("cipher", &self.cipher).finish_non_exhaustive()
    }
}

impl HeaderCrypto {
    pub fn new(cipher: CipherKind, headers_key: &SymmetricKey) -> Result<Self, CryptoError> {
        if headers_key.len() != cipher.key_len() {
            return Err(CryptoError::InvalidKeyLen {
                expected: cipher.key_len(),
                actual: headers_key.len(),
            });
        }
        Ok(Self { cipher, key: headers_key.clone() })
    }

    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let padded_len = plain.len().div_ceil(AES_BLOCK_LEN).max(1) * AES_BLOCK_LEN;
        let mut buf = vec![0u8; padded_len];
        buf[..plain.len()].copy_from_slice(plain);
        CbcEncryptor::new(self.cipher, &self.key, &ZERO_IV)?.encrypt_aligned(&mut buf)?;
        Ok(buf)
    }

    pub fn decrypt(&self, cipher_text: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut buf = cipher_text.to_vec();
        CbcDecryptor::new(self.cipher, &self.key, &ZERO_IV)?.decrypt_aligned(&mut buf)?;
        Ok(buf)
    }
}

/// A header block whose payload is a `T` encrypted with [`HeaderCrypto`].
///
/// The block can be stored, cloned and re-serialized without the key; the
/// value is only reachable through [`Encrypted::open`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encrypted<T> {
    block: HeaderBlock,
    _payload: PhantomData<fn() -> T>,
}

impl<T: BlockPayload> Encrypted<T> {
    pub fn seal(value: &T, crypto: &HeaderCrypto) -> Result<Self, CryptoError> {
        let payload = crypto.encrypt(&value.encode())?;
        Ok(Self { block: HeaderBlock::new(T::BLOCK_TYPE, payload), _payload: PhantomData })
    }

    pub fn from_block(block: HeaderBlock) -> Result<Self, HeaderError> {
        if block.block_type() != T::BLOCK_TYPE || !T::BLOCK_TYPE.is_encrypted() {
            return Err(HeaderError::UnexpectedBlock {
                block_type: block.block_type() as u8,
                context: "where an encrypted payload was expected",
            });
        }
        if block.payload().len() % AES_BLOCK_LEN != 0 {
            return Err(HeaderError::payload(T::BLOCK_TYPE, "encrypted payload not block aligned"));
        }
        Ok(Self { block, _payload: PhantomData })
    }

    pub fn open(&self, crypto: &HeaderCrypto) -> Result<T, HeaderError> {
        let plain = crypto
            .decrypt(self.block.payload())
            .map_err(|e| HeaderError::payload(T::BLOCK_TYPE, e.to_string()))?;
        T::decode(&plain)
    }

    pub fn block(&self) -> &HeaderBlock {
        &self.block
    }

    pub fn into_block(self) -> HeaderBlock {
        self.block
    }
}

/// Decrypt an optional encrypted block of type `T` from parsed headers.
pub fn open_optional<T: BlockPayload>(
    raw: &RawHeaders,
    crypto: &HeaderCrypto,
) -> Result<Option<T>, HeaderError> {
    match raw.find(T::BLOCK_TYPE) {
        Some(block) => Encrypted::<T>::from_block(block.clone())?.open(crypto).map(Some),
        None => Ok(None),
    }
}
