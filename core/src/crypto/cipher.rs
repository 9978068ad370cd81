// ## 📂 File: `src/crypto/cipher.rs`

//! AES block primitive and chunked CBC encryptors/decryptors.
//!
//! The chunked types keep the CBC chain across `update` calls so the
//! pipeline can feed arbitrary slices. Only `finish` touches PKCS#7 padding.

use aes::{Aes128, Aes256, Block};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
};

use crate::config::CipherKind;
use crate::constants::AES_BLOCK_LEN;
use crate::crypto::types::{CryptoError, SymmetricKey, IV_LEN, KEY_LEN_16, KEY_LEN_32};

fn check_key(kind: CipherKind, key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != kind.key_len() {
        return Err(CryptoError::InvalidKeyLen {
            expected: kind.key_len(),
            actual: key.len(),
        });
    }
    Ok(())
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidIvLen { expected: IV_LEN, actual: iv.len() });
    }
    Ok(())
}

/// Raw AES block cipher, width selected by key length.
#[derive(Clone)]
pub enum AesCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl AesCipher {
    pub fn new(key: &SymmetricKey) -> Result<Self, CryptoError> {
        Self::from_bytes(key.as_bytes())
    }

    pub fn from_bytes(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            KEY_LEN_16 => Aes128::new_from_slice(key)
                .map(AesCipher::Aes128)
                .map_err(|_| CryptoError::InvalidKeyLen { expected: KEY_LEN_16, actual: key.len() }),
            KEY_LEN_32 => Aes256::new_from_slice(key)
                .map(AesCipher::Aes256)
                .map_err(|_| CryptoError::InvalidKeyLen { expected: KEY_LEN_32, actual: key.len() }),
            actual => Err(CryptoError::InvalidKeyLen { expected: KEY_LEN_32, actual }),
        }
    }

    pub fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_LEN]) {
        let b = Block::from_mut_slice(&mut block[..]);
        match self {
            AesCipher::Aes128(c) => c.encrypt_block(b),
            AesCipher::Aes256(c) => c.encrypt_block(b),
        }
    }

    pub fn decrypt_block(&self, block: &mut [u8; AES_BLOCK_LEN]) {
        let b = Block::from_mut_slice(&mut block[..]);
        match self {
            AesCipher::Aes128(c) => c.decrypt_block(b),
            AesCipher::Aes256(c) => c.decrypt_block(b),
        }
    }
}

enum CbcEnc {
    Aes128(cbc::Encryptor<Aes128>),
    Aes256(cbc::Encryptor<Aes256>),
}

enum CbcDec {
    Aes128(cbc::Decryptor<Aes128>),
    Aes256(cbc::Decryptor<Aes256>),
}

/// Chunked AES-CBC encryptor.
///
/// `update` emits every complete block it can and buffers the remainder.
/// `finish` applies PKCS#7 so the output is always at least one block.
pub struct CbcEncryptor {
    inner: CbcEnc,
    pending: Vec<u8>,
}

impl CbcEncryptor {
    pub fn new(kind: CipherKind, key: &SymmetricKey, iv: &[u8]) -> Result<Self, CryptoError> {
        check_key(kind, key.as_bytes())?;
        check_iv(iv)?;
        let bad_key = |_| CryptoError::InvalidKeyLen { expected: kind.key_len(), actual: key.len() };
        let inner = match kind {
            CipherKind::Aes128Cbc => {
                CbcEnc::Aes128(cbc::Encryptor::new_from_slices(key.as_bytes(), iv).map_err(bad_key)?)
            }
            CipherKind::Aes256Cbc => {
                CbcEnc::Aes256(cbc::Encryptor::new_from_slices(key.as_bytes(), iv).map_err(bad_key)?)
            }
        };
        Ok(Self { inner, pending: Vec::with_capacity(AES_BLOCK_LEN) })
    }

    fn encrypt_blocks(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_exact_mut(AES_BLOCK_LEN) {
            let b = Block::from_mut_slice(chunk);
            match &mut self.inner {
                CbcEnc::Aes128(e) => e.encrypt_block_mut(b),
                CbcEnc::Aes256(e) => e.encrypt_block_mut(b),
            }
        }
    }

    /// Encrypt a block-aligned buffer in place with no padding.
    pub fn encrypt_aligned(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        if buf.len() % AES_BLOCK_LEN != 0 || !self.pending.is_empty() {
            return Err(CryptoError::NotBlockAligned { len: buf.len() });
        }
        self.encrypt_blocks(buf);
        Ok(())
    }

    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);
        let whole = data.len() - data.len() % AES_BLOCK_LEN;
        self.pending = data.split_off(whole);
        self.encrypt_blocks(&mut data);
        out.extend_from_slice(&data);
    }

    pub fn finish(self, out: &mut Vec<u8>) -> Result<(), CryptoError> {
        let tail_len = self.pending.len();
        let mut buf = [0u8; AES_BLOCK_LEN * 2];
        buf[..tail_len].copy_from_slice(&self.pending);
        let ct = match self.inner {
            CbcEnc::Aes128(e) => e.encrypt_padded_mut::<Pkcs7>(&mut buf, tail_len),
            CbcEnc::Aes256(e) => e.encrypt_padded_mut::<Pkcs7>(&mut buf, tail_len),
        }
        .map_err(|_| CryptoError::Failure("padding buffer too small".into()))?;
        out.extend_from_slice(ct);
        Ok(())
    }
}

/// Chunked AES-CBC decryptor.
///
/// The last complete block is always held back since it may carry the
/// padding; `finish` strips it and reports [`CryptoError::Padding`] when the
/// padding is malformed.
pub struct CbcDecryptor {
    inner: CbcDec,
    pending: Vec<u8>,
}

impl CbcDecryptor {
    pub fn new(kind: CipherKind, key: &SymmetricKey, iv: &[u8]) -> Result<Self, CryptoError> {
        check_key(kind, key.as_bytes())?;
        check_iv(iv)?;
        let bad_key = |_| CryptoError::InvalidKeyLen { expected: kind.key_len(), actual: key.len() };
        let inner = match kind {
            CipherKind::Aes128Cbc => {
                CbcDec::Aes128(cbc::Decryptor::new_from_slices(key.as_bytes(), iv).map_err(bad_key)?)
            }
            CipherKind::Aes256Cbc => {
                CbcDec::Aes256(cbc::Decryptor::new_from_slices(key.as_bytes(), iv).map_err(bad_key)?)
            }
        };
        Ok(Self { inner, pending: Vec::with_capacity(AES_BLOCK_LEN * 2) })
    }

    fn decrypt_blocks(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_exact_mut(AES_BLOCK_LEN) {
            let b = Block::from_mut_slice(chunk);
            match &mut self.inner {
                CbcDec::Aes128(d) => d.decrypt_block_mut(b),
                CbcDec::Aes256(d) => d.decrypt_block_mut(b),
            }
        }
    }

    /// Decrypt a block-aligned buffer in place with no padding.
    pub fn decrypt_aligned(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        if buf.len() % AES_BLOCK_LEN != 0 || !self.pending.is_empty() {
            return Err(CryptoError::NotBlockAligned { len: buf.len() });
        }
        self.decrypt_blocks(buf);
        Ok(())
    }

    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);
        if data.len() <= AES_BLOCK_LEN {
            self.pending = data;
            return;
        }
        // Keep at least one full block (and any partial one) for `finish`.
        let mut keep = data.len() % AES_BLOCK_LEN;
        if keep == 0 {
            keep = AES_BLOCK_LEN;
        }
        let whole = data.len() - keep;
        self.pending = data.split_off(whole);
        self.decrypt_blocks(&mut data);
        out.extend_from_slice(&data);
    }

    pub fn finish(self, out: &mut Vec<u8>) -> Result<(), CryptoError> {
        if self.pending.len() != AES_BLOCK_LEN {
            return Err(CryptoError::NotBlockAligned { len: self.pending.len() });
        }
        let mut buf = [0u8; AES_BLOCK_LEN];
        buf.copy_from_slice(&self.pending);
        let pt = match self.inner {
            CbcDec::Aes128(d) => d.decrypt_padded_mut::<Pkcs7>(&mut buf),
            CbcDec::Aes256(d) => d.decrypt_padded_mut::<Pkcs7>(&mut buf),
        }
        .map_err(|_| CryptoError::Padding)?;
        out.extend_from_slice(pt);
        Ok(())
    }
}
