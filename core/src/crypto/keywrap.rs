// ## 📂 File: `src/crypto/keywrap.rs`

//! RFC 3394 AES key wrap with a configurable round count.
//!
//! The integrity check value is compared in constant time, and the unwrap
//! always runs every round before the comparison.

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::constants::key_lens::WRAP_IV;
use crate::constants::AES_BLOCK_LEN;
use crate::crypto::cipher::AesCipher;
use crate::crypto::types::CryptoError;

/// RFC 3394 default initial value.
pub const WRAP_IV_VALUE: [u8; WRAP_IV] = [0xA6; WRAP_IV];

fn check_rounds(iterations: u32) -> Result<(), CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::MalformedWrap("zero wrap iterations".into()));
    }
    Ok(())
}

/// Wrap `key` (a multiple of 8 bytes, at least 16) under `kek`.
/// Output is `key.len() + 8` bytes.
pub fn wrap_key(kek: &AesCipher, key: &[u8], iterations: u32) -> Result<Vec<u8>, CryptoError> {
    check_rounds(iterations)?;
    if key.len() < 16 || key.len() % 8 != 0 {
        return Err(CryptoError::MalformedWrap(format!("cannot wrap {} key bytes", key.len())));
    }
    let n = key.len() / 8;
    let mut a = WRAP_IV_VALUE;
    let mut r = key.to_vec();
    let mut block = [0u8; AES_BLOCK_LEN];

    for j in 0..iterations as u64 {
        for i in 0..n {
            block[..8].copy_from_slice(&a);
            block[8..].copy_from_slice(&r[i * 8..i * 8 + 8]);
            kek.encrypt_block(&mut block);
            let t = (n as u64) * j + (i as u64 + 1);
            a.copy_from_slice(&block[..8]);
            xor_counter(&mut a, t);
            r[i * 8..i * 8 + 8].copy_from_slice(&block[8..]);
        }
    }
    block.zeroize();

    let mut out = Vec::with_capacity(WRAP_IV + r.len());
    out.extend_from_slice(&a);
    out.extend_from_slice(&r);
    r.zeroize();
    Ok(out)
}

/// Unwrap `wrapped` under `kek`.
///
/// Returns `Ok(None)` when the integrity check fails (the expected result for
/// a wrong key) and `Err` only for structurally malformed input.
pub fn unwrap_key(
    kek: &AesCipher,
    wrapped: &[u8],
    iterations: u32,
) -> Result<Option<Vec<u8>>, CryptoError> {
    check_rounds(iterations)?;
    if wrapped.len() < 24 || wrapped.len() % 8 != 0 {
        return Err(CryptoError::MalformedWrap(format!(
            "wrapped key length {} is invalid",
            wrapped.len()
        )));
    }
    let n = wrapped.len() / 8 - 1;
    let mut a = [0u8; WRAP_IV];
    a.copy_from_slice(&wrapped[..WRAP_IV]);
    let mut r = wrapped[WRAP_IV..].to_vec();
    let mut block = [0u8; AES_BLOCK_LEN];

    for j in (0..iterations as u64).rev() {
        for i in (0..n).rev() {
            let t = (n as u64) * j + (i as u64 + 1);
            xor_counter(&mut a, t);
            block[..8].copy_from_slice(&a);
            block[8..].copy_from_slice(&r[i * 8..i * 8 + 8]);
            kek.decrypt_block(&mut block);
            a.copy_from_slice(&block[..8]);
            r[i * 8..i * 8 + 8].copy_from_slice(&block[8..]);
        }
    }
    block.zeroize();

    if bool::from(a[..].ct_eq(&WRAP_IV_VALUE[..])) {
        Ok(Some(r))
    } else {
        r.zeroize();
        Ok(None)
    }
}

#[inline]
fn xor_counter(a: &mut [u8; WRAP_IV], t: u64) {
    for (x, y) in a.iter_mut().zip(t.to_be_bytes()) {
        *x ^= y;
    }
}
