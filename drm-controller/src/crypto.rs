//! HMAC verification and AES-CBC decryption primitives (`spec.md` §4.3,
//! §4.5). Every tag comparison here is constant-time; nothing in this module
//! short-circuits on the first mismatched byte.

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use drm_common::constants::{AES_BLK_SZ, AES_KEY_SZ, HMAC_KEY_SZ, SIGNATURE_SZ};

use crate::error::{Error, Result};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Compute an HMAC-SHA256 tag over `data`. A fresh `Hmac` instance is built
/// for every call, so there is no state to accidentally carry between
/// unrelated verifications.
fn hmac_tag(key: &[u8; HMAC_KEY_SZ], data: &[u8]) -> [u8; SIGNATURE_SZ] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Verify `data` against `expected` under `key`, in constant time.
pub fn verify_hmac(key: &[u8; HMAC_KEY_SZ], data: &[u8], expected: &[u8; SIGNATURE_SZ]) -> Result<()> {
    let tag = hmac_tag(key, data);
    if bool::from(tag.ct_eq(expected)) {
        Ok(())
    } else {
        Err(Error::HmacMismatch)
    }
}

/// Decrypt one AES-256-CBC chunk with an explicit IV. No padding is removed
/// here — chunk boundaries are not block-cipher padding boundaries, so only
/// the terminal chunk's terminal block ever carries PKCS#7 padding, and that
/// is stripped separately by the caller (`spec.md` §4.5).
pub fn aes_cbc_decrypt_chunk(key: &[u8; AES_KEY_SZ], iv: &[u8; AES_BLK_SZ], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLK_SZ != 0 {
        return Err(Error::DecryptFailed(format!(
            "ciphertext length {} is not a nonzero multiple of the block size",
            ciphertext.len()
        )));
    }
    let mut buf = ciphertext.to_vec();
    let decryptor = Aes256CbcDec::new(key.into(), iv.into());
    let len = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| Error::DecryptFailed(e.to_string()))?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// Strip PKCS#7 padding from the final plaintext block of the terminal
/// chunk. `spec.md` §4.5: an out-of-range padding byte aborts playback
/// rather than silently truncating to zero.
pub fn strip_pkcs7(plaintext: &mut Vec<u8>) -> Result<()> {
    let Some(&p) = plaintext.last() else {
        return Err(Error::BadPadding);
    };
    let p = p as usize;
    if p == 0 || p > AES_BLK_SZ || p > plaintext.len() {
        return Err(Error::BadPadding);
    }
    if !plaintext[plaintext.len() - p..].iter().all(|&b| b as usize == p) {
        return Err(Error::BadPadding);
    }
    plaintext.truncate(plaintext.len() - p);
    Ok(())
}
