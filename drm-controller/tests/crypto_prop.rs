//! Round-trip and rejection properties for the AES-CBC chunk decrypt and
//! PKCS7 strip helpers, across plaintext lengths the unit tests in
//! `crypto.rs` don't enumerate by hand.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use drm_controller::crypto::{aes_cbc_decrypt_chunk, strip_pkcs7};
use proptest::prelude::*;

fn encrypt_with_pkcs7(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    buf.resize(plaintext.len() + 16, 0);
    let encryptor = cbc::Encryptor::<Aes256>::new(key.into(), iv.into());
    let ct_len = encryptor.encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len()).unwrap().len();
    buf.truncate(ct_len);
    buf
}

proptest! {
    #[test]
    fn decrypt_then_strip_recovers_original_plaintext(
        key in proptest::array::uniform32(any::<u8>()),
        iv in proptest::array::uniform16(any::<u8>()),
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let ciphertext = encrypt_with_pkcs7(&key, &iv, &plaintext);
        let mut recovered = aes_cbc_decrypt_chunk(&key, &iv, &ciphertext).unwrap();
        strip_pkcs7(&mut recovered).unwrap();
        prop_assert_eq!(recovered, plaintext);
    }

    #[test]
    fn decrypt_never_panics_on_arbitrary_block_aligned_bytes(
        key in proptest::array::uniform32(any::<u8>()),
        iv in proptest::array::uniform16(any::<u8>()),
        nblocks in 1usize..8,
        filler in any::<u8>(),
    ) {
        let ciphertext = vec![filler; nblocks * 16];
        let _ = aes_cbc_decrypt_chunk(&key, &iv, &ciphertext);
    }

    #[test]
    fn strip_pkcs7_never_panics_on_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut data = data;
        let _ = strip_pkcs7(&mut data);
    }
}
