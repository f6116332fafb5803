//! Song object verification (`spec.md` §4.4, resolved per `SPEC_FULL.md`
//! §3): the whole-object HMAC covers `[metadata || iv || ciphertext]` under
//! the metadata-HMAC key — explicitly excluding the whole-object tag itself
//! and the per-chunk HMAC table, neither of which exist yet when the tag
//! was computed at packaging time. Each chunk additionally carries its own
//! tag under the separate chunk-HMAC key, checked just before that chunk is
//! decrypted.

use drm_common::constants::SIGNATURE_SZ;
use drm_common::song::ContainerLayout;
use drm_common::Secrets;

use crate::crypto::verify_hmac;
use crate::error::{Error, Result};

fn read_tag(container: &[u8], offset: usize) -> Result<[u8; SIGNATURE_SZ]> {
    container
        .get(offset..offset + SIGNATURE_SZ)
        .ok_or_else(|| Error::MalformedMetadata("container truncated before expected HMAC tag".into()))?
        .try_into()
        .map_err(|_| Error::MalformedMetadata("HMAC tag slice had unexpected length".into()))
}

/// Verify the whole-object tag. `container` is the full song buffer: the
/// metadata block through the end of the ciphertext.
pub fn verify_whole_object(secrets: &Secrets, container: &[u8], layout: &ContainerLayout) -> Result<()> {
    let expected = read_tag(container, layout.whole_hmac_offset())?;
    let md_and_iv = container
        .get(..layout.whole_hmac_offset())
        .ok_or_else(|| Error::MalformedMetadata("container shorter than its own metadata+iv region".into()))?;
    let ciphertext = container
        .get(layout.ciphertext_offset()..)
        .ok_or_else(|| Error::MalformedMetadata("container truncated before ciphertext".into()))?;

    let mut covered = Vec::with_capacity(md_and_iv.len() + ciphertext.len());
    covered.extend_from_slice(md_and_iv);
    covered.extend_from_slice(ciphertext);
    verify_hmac(&secrets.hmac_md_key, &covered, &expected)
}

/// Verify a single chunk's tag, read out of the chunk-HMAC table at
/// `chunk_index`, against `ciphertext` (that chunk's ciphertext bytes only).
pub fn verify_chunk(secrets: &Secrets, container: &[u8], layout: &ContainerLayout, chunk_index: usize, ciphertext: &[u8]) -> Result<()> {
    let expected = read_tag(container, layout.chunk_hmac_offset(chunk_index))?;
    verify_hmac(&secrets.hmac_key, ciphertext, &expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aes_cbc_decrypt_chunk;
    use cbc::cipher::block_padding::NoPadding;
    use cbc::cipher::{BlockEncryptMut, KeyIvInit};
    use drm_common::constants::{AES_BLK_SZ, AES_KEY_SZ, HMAC_KEY_SZ};
    use drm_common::song::SongMetadata;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    fn sample_secrets() -> Secrets {
        Secrets {
            regions: vec![],
            users: vec![],
            aes_key: [1u8; AES_KEY_SZ],
            hmac_md_key: [2u8; HMAC_KEY_SZ],
            hmac_key: [3u8; HMAC_KEY_SZ],
        }
    }

    fn tag(key: &[u8; HMAC_KEY_SZ], data: &[u8]) -> [u8; SIGNATURE_SZ] {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }

    /// Build a valid one-chunk container and return it with its layout.
    fn build_container(secrets: &Secrets, plaintext: &[u8]) -> (Vec<u8>, ContainerLayout) {
        let md = SongMetadata { owner_id: 0, rids: vec![0], uids: vec![0] };
        let md_bytes = md.encode();
        let iv = [9u8; AES_BLK_SZ];
        let layout = ContainerLayout::new(md_bytes.len(), 1);

        let mut padded = plaintext.to_vec();
        let encryptor = cbc::Encryptor::<aes::Aes256>::new(&secrets.aes_key.into(), &iv.into());
        let pt_len = padded.len();
        padded.resize(pt_len + AES_BLK_SZ, 0);
        let ct_len = encryptor.encrypt_padded_mut::<NoPadding>(&mut padded, pt_len).unwrap().len();
        padded.truncate(ct_len);
        let ciphertext = padded;

        let chunk_tag = tag(&secrets.hmac_key, &ciphertext);

        let mut md_and_iv = md_bytes.clone();
        md_and_iv.extend_from_slice(&iv);
        let mut whole_covered = md_and_iv.clone();
        whole_covered.extend_from_slice(&ciphertext);
        let whole_tag = tag(&secrets.hmac_md_key, &whole_covered);

        let mut container = md_and_iv;
        container.extend_from_slice(&whole_tag);
        container.extend_from_slice(&chunk_tag);
        container.extend_from_slice(&ciphertext);
        (container, layout)
    }

    #[test]
    fn whole_object_and_chunk_tags_verify() {
        let secrets = sample_secrets();
        let (container, layout) = build_container(&secrets, b"0123456789abcdef");
        assert!(verify_whole_object(&secrets, &container, &layout).is_ok());
        let ciphertext = &container[layout.ciphertext_offset()..];
        assert!(verify_chunk(&secrets, &container, &layout, 0, ciphertext).is_ok());

        let iv: [u8; AES_BLK_SZ] = container[layout.iv_offset()..layout.iv_offset() + AES_BLK_SZ].try_into().unwrap();
        let pt = aes_cbc_decrypt_chunk(&secrets.aes_key, &iv, ciphertext).unwrap();
        assert_eq!(&pt[..16], b"0123456789abcdef");
    }

    #[test]
    fn tampered_ciphertext_fails_both_tags() {
        let secrets = sample_secrets();
        let (mut container, layout) = build_container(&secrets, b"0123456789abcdef");
        let last = container.len() - 1;
        container[last] ^= 0xff;
        assert!(verify_whole_object(&secrets, &container, &layout).is_err());
        let ciphertext = &container[layout.ciphertext_offset()..];
        assert!(verify_chunk(&secrets, &container, &layout, 0, ciphertext).is_err());
    }

    #[test]
    fn tampered_metadata_fails_whole_object_tag_only() {
        let secrets = sample_secrets();
        let (mut container, layout) = build_container(&secrets, b"0123456789abcdef");
        container[1] ^= 0xff; // owner_id byte
        assert!(verify_whole_object(&secrets, &container, &layout).is_err());
        let ciphertext = &container[layout.ciphertext_offset()..];
        assert!(verify_chunk(&secrets, &container, &layout, 0, ciphertext).is_ok());
    }
}
