//! In-place song rewrites (`spec.md` §4.6): `share` grows a song's user
//! table, `digital_out` strips the DRM framing and hands back the raw
//! (still-encrypted) payload, truncated to the preview length when locked.
//!
//! `share` does not re-sign the whole-object HMAC after editing the
//! metadata block — a documented limitation carried over unchanged, not a
//! bug to quietly fix (`spec.md` §9). Re-sharing with a user already in
//! the table is a no-op rather than a second entry (`spec.md` §8).

use drm_common::constants::MAX_USERS;
use drm_common::song::{ContainerLayout, SongMetadata};
use drm_common::Secrets;

use crate::error::{Error, Result};
use crate::session::Session;

/// Add `target_username` to `md`'s shared-user list. Returns the updated
/// metadata; the caller is responsible for re-encoding it and shifting the
/// channel buffer to match the new `md_size`.
pub fn share_song(secrets: &Secrets, session: &Session, md: &SongMetadata, target_username: &str) -> Result<SongMetadata> {
    let uid = session.uid().ok_or(Error::NotLoggedIn)?;
    if md.owner_id != uid {
        return Err(Error::NotOwner);
    }
    let target_uid = secrets.uid_for_username(target_username, true).ok_or(Error::UnknownUser)?;
    if md.uids.contains(&target_uid) {
        return Ok(md.clone());
    }
    if md.uids.len() >= MAX_USERS {
        return Err(Error::UserTableFull);
    }

    let mut updated = md.clone();
    updated.uids.push(target_uid);
    Ok(updated)
}

pub struct DigitalOutResult {
    pub file_size: u32,
    pub wav_size: u32,
    pub bytes: Vec<u8>,
}

/// Strip the DRM framing from `container` (the song buffer starting at its
/// metadata block), returning the remaining ciphertext unmodified —
/// `digital_out` does not decrypt, it just removes the wrapper the host
/// never needs once the controller has validated it. `nchunks` must be the
/// song's real chunk count (from `resolve_chunking`), not zero, or the
/// per-chunk HMAC table is left mixed into the returned bytes.
pub fn digital_out(container: &[u8], md: &SongMetadata, nchunks: usize, file_size: u32, locked: bool, preview_sz: u32) -> DigitalOutResult {
    let layout = ContainerLayout::new(md.md_size(), nchunks);
    let header_len = layout.header_len();
    let mut bytes = container[header_len.min(container.len())..].to_vec();

    let mut wav_size = bytes.len() as u32;
    let mut new_file_size = file_size.saturating_sub(header_len as u32);

    if locked && wav_size > preview_sz {
        new_file_size = new_file_size.saturating_sub(wav_size - preview_sz);
        wav_size = preview_sz;
        bytes.truncate(wav_size as usize);
    }

    DigitalOutResult { file_size: new_file_size, wav_size, bytes }
}
