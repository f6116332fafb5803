//! Playback authorization (`spec.md` §4.2): full playback requires both
//! that the logged-in user owns or was shared the song, and that the
//! device is provisioned for one of the song's listed regions. Either
//! condition failing drops playback to the preview, silently rather than
//! as an error — there is no "unauthorized" signal on the wire beyond a
//! short `wav_size`.

use drm_common::song::SongMetadata;
use drm_common::Secrets;

use crate::session::Session;

/// Whether `md` is locked to a preview for the current session: `true`
/// unless a user is logged in, owns or was shared the song, *and* the
/// device is provisioned for at least one of the song's regions.
pub fn is_locked(secrets: &Secrets, session: &Session, md: &SongMetadata) -> bool {
    let Some(uid) = session.uid() else {
        return true;
    };
    let user_authorized = md.owner_id == uid || md.uids.contains(&uid);
    let region_authorized = secrets.provisioned_rids().iter().any(|rid| md.rids.contains(rid));
    !(user_authorized && region_authorized)
}
