//! Metadata query handlers (`spec.md` §4.8): `query_player` reports the
//! device's own provisioned regions/users; `query_song` reports a loaded
//! song's owner, regions, and shared users, resolved against the *full*
//! secrets table (not just the provisioned subset), since a song can name
//! a user or region this device was never provisioned for.

use drm_common::channel::{NameBuf, QueryChannel};
use drm_common::constants::{MAX_REGIONS, MAX_USERS};
use drm_common::song::SongMetadata;
use drm_common::Secrets;

pub fn query_player(secrets: &Secrets, out: &mut QueryChannel) {
    out.clear();
    let rids = secrets.provisioned_rids();
    let uids = secrets.provisioned_uids();
    out.num_regions = rids.len() as u32;
    out.num_users = uids.len() as u32;
    for (i, rid) in rids.iter().take(MAX_REGIONS).enumerate() {
        out.region_names[i] = NameBuf::from_str(secrets.region_name(*rid));
    }
    for (i, uid) in uids.iter().take(MAX_USERS).enumerate() {
        out.user_names[i] = NameBuf::from_str(secrets.username(*uid));
    }
}

pub fn query_song(secrets: &Secrets, md: &SongMetadata, out: &mut QueryChannel) {
    out.clear();
    out.num_regions = md.rids.len() as u32;
    out.num_users = md.uids.len() as u32;
    out.owner = NameBuf::from_str(secrets.username(md.owner_id));
    for (i, rid) in md.rids.iter().take(MAX_REGIONS).enumerate() {
        out.region_names[i] = NameBuf::from_str(secrets.region_name(*rid));
    }
    for (i, uid) in md.uids.iter().take(MAX_USERS).enumerate() {
        out.user_names[i] = NameBuf::from_str(secrets.username(*uid));
    }
}
