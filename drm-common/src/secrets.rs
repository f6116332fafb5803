//! The Secrets Table: immutable, build-time-provisioned regions, users, and
//! symmetric keys (`spec.md` §2.1, §6).
//!
//! Loaded once at controller startup from a TOML file standing in for the
//! provisioning toolchain's compiled-in secrets header. Nothing here is
//! mutated after `Secrets::load_toml` returns.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::constants::{AES_KEY_SZ, HMAC_KEY_SZ};
use crate::error::{Error, Result};

/// One entry of the region table.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionEntry {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub provisioned: bool,
}

/// One entry of the user table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub provisioned: bool,
    /// Only present for provisioned users; the original firmware keys
    /// `PROVISIONED_PINS` by provisioned index, so non-provisioned users
    /// simply have no PIN.
    #[serde(default)]
    pub pin: Option<String>,
}

/// Raw TOML shape, before keys are base64-decoded.
#[derive(Debug, Clone, Deserialize)]
struct RawSecrets {
    aes_key_b64: String,
    hmac_md_key_b64: String,
    hmac_key_b64: String,
    regions: Vec<RegionEntry>,
    users: Vec<UserEntry>,
}

/// The fully decoded secrets table: region/user tables plus the three
/// symmetric keys, held for the controller's process lifetime.
#[derive(Clone)]
pub struct Secrets {
    pub regions: Vec<RegionEntry>,
    pub users: Vec<UserEntry>,
    pub aes_key: [u8; AES_KEY_SZ],
    pub hmac_md_key: [u8; HMAC_KEY_SZ],
    pub hmac_key: [u8; HMAC_KEY_SZ],
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("regions", &self.regions)
            .field("users", &self.users)
            .field("aes_key", &"<redacted>")
            .field("hmac_md_key", &"<redacted>")
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

fn decode_key<const N: usize>(label: &str, b64: &str) -> Result<[u8; N]> {
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| Error::Secrets(format!("{label}: base64 decode failed: {e}")))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::Secrets(format!("{label}: expected {N} bytes, got {}", v.len())))
}

impl Secrets {
    /// Parse and decode a secrets TOML file. Any malformed entry is a fatal
    /// initialization error (`spec.md` §7: "initialization failures are
    /// fatal").
    pub fn load_toml(text: &str) -> Result<Self> {
        let raw: RawSecrets = toml::from_str(text)?;
        let aes_key = decode_key("aes_key_b64", &raw.aes_key_b64)?;
        let hmac_md_key = decode_key("hmac_md_key_b64", &raw.hmac_md_key_b64)?;
        let hmac_key = decode_key("hmac_key_b64", &raw.hmac_key_b64)?;
        Ok(Secrets {
            regions: raw.regions,
            users: raw.users,
            aes_key,
            hmac_md_key,
            hmac_key,
        })
    }

    /// Whether `rid` names a provisioned region (this firmware image's
    /// region table, not the full region namespace).
    pub fn is_provisioned_rid(&self, rid: u8) -> bool {
        self.regions.iter().any(|r| r.id == rid && r.provisioned)
    }

    /// Whether `uid` names a provisioned user.
    pub fn is_provisioned_uid(&self, uid: u8) -> bool {
        self.users.iter().any(|u| u.id == uid && u.provisioned)
    }

    /// Region name for `rid`, searching the full table (provisioned or
    /// not). Returns `"<unknown region>"` on a miss, per `spec.md` §4.8.
    pub fn region_name(&self, rid: u8) -> &str {
        self.regions
            .iter()
            .find(|r| r.id == rid)
            .map(|r| r.name.as_str())
            .unwrap_or("<unknown region>")
    }

    /// Username for `uid`, searching the full table. Returns
    /// `"<unknown user>"` on a miss, per `spec.md` §4.8.
    pub fn username(&self, uid: u8) -> &str {
        self.users
            .iter()
            .find(|u| u.id == uid)
            .map(|u| u.name.as_str())
            .unwrap_or("<unknown user>")
    }

    /// Resolve a username to a uid, optionally restricted to provisioned
    /// users (the `provisioned_only` flag in the original's
    /// `username_to_uid`).
    pub fn uid_for_username(&self, username: &str, provisioned_only: bool) -> Option<u8> {
        self.users
            .iter()
            .find(|u| u.name == username && (!provisioned_only || u.provisioned))
            .map(|u| u.id)
    }

    /// The list of provisioned region ids, in table order.
    pub fn provisioned_rids(&self) -> Vec<u8> {
        self.regions.iter().filter(|r| r.provisioned).map(|r| r.id).collect()
    }

    /// The list of provisioned uids, in table order.
    pub fn provisioned_uids(&self) -> Vec<u8> {
        self.users.iter().filter(|u| u.provisioned).map(|u| u.id).collect()
    }

    /// Look up a provisioned user's PIN by uid, for the `login` handler.
    pub fn pin_for_uid(&self, uid: u8) -> Option<&str> {
        self.users
            .iter()
            .find(|u| u.id == uid && u.provisioned)
            .and_then(|u| u.pin.as_deref())
    }
}
