//! Build-time constants shared by every crate in the workspace.
//!
//! These mirror the `constants.h` / `secrets.h` pair the original firmware
//! bakes in at image build time (see `spec.md` §6). Values here are chosen
//! to be internally consistent (e.g. `CHUNK_SZ` divisible by `AES_BLK_SZ`)
//! rather than to match any particular provisioning run.

/// AES block size in bytes. CBC IVs and padding are sized off this.
pub const AES_BLK_SZ: usize = 16;

/// AES-256 key size in bytes.
pub const AES_KEY_SZ: usize = 32;

/// HMAC key size in bytes (both the metadata-HMAC and chunk-HMAC keys).
pub const HMAC_KEY_SZ: usize = 32;

/// HMAC-SHA256 tag size in bytes.
pub const SIGNATURE_SZ: usize = 32;

/// Maximum stored username length, including any NUL padding.
pub const USERNAME_SZ: usize = 32;

/// Maximum stored PIN length.
pub const MAX_PIN_SZ: usize = 16;

/// Maximum stored region/user display name length (query channel).
pub const NAME_SZ: usize = 64;

/// Upper bound on regions listed in a song's metadata.
pub const MAX_REGIONS: usize = 8;

/// Upper bound on users listed in a song's metadata.
pub const MAX_USERS: usize = 8;

/// Size in bytes of a locked/preview playback, per `spec.md` §4.5.
pub const PREVIEW_SZ: usize = 661_500; // ~30s of 44.1kHz 16-bit mono PCM

/// Nominal preview duration in seconds (for log messages only).
pub const PREVIEW_TIME_SEC: u32 = 30;

/// Chunk size for streaming decryption; must be a multiple of `AES_BLK_SZ`.
pub const CHUNK_SZ: usize = 4096;

/// Capacity of the hardware audio FIFO in bytes.
pub const FIFO_CAP: u32 = 8192;

/// Headroom the DMA engine keeps below `FIFO_CAP` before starting another
/// burst, per `spec.md` §4.5.
pub const FIFO_MARGIN: u32 = 32;

/// Fixed login failure penalty, per `spec.md` §4.1 ("≥5 s").
pub const LOGIN_PENALTY: std::time::Duration = std::time::Duration::from_secs(5);

/// Sleep the dispatcher takes after each command so the host observes
/// the WORKING state, per `spec.md` §4.7.
pub const POST_COMMAND_SLEEP: std::time::Duration = std::time::Duration::from_micros(500);

const _: () = assert!(CHUNK_SZ % AES_BLK_SZ == 0, "CHUNK_SZ must be a multiple of AES_BLK_SZ");
