//! The shared command channel (`spec.md` §3, §6): a fixed memory region
//! written by an untrusted host and read/written by the controller.
//!
//! Every field here is treated as untrusted input per `spec.md` §5's
//! shared-resource policy: fixed-capacity buffers instead of unbounded
//! strings, and copy-out accessors instead of references into the channel,
//! so a command handler can't observe the host mutating a field between a
//! length check and its use (TOCTOU).

use crate::constants::{MAX_PIN_SZ, MAX_REGIONS, MAX_USERS, NAME_SZ, USERNAME_SZ};

/// Command discriminator written by the host (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Login,
    Logout,
    QueryPlayer,
    QuerySong,
    Share,
    Play,
    Pause,
    Stop,
    Restart,
    DigitalOut,
}

impl Command {
    /// Decode a raw discriminator. Unknown values return `None` so the
    /// dispatcher can silently ignore them, per `spec.md` §4.7.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => Command::Login,
            2 => Command::Logout,
            3 => Command::QueryPlayer,
            4 => Command::QuerySong,
            5 => Command::Share,
            6 => Command::Play,
            7 => Command::Pause,
            8 => Command::Stop,
            9 => Command::Restart,
            10 => Command::DigitalOut,
            _ => return None,
        })
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Command::Login => 1,
            Command::Logout => 2,
            Command::QueryPlayer => 3,
            Command::QuerySong => 4,
            Command::Share => 5,
            Command::Play => 6,
            Command::Pause => 7,
            Command::Stop => 8,
            Command::Restart => 9,
            Command::DigitalOut => 10,
        }
    }
}

/// A fixed-capacity, NUL-padded byte buffer standing in for a
/// `char[N]` field in the shared channel.
///
/// Writes silently truncate to capacity rather than panicking: the channel
/// is attacker-controlled, so a handler must never be able to crash the
/// controller just by writing an oversized name.
#[derive(Clone, Copy)]
pub struct NameBuf<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> NameBuf<N> {
    pub fn empty() -> Self {
        NameBuf { bytes: [0u8; N] }
    }

    pub fn from_str(s: &str) -> Self {
        let mut bytes = [0u8; N];
        let src = s.as_bytes();
        let n = src.len().min(N.saturating_sub(1)); // always leave room for a NUL
        bytes[..n].copy_from_slice(&src[..n]);
        NameBuf { bytes }
    }

    /// Copy the buffer out as a UTF-8 string, stopping at the first NUL
    /// (or end of buffer) and lossily replacing any invalid bytes. This is
    /// the TOCTOU-safe "copy before check" read `spec.md` §5 requires.
    pub fn to_str_lossy(&self) -> String {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }

    pub fn clear(&mut self) {
        self.bytes = [0u8; N];
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> Default for NameBuf<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> std::fmt::Debug for NameBuf<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NameBuf({:?})", self.to_str_lossy())
    }
}

/// The `song` sub-channel: file sizes plus the raw metadata and payload
/// bytes as written by the host. `md_bytes`/`payload` are not validated
/// here — `load_song_md` in `drm-controller` does that.
#[derive(Debug, Clone, Default)]
pub struct SongChannel {
    pub file_size: u32,
    pub wav_size: u32,
    pub md_bytes: Vec<u8>,
    pub payload: Vec<u8>,
}

/// The `query` sub-channel (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct QueryChannel {
    pub num_regions: u32,
    pub num_users: u32,
    pub owner: NameBuf<NAME_SZ>,
    pub region_names: [NameBuf<NAME_SZ>; MAX_REGIONS],
    pub user_names: [NameBuf<NAME_SZ>; MAX_USERS],
}

impl Default for QueryChannel {
    fn default() -> Self {
        QueryChannel {
            num_regions: 0,
            num_users: 0,
            owner: NameBuf::empty(),
            region_names: [NameBuf::empty(); MAX_REGIONS],
            user_names: [NameBuf::empty(); MAX_USERS],
        }
    }
}

impl QueryChannel {
    pub fn clear(&mut self) {
        *self = QueryChannel::default();
    }
}

/// The full shared command channel.
#[derive(Debug, Clone, Default)]
pub struct CommandChannel {
    pub cmd: u32,
    pub username: NameBuf<USERNAME_SZ>,
    pub pin: NameBuf<MAX_PIN_SZ>,
    pub login_status: u32,
    pub song: SongChannel,
    pub query: QueryChannel,
}
