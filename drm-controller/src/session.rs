//! Login session (`spec.md` §4.1): at most one logged-in user at a time,
//! tracked as controller-owned state rather than a flag inside the shared
//! channel.

use std::time::Duration;

use subtle::ConstantTimeEq;

use drm_common::channel::CommandChannel;
use drm_common::constants::MAX_PIN_SZ;
use drm_common::Secrets;

use crate::error::{Error, Result};

/// Compare two PINs in constant time (`spec.md` §4.1). Both sides are
/// padded to `MAX_PIN_SZ` before comparison, the same way `crypto.rs`'s
/// `verify_hmac` compares fixed-width tags, so a short PIN can't be told
/// apart from a long one by how quickly the mismatch is found.
fn pins_match(a: &str, b: &str) -> bool {
    let mut abuf = [0u8; MAX_PIN_SZ];
    let mut bbuf = [0u8; MAX_PIN_SZ];
    let an = a.len().min(MAX_PIN_SZ);
    let bn = b.len().min(MAX_PIN_SZ);
    abuf[..an].copy_from_slice(&a.as_bytes()[..an]);
    bbuf[..bn].copy_from_slice(&b.as_bytes()[..bn]);
    abuf.ct_eq(&bbuf).into()
}

/// Abstracts the fixed login-failure delay so tests can shrink it instead
/// of actually blocking for several seconds.
pub trait Clock {
    fn sleep(&self, d: Duration);
}

pub struct RealClock;

impl Clock for RealClock {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    logged_in_uid: Option<u8>,
}

impl Session {
    pub fn new() -> Self {
        Session { logged_in_uid: None }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in_uid.is_some()
    }

    pub fn uid(&self) -> Option<u8> {
        self.logged_in_uid
    }

    /// `login` (`spec.md` §4.1). The channel's username/PIN are cleared
    /// before comparison, mirroring the original firmware's ordering, so a
    /// handler never compares against credentials a second command could
    /// have raced in underneath it.
    pub fn login(&mut self, secrets: &Secrets, channel: &mut CommandChannel, penalty: Duration, clock: &dyn Clock) -> Result<()> {
        if self.is_logged_in() {
            return Err(Error::AlreadyLoggedIn);
        }

        let username = channel.username.to_str_lossy();
        let pin = channel.pin.to_str_lossy();
        channel.username.clear();
        channel.pin.clear();

        let uid = match secrets.uid_for_username(&username, true) {
            Some(uid) => uid,
            None => {
                clock.sleep(penalty);
                return Err(Error::UnknownUser);
            }
        };
        let expected_pin = secrets.pin_for_uid(uid).unwrap_or_default();
        if !pins_match(&pin, &expected_pin) {
            clock.sleep(penalty);
            return Err(Error::BadPin);
        }

        self.logged_in_uid = Some(uid);
        Ok(())
    }

    /// `logout` (`spec.md` §4.1). Idempotent: logging out while already
    /// logged out is not an error in the original firmware.
    pub fn logout(&mut self) {
        self.logged_in_uid = None;
    }
}
