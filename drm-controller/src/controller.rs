//! The top-level controller (`spec.md` §4.7, §9): composes the session,
//! secrets table, and hardware behind a single owned value instead of the
//! original firmware's file-scope globals, and drives the command
//! dispatcher loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use drm_common::channel::{Command, CommandChannel, NameBuf};
use drm_common::constants::{LOGIN_PENALTY, POST_COMMAND_SLEEP, PREVIEW_SZ};
use drm_common::song::{resolve_chunking, SongMetadata};
use drm_common::Secrets;

use crate::hw::Hardware;
use crate::session::{Clock, RealClock, Session};
use crate::state::{transition, ControllerState};
use crate::{auth, pipeline, query, rewriter};

pub struct Controller<H: Hardware> {
    secrets: Secrets,
    session: Session,
    state: ControllerState,
    hw: H,
    clock: Box<dyn Clock>,
    /// The last song metadata successfully loaded, kept only for
    /// diagnostics; every handler re-decodes the channel's `md_bytes`
    /// itself rather than trusting this to still match.
    snapshot: Option<SongMetadata>,
}

impl<H: Hardware> Controller<H> {
    pub fn new(secrets: Secrets, hw: H) -> Self {
        Controller { secrets, session: Session::new(), state: ControllerState::Stopped, hw, clock: Box::new(RealClock), snapshot: None }
    }

    /// Build a controller with an injected `Clock`, so unit and integration
    /// tests can use a non-sleeping clock instead of paying the real
    /// `LOGIN_PENALTY`/`POST_COMMAND_SLEEP` delays `new` incurs.
    pub fn with_clock(secrets: Secrets, hw: H, clock: Box<dyn Clock>) -> Self {
        Controller { secrets, session: Session::new(), state: ControllerState::Stopped, hw, clock, snapshot: None }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// The most recently decoded song metadata, for diagnostics/tests. Not
    /// relied on for authorization — every handler re-decodes the
    /// channel's `md_bytes` itself rather than trusting this to still
    /// match what the host last wrote.
    pub fn loaded_song(&self) -> Option<&SongMetadata> {
        self.snapshot.as_ref()
    }

    /// Block until the top-level interrupt flag is set, then run exactly
    /// one command. Returns `false` if no interrupt was pending (the
    /// caller decides whether to spin or yield between polls).
    pub fn step(&mut self, channel: &Mutex<CommandChannel>, interrupt: &AtomicBool) -> bool {
        if !interrupt.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.handle_command(channel, interrupt);
        true
    }

    fn handle_command(&mut self, channel: &Mutex<CommandChannel>, interrupt: &AtomicBool) {
        self.state = transition(&mut self.hw, ControllerState::Working);

        let cmd_raw = channel.lock().expect("command channel mutex poisoned").cmd;
        if let Some(cmd) = Command::from_raw(cmd_raw) {
            match cmd {
                Command::Login => self.do_login(channel),
                Command::Logout => self.session.logout(),
                Command::QueryPlayer => {
                    let mut ch = channel.lock().expect("command channel mutex poisoned");
                    query::query_player(&self.secrets, &mut ch.query);
                }
                Command::QuerySong => self.do_query_song(channel),
                Command::Share => self.do_share(channel),
                Command::Play => self.do_play(channel, interrupt),
                Command::DigitalOut => self.do_digital_out(channel),
                // Only meaningful while a Play is already in flight;
                // outside that, the original firmware silently ignores
                // them at the top level too.
                Command::Pause | Command::Stop | Command::Restart => {}
            }
        }

        {
            let mut ch = channel.lock().expect("command channel mutex poisoned");
            let username = self.session.uid().map(|uid| self.secrets.username(uid)).unwrap_or("");
            ch.username = NameBuf::from_str(username);
            ch.login_status = self.session.is_logged_in() as u32;
        }
        self.clock.sleep(POST_COMMAND_SLEEP);
        self.state = transition(&mut self.hw, ControllerState::Stopped);
    }

    fn do_login(&mut self, channel: &Mutex<CommandChannel>) {
        let mut ch = channel.lock().expect("command channel mutex poisoned");
        let _ = self.session.login(&self.secrets, &mut ch, LOGIN_PENALTY, self.clock.as_ref());
    }

    fn do_query_song(&mut self, channel: &Mutex<CommandChannel>) {
        let mut ch = channel.lock().expect("command channel mutex poisoned");
        match SongMetadata::decode(&ch.song.md_bytes) {
            Ok(md) => {
                query::query_song(&self.secrets, &md, &mut ch.query);
                self.snapshot = Some(md);
            }
            Err(_) => ch.song.wav_size = 0,
        }
    }

    fn do_share(&mut self, channel: &Mutex<CommandChannel>) {
        let mut ch = channel.lock().expect("command channel mutex poisoned");
        let md = match SongMetadata::decode(&ch.song.md_bytes) {
            Ok(md) => md,
            Err(_) => {
                ch.song.wav_size = 0;
                return;
            }
        };
        let target = ch.username.to_str_lossy();
        match rewriter::share_song(&self.secrets, &self.session, &md, &target) {
            Ok(updated) => {
                let old_size = md.md_size() as i64;
                let new_bytes = updated.encode();
                let shift = new_bytes.len() as i64 - old_size;
                ch.song.md_bytes = new_bytes;
                ch.song.file_size = (ch.song.file_size as i64 + shift).max(0) as u32;
                ch.song.wav_size = (ch.song.wav_size as i64 + shift).max(0) as u32;
                self.snapshot = Some(updated);
            }
            Err(_) => ch.song.wav_size = 0,
        }
    }

    fn do_play(&mut self, channel: &Mutex<CommandChannel>, interrupt: &AtomicBool) {
        let (container, md) = {
            let ch = channel.lock().expect("command channel mutex poisoned");
            match SongMetadata::decode(&ch.song.md_bytes) {
                Ok(md) => {
                    let mut container = ch.song.md_bytes.clone();
                    container.extend_from_slice(&ch.song.payload);
                    (container, md)
                }
                Err(_) => {
                    drop(ch);
                    channel.lock().expect("command channel mutex poisoned").song.wav_size = 0;
                    return;
                }
            }
        };
        self.snapshot = Some(md.clone());
        let locked = auth::is_locked(&self.secrets, &self.session, &md);

        let outcome = pipeline::play_song(&mut self.hw, &self.secrets, &container, &md, locked, interrupt, channel, &mut self.state);
        let mut ch = channel.lock().expect("command channel mutex poisoned");
        ch.song.wav_size = outcome.map(|o| o.wav_size).unwrap_or(0);
    }

    fn do_digital_out(&mut self, channel: &Mutex<CommandChannel>) {
        let mut ch = channel.lock().expect("command channel mutex poisoned");
        let md = match SongMetadata::decode(&ch.song.md_bytes) {
            Ok(md) => md,
            Err(_) => {
                ch.song.wav_size = 0;
                return;
            }
        };
        let mut container = ch.song.md_bytes.clone();
        container.extend_from_slice(&ch.song.payload);
        let nchunks = match resolve_chunking(container.len() - md.md_size()) {
            Ok((nchunks, _)) => nchunks,
            Err(_) => {
                ch.song.wav_size = 0;
                return;
            }
        };
        let locked = auth::is_locked(&self.secrets, &self.session, &md);

        let result = rewriter::digital_out(&container, &md, nchunks, ch.song.file_size, locked, PREVIEW_SZ as u32);
        ch.song.file_size = result.file_size;
        ch.song.wav_size = result.wav_size;
        ch.song.payload = result.bytes;
        ch.song.md_bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::SimHardware;
    use drm_common::secrets::UserEntry;
    use std::sync::Arc;
    use std::time::Duration;

    struct NullClock;
    impl Clock for NullClock {
        fn sleep(&self, _d: Duration) {}
    }

    fn secrets_with_alice() -> Secrets {
        Secrets {
            regions: vec![],
            users: vec![UserEntry { id: 1, name: "alice".into(), provisioned: true, pin: Some("1234".into()) }],
            aes_key: [0u8; 32],
            hmac_md_key: [0u8; 32],
            hmac_key: [0u8; 32],
        }
    }

    fn fire(interrupt: &Arc<AtomicBool>, channel: &Arc<Mutex<CommandChannel>>, controller: &mut Controller<SimHardware>, cmd: Command) {
        channel.lock().unwrap().cmd = cmd.as_raw();
        interrupt.store(true, Ordering::Release);
        assert!(controller.step(channel, interrupt));
    }

    #[test]
    fn step_returns_false_with_no_pending_interrupt() {
        let mut controller = Controller::with_clock(secrets_with_alice(), SimHardware::new(), Box::new(NullClock));
        let channel = Arc::new(Mutex::new(CommandChannel::default()));
        let interrupt = Arc::new(AtomicBool::new(false));
        assert!(!controller.step(&channel, &interrupt));
    }

    #[test]
    fn login_updates_channel_status_fields() {
        let mut controller = Controller::with_clock(secrets_with_alice(), SimHardware::new(), Box::new(NullClock));
        let channel = Arc::new(Mutex::new(CommandChannel::default()));
        let interrupt = Arc::new(AtomicBool::new(false));
        {
            let mut ch = channel.lock().unwrap();
            ch.username = NameBuf::from_str("alice");
            ch.pin = NameBuf::from_str("1234");
        }
        fire(&interrupt, &channel, &mut controller, Command::Login);

        let ch = channel.lock().unwrap();
        assert_eq!(ch.login_status, 1);
        assert_eq!(ch.username.to_str_lossy(), "alice");
    }

    #[test]
    fn logout_clears_login_status() {
        let mut controller = Controller::with_clock(secrets_with_alice(), SimHardware::new(), Box::new(NullClock));
        let channel = Arc::new(Mutex::new(CommandChannel::default()));
        let interrupt = Arc::new(AtomicBool::new(false));
        {
            let mut ch = channel.lock().unwrap();
            ch.username = NameBuf::from_str("alice");
            ch.pin = NameBuf::from_str("1234");
        }
        fire(&interrupt, &channel, &mut controller, Command::Login);
        fire(&interrupt, &channel, &mut controller, Command::Logout);
        assert_eq!(channel.lock().unwrap().login_status, 0);
    }

    #[test]
    fn unrecognized_command_is_silently_ignored() {
        let mut controller = Controller::with_clock(secrets_with_alice(), SimHardware::new(), Box::new(NullClock));
        let channel = Arc::new(Mutex::new(CommandChannel::default()));
        let interrupt = Arc::new(AtomicBool::new(false));
        channel.lock().unwrap().cmd = 0xDEAD;
        interrupt.store(true, Ordering::Release);
        assert!(controller.step(&channel, &interrupt));
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[test]
    fn malformed_song_metadata_zeroes_wav_size_instead_of_panicking() {
        let mut controller = Controller::with_clock(secrets_with_alice(), SimHardware::new(), Box::new(NullClock));
        let channel = Arc::new(Mutex::new(CommandChannel::default()));
        let interrupt = Arc::new(AtomicBool::new(false));
        channel.lock().unwrap().song.md_bytes = vec![0xff; 4];
        fire(&interrupt, &channel, &mut controller, Command::Play);
        assert_eq!(channel.lock().unwrap().song.wav_size, 0);
    }

    #[test]
    fn digital_out_strips_framing_down_to_bare_ciphertext() {
        use drm_common::constants::{AES_BLK_SZ, SIGNATURE_SZ};
        use drm_common::song::SongMetadata;

        let md = SongMetadata { owner_id: 1, rids: vec![], uids: vec![] };
        let md_bytes = md.encode();
        let nchunks = 1u32;
        let ciphertext = vec![0xCCu8; 16];
        let mut payload = vec![0u8; AES_BLK_SZ]; // iv
        payload.extend(vec![0u8; SIGNATURE_SZ]); // whole-object hmac (unchecked by digital_out)
        payload.extend(vec![0u8; nchunks as usize * SIGNATURE_SZ]); // chunk hmac table
        payload.extend_from_slice(&ciphertext);

        let mut controller = Controller::with_clock(secrets_with_alice(), SimHardware::new(), Box::new(NullClock));
        let channel = Arc::new(Mutex::new(CommandChannel::default()));
        let interrupt = Arc::new(AtomicBool::new(false));
        {
            let mut ch = channel.lock().unwrap();
            ch.song.md_bytes = md_bytes.clone();
            ch.song.payload = payload.clone();
            ch.song.file_size = (md_bytes.len() + payload.len()) as u32;
        }
        fire(&interrupt, &channel, &mut controller, Command::DigitalOut);

        let ch = channel.lock().unwrap();
        assert_eq!(ch.song.payload, ciphertext);
        assert_eq!(ch.song.wav_size, ciphertext.len() as u32);
        assert!(ch.song.md_bytes.is_empty());
    }
}
