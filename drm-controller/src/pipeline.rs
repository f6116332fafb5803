//! Streaming decrypt-and-play pipeline (`spec.md` §4.5): walk the song's
//! chunk table, verify and decrypt one chunk at a time into a BRAM
//! half-buffer, and push it out over DMA, capping total output at
//! `PREVIEW_SZ` bytes when playback is locked to a preview.
//!
//! Playback polls the shared interrupt flag once per chunk boundary
//! (`spec.md` §4.5, §5): a pending `PAUSE` blocks until the next interrupt,
//! `STOP` ends playback early, and `RESTART` re-plays from chunk zero
//! without re-verifying the whole-object tag a second time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use drm_common::channel::{Command, CommandChannel};
use drm_common::constants::{AES_BLK_SZ, CHUNK_SZ, FIFO_CAP, FIFO_MARGIN, PREVIEW_SZ};
use drm_common::song::{resolve_chunking, ContainerLayout, SongMetadata};
use drm_common::Secrets;

use crate::crypto::{aes_cbc_decrypt_chunk, strip_pkcs7};
use crate::error::Result;
use crate::hw::Hardware;
use crate::state::{transition, ControllerState};
use crate::verifier::{verify_chunk, verify_whole_object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOutcome {
    /// Bytes actually pushed to the audio FIFO; this is what the handler
    /// writes back into `channel.song.wav_size`.
    pub wav_size: u32,
}

enum PlaytimeSignal {
    Continue,
    Stop,
    Restart,
}

/// Check for (and react to) a pending interrupt at a chunk boundary.
/// Blocks on `PAUSE` until the next interrupt arrives, same as the
/// original firmware's playtime command loop.
fn poll_playtime_commands<H: Hardware>(interrupt: &AtomicBool, channel: &Mutex<CommandChannel>, hw: &mut H, state: &mut ControllerState) -> PlaytimeSignal {
    while interrupt.swap(false, Ordering::AcqRel) {
        let cmd = channel.lock().expect("command channel mutex poisoned").cmd;
        match Command::from_raw(cmd) {
            Some(Command::Pause) => {
                *state = transition(hw, ControllerState::Paused);
                while !interrupt.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
            }
            Some(Command::Play) => {
                *state = transition(hw, ControllerState::Playing);
                return PlaytimeSignal::Continue;
            }
            Some(Command::Stop) => return PlaytimeSignal::Stop,
            Some(Command::Restart) => return PlaytimeSignal::Restart,
            _ => {}
        }
    }
    PlaytimeSignal::Continue
}

/// Stream `container` (the song buffer starting at its metadata block) to
/// `hw`. `locked` selects preview-length output instead of the full song;
/// every chunk's ciphertext is still covered by the whole-object tag
/// checked up front, regardless of how much of it ends up being played.
pub fn play_song<H: Hardware>(
    hw: &mut H,
    secrets: &Secrets,
    container: &[u8],
    md: &SongMetadata,
    locked: bool,
    interrupt: &AtomicBool,
    channel: &Mutex<CommandChannel>,
    state: &mut ControllerState,
) -> Result<PlayOutcome> {
    let md_size = md.md_size();
    let post_md_len = container.len() - md_size;
    let (nchunks, ciphertext_len) = resolve_chunking(post_md_len)?;
    let layout = ContainerLayout::new(md_size, nchunks);

    verify_whole_object(secrets, container, &layout)?;

    let cap = if locked { PREVIEW_SZ } else { usize::MAX };
    let initial_iv: [u8; AES_BLK_SZ] = container[layout.iv_offset()..layout.iv_offset() + AES_BLK_SZ]
        .try_into()
        .expect("iv slice is exactly AES_BLK_SZ bytes");

    'restart: loop {
        *state = transition(hw, ControllerState::Playing);
        let mut streamed = 0usize;
        let mut prev_ciphertext_tail = initial_iv;
        let mut offset_in_ciphertext = 0usize;

        for chunk_index in 0..nchunks {
            if streamed >= cap {
                return Ok(PlayOutcome { wav_size: streamed as u32 });
            }

            match poll_playtime_commands(interrupt, channel, hw, state) {
                PlaytimeSignal::Continue => {}
                PlaytimeSignal::Stop => return Ok(PlayOutcome { wav_size: streamed as u32 }),
                PlaytimeSignal::Restart => continue 'restart,
            }

            let remaining = ciphertext_len - offset_in_ciphertext;
            // Every chunk but the last is exactly CHUNK_SZ bytes of
            // ciphertext; the last one absorbs whatever is left, which can
            // exceed CHUNK_SZ by up to one block once PKCS#7 padding was
            // added at packaging time.
            let this_len = if chunk_index == nchunks - 1 { remaining } else { remaining.min(CHUNK_SZ) };
            let start = layout.ciphertext_offset() + offset_in_ciphertext;
            let chunk_ciphertext = &container[start..start + this_len];

            verify_chunk(secrets, container, &layout, chunk_index, chunk_ciphertext)?;

            let iv = prev_ciphertext_tail;
            let mut plaintext = aes_cbc_decrypt_chunk(&secrets.aes_key, &iv, chunk_ciphertext)?;
            if this_len >= AES_BLK_SZ {
                prev_ciphertext_tail.copy_from_slice(&chunk_ciphertext[this_len - AES_BLK_SZ..]);
            }
            if chunk_index == nchunks - 1 {
                strip_pkcs7(&mut plaintext)?;
            }

            let take = plaintext.len().min(cap - streamed);
            let to_play = &plaintext[..take];

            let half_offset = (chunk_index % 2) * CHUNK_SZ;
            hw.bram_write(half_offset, to_play);
            transfer_from_bram(hw, half_offset, to_play.len());

            streamed += take;
            offset_in_ciphertext += this_len;
        }

        return Ok(PlayOutcome { wav_size: streamed as u32 });
    }
}

/// Push `len` bytes staged at `bram_offset` out over DMA, looping while the
/// FIFO doesn't have room for the whole transfer in one shot. Per
/// `spec.md` §4.5, the next burst only starts once the DMA engine is idle
/// *and* the FIFO fill is below `FIFO_CAP - FIFO_MARGIN`, so the hardware
/// FIFO is never driven right up to its physical cap.
fn transfer_from_bram<H: Hardware>(hw: &mut H, bram_offset: usize, len: usize) {
    let high_water = FIFO_CAP - FIFO_MARGIN;
    let mut sent = 0usize;
    while sent < len {
        while hw.dma_busy() || hw.fifo_fill() >= high_water {
            std::hint::spin_loop();
        }
        let fifo_room = high_water.saturating_sub(hw.fifo_fill()) as usize;
        let n = (len - sent).min(fifo_room.max(1));
        hw.dma_start(bram_offset + sent, n);
        sent += n;
    }
}
