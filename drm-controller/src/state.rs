//! Visible controller state (`spec.md` §4.7): `STOPPED` between commands,
//! `WORKING` while a command handler runs, `PLAYING`/`PAUSED` only during
//! an in-flight `play_song`. Each transition is mirrored onto the LED.

use crate::hw::{Hardware, LedColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Working,
    Playing,
    Paused,
}

impl ControllerState {
    fn led_color(self) -> LedColor {
        match self {
            ControllerState::Stopped => LedColor::Red,
            ControllerState::Working => LedColor::Yellow,
            ControllerState::Playing => LedColor::Green,
            ControllerState::Paused => LedColor::Blue,
        }
    }
}

/// Move to `next`, updating the LED to match. Kept as a free function
/// (rather than a method that also stores `self`) since the controller
/// holds the current state itself and just needs the LED side effect.
pub fn transition<H: Hardware>(hw: &mut H, next: ControllerState) -> ControllerState {
    hw.led_set(next.led_color());
    next
}
