//! Shared mouse state and the event aggregator.
//!
//! [`MouseState`] collects USB input between two transmissions. Motion and
//! wheel deltas accumulate with saturating clamps; button levels are kept
//! as-is and survive a transmit reset.
//!
//! `pending_len` records how many bytes the next report must carry. It only
//! grows inside a coalescing window so a late full-packet request (middle
//! button, wheel) is never downgraded to a short report.

use crate::config::{MOTION_ACCUM_LIMIT, WHEEL_ACCUM_LIMIT};
use crate::negotiation::HandshakeState;
use crate::protocol::Protocol;

/// Shortest report any implemented protocol sends.
pub const MIN_REPORT_LEN: usize = 3;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Left,
    Right,
    Middle,
}

/// User-selectable adapter options. Persisted by the settings codec.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseOptions {
    /// Protocol announced to the host.
    pub protocol: Protocol,
    /// Motion multiplier, 0.2..=3.0 in 0.2 steps.
    pub sensitivity: f32,
    /// Report the wheel and middle button (wheel protocol only).
    pub wheel: bool,
    /// Swap left and right buttons on the wire.
    pub swap_buttons: bool,
}

impl Default for MouseOptions {
    fn default() -> Self {
        Self {
            protocol: Protocol::MsWheel,
            sensitivity: 1.0,
            wheel: true,
            swap_buttons: false,
        }
    }
}

impl MouseOptions {
    /// Protocol the adapter actually speaks.
    ///
    /// The wheel protocol with the wheel turned off degrades to the plain
    /// two-button protocol.
    pub fn effective_protocol(&self) -> Protocol {
        match self.protocol {
            Protocol::MsWheel if !self.wheel => Protocol::MsTwoButton,
            p => p,
        }
    }

    /// Sensitivity in tenths, as shown on the console.
    pub fn sensitivity_tenths(&self) -> u32 {
        crate::sensitivity::to_tenths(self.sensitivity)
    }
}

/// Aggregated input waiting for the next transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseState {
    /// Host driver negotiation progress.
    pub handshake: HandshakeState,
    /// Accumulated X motion, ±[`MOTION_ACCUM_LIMIT`].
    pub x: i32,
    /// Accumulated Y motion, ±[`MOTION_ACCUM_LIMIT`].
    pub y: i32,
    /// Accumulated wheel motion, ±[`WHEEL_ACCUM_LIMIT`].
    pub wheel: i32,
    pub left: bool,
    pub right: bool,
    pub middle: bool,
    /// Bytes the next report must carry, `None` when nothing is pending.
    pub pending_len: Option<usize>,
    /// Send on the next cycle regardless of the rate limit.
    pub force_update: bool,
}

impl MouseState {
    /// Fresh state: nothing pending, no buttons held, handshake not seen.
    pub const fn new() -> Self {
        Self {
            handshake: HandshakeState::Uninit,
            x: 0,
            y: 0,
            wheel: 0,
            left: false,
            right: false,
            middle: false,
            pending_len: None,
            force_update: false,
        }
    }

    /// Raise the pending length to at least `len`.
    pub fn request(&mut self, len: usize) {
        self.pending_len = self.pending_len.max(Some(len));
    }

    /// Length a motion or left/right edge needs under `protocol`.
    ///
    /// While the middle button is held on a three-button protocol the full
    /// report is needed so the held state keeps being reported.
    fn base_len(&self, protocol: Protocol) -> usize {
        let desc = protocol.descriptor();
        if self.middle && desc.buttons >= 3 {
            desc.report_len.max(MIN_REPORT_LEN)
        } else {
            MIN_REPORT_LEN
        }
    }

    /// Accumulate relative motion.
    pub fn record_motion(&mut self, dx: i32, dy: i32, protocol: Protocol) {
        self.x = clamp(self.x.saturating_add(dx), -MOTION_ACCUM_LIMIT, MOTION_ACCUM_LIMIT);
        self.y = clamp(self.y.saturating_add(dy), -MOTION_ACCUM_LIMIT, MOTION_ACCUM_LIMIT);
        self.request(self.base_len(protocol));
    }

    /// Accumulate wheel motion. Only wheel protocols request a report for it.
    pub fn record_wheel(&mut self, dw: i32, protocol: Protocol) {
        self.wheel = clamp(self.wheel.saturating_add(dw), -WHEEL_ACCUM_LIMIT, WHEEL_ACCUM_LIMIT);
        let desc = protocol.descriptor();
        if desc.wheel {
            self.request(desc.report_len);
        }
    }

    /// Record a button level change and force the next report out.
    ///
    /// Middle button changes are ignored on protocols that cannot report it.
    pub fn record_button(&mut self, button: Button, pressed: bool, protocol: Protocol) {
        let desc = protocol.descriptor();
        match button {
            Button::Left => self.left = pressed,
            Button::Right => self.right = pressed,
            Button::Middle => {
                if desc.buttons < 3 {
                    return;
                }
                self.middle = pressed;
                self.force_update = true;
                self.request(desc.report_len);
                return;
            }
        }
        self.force_update = true;
        self.request(self.base_len(protocol));
    }

    /// Level of `button`.
    pub fn button(&self, button: Button) -> bool {
        match button {
            Button::Left => self.left,
            Button::Right => self.right,
            Button::Middle => self.middle,
        }
    }

    /// Clear everything a transmission consumed. Button levels and the
    /// handshake state are kept.
    pub fn reset(&mut self) {
        self.pending_len = None;
        self.force_update = false;
        self.x = 0;
        self.y = 0;
        self.wheel = 0;
    }
}

/// Clamp `v` into `[lo, hi]`.
pub fn clamp(v: i32, lo: i32, hi: i32) -> i32 {
    v.max(lo).min(hi)
}
