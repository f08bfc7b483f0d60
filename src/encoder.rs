//! Legacy serial mouse packet encoder.
//!
//! All implemented protocols share the Microsoft 7-bit layout:
//!
//! ```text
//!          bit 6  5    4    3    2    1    0
//! Byte 0:      1  LMB  RMB  Y7   Y6   X7   X6
//! Byte 1:      0  X5   X4   X3   X2   X1   X0
//! Byte 2:      0  Y5   Y4   Y3   Y2   Y1   Y0
//! Byte 3:      0  0    MMB  W3   W2   W1   W0   (wheel protocol)
//! Byte 3:      0  MMB  0    0    0    0    0    (Logitech)
//! ```
//!
//! The wheel nibble is `(-wheel) & 0x0F`, so one notch down is `0x01`
//! and one notch up is `0x0F`.

use crate::config::{MOTION_REPORT_LIMIT, WHEEL_REPORT_LIMIT};
use crate::protocol::Protocol;
use crate::sensitivity;
use crate::state::{clamp, MouseOptions, MouseState, MIN_REPORT_LEN};

/// Packet template. Byte 0 carries the sync bit.
pub const PACKET_TEMPLATE: [u8; 4] = [0x40, 0x00, 0x00, 0x00];

/// Bit positions in byte 0.
const LMB_BIT: u8 = 5;
const RMB_BIT: u8 = 4;

/// Middle button bit in byte 3 of the wheel protocol.
const WHEEL_MMB_BIT: u8 = 4;

/// Byte 3 of a Logitech report while the middle button is held.
const LOGITECH_MMB: u8 = 0x20;

/// One encoded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    bytes: [u8; 4],
    len: usize,
}

impl Packet {
    /// Bytes to put on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Render the pending state as a report for the active protocol.
///
/// Returns `None` when nothing worth a full report is pending and no
/// button edge forces one out, or when the protocol has no wire layout.
/// The state is not modified; the caller resets it after a successful
/// transmit.
pub fn try_encode(state: &MouseState, options: &MouseOptions) -> Option<Packet> {
    let protocol = options.effective_protocol();
    let desc = protocol.descriptor();
    if !desc.implemented {
        return None;
    }

    let pending = match state.pending_len {
        Some(len) if len >= MIN_REPORT_LEN => Some(len),
        _ => None,
    };
    if pending.is_none() && !state.force_update {
        return None;
    }
    let len = pending
        .unwrap_or(MIN_REPORT_LEN)
        .clamp(MIN_REPORT_LEN, desc.report_len.max(MIN_REPORT_LEN));

    let (x, y) = sensitivity::scale(state.x, state.y, options.sensitivity);
    let x = clamp(x, -MOTION_REPORT_LIMIT, MOTION_REPORT_LIMIT);
    let y = clamp(y, -MOTION_REPORT_LIMIT, MOTION_REPORT_LIMIT);

    let (left, right) = if options.swap_buttons {
        (state.right, state.left)
    } else {
        (state.left, state.right)
    };

    let mut bytes = PACKET_TEMPLATE;
    bytes[0] |= (left as u8) << LMB_BIT;
    bytes[0] |= (right as u8) << RMB_BIT;
    bytes[0] |= ((x & 0xC0) >> 6) as u8;
    bytes[0] |= ((y & 0xC0) >> 4) as u8;
    bytes[1] |= (x & 0x3F) as u8;
    bytes[2] |= (y & 0x3F) as u8;

    let middle = state.middle && desc.buttons >= 3;
    bytes[3] = match protocol {
        Protocol::MsWheel => {
            let wheel = clamp(state.wheel, -WHEEL_REPORT_LIMIT, WHEEL_REPORT_LIMIT);
            ((middle as u8) << WHEEL_MMB_BIT) | wheel_nibble(wheel)
        }
        Protocol::Logitech if middle => LOGITECH_MMB,
        _ => 0,
    };

    Some(Packet { bytes, len })
}

/// Wheel delta as sent in the low nibble of byte 3.
pub fn wheel_nibble(wheel: i32) -> u8 {
    (wheel.wrapping_neg() & 0x0F) as u8
}
