//! USB HID boot-protocol mouse report.
//!
//! Layout (3 or 4 bytes):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left, Bit 1 = Right, Bit 2 = Middle
//! Byte 1: X displacement (signed, -127..127)
//! Byte 2: Y displacement (signed, -127..127)
//! Byte 3: Scroll wheel  (signed, -127..127, optional)
//! ```
//!
//! USB wheel deltas are positive when scrolling up (away from the user).

use super::MouseEvent;

/// Shortest boot report we accept.
pub const MOUSE_REPORT_MIN_SIZE: usize = 3;

const BUTTON_LEFT: u8 = 1 << 0;
const BUTTON_RIGHT: u8 = 1 << 1;
const BUTTON_MIDDLE: u8 = 1 << 2;

/// Standard USB HID boot-protocol mouse report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield (bit 0 = left, bit 1 = right, bit 2 = middle).
    pub buttons: u8,
    /// Relative X movement (signed).
    pub x: i8,
    /// Relative Y movement (signed).
    pub y: i8,
    /// Scroll wheel delta (signed).
    pub wheel: i8,
}

impl MouseReport {
    /// Parse raw report bytes from the USB host driver.
    ///
    /// Accepts 3-byte (no wheel) or longer (with wheel) reports.
    pub fn from_boot_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < MOUSE_REPORT_MIN_SIZE {
            return None;
        }
        Some(Self {
            buttons: data[0],
            x: data[1] as i8,
            y: data[2] as i8,
            wheel: if data.len() >= 4 { data[3] as i8 } else { 0 },
        })
    }

    /// Level-based event for the adapter.
    pub fn to_event(&self) -> MouseEvent {
        MouseEvent {
            dx: i32::from(self.x),
            dy: i32::from(self.y),
            wheel: i32::from(self.wheel),
            left: self.buttons & BUTTON_LEFT != 0,
            right: self.buttons & BUTTON_RIGHT != 0,
            middle: self.buttons & BUTTON_MIDDLE != 0,
        }
    }

    /// Returns `true` when no buttons are pressed and there is no movement.
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0 && self.wheel == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_four_byte_report() {
        let r = MouseReport::from_boot_bytes(&[0x05, 0x0A, 0xF6, 0xFF]).unwrap();
        assert_eq!(r.buttons, 0x05);
        assert_eq!((r.x, r.y, r.wheel), (10, -10, -1));

        let e = r.to_event();
        assert!(e.left && !e.right && e.middle);
        assert_eq!((e.dx, e.dy, e.wheel), (10, -10, -1));
    }

    #[test]
    fn parse_three_byte_report() {
        let r = MouseReport::from_boot_bytes(&[0x02, 0x00, 0x00]).unwrap();
        assert_eq!(r.wheel, 0);
        assert!(r.to_event().right);
    }

    #[test]
    fn short_report_rejected() {
        assert_eq!(MouseReport::from_boot_bytes(&[0x01, 0x02]), None);
        assert_eq!(MouseReport::from_boot_bytes(&[]), None);
    }

    #[test]
    fn idle_report() {
        assert!(MouseReport::default().is_idle());
        assert!(!MouseReport::from_boot_bytes(&[0, 1, 0]).unwrap().is_idle());
    }
}
