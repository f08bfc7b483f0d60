//! Normalized mouse input.
//!
//! Both USB sources (evdev on the desktop, the USB host driver on the
//! firmware) are reduced to one [`MouseEvent`] shape before reaching the
//! adapter.
//!
//! On the firmware the USB host driver hands boot reports over through
//! [`submit_report`] (or [`submit_boot_bytes`] from its report callback)
//! and the pipeline drains them with [`next_report`].

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::HID_REPORT_QUEUE_LEN;

pub mod mouse;

pub use crate::state::Button;
pub use mouse::MouseReport;

/// Boot reports waiting for the pipeline.
pub type ReportChannel = Channel<CriticalSectionRawMutex, MouseReport, HID_REPORT_QUEUE_LEN>;

/// Reports from the USB host driver. Safe to feed from any task, core or
/// interrupt.
pub static HID_REPORTS: ReportChannel = Channel::new();

/// Queue a report for the pipeline.
///
/// Returns `false` when the queue is full; the report is dropped and the
/// next one carries the current button levels again.
pub fn submit_report(report: &MouseReport) -> bool {
    if HID_REPORTS.try_send(*report).is_err() {
        warn!("HID report queue full, report dropped");
        return false;
    }
    true
}

/// Parse raw boot-protocol bytes and queue them. Short reports are
/// rejected.
pub fn submit_boot_bytes(data: &[u8]) -> bool {
    match MouseReport::from_boot_bytes(data) {
        Some(report) => submit_report(&report),
        None => {
            debug!("Ignoring {}-byte HID report", data.len());
            false
        }
    }
}

/// Next queued report, if any.
pub fn next_report() -> Option<MouseReport> {
    HID_REPORTS.try_receive().ok()
}

/// One batch of mouse input.
///
/// Deltas are relative to the previous event; buttons are the current
/// levels, not edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseEvent {
    pub dx: i32,
    pub dy: i32,
    pub wheel: i32,
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl MouseEvent {
    /// Motion-only event.
    pub const fn motion(dx: i32, dy: i32) -> Self {
        Self {
            dx,
            dy,
            wheel: 0,
            left: false,
            right: false,
            middle: false,
        }
    }

    /// Same event with `button` set to `pressed`.
    pub const fn with_button(mut self, button: Button, pressed: bool) -> Self {
        match button {
            Button::Left => self.left = pressed,
            Button::Right => self.right = pressed,
            Button::Middle => self.middle = pressed,
        }
        self
    }

    /// Level of `button` in this event.
    pub const fn button(&self, button: Button) -> bool {
        match button {
            Button::Left => self.left,
            Button::Right => self.right,
            Button::Middle => self.middle,
        }
    }
}
