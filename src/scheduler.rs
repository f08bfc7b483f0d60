//! Transmit scheduler.
//!
//! At 1200 baud a 7N1 character takes 7.5 ms, so the host can take at most
//! one report every 22.7 ms (3 bytes) or 30 ms (4 bytes). Input arriving
//! faster than that is coalesced in [`MouseState`] until the deadline
//! passes. Button edges skip the wait.

use crate::config::{BYTE_INTERVAL_US, REPORT3_INTERVAL_US, REPORT4_INTERVAL_US};
use crate::encoder::{self, Packet};
use crate::link::SerialLink;
use crate::state::{MouseOptions, MouseState};

/// Time needed on the wire for a report of `len` bytes (µs).
pub const fn interval_for(len: usize) -> u64 {
    match len {
        0..=2 => BYTE_INTERVAL_US * len as u64,
        3 => REPORT3_INTERVAL_US,
        _ => REPORT4_INTERVAL_US,
    }
}

/// Rate limiter for outgoing reports. Times are microseconds on any
/// monotonic clock.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    next_tx_us: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self { next_tx_us: 0 }
    }

    /// Earliest time the next unforced report may go out.
    pub fn deadline(&self) -> u64 {
        self.next_tx_us
    }

    /// Whether a report should be attempted at `now_us`.
    pub fn due(&self, now_us: u64, state: &MouseState) -> bool {
        state.force_update || (now_us >= self.next_tx_us && state.pending_len.is_some())
    }

    /// Run one scheduling decision.
    ///
    /// When a report is due and the encoder produces one, it is written to
    /// `link`, the deadline moves forward by its wire time and `state` is
    /// reset. Returns the packet that was sent.
    pub fn poll<L: SerialLink + ?Sized>(
        &mut self,
        now_us: u64,
        state: &mut MouseState,
        options: &MouseOptions,
        link: &mut L,
    ) -> Option<Packet> {
        if !self.due(now_us, state) {
            return None;
        }
        let packet = encoder::try_encode(state, options)?;

        let written = link.write(packet.as_bytes());
        if written < packet.len() {
            debug!("Short write: {} of {} bytes", written, packet.len());
        }
        trace!("TX {:?}", packet.as_bytes());

        self.next_tx_us = now_us.saturating_add(interval_for(packet.len()));
        state.reset();
        Some(packet)
    }
}
