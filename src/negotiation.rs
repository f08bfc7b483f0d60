//! Host driver negotiation.
//!
//! A serial mouse driver announces itself by pulsing the handshake line:
//! it holds the line while initializing, then releases it and waits for
//! the identification bytes. The adapter tracks that sequence:
//!
//! ```text
//!            asserted               released
//!  Uninit ────────────▶ LowInit ───────────────▶ Toggled ◀──┐
//!                                 (send ident)     │        │ released
//!                                         asserted │        │ (send ident)
//!                                                  ▼        │
//!                                                LowRun ────┘
//! ```
//!
//! Reports may flow once the state is past `LowInit`. A later drop of the
//! line does not block them again.

use crate::link::SerialLink;
use crate::protocol::Protocol;

/// Negotiation progress, ordered by how far the host has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeState {
    /// Nothing seen yet.
    #[default]
    Uninit,
    /// Host is holding the line, driver initializing.
    LowInit,
    /// Host released the line, ident sent.
    Toggled,
    /// Host asserted the line again after init. Treated as running.
    LowRun,
}

impl HandshakeState {
    /// Whether reports may be sent in this state.
    pub fn transmit_enabled(self) -> bool {
        self > HandshakeState::LowInit
    }
}

/// Result of writing the identification sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentOutcome {
    /// Every ident byte was written.
    Complete,
    /// The host reasserted the line after `sent` bytes.
    Aborted { sent: usize },
}

/// Evaluate one handshake sample.
///
/// Returns the new state when a transition happened. Releasing the line
/// from `LowInit` or `LowRun` sends the ident for `protocol`.
pub fn step<L: SerialLink + ?Sized>(
    state: &mut HandshakeState,
    protocol: Protocol,
    link: &mut L,
) -> Option<HandshakeState> {
    let asserted = link.handshake_asserted();
    let next = next_state(*state, asserted)?;

    if next == HandshakeState::Toggled {
        match send_ident(link, protocol) {
            IdentOutcome::Complete => info!("Host ready, identified as {:?}", protocol),
            IdentOutcome::Aborted { sent } => {
                warn!("Ident aborted after {} bytes, host restarted", sent)
            }
        }
    } else {
        debug!("Handshake {:?} -> {:?}", *state, next);
    }

    *state = next;
    Some(next)
}

/// Pure transition table.
pub fn next_state(state: HandshakeState, asserted: bool) -> Option<HandshakeState> {
    use HandshakeState::*;
    match (state, asserted) {
        (Uninit, true) => Some(LowInit),
        (Toggled, true) => Some(LowRun),
        (LowInit | LowRun, false) => Some(Toggled),
        _ => None,
    }
}

/// Write the ident byte by byte, giving up if the host reasserts the
/// handshake line before the sequence is complete.
///
/// Each byte is flushed before the line is sampled again, so the check
/// happens at wire time even on queued links.
pub fn send_ident<L: SerialLink + ?Sized>(link: &mut L, protocol: Protocol) -> IdentOutcome {
    let ident = protocol.descriptor().ident;
    if ident.is_empty() {
        warn!("{:?} has no ident sequence", protocol);
    }
    for (sent, byte) in ident.iter().enumerate() {
        if link.handshake_asserted() {
            return IdentOutcome::Aborted { sent };
        }
        link.write(core::slice::from_ref(byte));
        link.flush();
    }
    IdentOutcome::Complete
}

/// Identify without waiting for the host, for hosts whose driver is
/// already loaded.
pub fn identify_now<L: SerialLink + ?Sized>(
    state: &mut HandshakeState,
    protocol: Protocol,
    link: &mut L,
) {
    link.write(protocol.descriptor().ident);
    *state = HandshakeState::Toggled;
    info!("Identified as {:?} without handshake", protocol);
}
