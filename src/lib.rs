//! Core library for usb2serial.
//!
//! Turns USB mouse input into a legacy RS-232 serial mouse: coalesces
//! input, negotiates with the host driver over the handshake line, paces
//! reports to the 1200-baud link and persists the user's settings.
//!
//! Everything here is host-testable. Hardware lives behind the traits in
//! [`link`]; the desktop adapter (`src/main.rs`) and the RP2040 firmware
//! (`src/bin/firmware.rs`) provide the implementations.
//!
//! Usage: `cargo test` for the core, `cargo build --features desktop`
//! or `cargo build --release --features embedded --target thumbv6m-none-eabi`
//! for the adapters.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

// This must go first so the log macros are visible everywhere.
#[macro_use]
mod fmt;

pub mod adapter;
pub mod config;
pub mod console;
pub mod encoder;
pub mod error;
pub mod hid;
pub mod link;
pub mod negotiation;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod sensitivity;
pub mod settings;
pub mod state;
pub mod storage;

pub use adapter::Adapter;
pub use encoder::{try_encode, Packet};
pub use error::{DecodeError, Error, StorageError};
pub use hid::{MouseEvent, MouseReport};
pub use link::{ControlLine, SerialLink, SettingsStore};
pub use negotiation::HandshakeState;
pub use protocol::{Protocol, ProtocolDescriptor};
pub use state::{Button, MouseOptions, MouseState};

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
