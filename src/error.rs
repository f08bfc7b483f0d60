//! Unified error types for usb2serial.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use thiserror::Error;

/// Why a stored settings record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Checksum over the first seven bytes does not match.
    #[error("settings checksum mismatch")]
    Crc,
    /// Checksum matches but canaries or version are wrong.
    #[error("settings record has bad canary or version")]
    Format,
}

/// Failures reported by a settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Reading the block failed.
    #[error("storage read failed")]
    Read,
    /// Programming the block failed.
    #[error("storage write failed")]
    Write,
    /// Erasing the sector failed.
    #[error("storage erase failed")]
    Erase,
    /// The block does not fit the reserved region.
    #[error("storage access out of bounds")]
    OutOfBounds,
}

/// Top-level error type used across the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Stored settings could not be decoded.
    #[error("settings: {0}")]
    Settings(#[from] DecodeError),

    /// Settings store failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Buffer too small for the requested operation.
    #[error("buffer overflow")]
    BufferOverflow,
}
