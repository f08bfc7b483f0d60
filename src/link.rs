//! Platform seams: the serial link to the host and the settings store.
//!
//! The core never touches hardware directly. The desktop adapter backs
//! [`SerialLink`] with a tty and the firmware backs it with the RP2040
//! UART, a CTS GPIO and the inter-core byte queue.

use crate::config::{HANDSHAKE_ERROR_LOG_EVERY, SETTINGS_BLOCK_SIZE};
use crate::error::StorageError;

/// Modem control outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlLine {
    Rts,
    Dtr,
}

/// Byte-level access to the legacy serial link.
///
/// Writes and reads report how many bytes were transferred; a short count
/// is not an error for the core.
pub trait SerialLink {
    /// Write raw bytes.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Read whatever is available without blocking.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize;

    /// `true` while the host holds the handshake line in its "driver
    /// initializing" level.
    fn handshake_asserted(&mut self) -> bool;

    /// Drive a modem control output.
    fn set_control_line(&mut self, line: ControlLine, level: bool);

    /// Wait until everything written so far has left for the wire.
    ///
    /// Links that write synchronously need not override this.
    fn flush(&mut self) {}

    /// Write console text, expanding `\n` to `\r\n`.
    ///
    /// Returns the number of input bytes consumed.
    fn write_terminal(&mut self, bytes: &[u8]) -> usize {
        let mut consumed = 0;
        for (i, chunk) in bytes.split(|&b| b == b'\n').enumerate() {
            if i > 0 {
                if self.write(b"\r\n") < 2 {
                    return consumed;
                }
                consumed += 1;
            }
            let n = self.write(chunk);
            consumed += n;
            if n < chunk.len() {
                return consumed;
            }
        }
        consumed
    }
}

/// Last good handshake level, held across failed reads of the modem
/// lines.
///
/// A failed read must not look like a released line, or negotiation would
/// move on and resend the ident.
#[derive(Debug, Clone, Default)]
pub struct HandshakeLatch {
    level: bool,
    failures: u32,
}

impl HandshakeLatch {
    pub const fn new() -> Self {
        Self {
            level: false,
            failures: 0,
        }
    }

    /// Feed one sample, `None` for a failed read. Returns the level to
    /// act on.
    pub fn update(&mut self, sample: Option<bool>) -> bool {
        match sample {
            Some(level) => {
                if self.failures > 0 {
                    info!("Handshake line readable again after {} failed reads", self.failures);
                }
                self.failures = 0;
                self.level = level;
            }
            None => self.failures = self.failures.saturating_add(1),
        }
        self.level
    }

    /// Whether the current failure should be logged: the first one and
    /// then every [`HANDSHAKE_ERROR_LOG_EVERY`] after it.
    pub fn should_log(&self) -> bool {
        self.failures % HANDSHAKE_ERROR_LOG_EVERY == 1
    }

    /// Consecutive failed reads.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Raw block storage for the settings record.
pub trait SettingsStore {
    /// Read the settings block. `None` when it cannot be read.
    fn read_block(&mut self) -> Option<[u8; SETTINGS_BLOCK_SIZE]>;

    /// Replace the settings block. Erasing first is the store's job.
    fn write_block(&mut self, block: &[u8]) -> Result<(), StorageError>;
}

/// Write as much of `bytes` as the writer takes and return the count.
///
/// Stops at the first error or zero-length write, so a partial transfer
/// still reports the bytes that went out.
#[cfg(any(test, feature = "std"))]
pub fn write_counted<W: std::io::Write + ?Sized>(w: &mut W, bytes: &[u8]) -> usize {
    let mut written = 0;
    while written < bytes.len() {
        match w.write(&bytes[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("Serial write failed after {} of {} bytes: {}", written, bytes.len(), e);
                break;
            }
        }
    }
    written
}

impl<T: SerialLink + ?Sized> SerialLink for &mut T {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_nonblocking(buf)
    }

    fn handshake_asserted(&mut self) -> bool {
        (**self).handshake_asserted()
    }

    fn set_control_line(&mut self, line: ControlLine, level: bool) {
        (**self).set_control_line(line, level)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn write_terminal(&mut self, bytes: &[u8]) -> usize {
        (**self).write_terminal(bytes)
    }
}
