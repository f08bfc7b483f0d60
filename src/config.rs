//! Application-wide constants and compile-time configuration.
//!
//! Link timing, storage geometry and pin assignments live here so they
//! can be tuned in one place.

// Legacy serial link

/// Legacy mouse line rate. Every supported protocol runs at 1200 baud.
pub const SERIAL_BAUD: u32 = 1200;

/// Data bits per character (7N1 framing).
pub const SERIAL_DATA_BITS: u8 = 7;

/// Stop bits per character.
pub const SERIAL_STOP_BITS: u8 = 1;

/// Time the link needs to shift out one 7N1 character at 1200 baud (µs).
pub const BYTE_INTERVAL_US: u64 = 7_500;

/// Minimum spacing after a 3-byte report (µs).
pub const REPORT3_INTERVAL_US: u64 = 22_700;

/// Minimum spacing after a 4-byte report (µs).
pub const REPORT4_INTERVAL_US: u64 = 30_000;

// Aggregation limits

/// Accumulated X/Y range. Wide enough to survive the sensitivity multiply
/// before the final ±127 clamp.
pub const MOTION_ACCUM_LIMIT: i32 = 36_862;

/// Accumulated wheel range before encoding.
pub const WHEEL_ACCUM_LIMIT: i32 = 63;

/// Per-report X/Y range on the wire.
pub const MOTION_REPORT_LIMIT: i32 = 127;

/// Per-report wheel range on the wire.
pub const WHEEL_REPORT_LIMIT: i32 = 15;

// Sensitivity

/// Sensitivity step, also the storage quantum.
pub const SENSITIVITY_STEP: f32 = 0.2;

/// Lowest accepted sensitivity.
pub const SENSITIVITY_MIN: f32 = 0.2;

/// Highest accepted sensitivity.
pub const SENSITIVITY_MAX: f32 = 3.0;

/// Console sensitivity range, in tenths.
pub const SENSITIVITY_TENTHS_MIN: u32 = 2;
pub const SENSITIVITY_TENTHS_MAX: u32 = 30;

// Console

/// How often the idle serial receive path is checked for a console request (µs).
pub const CONSOLE_POLL_INTERVAL_US: u64 = 1_000_000;

/// Console line buffer length.
pub const CONSOLE_LINE_LEN: usize = 256;

/// Desktop control loop yield between iterations (µs).
pub const LOOP_YIELD_US: u64 = 1_000;

/// While the modem lines cannot be read, log one failure in this many
/// (about once a second at the desktop loop rate).
pub const HANDSHAKE_ERROR_LOG_EVERY: u32 = 1_000;

// Settings storage

/// Size of the block the settings record is written into.
/// One RP2040 flash page; the record occupies the first 8 bytes.
pub const SETTINGS_BLOCK_SIZE: usize = 256;

/// Flash region reserved for settings at the end of flash: one RP2040
/// erase sector, matching the hole left in `memory.x`.
pub const FLASH_SECTOR_SIZE: usize = 4096;

/// Total on-board flash (Raspberry Pi Pico).
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Default settings file name, resolved against the home directory.
pub const SETTINGS_FILE_NAME: &str = ".usb2serial.conf";

// Firmware

/// Capacity of the byte queue between the pipeline core and the UART core.
pub const TX_QUEUE_LEN: usize = 64;

/// Depth of the boot-report channel fed by the USB host driver.
pub const HID_REPORT_QUEUE_LEN: usize = 8;

// GPIO pin assignments (Raspberry Pi Pico defaults)
//
// These are logical names; the concrete `embassy_rp::peripherals::*`
// types are selected in `bin/firmware.rs`. Adjust for a custom board.
//
//   UART0 TX  → GP0  (to MAX3232 T1IN)
//   UART0 RX  → GP1  (from MAX3232 R1OUT)
//   CTS in    → GP2  (from MAX3232 R2OUT, host RTS)
//   Status LED→ GP25
