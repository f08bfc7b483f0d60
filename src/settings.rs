//! Persisted settings record.
//!
//! Layout (8 bytes, at the start of a [`SETTINGS_BLOCK_SIZE`] block):
//! ```text
//! Byte 0-1: Canary 0x4D 0x6F
//! Byte 2:   Version (0x00)
//! Byte 3:   Options
//!           Bit 0-1 = protocol id
//!           Bit 2-5 = sensitivity in 0.2 steps (1..=15)
//!           Bit 6   = wheel enabled
//!           Bit 7   = swap buttons
//! Byte 4:   Reserved (0x00)
//! Byte 5-6: Canary 0x75 0x53
//! Byte 7:   CRC-8 over bytes 0-6
//! ```
//!
//! The CRC is checked before anything else so erased or random storage
//! is rejected without looking at the fields.

use crc::{Algorithm, Crc};

use crate::config::{SENSITIVITY_STEP, SETTINGS_BLOCK_SIZE};
use crate::error::{DecodeError, Error, StorageError};
use crate::link::SettingsStore;
use crate::protocol::Protocol;
use crate::sensitivity;
use crate::state::MouseOptions;

/// Meaningful bytes of the record.
pub const RECORD_LEN: usize = 8;

/// Record format version.
pub const SETTINGS_VERSION: u8 = 0x00;

const CANARY_HEAD: [u8; 2] = [0x4D, 0x6F];
const CANARY_TAIL: [u8; 2] = [0x75, 0x53];

const PROTOCOL_MASK: u8 = 0x03;
const SENSITIVITY_SHIFT: u8 = 2;
const SENSITIVITY_MASK: u8 = 0x0F;
const WHEEL_BIT: u8 = 1 << 6;
const SWAP_BIT: u8 = 1 << 7;

/// CRC-8, polynomial 0x97, MSB first, init 0, no final XOR.
/// Matches records written by deployed adapters.
pub const CRC_8_SETTINGS: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x97,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0x94,
    residue: 0x00,
};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SETTINGS);

/// CRC-8 over `data`.
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// Sensitivity as stored: 0.2 steps, 1..=15.
fn quantize_sensitivity(s: f32) -> u8 {
    let q = (sensitivity::clamp_sensitivity(s) / SENSITIVITY_STEP + 0.5) as u8;
    q.clamp(1, 15)
}

/// Encode options into the 8-byte record.
pub fn encode(options: &MouseOptions) -> [u8; RECORD_LEN] {
    let mut opts = options.protocol.id() & PROTOCOL_MASK;
    opts |= quantize_sensitivity(options.sensitivity) << SENSITIVITY_SHIFT;
    if options.wheel {
        opts |= WHEEL_BIT;
    }
    if options.swap_buttons {
        opts |= SWAP_BIT;
    }

    let mut record = [
        CANARY_HEAD[0],
        CANARY_HEAD[1],
        SETTINGS_VERSION,
        opts,
        0x00,
        CANARY_TAIL[0],
        CANARY_TAIL[1],
        0x00,
    ];
    record[7] = crc8(&record[..7]);
    record
}

/// Decode a record. Only the first [`RECORD_LEN`] bytes are examined.
pub fn decode(bytes: &[u8]) -> Result<MouseOptions, DecodeError> {
    if bytes.len() < RECORD_LEN {
        return Err(DecodeError::Format);
    }
    if crc8(&bytes[..7]) != bytes[7] {
        return Err(DecodeError::Crc);
    }
    if bytes[0..2] != CANARY_HEAD || bytes[5..7] != CANARY_TAIL || bytes[2] != SETTINGS_VERSION {
        return Err(DecodeError::Format);
    }

    let opts = bytes[3];
    let quantum = (opts >> SENSITIVITY_SHIFT) & SENSITIVITY_MASK;
    let protocol = match Protocol::from_id(opts & PROTOCOL_MASK) {
        Some(p) => p,
        None => return Err(DecodeError::Format),
    };

    Ok(MouseOptions {
        protocol,
        sensitivity: sensitivity::from_tenths(u32::from(quantum) * 2),
        wheel: opts & WHEEL_BIT != 0,
        swap_buttons: opts & SWAP_BIT != 0,
    })
}

/// Encode into a storage block, zero padded. Returns the bytes used.
pub fn encode_block(options: &MouseOptions, block: &mut [u8]) -> Result<usize, Error> {
    if block.len() < RECORD_LEN {
        return Err(Error::BufferOverflow);
    }
    block.fill(0);
    block[..RECORD_LEN].copy_from_slice(&encode(options));
    Ok(RECORD_LEN)
}

/// Read and decode the stored settings.
pub fn load<S: SettingsStore + ?Sized>(store: &mut S) -> Result<MouseOptions, Error> {
    let block = store.read_block().ok_or(StorageError::Read)?;
    Ok(decode(&block)?)
}

/// Stored settings, or defaults when storage is empty or corrupt.
///
/// Storage is not rewritten here; defaults only persist on an explicit save.
/// A stored protocol without a wire layout is replaced by the default.
pub fn load_or_default<S: SettingsStore + ?Sized>(store: &mut S) -> MouseOptions {
    match load(store) {
        Ok(mut options) => {
            if !options.protocol.is_implemented() {
                warn!("Stored protocol {:?} unsupported, using default", options.protocol);
                options.protocol = Protocol::default();
            }
            info!(
                "Settings loaded: protocol {:?}, sensitivity {} tenths",
                options.protocol,
                options.sensitivity_tenths()
            );
            options
        }
        Err(e) => {
            warn!("No valid settings ({:?}), using defaults", e);
            MouseOptions::default()
        }
    }
}

/// Persist `options`.
pub fn save<S: SettingsStore + ?Sized>(store: &mut S, options: &MouseOptions) -> Result<(), Error> {
    let mut block = [0u8; SETTINGS_BLOCK_SIZE];
    encode_block(options, &mut block)?;
    store.write_block(&block).map_err(|e| {
        error!("Settings save failed: {:?}", e);
        Error::from(e)
    })?;
    info!("Settings saved");
    Ok(())
}
