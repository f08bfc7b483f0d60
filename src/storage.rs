//! Persistent storage for the settings block.
//!
//! Firmware keeps the block at the start of the last flash sector, which
//! the linker script leaves out of the program image. The desktop adapter
//! keeps it in a small file.
//!
//! Storage layout (flash):
//!   - The last [`FLASH_SECTOR_SIZE`] bytes are reserved for settings.
//!   - The first [`SETTINGS_BLOCK_SIZE`] bytes hold the record, padded
//!     with zeros. The rest of the sector stays erased.

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

use crate::config::{FLASH_SECTOR_SIZE, SETTINGS_BLOCK_SIZE};
use crate::error::StorageError;
use crate::link::SettingsStore;

/// Settings store on a NOR flash device.
///
/// The flash driver must keep the other core off the flash bus while a
/// sector is erased or programmed.
pub struct FlashSettingsStore<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> FlashSettingsStore<F> {
    /// Use the last [`FLASH_SECTOR_SIZE`] bytes of `flash`.
    ///
    /// The region must be a whole number of erase blocks.
    pub fn new(flash: F) -> Result<Self, StorageError> {
        let capacity = flash.capacity();
        if capacity < FLASH_SECTOR_SIZE || FLASH_SECTOR_SIZE % F::ERASE_SIZE != 0 {
            return Err(StorageError::OutOfBounds);
        }
        let offset =
            u32::try_from(capacity - FLASH_SECTOR_SIZE).map_err(|_| StorageError::OutOfBounds)?;
        Ok(Self { flash, offset })
    }

    /// Flash offset of the settings sector.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: NorFlash> SettingsStore for FlashSettingsStore<F> {
    fn read_block(&mut self) -> Option<[u8; SETTINGS_BLOCK_SIZE]> {
        let mut block = [0u8; SETTINGS_BLOCK_SIZE];
        match self.flash.read(self.offset, &mut block) {
            Ok(()) => Some(block),
            Err(_) => {
                error!("Flash read failed at {}", self.offset);
                None
            }
        }
    }

    fn write_block(&mut self, block: &[u8]) -> Result<(), StorageError> {
        if block.len() > SETTINGS_BLOCK_SIZE || block.len() % F::WRITE_SIZE != 0 {
            return Err(StorageError::OutOfBounds);
        }
        let end = self.offset + FLASH_SECTOR_SIZE as u32;

        self.flash.erase(self.offset, end).map_err(|_| {
            error!("Flash erase failed at {}", self.offset);
            StorageError::Erase
        })?;
        self.flash.write(self.offset, block).map_err(|_| {
            error!("Flash write failed at {}", self.offset);
            StorageError::Write
        })?;
        debug!("Settings block written at {}", self.offset);
        Ok(())
    }
}

#[cfg(any(test, feature = "std"))]
pub use file::FileSettingsStore;

#[cfg(any(test, feature = "std"))]
mod file {
    use std::fs::{self, File};
    use std::io::Read;
    use std::path::{Path, PathBuf};

    use super::*;

    /// Settings store backed by a file holding the raw block.
    #[derive(Debug, Clone)]
    pub struct FileSettingsStore {
        path: PathBuf,
    }

    impl FileSettingsStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl SettingsStore for FileSettingsStore {
        fn read_block(&mut self) -> Option<[u8; SETTINGS_BLOCK_SIZE]> {
            let mut block = [0u8; SETTINGS_BLOCK_SIZE];
            let result = File::open(&self.path).and_then(|mut f| f.read_exact(&mut block));
            match result {
                Ok(()) => Some(block),
                Err(e) => {
                    debug!("Cannot read {:?}: {}", self.path, e);
                    None
                }
            }
        }

        fn write_block(&mut self, block: &[u8]) -> Result<(), StorageError> {
            fs::write(&self.path, block).map_err(|e| {
                error!("Cannot write {:?}: {}", self.path, e);
                StorageError::Write
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind};

    const SECTOR: usize = FLASH_SECTOR_SIZE;

    /// RAM-backed flash with NOR semantics: erase sets 0xFF, programming
    /// only clears bits.
    struct RamFlash {
        mem: std::vec::Vec<u8>,
        erases: usize,
    }

    impl RamFlash {
        fn new(sectors: usize) -> Self {
            Self {
                mem: std::vec![0xFF; sectors * SECTOR],
                erases: 0,
            }
        }
    }

    impl ErrorType for RamFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for RamFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let src = self
                .mem
                .get(start..start + bytes.len())
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            bytes.copy_from_slice(src);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.mem.len()
        }
    }

    impl NorFlash for RamFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = SECTOR;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.mem[from as usize..to as usize].fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            for (dst, src) in self.mem[start..start + bytes.len()].iter_mut().zip(bytes) {
                *dst &= *src;
            }
            Ok(())
        }
    }

    #[test]
    fn uses_last_sector() {
        let store = FlashSettingsStore::new(RamFlash::new(4)).unwrap();
        assert_eq!(store.offset(), 3 * SECTOR as u32);
    }

    #[test]
    fn erased_flash_reads_as_ff() {
        let mut store = FlashSettingsStore::new(RamFlash::new(2)).unwrap();
        let block = store.read_block().unwrap();
        assert!(block.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn write_erases_first() {
        let mut store = FlashSettingsStore::new(RamFlash::new(2)).unwrap();
        let mut block = [0u8; SETTINGS_BLOCK_SIZE];
        block[0] = 0x0F;
        store.write_block(&block).unwrap();
        block[0] = 0xF0;
        store.write_block(&block).unwrap();

        assert_eq!(store.read_block().unwrap()[0], 0xF0);
        assert_eq!(store.into_inner().erases, 2);
    }

    #[test]
    fn write_leaves_program_area_alone() {
        let mut flash = RamFlash::new(2);
        flash.mem[SECTOR - 1] = 0x42;
        let mut store = FlashSettingsStore::new(flash).unwrap();
        store.write_block(&[0u8; SETTINGS_BLOCK_SIZE]).unwrap();

        let flash = store.into_inner();
        assert_eq!(flash.mem[SECTOR - 1], 0x42);
        assert!(flash.mem[SECTOR..SECTOR + SETTINGS_BLOCK_SIZE].iter().all(|&b| b == 0));
        assert!(flash.mem[SECTOR + SETTINGS_BLOCK_SIZE..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn rejects_unaligned_block() {
        let mut store = FlashSettingsStore::new(RamFlash::new(1)).unwrap();
        assert_eq!(store.write_block(&[0u8; 3]), Err(StorageError::OutOfBounds));
    }

    #[test]
    fn too_small_flash() {
        let flash = RamFlash {
            mem: std::vec::Vec::new(),
            erases: 0,
        };
        assert!(FlashSettingsStore::new(flash).is_err());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSettingsStore::new(dir.path().join("settings.bin"));
        assert!(store.read_block().is_none());

        let mut block = [0u8; SETTINGS_BLOCK_SIZE];
        block[..3].copy_from_slice(&[1, 2, 3]);
        store.write_block(&block).unwrap();
        assert_eq!(store.read_block().unwrap()[..3], [1, 2, 3]);
    }

    #[test]
    fn file_store_short_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [0x4D, 0x6F]).unwrap();
        let mut store = FileSettingsStore::new(path);
        assert!(store.read_block().is_none());
    }
}
