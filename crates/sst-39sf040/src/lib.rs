//! SST39SF040 512KB NOR flash.
//!
//! Byte-programmable, sector- and chip-erasable flash behind the JEDEC
//! unlock-sequence command protocol. Commands are recognised by combining
//! the command address (A14-A0) and the data byte into one code:
//!
//! | sequence                                   | command               |
//! |--------------------------------------------|-----------------------|
//! | `5555:AA 2AAA:55 5555:A0 addr:data`        | byte program          |
//! | `5555:AA 2AAA:55 5555:80 5555:AA 2AAA:55 5555:10` | chip erase     |
//! | `5555:AA 2AAA:55 5555:80 5555:AA 2AAA:55 SA:30`   | 4KB sector erase |
//! | `5555:AA 2AAA:55 5555:90`                  | software ID entry     |
//! | `5555:AA 2AAA:55 5555:F0` or `XXXX:F0`     | software ID exit      |
//!
//! Any write that does not match the next expected code drops the machine
//! back to idle without touching the array.
//!
//! # Busy polling
//!
//! Program and erase complete immediately in the backing store but leave a
//! busy counter running. While it is nonzero, writes are ignored and every
//! read decrements it and returns a status byte instead of data: bit 7 is
//! the complement of the stored bit 7 (data polling), bit 6 the counter's
//! parity (toggle bit), bits 5-0 the stored bits.
//!
//! # Standalone IC
//!
//! The chip knows nothing about the machine it sits in. The owner maps CPU
//! addresses onto flash addresses and handles image files.

mod state;

use log::{debug, trace};

pub use state::StateError;

/// Array size in bytes (128 sectors of 4KB).
pub const FLASH_SIZE: usize = 0x8_0000;

/// Sector size erased by the sector-erase command.
pub const SECTOR_SIZE: usize = 0x1000;

/// Manufacturer identification byte (SST), read at address 0 in ID mode.
pub const MANUFACTURER_ID: u8 = 0xBF;

/// Device identification byte (39SF040), read at address 1 in ID mode.
pub const DEVICE_ID: u8 = 0xB7;

/// Busy reads after a byte program.
pub const PROGRAM_BUSY: u32 = 4;
/// Busy reads after a sector erase.
pub const SECTOR_ERASE_BUSY: u32 = 5_000;
/// Busy reads after a chip erase.
pub const CHIP_ERASE_BUSY: u32 = 20_000;

const ADDR_MASK: u32 = FLASH_SIZE as u32 - 1;

/// Only A14-A0 take part in command decoding.
const COMMAND_ADDR_MASK: u32 = 0x7FFF;

const UNLOCK_1: u32 = 0x55_55AA;
const UNLOCK_2: u32 = 0x2A_AA55;
const CMD_PROGRAM: u32 = 0x55_55A0;
const CMD_ERASE: u32 = 0x55_5580;
const CMD_ID_ENTRY: u32 = 0x55_5590;
const CMD_ID_EXIT: u32 = 0x55_55F0;
const CMD_CHIP_ERASE: u32 = 0x55_5510;
const SECTOR_ERASE_DATA: u8 = 0x30;
const ID_EXIT_DATA: u8 = 0xF0;

/// Position within the current command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteCycle {
    /// Waiting for the first unlock write.
    #[default]
    Idle,
    /// `5555:AA` seen.
    FirstUnlock,
    /// `2AAA:55` seen; the next write selects the command.
    SecondUnlock,
    /// `5555:A0` seen; the next write programs one byte.
    ProgramSelected,
    /// `5555:80` seen; an erase needs a second unlock.
    EraseSelected,
    /// Erase second unlock, `5555:AA` seen.
    EraseFirstUnlock,
    /// Erase second unlock complete; `10` erases the chip, `30` a sector.
    EraseArmed,
}

impl WriteCycle {
    /// Short name for debuggers.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FirstUnlock => "first_unlock",
            Self::SecondUnlock => "second_unlock",
            Self::ProgramSelected => "program_selected",
            Self::EraseSelected => "erase_selected",
            Self::EraseFirstUnlock => "erase_first_unlock",
            Self::EraseArmed => "erase_armed",
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::FirstUnlock => 1,
            Self::SecondUnlock => 2,
            Self::ProgramSelected => 3,
            Self::EraseSelected => 4,
            Self::EraseFirstUnlock => 5,
            Self::EraseArmed => 6,
        }
    }

    fn from_byte(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Idle,
            1 => Self::FirstUnlock,
            2 => Self::SecondUnlock,
            3 => Self::ProgramSelected,
            4 => Self::EraseSelected,
            5 => Self::EraseFirstUnlock,
            6 => Self::EraseArmed,
            _ => return None,
        })
    }
}

/// SST39SF040 flash chip.
pub struct Sst39sf040 {
    data: Box<[u8]>,
    cycle: WriteCycle,
    /// Reads left before the current program/erase reports completion.
    busy: u32,
    software_id: bool,
    /// Set by any program or erase; cleared when the owner persists the image.
    modified: bool,
}

impl Sst39sf040 {
    /// A blank (fully erased) chip.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; FLASH_SIZE].into_boxed_slice(),
            cycle: WriteCycle::Idle,
            busy: 0,
            software_id: false,
            modified: false,
        }
    }

    /// Reset the command logic. Array contents are kept.
    pub fn reset(&mut self) {
        self.cycle = WriteCycle::Idle;
        self.software_id = false;
        self.busy = 0;
    }

    /// Bus write. Only writes that advance a command sequence have an effect.
    pub fn write(&mut self, addr: u32, data: u8) {
        if self.busy > 0 {
            return;
        }
        let addr = addr & ADDR_MASK;
        let code = ((addr & COMMAND_ADDR_MASK) << 8) | u32::from(data);

        // XXXX:F0 leaves ID mode from anywhere except a pending program,
        // where the byte is data.
        if self.software_id && data == ID_EXIT_DATA && self.cycle != WriteCycle::ProgramSelected {
            debug!("flash: software ID exit");
            self.software_id = false;
            self.cycle = WriteCycle::Idle;
            return;
        }

        self.cycle = match (self.cycle, code) {
            (WriteCycle::Idle, UNLOCK_1) => WriteCycle::FirstUnlock,
            (WriteCycle::FirstUnlock, UNLOCK_2) => WriteCycle::SecondUnlock,
            (WriteCycle::SecondUnlock, CMD_PROGRAM) => WriteCycle::ProgramSelected,
            (WriteCycle::SecondUnlock, CMD_ERASE) => WriteCycle::EraseSelected,
            (WriteCycle::SecondUnlock, CMD_ID_ENTRY) => {
                debug!("flash: software ID entry");
                self.software_id = true;
                WriteCycle::Idle
            }
            (WriteCycle::SecondUnlock, CMD_ID_EXIT) => {
                self.software_id = false;
                WriteCycle::Idle
            }
            (WriteCycle::ProgramSelected, _) => {
                self.program(addr, data);
                WriteCycle::Idle
            }
            (WriteCycle::EraseSelected, UNLOCK_1) => WriteCycle::EraseFirstUnlock,
            (WriteCycle::EraseFirstUnlock, UNLOCK_2) => WriteCycle::EraseArmed,
            (WriteCycle::EraseArmed, CMD_CHIP_ERASE) => {
                self.erase_chip();
                WriteCycle::Idle
            }
            (WriteCycle::EraseArmed, _) if data == SECTOR_ERASE_DATA => {
                self.erase_sector(addr);
                WriteCycle::Idle
            }
            (state, _) => {
                if state != WriteCycle::Idle {
                    trace!(
                        "flash: sequence reset in {} by {addr:05X}:{data:02X}",
                        state.name()
                    );
                }
                WriteCycle::Idle
            }
        };
    }

    /// Bus read. Busy and ID mode change what comes back; busy reads also
    /// count down the operation.
    pub fn read(&mut self, addr: u32) -> u8 {
        let addr = addr & ADDR_MASK;
        let byte = self.data[addr as usize];
        if self.busy > 0 {
            self.busy -= 1;
            return busy_status(byte, self.busy);
        }
        if self.software_id {
            return match addr {
                0 => MANUFACTURER_ID,
                1 => DEVICE_ID,
                _ => 0xFF,
            };
        }
        byte
    }

    /// Stored byte, without side effects.
    #[must_use]
    pub fn peek(&self, addr: u32) -> u8 {
        self.data[(addr & ADDR_MASK) as usize]
    }

    /// Replace the array from an image file. Short images fill a prefix.
    pub fn load_image(&mut self, image: &[u8]) {
        let len = image.len().min(FLASH_SIZE);
        self.data[..len].copy_from_slice(&image[..len]);
        self.modified = false;
    }

    /// Full array contents for persisting.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Mark the image as persisted.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    #[must_use]
    pub fn cycle(&self) -> WriteCycle {
        self.cycle
    }

    #[must_use]
    pub fn busy(&self) -> u32 {
        self.busy
    }

    #[must_use]
    pub fn software_id_mode(&self) -> bool {
        self.software_id
    }

    fn program(&mut self, addr: u32, data: u8) {
        self.data[addr as usize] = data;
        self.busy = PROGRAM_BUSY;
        self.modified = true;
    }

    fn erase_sector(&mut self, addr: u32) {
        let start = addr as usize & !(SECTOR_SIZE - 1);
        debug!("flash: sector erase at {start:05X}");
        self.data[start..start + SECTOR_SIZE].fill(0xFF);
        self.busy = SECTOR_ERASE_BUSY;
        self.modified = true;
    }

    fn erase_chip(&mut self) {
        debug!("flash: chip erase");
        self.data.fill(0xFF);
        self.busy = CHIP_ERASE_BUSY;
        self.modified = true;
    }
}

impl Default for Sst39sf040 {
    fn default() -> Self {
        Self::new()
    }
}

/// Status byte returned while an operation is in flight.
fn busy_status(byte: u8, busy: u32) -> u8 {
    let toggle = if busy & 1 != 0 { 0x40 } else { 0x00 };
    (byte & 0x3F) | (!byte & 0x80) | toggle
}
