//! Save-state section for the flash chip.
//!
//! Layout (little-endian):
//!
//! ```text
//! "SSTF"  magic
//! u8      version
//! u8      device id (0xB7)
//! u8      write cycle
//! u8      flags: bit 0 = software ID, bit 1 = modified
//! u32     busy counter
//! [u8; FLASH_SIZE] array
//! ```

use thiserror::Error;

use crate::{DEVICE_ID, FLASH_SIZE, Sst39sf040, WriteCycle};

const MAGIC: &[u8; 4] = b"SSTF";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 1 + 1 + 1 + 4;

/// Length of one serialized flash section.
pub(crate) const SECTION_LEN: usize = HEADER_LEN + FLASH_SIZE;

/// Why a flash state section was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("flash state truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("flash state has bad magic")]
    BadMagic,
    #[error("flash state version {0} is not supported")]
    VersionMismatch(u8),
    #[error("flash state is for device {0:#04X}")]
    DeviceMismatch(u8),
    #[error("flash state has invalid write cycle {0}")]
    InvalidCycle(u8),
}

impl Sst39sf040 {
    /// Append this chip's state to `out`.
    pub fn save_state(&self, out: &mut Vec<u8>) {
        out.reserve(SECTION_LEN);
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(DEVICE_ID);
        out.push(self.cycle.to_byte());
        out.push(u8::from(self.software_id) | (u8::from(self.modified) << 1));
        out.extend_from_slice(&self.busy.to_le_bytes());
        out.extend_from_slice(&self.data);
    }

    /// Restore state from the front of `input`, returning the bytes consumed.
    ///
    /// Nothing changes unless the whole section validates.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] when the section is short, carries the wrong
    /// magic, version or device, or encodes an unknown write cycle.
    pub fn load_state(&mut self, input: &[u8]) -> Result<usize, StateError> {
        if input.len() < SECTION_LEN {
            return Err(StateError::Truncated {
                needed: SECTION_LEN,
                available: input.len(),
            });
        }
        if &input[0..4] != MAGIC {
            return Err(StateError::BadMagic);
        }
        if input[4] != VERSION {
            return Err(StateError::VersionMismatch(input[4]));
        }
        if input[5] != DEVICE_ID {
            return Err(StateError::DeviceMismatch(input[5]));
        }
        let cycle = WriteCycle::from_byte(input[6]).ok_or(StateError::InvalidCycle(input[6]))?;
        let flags = input[7];
        let busy = u32::from_le_bytes([input[8], input[9], input[10], input[11]]);

        self.cycle = cycle;
        self.software_id = flags & 0x01 != 0;
        self.modified = flags & 0x02 != 0;
        self.busy = busy;
        self.data.copy_from_slice(&input[HEADER_LEN..SECTION_LEN]);
        Ok(SECTION_LEN)
    }
}
