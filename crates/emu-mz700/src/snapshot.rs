//! Save state for the bus controller.
//!
//! Layout (little-endian):
//!
//! ```text
//! "MZMB"          magic
//! u32             version
//! u32             device id (model + video standard)
//! PCG             MZ-700: the two writable 1KB halves ($400, $C00)
//!                 MZ-1500: all three 8KB planes
//! [u8; 0x10000]   RAM
//! [u8; 0x1000]    VRAM
//! u8 x 3          mode bits, PCG bank, IPL page
//! u8 x 3          PCG-700 data, address, control
//! u8              priority
//! [u8; 8]         palette
//! u8 x 9          blink, tempo, blank, hblank, hsync, vblank, vsync,
//!                 blank_vram, hblank_pcg
//! u16             raster line
//! u32             clock within the line
//! u8              boot storage (0 ROM, 1 flash)
//! u8              flash section present
//! ...             flash section (see `sst_39sf040`)
//! ```
//!
//! The bank map is not stored: it is derived from the mode latch on load.
//! [`Mz700`](crate::Mz700) prefixes this record with its scheduler state.

use log::warn;
use thiserror::Error;

use crate::bus::MzBus;
use crate::config::{BootStorage, MzModel};
use crate::memory::{RAM_SIZE, VRAM_SIZE};
use crate::peripherals::Peripherals;

const SNAPSHOT_MAGIC: &[u8; 4] = b"MZMB";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot truncated")]
    Truncated,
    #[error("not a bus snapshot")]
    BadMagic,
    #[error("snapshot version {0} is not supported")]
    VersionMismatch(u32),
    #[error("snapshot is for device {found:#010X}, this machine is {expected:#010X}")]
    DeviceMismatch { expected: u32, found: u32 },
    #[error("snapshot {0} out of range")]
    OutOfRange(&'static str),
    #[error("flash state: {0}")]
    Flash(#[from] sst_39sf040::StateError),
}

/// Byte ranges of the PCG buffer that are stored.
fn pcg_ranges(model: MzModel) -> &'static [(usize, usize)] {
    match model {
        MzModel::Mz700 => &[(0x400, 0x800), (0xC00, 0x1000)],
        MzModel::Mz1500 => &[(0x0000, 0x6000)],
    }
}

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.pos.checked_add(len).ok_or(SnapshotError::Truncated)?;
        let bytes = self.data.get(self.pos..end).ok_or(SnapshotError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, SnapshotError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, SnapshotError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, SnapshotError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Everything parsed from a snapshot, applied only once it all validated.
struct Staged<'a> {
    pcg: Vec<&'a [u8]>,
    ram: &'a [u8],
    vram: &'a [u8],
    latch: [u8; 3],
    pcg700: [u8; 3],
    priority: u8,
    palette: [u8; 8],
    flags: [bool; 9],
    line: u16,
    line_clock: u32,
}

impl<P: Peripherals> MzBus<P> {
    /// Serialize the controller state.
    #[must_use]
    pub fn save_state(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(0x1_8000);

        data.extend_from_slice(SNAPSHOT_MAGIC);
        data.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        data.extend_from_slice(&self.config.device_id().to_le_bytes());

        for &(start, end) in pcg_ranges(self.config.model) {
            data.extend_from_slice(&self.mem.pcg[start..end]);
        }
        data.extend_from_slice(&self.mem.ram);
        data.extend_from_slice(&self.mem.vram);

        data.push(self.latch.bits());
        data.push(self.latch.pcg_bank());
        data.push(self.latch.ipl_page());

        let (pcg_data, pcg_addr, pcg_ctrl) = self.pcg700.registers();
        data.extend_from_slice(&[pcg_data, pcg_addr, pcg_ctrl]);

        data.push(self.priority);
        data.extend_from_slice(&self.palette);

        data.extend(self.crtc.flags().iter().map(|&flag| u8::from(flag)));
        data.extend_from_slice(&self.crtc.line().to_le_bytes());
        data.extend_from_slice(&self.crtc.line_clock().to_le_bytes());

        data.push(match self.config.boot_storage {
            BootStorage::Rom => 0,
            BootStorage::Flash => 1,
        });
        match &self.flash {
            Some(flash) => {
                data.push(1);
                flash.save_state(&mut data);
            }
            None => data.push(0),
        }

        data
    }

    /// Restore controller state from [`save_state`](Self::save_state)
    /// output. On error nothing is changed.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        let result = self.apply_state(data);
        if let Err(err) = &result {
            warn!("snapshot rejected: {err}");
        }
        result
    }

    /// [`load_state`](Self::load_state) without the logging.
    pub(crate) fn apply_state(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        let mut r = Reader::new(data);

        if r.take(4)? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = r.u32()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch(version));
        }
        let expected = self.config.device_id();
        let found = r.u32()?;
        if found != expected {
            return Err(SnapshotError::DeviceMismatch { expected, found });
        }

        let pcg = pcg_ranges(self.config.model)
            .iter()
            .map(|&(start, end)| r.take(end - start))
            .collect::<Result<Vec<_>, _>>()?;
        let ram = r.take(RAM_SIZE)?;
        let vram = r.take(VRAM_SIZE)?;
        let latch = [r.u8()?, r.u8()?, r.u8()?];
        let pcg700 = [r.u8()?, r.u8()?, r.u8()?];
        let priority = r.u8()?;
        let mut palette = [0u8; 8];
        palette.copy_from_slice(r.take(8)?);
        let mut flags = [false; 9];
        for (flag, &byte) in flags.iter_mut().zip(r.take(9)?) {
            *flag = byte != 0;
        }
        let line = r.u16()?;
        let line_clock = r.u32()?;

        let storage = r.u8()?;
        let has_flash = r.u8()? != 0;
        let wants_flash = self.config.boot_storage == BootStorage::Flash;
        if (storage != 0) != wants_flash || has_flash != self.flash.is_some() {
            return Err(SnapshotError::DeviceMismatch { expected, found });
        }

        let staged = Staged {
            pcg,
            ram,
            vram,
            latch,
            pcg700,
            priority,
            palette,
            flags,
            line,
            line_clock,
        };

        // Last fallible step; the flash chip itself only changes on success.
        if let Some(flash) = self.flash.as_mut() {
            flash.load_state(r.rest())?;
        }

        self.apply(&staged);
        Ok(())
    }

    fn apply(&mut self, s: &Staged<'_>) {
        for (&(start, end), bytes) in pcg_ranges(self.config.model).iter().zip(&s.pcg) {
            self.mem.pcg[start..end].copy_from_slice(bytes);
        }
        self.mem.ram.copy_from_slice(s.ram);
        self.mem.vram.copy_from_slice(s.vram);
        self.latch.restore(s.latch[0], s.latch[1], s.latch[2]);
        self.pcg700.restore(s.pcg700[0], s.pcg700[1], s.pcg700[2]);
        self.priority = s.priority;
        self.palette = s.palette;
        self.crtc.restore(s.flags, s.line, s.line_clock);

        self.map.derive(&self.latch, self.config.model);
        self.redraw_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MzConfig, VideoStandard};
    use crate::peripherals::NullPeripherals;
    use emu_core::Bus;

    fn make_bus(model: MzModel, storage: BootStorage) -> MzBus {
        let mut config = MzConfig::new(model, VideoStandard::Ntsc);
        config.boot_storage = storage;
        let mut bus = MzBus::new(&config, NullPeripherals);
        bus.reset();
        bus
    }

    #[test]
    fn round_trip_restores_memory_and_latch() {
        let mut bus = make_bus(MzModel::Mz1500, BootStorage::Rom);
        bus.write(0xD123, 0x42);
        bus.io_write(0xE0, 0);
        bus.write(0x0100, 0x99);
        bus.io_write(0xE5, 1);
        bus.write(0xD005, 0x77);
        bus.io_write(0xF1, 0x36);
        let saved = bus.save_state();

        let mut other = make_bus(MzModel::Mz1500, BootStorage::Rom);
        other.load_state(&saved).unwrap();
        assert!(other.latch().pcg_mode());
        assert!(!other.latch().mon_low());
        assert_eq!(other.peek(0xD005), 0x77);
        assert_eq!(other.peek(0x0100), 0x99);
        assert_eq!(other.memories().vram[0x123], 0x42);
        assert_eq!(other.palette()[3], 6);
        assert_eq!(other.bank_map(), bus.bank_map());
    }

    #[test]
    fn mid_line_vram_wait_survives_round_trip() {
        let mut bus = make_bus(MzModel::Mz700, BootStorage::Rom);
        bus.begin_line(10);
        bus.set_line_clock(100);
        let saved = bus.save_state();

        let mut other = make_bus(MzModel::Mz700, BootStorage::Rom);
        other.load_state(&saved).unwrap();
        assert_eq!(other.crtc().line_clock(), 100);
        assert_eq!(other.read(0xD000).wait, bus.read(0xD000).wait);
        assert_eq!(other.read(0xD000).wait, 60 + 2);
    }

    #[test]
    fn rejects_other_model() {
        let bus = make_bus(MzModel::Mz700, BootStorage::Rom);
        let saved = bus.save_state();
        let mut other = make_bus(MzModel::Mz1500, BootStorage::Rom);
        assert!(matches!(
            other.load_state(&saved),
            Err(SnapshotError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn rejects_version_and_magic() {
        let bus = make_bus(MzModel::Mz700, BootStorage::Rom);
        let mut saved = bus.save_state();
        let mut other = make_bus(MzModel::Mz700, BootStorage::Rom);

        saved[4] = 2;
        assert_eq!(other.load_state(&saved), Err(SnapshotError::VersionMismatch(2)));
        saved[0] = b'X';
        assert_eq!(other.load_state(&saved), Err(SnapshotError::BadMagic));
    }

    #[test]
    fn truncated_snapshot_changes_nothing() {
        let mut bus = make_bus(MzModel::Mz700, BootStorage::Rom);
        bus.io_write(0xE0, 0);
        bus.write(0x0040, 0x11);
        let saved = bus.save_state();

        let mut other = make_bus(MzModel::Mz700, BootStorage::Rom);
        assert_eq!(
            other.load_state(&saved[..saved.len() - 1]),
            Err(SnapshotError::Truncated)
        );
        assert!(other.latch().mon_low());
        assert_eq!(other.memories().ram[0x40], 0);
    }

    #[test]
    fn flash_section_round_trips() {
        let mut bus = make_bus(MzModel::Mz700, BootStorage::Flash);
        bus.io_read(0x05FF);
        bus.write(0x0555, 0xAA);
        let saved = bus.save_state();

        let mut other = make_bus(MzModel::Mz700, BootStorage::Flash);
        other.load_state(&saved).unwrap();
        let flash = other.flash().unwrap();
        assert_eq!(flash.cycle(), sst_39sf040::WriteCycle::FirstUnlock);
    }

    #[test]
    fn bad_flash_section_changes_nothing() {
        let mut bus = make_bus(MzModel::Mz700, BootStorage::Flash);
        bus.io_write(0xE1, 0);
        let mut saved = bus.save_state();
        // Header, PCG halves, RAM, VRAM, then 32 bytes of registers and flags.
        let flash_start = 12 + 0x800 + RAM_SIZE + VRAM_SIZE + 32;
        saved[flash_start] = b'Z';

        let mut other = make_bus(MzModel::Mz700, BootStorage::Flash);
        assert!(matches!(other.load_state(&saved), Err(SnapshotError::Flash(_))));
        assert!(other.latch().mon_high());
    }

    #[test]
    fn storage_mismatch_rejected() {
        let bus = make_bus(MzModel::Mz700, BootStorage::Flash);
        let saved = bus.save_state();
        let mut other = make_bus(MzModel::Mz700, BootStorage::Rom);
        assert!(matches!(
            other.load_state(&saved),
            Err(SnapshotError::DeviceMismatch { .. })
        ));
    }
}
