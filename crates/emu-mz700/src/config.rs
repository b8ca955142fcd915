//! Machine configuration.
//!
//! Everything here is fixed when the machine is built. Model and video
//! standard select one of a closed set of timing tables and feature flags;
//! nothing switches at runtime.

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Supported machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MzModel {
    /// MZ-700: 4KB VRAM, optional PCG-700 board behind $E010-$E012.
    #[default]
    Mz700,
    /// MZ-1500: adds the three-plane PCG overlay, palette and 6KB EXT ROM.
    Mz1500,
}

impl MzModel {
    /// Bytes of PCG pattern memory.
    #[must_use]
    pub const fn pcg_size(self) -> usize {
        match self {
            Self::Mz700 => 0x1000,
            Self::Mz1500 => 0x6000,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mz700 => "MZ-700",
            Self::Mz1500 => "MZ-1500",
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Mz700 => 1,
            Self::Mz1500 => 2,
        }
    }
}

/// Broadcast standard. Selects the raster timing table and ROM region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VideoStandard {
    /// Japanese machines.
    #[default]
    Ntsc,
    /// European machines.
    Pal,
}

impl VideoStandard {
    /// Raster timing for this standard.
    #[must_use]
    pub const fn timing(self) -> Timing {
        match self {
            Self::Ntsc => NTSC,
            Self::Pal => PAL,
        }
    }

    /// Suffix of the region-specific ROM file names.
    #[must_use]
    pub const fn rom_region(self) -> &'static str {
        match self {
            Self::Ntsc => "JP",
            Self::Pal => "EU",
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Ntsc => 0,
            Self::Pal => 1,
        }
    }
}

/// What answers in $0000-$0FFF while the monitor ROM is paged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BootStorage {
    /// 4KB IPL ROM.
    #[default]
    Rom,
    /// 512KB SST39SF040 flash, paged in 4KB steps by the IPL page selector.
    Flash,
}

/// Raster timing table, in CPU clocks and scanlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub cpu_clock_hz: u64,
    pub clocks_per_line: u32,
    pub lines_per_frame: u16,
    pub visible_lines: u16,
    pub blank_start: u32,
    pub blank_end: u32,
    pub hblank_start: u32,
    pub hsync_start: u32,
    pub hsync_end: u32,
    pub vsync_start: u16,
    pub vsync_end: u16,
    /// Clock at which the MZ-1500 PCG access window opens.
    pub pcg_window: u32,
}

/// Japanese 60Hz timing.
pub const NTSC: Timing = Timing {
    cpu_clock_hz: 3_579_545,
    clocks_per_line: 228,
    lines_per_frame: 262,
    visible_lines: 200,
    blank_start: 160,
    blank_end: 0,
    hblank_start: 160,
    hsync_start: 180,
    hsync_end: 196,
    vsync_start: 221,
    vsync_end: 223,
    pcg_window: 170,
};

/// European 50Hz timing. BLNK and /HBLK are believed to start on the same
/// pulse; the split values here are the measured ones.
pub const PAL: Timing = Timing {
    cpu_clock_hz: 17_734_475 / 5,
    clocks_per_line: 228,
    lines_per_frame: 312,
    visible_lines: 200,
    blank_start: 147,
    blank_end: 0,
    hblank_start: 128,
    hsync_start: 160,
    hsync_end: 176,
    vsync_start: 245,
    vsync_end: 247,
    pcg_window: 170,
};

/// Configuration for creating a machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MzConfig {
    pub model: MzModel,
    pub standard: VideoStandard,
    pub boot_storage: BootStorage,
    /// DIP switch 1: PCG-700 board fitted (MZ-700 only).
    pub pcg700: bool,
    /// Blend each frame with the previous one at half intensity.
    pub colour_blend: bool,
    /// Leave every other output line black.
    pub scanlines: bool,
    /// Directory holding ROM and flash images. `None` runs with blank memories.
    pub rom_dir: Option<PathBuf>,
}

impl MzConfig {
    #[must_use]
    pub fn new(model: MzModel, standard: VideoStandard) -> Self {
        Self {
            model,
            standard,
            ..Self::default()
        }
    }

    /// Identity written into snapshots; a snapshot only loads into a machine
    /// with the same identity.
    #[must_use]
    pub fn device_id(&self) -> u32 {
        u32::from_le_bytes([b'M', b'Z', self.model.code(), self.standard.code()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_tables_differ_by_standard() {
        assert_eq!(VideoStandard::Ntsc.timing().lines_per_frame, 262);
        assert_eq!(VideoStandard::Pal.timing().lines_per_frame, 312);
        assert_eq!(VideoStandard::Pal.timing().cpu_clock_hz, 3_546_895);
        assert_eq!(NTSC.clocks_per_line, PAL.clocks_per_line);
    }

    #[test]
    fn device_id_tracks_model_and_standard() {
        let a = MzConfig::new(MzModel::Mz700, VideoStandard::Ntsc);
        let b = MzConfig::new(MzModel::Mz1500, VideoStandard::Ntsc);
        let c = MzConfig::new(MzModel::Mz700, VideoStandard::Pal);
        assert_ne!(a.device_id(), b.device_id());
        assert_ne!(a.device_id(), c.device_id());
        let mut d = a.clone();
        d.scanlines = true;
        assert_eq!(a.device_id(), d.device_id());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_round_trips_through_json() {
        let mut config = MzConfig::new(MzModel::Mz1500, VideoStandard::Pal);
        config.boot_storage = BootStorage::Flash;
        config.rom_dir = Some(PathBuf::from("roms"));
        let json = serde_json::to_string(&config).unwrap();
        let back: MzConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
