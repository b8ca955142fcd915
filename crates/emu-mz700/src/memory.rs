//! Physical memories owned by the bus controller.

use crate::config::MzModel;

pub const IPL_SIZE: usize = 0x1000;
pub const EXT_SIZE: usize = 0x1800;
pub const FONT_SIZE: usize = 0x2000;
pub const RAM_SIZE: usize = 0x1_0000;
pub const VRAM_SIZE: usize = 0x1000;

/// VRAM attribute block, filled with white-on-blue at power-on.
const ATTR_START: usize = 0x800;
const ATTR_END: usize = 0xC00;
const ATTR_POWER_ON: u8 = 0x71;

/// A physical memory that a bank window can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ipl,
    Ext,
    Font,
    Pcg,
    Ram,
    Vram,
}

impl Region {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ipl => "ipl",
            Self::Ext => "ext",
            Self::Font => "font",
            Self::Pcg => "pcg",
            Self::Ram => "ram",
            Self::Vram => "vram",
        }
    }
}

/// The fixed set of byte arrays behind the bank map.
pub struct Memories {
    pub ipl: Box<[u8]>,
    pub ext: Box<[u8]>,
    /// Character generator: 4KB CG ROM or 8KB XCG ROM.
    pub font: Box<[u8]>,
    /// PCG-700 (2KB + copy of lower CG ROM) or MZ-1500 PCG (three 8KB planes).
    pub pcg: Box<[u8]>,
    pub ram: Box<[u8]>,
    pub vram: Box<[u8]>,
}

impl Memories {
    /// Power-on contents: ROMs 0xFF, RAM and PCG zero, attributes 0x71.
    #[must_use]
    pub fn new(model: MzModel) -> Self {
        let mut vram = vec![0u8; VRAM_SIZE].into_boxed_slice();
        vram[ATTR_START..ATTR_END].fill(ATTR_POWER_ON);
        Self {
            ipl: vec![0xFF; IPL_SIZE].into_boxed_slice(),
            ext: vec![0xFF; EXT_SIZE].into_boxed_slice(),
            font: vec![0u8; FONT_SIZE].into_boxed_slice(),
            pcg: vec![0u8; model.pcg_size()].into_boxed_slice(),
            ram: vec![0u8; RAM_SIZE].into_boxed_slice(),
            vram,
        }
    }

    fn region(&self, region: Region) -> &[u8] {
        match region {
            Region::Ipl => &self.ipl,
            Region::Ext => &self.ext,
            Region::Font => &self.font,
            Region::Pcg => &self.pcg,
            Region::Ram => &self.ram,
            Region::Vram => &self.vram,
        }
    }

    fn region_mut(&mut self, region: Region) -> &mut [u8] {
        match region {
            Region::Ipl => &mut self.ipl,
            Region::Ext => &mut self.ext,
            Region::Font => &mut self.font,
            Region::Pcg => &mut self.pcg,
            Region::Ram => &mut self.ram,
            Region::Vram => &mut self.vram,
        }
    }

    /// Byte at `offset` in `region`; 0xFF past the end.
    #[must_use]
    pub fn read(&self, region: Region, offset: usize) -> u8 {
        self.region(region).get(offset).copied().unwrap_or(0xFF)
    }

    /// Store a byte. Writes past the end are dropped.
    pub fn write(&mut self, region: Region, offset: usize, value: u8) {
        if let Some(byte) = self.region_mut(region).get_mut(offset) {
            *byte = value;
        }
    }

    /// Copy the character ROM halves the PCG-700 board passes through
    /// ($000-$3FF and $800-$BFF). The writable halves are cleared.
    pub fn init_pcg700(&mut self) {
        self.pcg.fill(0);
        self.pcg[0x000..0x400].copy_from_slice(&self.font[0x000..0x400]);
        self.pcg[0x800..0xC00].copy_from_slice(&self.font[0x800..0xC00]);
    }
}
