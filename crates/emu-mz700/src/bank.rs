//! Bank map: 32 windows of 2KB covering the 64KB address space.
//!
//! Each window has an independent read source and write sink. A target is
//! either a region of physical memory at a base offset or the dummy, which
//! reads 0xFF and swallows writes. Several windows may alias the same region
//! at different offsets (the MZ-1500 font mapping does).
//!
//! The map is a pure function of the mode latch. Port writes rebuild the
//! affected half from scratch through [`BankMap::derive_low`] and
//! [`BankMap::derive_high`]; nothing edits a window in place.

use crate::config::MzModel;
use crate::latch::ModeLatch;
use crate::memory::{Memories, Region};

pub const WINDOW_SIZE: usize = 0x800;
pub const WINDOW_COUNT: usize = 32;

/// Where a window reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Dummy,
    Mapped { region: Region, base: usize },
}

impl Target {
    const fn at(region: Region, base: usize) -> Self {
        Self::Mapped { region, base }
    }

    /// Same target advanced by `windows` windows. Dummy stays dummy.
    const fn advance(self, windows: usize) -> Self {
        match self {
            Self::Dummy => Self::Dummy,
            Self::Mapped { region, base } => Self::Mapped {
                region,
                base: base + windows * WINDOW_SIZE,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub read: Target,
    pub write: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankMap {
    windows: [Window; WINDOW_COUNT],
}

impl BankMap {
    /// Every window on RAM at its own address.
    #[must_use]
    pub fn all_ram() -> Self {
        let mut map = Self {
            windows: [Window {
                read: Target::Dummy,
                write: Target::Dummy,
            }; WINDOW_COUNT],
        };
        let ram = Target::at(Region::Ram, 0);
        map.set(0x0000, 0xFFFF, ram, ram);
        map
    }

    /// Point the windows covering `start..=end` at consecutive 2KB slices of
    /// the two targets.
    fn set(&mut self, start: u16, end: u16, write: Target, read: Target) {
        let first = usize::from(start) >> 11;
        let last = usize::from(end) >> 11;
        for (i, window) in self.windows[first..=last].iter_mut().enumerate() {
            *window = Window {
                read: read.advance(i),
                write: write.advance(i),
            };
        }
    }

    /// $0000-$0FFF: monitor ROM (read only) or RAM.
    pub fn derive_low(&mut self, latch: &ModeLatch) {
        if latch.mon_low() {
            self.set(0x0000, 0x0FFF, Target::Dummy, Target::at(Region::Ipl, 0));
        } else {
            let ram = Target::at(Region::Ram, 0);
            self.set(0x0000, 0x0FFF, ram, ram);
        }
    }

    /// $D000-$FFFF: PCG planes, VRAM + ROM, or RAM.
    pub fn derive_high(&mut self, latch: &ModeLatch, model: MzModel) {
        if model == MzModel::Mz1500 && latch.pcg_mode() {
            let bank = usize::from(latch.pcg_bank() & 3);
            if bank != 0 {
                let plane = Target::at(Region::Pcg, (bank - 1) * 0x2000);
                self.set(0xD000, 0xEFFF, plane, plane);
            } else {
                let font = Target::at(Region::Font, 0);
                self.set(0xD000, 0xDFFF, Target::Dummy, font);
                self.set(0xE000, 0xEFFF, Target::Dummy, font);
            }
            self.set(0xF000, 0xFFFF, Target::Dummy, Target::Dummy);
        } else if latch.mon_high() {
            let vram = Target::at(Region::Vram, 0);
            self.set(0xD000, 0xDFFF, vram, vram);
            match model {
                MzModel::Mz700 => self.set(0xE000, 0xFFFF, Target::Dummy, Target::Dummy),
                MzModel::Mz1500 => {
                    self.set(0xE000, 0xE7FF, Target::Dummy, Target::Dummy);
                    self.set(0xE800, 0xFFFF, Target::Dummy, Target::at(Region::Ext, 0));
                }
            }
        } else {
            let ram = Target::at(Region::Ram, 0xD000);
            self.set(0xD000, 0xFFFF, ram, ram);
        }
    }

    /// Both halves, as after reset or a snapshot load.
    pub fn derive(&mut self, latch: &ModeLatch, model: MzModel) {
        self.derive_low(latch);
        self.derive_high(latch, model);
    }

    #[must_use]
    pub fn window(&self, addr: u16) -> Window {
        self.windows[usize::from(addr) >> 11]
    }

    #[must_use]
    pub fn read(&self, mem: &Memories, addr: u16) -> u8 {
        match self.window(addr).read {
            Target::Dummy => 0xFF,
            Target::Mapped { region, base } => {
                mem.read(region, base + (usize::from(addr) & (WINDOW_SIZE - 1)))
            }
        }
    }

    pub fn write(&self, mem: &mut Memories, addr: u16, value: u8) {
        if let Target::Mapped { region, base } = self.window(addr).write {
            mem.write(region, base + (usize::from(addr) & (WINDOW_SIZE - 1)), value);
        }
    }
}

impl Default for BankMap {
    fn default() -> Self {
        Self::all_ram()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_latch(ports: &[(u8, u8)], model: MzModel) -> ModeLatch {
        let mut latch = ModeLatch::new();
        latch.reset();
        for &(port, data) in ports {
            latch.write_port(port, data, model);
        }
        latch
    }

    fn derived(latch: &ModeLatch, model: MzModel) -> BankMap {
        let mut map = BankMap::all_ram();
        map.derive(latch, model);
        map
    }

    #[test]
    fn power_on_map_is_flat_ram() {
        let map = BankMap::all_ram();
        assert_eq!(
            map.window(0xF800).read,
            Target::Mapped {
                region: Region::Ram,
                base: 0xF800
            }
        );
    }

    #[test]
    fn reset_map_mz700() {
        let map = derived(&make_latch(&[], MzModel::Mz700), MzModel::Mz700);
        assert_eq!(map.window(0x0800).read, Target::at(Region::Ipl, 0x800));
        assert_eq!(map.window(0x0800).write, Target::Dummy);
        assert_eq!(map.window(0x1000).read, Target::at(Region::Ram, 0x1000));
        assert_eq!(map.window(0xD800).write, Target::at(Region::Vram, 0x800));
        assert_eq!(map.window(0xE800).read, Target::Dummy);
        assert_eq!(map.window(0xF800).read, Target::Dummy);
    }

    #[test]
    fn reset_map_mz1500_has_ext_rom() {
        let map = derived(&make_latch(&[], MzModel::Mz1500), MzModel::Mz1500);
        assert_eq!(map.window(0xE000).read, Target::Dummy);
        assert_eq!(map.window(0xE800).read, Target::at(Region::Ext, 0));
        assert_eq!(map.window(0xF800).read, Target::at(Region::Ext, 0x1000));
        assert_eq!(map.window(0xF800).write, Target::Dummy);
    }

    #[test]
    fn monitor_out_gives_ram() {
        let latch = make_latch(&[(0xE0, 0), (0xE1, 0)], MzModel::Mz700);
        let map = derived(&latch, MzModel::Mz700);
        assert_eq!(map.window(0x0000).write, Target::at(Region::Ram, 0));
        assert_eq!(map.window(0xD000).read, Target::at(Region::Ram, 0xD000));
        assert_eq!(map.window(0xF800).write, Target::at(Region::Ram, 0xF800));
    }

    #[test]
    fn pcg_bank_selects_plane() {
        let latch = make_latch(&[(0xE5, 2)], MzModel::Mz1500);
        let map = derived(&latch, MzModel::Mz1500);
        assert_eq!(map.window(0xD000).read, Target::at(Region::Pcg, 0x2000));
        assert_eq!(map.window(0xE800).write, Target::at(Region::Pcg, 0x3800));
        assert_eq!(map.window(0xF000).read, Target::Dummy);
    }

    #[test]
    fn pcg_bank_zero_aliases_font_read_only() {
        let latch = make_latch(&[(0xE5, 0)], MzModel::Mz1500);
        let map = derived(&latch, MzModel::Mz1500);
        assert_eq!(map.window(0xD000).read, Target::at(Region::Font, 0));
        assert_eq!(map.window(0xE000).read, Target::at(Region::Font, 0));
        assert_eq!(map.window(0xE800).read, Target::at(Region::Font, 0x800));
        assert_eq!(map.window(0xD000).write, Target::Dummy);
    }

    #[test]
    fn dummy_reads_ff_and_discards() {
        let mut mem = Memories::new(MzModel::Mz700);
        let map = derived(&make_latch(&[], MzModel::Mz700), MzModel::Mz700);
        map.write(&mut mem, 0xF000, 0x12);
        assert_eq!(map.read(&mem, 0xF000), 0xFF);
        map.write(&mut mem, 0x0010, 0x34);
        assert_eq!(mem.ram[0x0010], 0);
    }

    #[test]
    fn derivation_is_idempotent() {
        let latch = make_latch(&[(0xE5, 1), (0xE0, 0)], MzModel::Mz1500);
        let once = derived(&latch, MzModel::Mz1500);
        let mut twice = once.clone();
        twice.derive(&latch, MzModel::Mz1500);
        assert_eq!(once, twice);
    }
}
