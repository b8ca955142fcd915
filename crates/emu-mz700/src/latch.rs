//! Mode latch: the memory-bank bits set by OUT to ports $E0-$E6.
//!
//! | port | effect                                         | remaps      |
//! |------|------------------------------------------------|-------------|
//! | $E0  | monitor ROM out of $0000-$0FFF                 | low         |
//! | $E1  | VRAM/I/O out of $D000-$FFFF                    | high        |
//! | $E2  | monitor ROM in                                 | low         |
//! | $E3  | VRAM/I/O in                                    | high        |
//! | $E4  | both in; PCG overlay off (MZ-1500)             | low + high  |
//! | $E5  | PCG overlay on, bank = data (MZ-1500)          | high        |
//! | $E6  | PCG overlay off (MZ-1500)                      | high        |
//!
//! IN from port $FF latches the boot-storage page from A15-A8.

use log::debug;

use crate::config::MzModel;

pub const MON_LOW: u8 = 0x01;
pub const MON_HIGH: u8 = 0x02;
pub const PCG_MODE: u8 = 0x20;

/// Halves of the address space that need re-deriving after a port write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Remap {
    pub low: bool,
    pub high: bool,
}

impl Remap {
    const NONE: Self = Self { low: false, high: false };
    const LOW: Self = Self { low: true, high: false };
    const HIGH: Self = Self { low: false, high: true };
    const BOTH: Self = Self { low: true, high: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeLatch {
    bits: u8,
    pcg_bank: u8,
    ipl_page: u8,
}

impl ModeLatch {
    /// Power-on state, before reset: everything RAM.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: 0,
            pcg_bank: 0,
            ipl_page: 0,
        }
    }

    /// Reset: monitor ROM and VRAM paged in, PCG bank 0. The boot-storage
    /// page survives.
    pub fn reset(&mut self) {
        self.bits = MON_LOW | MON_HIGH;
        self.pcg_bank = 0;
    }

    /// Apply an OUT to a bank port. Ports the model lacks are ignored.
    pub fn write_port(&mut self, port: u8, data: u8, model: MzModel) -> Remap {
        let mz1500 = model == MzModel::Mz1500;
        let remap = match port {
            0xE0 => {
                self.bits &= !MON_LOW;
                Remap::LOW
            }
            0xE1 => {
                self.bits &= !MON_HIGH;
                Remap::HIGH
            }
            0xE2 => {
                self.bits |= MON_LOW;
                Remap::LOW
            }
            0xE3 => {
                self.bits |= MON_HIGH;
                Remap::HIGH
            }
            0xE4 => {
                self.bits |= MON_LOW | MON_HIGH;
                if mz1500 {
                    self.bits &= !PCG_MODE;
                }
                Remap::BOTH
            }
            0xE5 if mz1500 => {
                self.bits |= PCG_MODE;
                self.pcg_bank = data;
                Remap::HIGH
            }
            0xE6 if mz1500 => {
                self.bits &= !PCG_MODE;
                Remap::HIGH
            }
            _ => Remap::NONE,
        };
        if remap != Remap::NONE {
            debug!(
                "bank port {port:02X}: bits={:02X} pcg_bank={}",
                self.bits, self.pcg_bank
            );
        }
        remap
    }

    /// IN from port $FF: select the boot-storage page.
    pub fn select_ipl_page(&mut self, page: u8) {
        self.ipl_page = page;
    }

    #[must_use]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    #[must_use]
    pub fn mon_low(&self) -> bool {
        self.bits & MON_LOW != 0
    }

    #[must_use]
    pub fn mon_high(&self) -> bool {
        self.bits & MON_HIGH != 0
    }

    #[must_use]
    pub fn pcg_mode(&self) -> bool {
        self.bits & PCG_MODE != 0
    }

    #[must_use]
    pub fn pcg_bank(&self) -> u8 {
        self.pcg_bank
    }

    #[must_use]
    pub fn ipl_page(&self) -> u8 {
        self.ipl_page
    }

    /// Rebuild from snapshot fields.
    pub(crate) fn restore(&mut self, bits: u8, pcg_bank: u8, ipl_page: u8) {
        self.bits = bits;
        self.pcg_bank = pcg_bank;
        self.ipl_page = ipl_page;
    }
}

impl Default for ModeLatch {
    fn default() -> Self {
        Self::new()
    }
}
