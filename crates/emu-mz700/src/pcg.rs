//! PCG-700 programmable character generator board (MZ-700).
//!
//! The board sits behind three memory-mapped registers while VRAM is paged
//! in:
//!
//! - `$E010` data latch
//! - `$E011` address latch (low 8 bits of the cell offset)
//! - `$E012` control
//!
//! Control bits 1-0 supply offset bits 9-8 and bit 2 selects the upper
//! (`$C00`) or lower (`$400`) writable half. A rising edge on bit 4 stores
//! one byte: the data latch, or the CG ROM byte at the same offset when
//! bit 5 is set. Bit 3 clear switches the display over to the PCG.

/// The three PCG-700 registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcg700 {
    data: u8,
    addr: u8,
    ctrl: u8,
}

impl Pcg700 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: 0,
            addr: 0,
            ctrl: 0xFF,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Register write; `reg` is the offset from `$E010`.
    pub fn write(&mut self, reg: u16, value: u8, pcg: &mut [u8], font: &[u8]) {
        match reg {
            0 => self.data = value,
            1 => self.addr = value,
            2 => {
                if self.ctrl & 0x10 == 0 && value & 0x10 != 0 {
                    let half = if value & 0x04 != 0 { 0xC00 } else { 0x400 };
                    let offset = usize::from(self.addr) | (usize::from(value & 3) << 8) | half;
                    let byte = if value & 0x20 != 0 {
                        font.get(offset).copied().unwrap_or(0)
                    } else {
                        self.data
                    };
                    if let Some(cell) = pcg.get_mut(offset) {
                        *cell = byte;
                    }
                }
                self.ctrl = value;
            }
            _ => {}
        }
    }

    /// Whether the display reads patterns from the PCG instead of CG ROM.
    #[must_use]
    pub fn display_enabled(&self, fitted: bool) -> bool {
        fitted && self.ctrl & 0x08 == 0
    }

    #[must_use]
    pub fn registers(&self) -> (u8, u8, u8) {
        (self.data, self.addr, self.ctrl)
    }

    pub(crate) fn restore(&mut self, data: u8, addr: u8, ctrl: u8) {
        self.data = data;
        self.addr = addr;
        self.ctrl = ctrl;
    }
}

impl Default for Pcg700 {
    fn default() -> Self {
        Self::new()
    }
}
