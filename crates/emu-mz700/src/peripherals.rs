//! Devices the bus controller talks to but does not own.
//!
//! The 8255 PIO, the 8253 PIT and the Z80 itself live outside this crate.
//! The controller reaches them only through these calls: register access for
//! the memory-mapped I/O block, and level changes on the wires it drives.

/// Signal and register interface to the surrounding machine.
///
/// Every method has a no-op default so a host wires up only what it models.
pub trait Peripherals {
    /// 8255 register read ($E000-$E003).
    fn pio_read(&mut self, _reg: u8) -> u8 {
        0xFF
    }

    /// 8255 register write.
    fn pio_write(&mut self, _reg: u8, _value: u8) {}

    /// Drive the 8255 port C input bits selected by `mask`.
    ///
    /// Bit 7 is /VBLANK, bit 6 the cursor blink, bit 4 the cassette motor.
    fn pio_port_c(&mut self, _value: u8, _mask: u8) {}

    /// 8253 register read ($E004-$E007).
    fn pit_read(&mut self, _reg: u8) -> u8 {
        0xFF
    }

    /// 8253 register write.
    fn pit_write(&mut self, _reg: u8, _value: u8) {}

    /// 8253 GATE0, written through $E008 bit 0.
    fn pit_gate0(&mut self, _level: bool) {}

    /// 8253 CLK1, driven by /BLANK.
    fn pit_clock1(&mut self, _level: bool) {}

    /// Assert or release the Z80 BUSREQ line.
    fn set_bus_request(&mut self, _asserted: bool) {}

    /// The tempo square wave changed level.
    fn tempo_changed(&mut self, _level: bool) {}

    /// T-states of the CPU's previous M-cycle, used for the VRAM wait tail.
    fn cpu_mcycle_tstates(&self) -> u8 {
        0
    }
}

/// Nothing attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPeripherals;

impl Peripherals for NullPeripherals {}
