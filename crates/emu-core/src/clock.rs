//! Master clock configuration.

/// The clock every component of a machine counts in.
///
/// On the 8-bit machines emulated here this is the CPU clock; periodic
/// events are expressed as a number of these clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Frequency in Hz (e.g. `3_579_545` for an NTSC colour-burst crystal).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Clocks between events of a periodic signal toggling at `rate_hz`
    /// (integer division, as hardware dividers truncate).
    #[must_use]
    pub const fn period_of(&self, rate_hz: u64) -> u64 {
        self.frequency_hz / rate_hz
    }
}
