//! Memory and I/O bus interface.

/// Result of a bus read: the data byte plus the wait states the access cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    pub data: u8,
    /// Extra CPU T-states inserted before the access completes.
    pub wait: u8,
}

impl ReadResult {
    #[must_use]
    pub const fn new(data: u8) -> Self {
        Self { data, wait: 0 }
    }

    #[must_use]
    pub const fn with_wait(data: u8, wait: u8) -> Self {
        Self { data, wait }
    }
}

/// Memory and I/O bus seen by a CPU core.
///
/// Memory and I/O are separate address spaces (Z80 style). Writes return the
/// wait states they cost; reads carry them in [`ReadResult`].
pub trait Bus {
    /// Read a byte from memory.
    fn read(&mut self, addr: u32) -> ReadResult;

    /// Write a byte to memory. Returns wait states.
    fn write(&mut self, addr: u32, value: u8) -> u8;

    /// Read a byte from an I/O port. The full 16-bit port address is passed
    /// because some machines decode the high byte.
    fn io_read(&mut self, addr: u32) -> ReadResult;

    /// Write a byte to an I/O port. Returns wait states.
    fn io_write(&mut self, addr: u32, value: u8) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_result_defaults_to_no_wait() {
        let r = ReadResult::new(0x42);
        assert_eq!(r.data, 0x42);
        assert_eq!(r.wait, 0);
        assert_eq!(ReadResult::with_wait(0x42, 3).wait, 3);
    }
}
