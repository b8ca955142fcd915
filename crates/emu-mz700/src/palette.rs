//! MZ-700 8-colour palette.
//!
//! Colour codes are 3-bit GRB: bit 0 blue, bit 1 red, bit 2 green. The
//! MZ-1500 palette registers remap codes before this table is applied.

/// ARGB32 palette, indexed by colour code.
pub const PALETTE: [u32; 8] = [
    0xFF00_0000, // 0: Black
    0xFF00_00FF, // 1: Blue
    0xFFFF_0000, // 2: Red
    0xFFFF_00FF, // 3: Magenta
    0xFF00_FF00, // 4: Green
    0xFF00_FFFF, // 5: Cyan
    0xFFFF_FF00, // 6: Yellow
    0xFFFF_FFFF, // 7: White
];

/// Opaque black, used for scanline gaps.
pub const BLACK: u32 = PALETTE[0];

/// Half of each of two colours, channel by channel.
#[must_use]
pub const fn blend(current: u32, previous: u32) -> u32 {
    0xFF00_0000 | (((current >> 1) & 0x007F_7F7F) + ((previous >> 1) & 0x007F_7F7F))
}
