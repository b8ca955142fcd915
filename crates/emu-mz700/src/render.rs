//! Character display.
//!
//! VRAM layout (4KB at $D000):
//!
//! | offset      | contents                                    |
//! |-------------|---------------------------------------------|
//! | $000-$3E7   | character codes, 40 x 25                    |
//! | $400-$7E7   | MZ-1500 PCG codes                           |
//! | $800-$BE7   | attributes: bit 7 CG bank, 6-4 fg, 3 bank (MZ-700), 2-0 bg |
//! | $C00-$FE7   | MZ-1500 PCG attributes: 7-6 bank, 3 enable  |
//!
//! Lines are drawn one at a time into a 320x200 buffer of colour codes as
//! the raster reaches them, so mid-frame VRAM writes show up where the beam
//! was. Once a frame, [`Renderer::present`] expands the codes into the
//! 640x400 ARGB32 framebuffer.

use crate::palette::{self, BLACK, PALETTE};

pub const SCREEN_WIDTH: usize = 320;
pub const SCREEN_HEIGHT: usize = 200;
pub const OUTPUT_WIDTH: usize = SCREEN_WIDTH * 2;
pub const OUTPUT_HEIGHT: usize = SCREEN_HEIGHT * 2;

const COLUMNS: usize = 40;

/// MZ-1500 overlay inputs.
pub struct Overlay<'a> {
    /// Three 8KB planes: blue, red, green.
    pub pcg: &'a [u8],
    /// Priority register ($F0): bit 0 enables the overlay, bit 1 puts PCG
    /// in front of text.
    pub priority: u8,
}

/// Everything one line reads.
pub struct LineSource<'a> {
    pub vram: &'a [u8],
    /// Text patterns: CG ROM, or the PCG-700 buffer when it is switched in.
    pub patterns: &'a [u8],
    /// Attribute bit 3 extends the character code (MZ-700).
    pub attr_bank: bool,
    pub overlay: Option<Overlay<'a>>,
}

pub struct Renderer {
    screen: Vec<u8>,
    /// Last presented frame, for colour blending.
    previous: Vec<u8>,
    framebuffer: Vec<u32>,
    colour_blend: bool,
    scanlines: bool,
}

impl Renderer {
    #[must_use]
    pub fn new(colour_blend: bool, scanlines: bool) -> Self {
        Self {
            screen: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            previous: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            framebuffer: vec![BLACK; OUTPUT_WIDTH * OUTPUT_HEIGHT],
            colour_blend,
            scanlines,
        }
    }

    /// Draw scanline `v` (0..200) into the colour-code buffer.
    pub fn draw_line(&mut self, v: usize, src: &LineSource<'_>) {
        if v >= SCREEN_HEIGHT {
            return;
        }
        let row = v & 7;
        let first = COLUMNS * (v >> 3);
        let dest_line = &mut self.screen[v * SCREEN_WIDTH..(v + 1) * SCREEN_WIDTH];

        for (col, dest) in dest_line.chunks_exact_mut(8).enumerate() {
            let ptr = first + col;
            let attr = fetch(src.vram, ptr | 0x800);
            let mut code = (usize::from(fetch(src.vram, ptr)) << 3) | (usize::from(attr & 0x80) << 4);
            if src.attr_bank {
                code |= usize::from(attr & 0x08) << 10;
            }
            let bg = attr & 7;
            let fg = (attr >> 4) & 7;
            let text = fetch(src.patterns, code | row);

            let overlay = src.overlay.as_ref().and_then(|overlay| {
                let pcg_attr = fetch(src.vram, ptr | 0xC00);
                if overlay.priority & 1 == 0 || pcg_attr & 0x08 == 0 {
                    return None;
                }
                let pcg_code = (usize::from(fetch(src.vram, ptr | 0x400)) << 3)
                    | (usize::from(pcg_attr & 0xC0) << 5);
                let base = pcg_code | row;
                let planes = [
                    fetch(overlay.pcg, base),
                    fetch(overlay.pcg, base | 0x2000),
                    fetch(overlay.pcg, base | 0x4000),
                ];
                Some((planes, overlay.priority & 2 != 0))
            });

            for (bit, pixel) in dest.iter_mut().enumerate() {
                let mask = 0x80 >> bit;
                let text_on = text & mask != 0;
                *pixel = match overlay {
                    None => {
                        if text_on {
                            fg
                        } else {
                            bg
                        }
                    }
                    Some(([b, r, g], pcg_front)) => {
                        let dot = u8::from(b & mask != 0)
                            | (u8::from(r & mask != 0) << 1)
                            | (u8::from(g & mask != 0) << 2);
                        match (pcg_front, text_on) {
                            (true, _) if dot != 0 => dot,
                            (_, true) => fg,
                            (_, false) if dot != 0 => dot,
                            _ => bg,
                        }
                    }
                };
            }
        }
    }

    /// Expand the colour codes into the framebuffer. `palette` remaps codes
    /// first (identity on the MZ-700).
    pub fn present(&mut self, palette: &[u8; 8]) {
        let lookup = |code: u8| PALETTE[usize::from(palette[usize::from(code & 7)] & 7)];

        for y in 0..SCREEN_HEIGHT {
            let src = &self.screen[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH];
            let old = &self.previous[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH];
            let (top, bottom) = self.framebuffer
                [2 * y * OUTPUT_WIDTH..(2 * y + 2) * OUTPUT_WIDTH]
                .split_at_mut(OUTPUT_WIDTH);

            for (x, pair) in top.chunks_exact_mut(2).enumerate() {
                let colour = if self.colour_blend {
                    palette::blend(lookup(src[x]), lookup(old[x]))
                } else {
                    lookup(src[x])
                };
                pair.fill(colour);
            }

            if self.scanlines {
                bottom.fill(BLACK);
            } else {
                bottom.copy_from_slice(top);
            }
        }

        if self.colour_blend {
            self.previous.copy_from_slice(&self.screen);
        }
    }

    /// Colour codes, 320x200.
    #[must_use]
    pub fn screen(&self) -> &[u8] {
        &self.screen
    }

    /// ARGB32, 640x400.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }
}

fn fetch(mem: &[u8], index: usize) -> u8 {
    if mem.is_empty() {
        0
    } else {
        mem[index % mem.len()]
    }
}
