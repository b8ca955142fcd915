//! Raster timing state machine.
//!
//! The MZ-700 has no CRTC chip; discrete logic counts 228 CPU clocks per
//! line and derives the blanking and sync signals. This module models the
//! flags that logic produces and the wires they drive.
//!
//! Per line, the host scheduler calls [`Crtc::begin_line`] at clock 0 and
//! then fires each entry of [`Crtc::line_schedule`] at its clock offset.
//! Vertical flags come from the line number alone and horizontal flags are
//! cleared at every line start, so nothing drifts across lines. Tempo and
//! blink are free-running and fired on their own periods.
//!
//! | signal  | wire                       | active |
//! |---------|----------------------------|--------|
//! | VBLANK  | 8255 PC7                   | low    |
//! | BLANK   | 8253 CLK1                  | low    |
//! | blink   | 8255 PC6 (556 output)      | toggle |
//! | PCG     | Z80 BUSREQ (MZ-1500)       | high   |

use crate::config::{MzModel, Timing};
use crate::peripherals::Peripherals;

/// A timed event delivered by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    HblankStart,
    BlankStart,
    BlankEnd,
    HsyncStart,
    HsyncEnd,
    /// MZ-1500 PCG access window opens.
    PcgWindow,
    /// Tempo square wave, toggled every CPU_CLOCK/64 clocks (32Hz).
    Tempo,
    /// Cursor blink, toggled every CPU_CLOCK/3 clocks (1.5Hz).
    Blink,
}

pub struct Crtc {
    timing: Timing,
    model: MzModel,
    line: u16,
    line_clock: u32,
    vblank: bool,
    vsync: bool,
    hblank: bool,
    hsync: bool,
    blank: bool,
    /// CPU accesses to VRAM are free while this is set.
    blank_vram: bool,
    /// PCG stall already taken (or window open) for this line.
    hblank_pcg: bool,
    tempo: bool,
    blink: bool,
}

impl Crtc {
    #[must_use]
    pub fn new(timing: Timing, model: MzModel) -> Self {
        Self {
            timing,
            model,
            line: 0,
            line_clock: 0,
            vblank: true,
            vsync: true,
            hblank: true,
            hsync: true,
            blank: false,
            blank_vram: true,
            hblank_pcg: true,
            tempo: false,
            blink: false,
        }
    }

    /// Reset: all blanking active until the first line starts.
    pub fn reset(&mut self, periph: &mut impl Peripherals) {
        self.blink = false;
        self.tempo = false;
        self.vblank = true;
        self.vsync = true;
        self.hblank = true;
        self.hsync = true;
        self.blank_vram = true;
        self.hblank_pcg = true;
        // The cassette motor sense is tied high.
        periph.pio_port_c(0xFF, 0x10);
    }

    /// Sub-line events in firing order: by clock, ties in declaration order.
    #[must_use]
    pub fn line_schedule(&self) -> Vec<(u32, Event)> {
        let t = &self.timing;
        let mut events = vec![
            (t.hblank_start, Event::HblankStart),
            (t.blank_start, Event::BlankStart),
            (t.blank_end, Event::BlankEnd),
            (t.hsync_start, Event::HsyncStart),
            (t.hsync_end, Event::HsyncEnd),
        ];
        if self.model == MzModel::Mz1500 {
            events.push((t.pcg_window, Event::PcgWindow));
        }
        events.sort_by_key(|&(clock, _)| clock);
        events
    }

    /// Start of a scanline. Returns whether the line is visible and should
    /// be drawn now.
    pub fn begin_line(&mut self, line: u16, periph: &mut impl Peripherals) -> bool {
        self.line = line;
        self.line_clock = 0;

        self.set_vblank(line >= self.timing.visible_lines, periph);
        self.vsync = (self.timing.vsync_start..=self.timing.vsync_end).contains(&line);

        self.hblank = false;
        self.hsync = false;
        self.set_blank(false, periph);
        if self.model == MzModel::Mz1500 {
            self.hblank_pcg = false;
        }
        self.blank_vram = false;

        line < self.timing.visible_lines
    }

    pub fn fire(&mut self, event: Event, periph: &mut impl Peripherals) {
        match event {
            Event::Tempo => {
                self.tempo = !self.tempo;
                periph.tempo_changed(self.tempo);
            }
            Event::Blink => {
                self.blink = !self.blink;
                periph.pio_port_c(if self.blink { 0xFF } else { 0x00 }, 0x40);
            }
            Event::HblankStart => self.hblank = true,
            Event::BlankStart => {
                self.set_blank(true, periph);
                self.blank_vram = true;
            }
            Event::BlankEnd => {
                self.set_blank(false, periph);
                self.blank_vram = false;
            }
            Event::HsyncStart => self.hsync = true,
            Event::HsyncEnd => self.hsync = false,
            Event::PcgWindow => {
                if self.hblank_pcg {
                    periph.set_bus_request(false);
                }
                self.hblank_pcg = true;
            }
        }
    }

    /// CPU touched PCG memory on the MZ-1500. Stalls the bus once per line
    /// if the access window is not open yet.
    pub fn pcg_access(&mut self, periph: &mut impl Peripherals) {
        if !self.hblank_pcg {
            periph.set_bus_request(true);
            self.hblank_pcg = true;
        }
    }

    /// Wait states for a VRAM access at the current clock: the clocks left
    /// until blanking plus the tail of the CPU's M-cycle.
    #[must_use]
    pub fn vram_wait(&self, mcycle_tstates: u8) -> u8 {
        let left = i64::from(self.timing.blank_start) - i64::from(self.line_clock);
        if left > 0 {
            let wait = left + i64::from(mcycle_tstates) + 2;
            u8::try_from(wait).unwrap_or(u8::MAX)
        } else {
            0
        }
    }

    fn set_vblank(&mut self, value: bool, periph: &mut impl Peripherals) {
        if self.vblank != value {
            periph.pio_port_c(if value { 0x00 } else { 0xFF }, 0x80);
            self.vblank = value;
        }
    }

    fn set_blank(&mut self, value: bool, periph: &mut impl Peripherals) {
        if self.blank != value {
            periph.pit_clock1(!value);
            self.blank = value;
        }
    }

    /// Host scheduler position within the line.
    pub fn set_line_clock(&mut self, clock: u32) {
        self.line_clock = clock;
    }

    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    #[must_use]
    pub fn line(&self) -> u16 {
        self.line
    }

    #[must_use]
    pub fn line_clock(&self) -> u32 {
        self.line_clock
    }

    #[must_use]
    pub fn vblank(&self) -> bool {
        self.vblank
    }

    #[must_use]
    pub fn vsync(&self) -> bool {
        self.vsync
    }

    #[must_use]
    pub fn hblank(&self) -> bool {
        self.hblank
    }

    #[must_use]
    pub fn hsync(&self) -> bool {
        self.hsync
    }

    #[must_use]
    pub fn blank(&self) -> bool {
        self.blank
    }

    #[must_use]
    pub fn blank_vram(&self) -> bool {
        self.blank_vram
    }

    #[must_use]
    pub fn hblank_pcg(&self) -> bool {
        self.hblank_pcg
    }

    #[must_use]
    pub fn tempo(&self) -> bool {
        self.tempo
    }

    #[must_use]
    pub fn blink(&self) -> bool {
        self.blink
    }

    pub(crate) fn flags(&self) -> [bool; 9] {
        [
            self.blink,
            self.tempo,
            self.blank,
            self.hblank,
            self.hsync,
            self.vblank,
            self.vsync,
            self.blank_vram,
            self.hblank_pcg,
        ]
    }

    pub(crate) fn restore(&mut self, flags: [bool; 9], line: u16, line_clock: u32) {
        [
            self.blink,
            self.tempo,
            self.blank,
            self.hblank,
            self.hsync,
            self.vblank,
            self.vsync,
            self.blank_vram,
            self.hblank_pcg,
        ] = flags;
        self.line = line;
        self.line_clock = line_clock;
    }
}
