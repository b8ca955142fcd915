//! MZ-700 / MZ-1500 bus controller.
//!
//! Every CPU memory access goes through [`MzBus`]. The order of decoding:
//!
//! 1. Monitor-low set and address below $1000: one wait state. With flash
//!    boot storage the access goes to the flash chip at
//!    `ipl_page * 0x1000 + addr` and never reaches the bank map.
//! 2. Monitor-high set and address in $D000-$DFFF: the access waits until
//!    horizontal blanking (see [`Crtc::vram_wait`]).
//! 3. MZ-1500 PCG mode and address in $D000-$EFFF: BUSREQ stall once per
//!    line until the PCG window opens.
//! 4. Monitor-high set, not PCG mode: $E000-$E00F go to the 8255/8253 and
//!    $E010-$E012 to the PCG-700 board (MZ-700).
//! 5. Everything else resolves through the bank map.
//!
//! I/O ports only drive the mode latch and the MZ-1500 display registers;
//! every IN returns $FF.

use emu_core::{Bus, Observable, ReadResult, Value};
use log::debug;
use sst_39sf040::Sst39sf040;

use crate::bank::{BankMap, Target};
use crate::config::{BootStorage, MzConfig, MzModel};
use crate::crtc::{Crtc, Event};
use crate::latch::ModeLatch;
use crate::memory::{FONT_SIZE, Memories};
use crate::pcg::Pcg700;
use crate::peripherals::{NullPeripherals, Peripherals};
use crate::render::{LineSource, Overlay, Renderer, SCREEN_HEIGHT};

/// Wait states for any access to the monitor ROM window.
const MONITOR_WAIT: u8 = 1;

const IDENTITY_PALETTE: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

pub struct MzBus<P: Peripherals = NullPeripherals> {
    pub(crate) config: MzConfig,
    pub(crate) mem: Memories,
    pub(crate) map: BankMap,
    pub(crate) latch: ModeLatch,
    pub(crate) pcg700: Pcg700,
    /// MZ-1500 priority register ($F0).
    pub(crate) priority: u8,
    /// MZ-1500 palette registers ($F1).
    pub(crate) palette: [u8; 8],
    pub(crate) crtc: Crtc,
    pub(crate) renderer: Renderer,
    pub(crate) flash: Option<Sst39sf040>,
    periph: P,
}

impl<P: Peripherals> MzBus<P> {
    /// Power-on state: blank memories, flat RAM map. Call [`reset`](Self::reset)
    /// before running.
    #[must_use]
    pub fn new(config: &MzConfig, periph: P) -> Self {
        let mut mem = Memories::new(config.model);
        if config.model == MzModel::Mz700 {
            mem.init_pcg700();
        }
        let flash = (config.boot_storage == BootStorage::Flash).then(Sst39sf040::new);
        Self {
            config: config.clone(),
            mem,
            map: BankMap::all_ram(),
            latch: ModeLatch::new(),
            pcg700: Pcg700::new(),
            priority: 0,
            palette: IDENTITY_PALETTE,
            crtc: Crtc::new(config.standard.timing(), config.model),
            renderer: Renderer::new(config.colour_blend, config.scanlines),
            flash,
            periph,
        }
    }

    pub fn reset(&mut self) {
        self.latch.reset();
        self.map.derive(&self.latch, self.config.model);
        self.crtc.reset(&mut self.periph);
        self.pcg700.reset();
        self.priority = 0;
        self.palette = IDENTITY_PALETTE;
        if let Some(flash) = self.flash.as_mut() {
            flash.reset();
        }
    }

    /// Install an IPL ROM image. Short images fill a prefix.
    pub fn load_ipl(&mut self, image: &[u8]) {
        copy_prefix(&mut self.mem.ipl, image);
    }

    /// Install the MZ-1500 EXT ROM image.
    pub fn load_ext(&mut self, image: &[u8]) {
        copy_prefix(&mut self.mem.ext, image);
    }

    /// Install the character ROM. A 4KB CG ROM is mirrored into the upper
    /// half of the 8KB space. On the MZ-700 the PCG-700 pass-through halves
    /// are refreshed from it.
    pub fn load_font(&mut self, image: &[u8]) {
        copy_prefix(&mut self.mem.font, image);
        if image.len() < FONT_SIZE {
            self.mem.font.copy_within(0..FONT_SIZE / 2, FONT_SIZE / 2);
        }
        if self.config.model == MzModel::Mz700 {
            self.mem.init_pcg700();
        }
    }

    /// Start of scanline `line`: update the raster flags and draw the line
    /// if it is visible. Must come before any of the line's sub-events.
    pub fn begin_line(&mut self, line: u16) {
        if self.crtc.begin_line(line, &mut self.periph) {
            self.draw_line(usize::from(line));
        }
    }

    /// Deliver a timed event.
    pub fn fire(&mut self, event: Event) {
        self.crtc.fire(event, &mut self.periph);
    }

    /// Tell the controller how many clocks have passed since the current
    /// line started. Used for VRAM wait states.
    pub fn set_line_clock(&mut self, clock: u32) {
        self.crtc.set_line_clock(clock);
    }

    /// Re-render every visible line from current VRAM (debugger view).
    pub fn redraw_all(&mut self) {
        for v in 0..SCREEN_HEIGHT {
            self.draw_line(v);
        }
    }

    /// Build the output framebuffer from the drawn lines.
    pub fn present(&mut self) {
        let palette = match self.config.model {
            MzModel::Mz700 => IDENTITY_PALETTE,
            MzModel::Mz1500 => self.palette,
        };
        self.renderer.present(&palette);
    }

    fn draw_line(&mut self, v: usize) {
        let model = self.config.model;
        let patterns: &[u8] =
            if model == MzModel::Mz700 && self.pcg700.display_enabled(self.config.pcg700) {
                &self.mem.pcg
            } else {
                &self.mem.font
            };
        let overlay = (model == MzModel::Mz1500).then(|| Overlay {
            pcg: &self.mem.pcg,
            priority: self.priority,
        });
        let src = LineSource {
            vram: &self.mem.vram,
            patterns,
            attr_bank: model == MzModel::Mz700,
            overlay,
        };
        self.renderer.draw_line(v, &src);
    }

    /// Byte the CPU would read, without wait states or side effects.
    /// Memory-mapped I/O reads through to the bank map underneath.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        if self.latch.mon_low() && addr < 0x1000 {
            if let Some(flash) = &self.flash {
                return flash.peek(self.flash_address(addr));
            }
        }
        self.map.read(&self.mem, addr)
    }

    fn flash_address(&self, addr: u16) -> u32 {
        u32::from(self.latch.ipl_page()) * 0x1000 + u32::from(addr)
    }

    fn pcg_mode(&self) -> bool {
        self.config.model == MzModel::Mz1500 && self.latch.pcg_mode()
    }

    /// Wait states for an access outside the flash window.
    fn access_wait(&self, addr: u16) -> u8 {
        if self.latch.mon_low() && addr < 0x1000 {
            MONITOR_WAIT
        } else if self.latch.mon_high() && (0xD000..=0xDFFF).contains(&addr) {
            self.crtc.vram_wait(self.periph.cpu_mcycle_tstates())
        } else {
            0
        }
    }

    fn read_data(&mut self, addr: u16) -> u8 {
        if self.pcg_mode() {
            if (0xD000..=0xEFFF).contains(&addr) {
                self.crtc.pcg_access(&mut self.periph);
            }
        } else if self.latch.mon_high() && (0xE000..=0xE00F).contains(&addr) {
            let reg = (addr & 3) as u8;
            return match addr & 0x0F {
                0x0..=0x3 => self.periph.pio_read(reg),
                0x4..=0x7 => self.periph.pit_read(reg),
                0x8 => {
                    let hblank = if self.crtc.hblank() { 0x00 } else { 0x80 };
                    hblank | u8::from(self.crtc.tempo()) | 0x7E
                }
                _ => 0xFF,
            };
        }
        self.map.read(&self.mem, addr)
    }

    fn write_data(&mut self, addr: u16, value: u8) {
        if self.pcg_mode() {
            if (0xD000..=0xEFFF).contains(&addr) {
                self.crtc.pcg_access(&mut self.periph);
            }
        } else if self.latch.mon_high() {
            if (0xE000..=0xE00F).contains(&addr) {
                let reg = (addr & 3) as u8;
                match addr & 0x0F {
                    0x0..=0x3 => self.periph.pio_write(reg, value),
                    0x4..=0x7 => self.periph.pit_write(reg, value),
                    0x8 => self.periph.pit_gate0(value & 1 != 0),
                    _ => {}
                }
                return;
            }
            if self.config.model == MzModel::Mz700 && (0xE010..=0xE012).contains(&addr) {
                self.pcg700
                    .write(addr - 0xE010, value, &mut self.mem.pcg, &self.mem.font);
                return;
            }
        }
        self.map.write(&mut self.mem, addr, value);
    }

    fn write_port(&mut self, port: u8, data: u8) {
        let model = self.config.model;
        match port {
            0xF0 if model == MzModel::Mz1500 => self.priority = data,
            0xF1 if model == MzModel::Mz1500 => {
                self.palette[usize::from((data >> 4) & 7)] = data & 7;
            }
            _ => {
                let remap = self.latch.write_port(port, data, model);
                if remap.low {
                    self.map.derive_low(&self.latch);
                }
                if remap.high {
                    self.map.derive_high(&self.latch, model);
                }
            }
        }
    }

    #[must_use]
    pub fn config(&self) -> &MzConfig {
        &self.config
    }

    #[must_use]
    pub fn latch(&self) -> &ModeLatch {
        &self.latch
    }

    #[must_use]
    pub fn crtc(&self) -> &Crtc {
        &self.crtc
    }

    #[must_use]
    pub fn memories(&self) -> &Memories {
        &self.mem
    }

    #[must_use]
    pub fn bank_map(&self) -> &BankMap {
        &self.map
    }

    #[must_use]
    pub fn pcg700(&self) -> &Pcg700 {
        &self.pcg700
    }

    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    #[must_use]
    pub fn palette(&self) -> &[u8; 8] {
        &self.palette
    }

    #[must_use]
    pub fn flash(&self) -> Option<&Sst39sf040> {
        self.flash.as_ref()
    }

    pub fn flash_mut(&mut self) -> Option<&mut Sst39sf040> {
        self.flash.as_mut()
    }

    #[must_use]
    pub fn peripherals(&self) -> &P {
        &self.periph
    }

    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.periph
    }

    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// ARGB32 output, 640x400.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.renderer.framebuffer()
    }
}

impl<P: Peripherals> Bus for MzBus<P> {
    fn read(&mut self, addr: u32) -> ReadResult {
        let addr = addr as u16;
        if self.latch.mon_low() && addr < 0x1000 {
            let target = self.flash_address(addr);
            if let Some(flash) = self.flash.as_mut() {
                return ReadResult::with_wait(flash.read(target), MONITOR_WAIT);
            }
        }
        let wait = self.access_wait(addr);
        ReadResult::with_wait(self.read_data(addr), wait)
    }

    fn write(&mut self, addr: u32, value: u8) -> u8 {
        let addr = addr as u16;
        if self.latch.mon_low() && addr < 0x1000 {
            let target = self.flash_address(addr);
            if let Some(flash) = self.flash.as_mut() {
                flash.write(target, value);
                return MONITOR_WAIT;
            }
        }
        let wait = self.access_wait(addr);
        self.write_data(addr, value);
        wait
    }

    fn io_read(&mut self, addr: u32) -> ReadResult {
        if addr & 0xFF == 0xFF {
            let page = (addr >> 8) as u8;
            debug!("boot storage page {page:02X}");
            self.latch.select_ipl_page(page);
        }
        ReadResult::new(0xFF)
    }

    fn io_write(&mut self, addr: u32, value: u8) -> u8 {
        self.write_port(addr as u8, value);
        0
    }
}

impl<P: Peripherals> Observable for MzBus<P> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("latch.") {
            let latch = &self.latch;
            match rest {
                "bits" => Some(latch.bits().into()),
                "mon_low" => Some(latch.mon_low().into()),
                "mon_high" => Some(latch.mon_high().into()),
                "pcg_mode" => Some(latch.pcg_mode().into()),
                "pcg_bank" => Some(latch.pcg_bank().into()),
                "ipl_page" => Some(latch.ipl_page().into()),
                "priority" => Some(self.priority.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("crtc.") {
            let crtc = &self.crtc;
            match rest {
                "line" => Some(crtc.line().into()),
                "clock" => Some(crtc.line_clock().into()),
                "vblank" => Some(crtc.vblank().into()),
                "vsync" => Some(crtc.vsync().into()),
                "hblank" => Some(crtc.hblank().into()),
                "hsync" => Some(crtc.hsync().into()),
                "blank" => Some(crtc.blank().into()),
                "blank_vram" => Some(crtc.blank_vram().into()),
                "tempo" => Some(crtc.tempo().into()),
                "blink" => Some(crtc.blink().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("flash.") {
            let flash = self.flash.as_ref()?;
            match rest {
                "cycle" => Some(flash.cycle().name().into()),
                "busy" => Some(flash.busy().into()),
                "software_id" => Some(flash.software_id_mode().into()),
                "modified" => Some(flash.is_modified().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|a| Value::U8(self.peek(a)))
        } else if let Some(rest) = path.strip_prefix("bank.") {
            // Region the window containing the address reads from.
            let window = self.map.window(parse_address(rest)?);
            let name = match window.read {
                Target::Dummy => "dummy",
                Target::Mapped { region, .. } => region.name(),
            };
            Some(name.into())
        } else {
            None
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "latch.bits",
            "latch.mon_low",
            "latch.mon_high",
            "latch.pcg_mode",
            "latch.pcg_bank",
            "latch.ipl_page",
            "latch.priority",
            "crtc.line",
            "crtc.clock",
            "crtc.vblank",
            "crtc.vsync",
            "crtc.hblank",
            "crtc.hsync",
            "crtc.blank",
            "crtc.blank_vram",
            "crtc.tempo",
            "crtc.blink",
            "flash.cycle",
            "flash.busy",
            "flash.software_id",
            "flash.modified",
            "memory.<address>",
            "bank.<address>",
        ]
    }
}

/// `0x`/`$` hex or decimal.
fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn copy_prefix(dest: &mut [u8], image: &[u8]) {
    let len = image.len().min(dest.len());
    dest[..len].copy_from_slice(&image[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoStandard;

    fn make_bus(model: MzModel) -> MzBus {
        let mut bus = MzBus::new(&MzConfig::new(model, VideoStandard::Ntsc), NullPeripherals);
        bus.reset();
        bus
    }

    #[test]
    fn monitor_rom_read_costs_one_wait() {
        let mut bus = make_bus(MzModel::Mz700);
        let mut ipl = vec![0u8; 0x1000];
        ipl[0x10] = 0xC3;
        bus.load_ipl(&ipl);
        let result = bus.read(0x0010);
        assert_eq!(result.data, 0xC3);
        assert_eq!(result.wait, 1);
        assert_eq!(bus.write(0x0010, 0x00), 1);
        assert_eq!(bus.read(0x0010).data, 0xC3);
    }

    #[test]
    fn monitor_out_exposes_ram() {
        let mut bus = make_bus(MzModel::Mz700);
        bus.io_write(0xE0, 0);
        assert_eq!(bus.write(0x0010, 0x5A), 0);
        assert_eq!(bus.read(0x0010), ReadResult::new(0x5A));
    }

    #[test]
    fn vram_wait_before_blank() {
        let mut bus = make_bus(MzModel::Mz700);
        bus.begin_line(0);
        bus.set_line_clock(150);
        assert_eq!(bus.read(0xD000).wait, 10 + 2);
        bus.set_line_clock(170);
        assert_eq!(bus.read(0xD000).wait, 0);
        assert_eq!(bus.read(0xE800).wait, 0);
    }

    #[test]
    fn mmio_status_register() {
        let mut bus = make_bus(MzModel::Mz700);
        bus.begin_line(0);
        assert_eq!(bus.read(0xE008).data, 0xFE);
        bus.fire(Event::HblankStart);
        bus.fire(Event::Tempo);
        assert_eq!(bus.read(0xE008).data, 0x7F);
        assert_eq!(bus.read(0xE00C).data, 0xFF);
    }

    #[test]
    fn pcg700_port_writes_pattern() {
        let mut bus = make_bus(MzModel::Mz700);
        bus.write(0xE012, 0x00);
        bus.write(0xE010, 0xA5);
        bus.write(0xE011, 0x08);
        bus.write(0xE012, 0x10);
        assert_eq!(bus.memories().pcg[0x408], 0xA5);
    }

    #[test]
    fn pcg700_port_absent_on_mz1500() {
        let mut bus = make_bus(MzModel::Mz1500);
        bus.write(0xE012, 0x00);
        bus.write(0xE012, 0x10);
        assert_eq!(bus.pcg700().registers(), (0, 0, 0xFF));
    }

    #[test]
    fn io_reads_are_ff_and_latch_ipl_page() {
        let mut bus = make_bus(MzModel::Mz700);
        assert_eq!(bus.io_read(0x03FF).data, 0xFF);
        assert_eq!(bus.latch().ipl_page(), 3);
        assert_eq!(bus.io_read(0x05FE).data, 0xFF);
        assert_eq!(bus.latch().ipl_page(), 3);
    }

    #[test]
    fn mz1500_palette_and_priority_ports() {
        let mut bus = make_bus(MzModel::Mz1500);
        bus.io_write(0xF0, 0x03);
        bus.io_write(0xF1, 0x52);
        assert_eq!(bus.priority(), 3);
        assert_eq!(bus.palette()[5], 2);
        bus.reset();
        assert_eq!(bus.palette(), &IDENTITY_PALETTE);
    }

    #[test]
    fn font_mirrors_short_image() {
        let mut bus = make_bus(MzModel::Mz700);
        let font: Vec<u8> = (0..0x1000).map(|i| i as u8).collect();
        bus.load_font(&font);
        assert_eq!(bus.memories().font[0x1234], 0x34);
        // PCG-700 pass-through halves follow the font.
        assert_eq!(bus.memories().pcg[0x812], 0x12);
    }

    #[test]
    fn redraw_all_uses_current_vram() {
        let mut bus = make_bus(MzModel::Mz700);
        bus.io_write(0xE3, 0);
        bus.write(0xD800, 0x24);
        bus.redraw_all();
        assert_eq!(bus.renderer().screen()[0], 4);
        assert_eq!(bus.renderer().screen()[8], 1);
    }

    #[test]
    fn observable_paths() {
        let mut bus = make_bus(MzModel::Mz700);
        bus.begin_line(12);
        assert_eq!(bus.query("crtc.line"), Some(Value::U16(12)));
        assert_eq!(bus.query("latch.mon_low"), Some(Value::Bool(true)));
        assert_eq!(bus.query("memory.0xD800"), Some(Value::U8(0x71)));
        assert_eq!(bus.query("flash.busy"), None);
        assert_eq!(bus.query("nonsense"), None);
    }

    #[test]
    fn bank_path_names_window_region() {
        let mut bus = make_bus(MzModel::Mz1500);
        assert_eq!(bus.query("bank.0x0000"), Some(Value::from("ipl")));
        assert_eq!(bus.query("bank.$D800"), Some(Value::from("vram")));
        assert_eq!(bus.query("bank.59392"), Some(Value::from("ext")));
        assert_eq!(bus.query("bank.0xE000"), Some(Value::from("dummy")));
        bus.io_write(0xE5, 0);
        assert_eq!(bus.query("bank.0xD000"), Some(Value::from("font")));
        bus.io_write(0xE0, 0);
        assert_eq!(bus.query("bank.0x0800"), Some(Value::from("ram")));
        assert_eq!(bus.query("bank.zz"), None);
    }
}
