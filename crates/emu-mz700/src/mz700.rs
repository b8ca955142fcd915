//! Top-level machine driver and event scheduler.
//!
//! The driver ticks once per CPU clock. At clock 0 of every line it starts
//! the line on the bus, then fires the line's sub-events as their clock
//! offsets come up, in the order [`Crtc::line_schedule`] gives. Tempo and
//! blink run off their own countdowns, independent of the raster. After
//! the last line of a frame the framebuffer is presented.
//!
//! The CPU is not part of this crate; a host runs it against
//! [`Mz700::bus_mut`] between ticks.
//!
//! [`Crtc::line_schedule`]: crate::Crtc::line_schedule

use std::io;

use emu_core::{MasterClock, Observable, Tickable, Value};
use log::{info, warn};

use crate::bus::MzBus;
use crate::config::{MzConfig, Timing};
use crate::crtc::Event;
use crate::peripherals::{NullPeripherals, Peripherals};
use crate::render::{OUTPUT_HEIGHT, OUTPUT_WIDTH};
use crate::rom;
use crate::snapshot::{Reader, SnapshotError};

/// Tempo toggles per second.
const TEMPO_RATE: u64 = 64;
/// Blink toggles per second.
const BLINK_RATE: u64 = 3;

/// Scheduler section that prefixes the bus record in a machine snapshot.
const DRIVER_MAGIC: &[u8; 4] = b"MZDR";
const DRIVER_VERSION: u32 = 1;

pub struct Mz700<P: Peripherals = NullPeripherals> {
    bus: MzBus<P>,
    timing: Timing,
    /// Sub-line events for every line, sorted by clock.
    schedule: Vec<(u32, Event)>,
    next_event: usize,
    line: u16,
    line_clock: u32,
    tempo_period: u64,
    tempo_countdown: u64,
    blink_period: u64,
    blink_countdown: u64,
    master_clock: u64,
    frame_count: u64,
    frame_complete: bool,
}

impl<P: Peripherals> Mz700<P> {
    /// Build and reset a machine, loading images from `config.rom_dir`.
    #[must_use]
    pub fn new(config: &MzConfig, periph: P) -> Self {
        let mut bus = MzBus::new(config, periph);
        if let Some(dir) = &config.rom_dir {
            rom::load_images(&mut bus, dir);
        }
        let timing = *bus.crtc().timing();
        let clock = MasterClock::new(timing.cpu_clock_hz);
        let schedule = bus.crtc().line_schedule();
        info!(
            "{} {:?}: {} Hz, {} lines",
            config.model.name(),
            config.standard,
            timing.cpu_clock_hz,
            timing.lines_per_frame
        );

        let mut machine = Self {
            bus,
            timing,
            schedule,
            next_event: 0,
            line: 0,
            line_clock: 0,
            tempo_period: clock.period_of(TEMPO_RATE),
            tempo_countdown: 0,
            blink_period: clock.period_of(BLINK_RATE),
            blink_countdown: 0,
            master_clock: 0,
            frame_count: 0,
            frame_complete: false,
        };
        machine.reset();
        machine
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.line = 0;
        self.line_clock = 0;
        self.next_event = 0;
        self.tempo_countdown = self.tempo_period;
        self.blink_countdown = self.blink_period;
        self.frame_complete = false;
    }

    /// Run to the start of the next scanline. Returns clocks run.
    pub fn run_line(&mut self) -> u64 {
        let start = self.master_clock;
        loop {
            self.tick();
            if self.line_clock == 0 {
                break;
            }
        }
        self.master_clock - start
    }

    /// Run to the end of the current frame. Returns clocks run.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.master_clock;
        self.frame_complete = false;
        while !self.frame_complete {
            self.tick();
        }
        self.master_clock - start
    }

    /// Persist anything that changed (the flash image) to `rom_dir`.
    pub fn shutdown(&mut self) -> io::Result<bool> {
        match self.bus.config().rom_dir.clone() {
            Some(dir) => rom::save_flash(&mut self.bus, &dir),
            None => Ok(false),
        }
    }

    /// Serialize the scheduler position followed by the bus record.
    ///
    /// ```text
    /// "MZDR"  magic
    /// u32     version
    /// u16     next line to run
    /// u32     next clock within the line
    /// u32     index of the next sub-line event
    /// u64 x 4 tempo countdown, blink countdown, master clock, frame count
    /// ...     bus record (see `MzBus::save_state`)
    /// ```
    #[must_use]
    pub fn save_state(&self) -> Vec<u8> {
        let bus = self.bus.save_state();
        let mut data = Vec::with_capacity(50 + bus.len());
        data.extend_from_slice(DRIVER_MAGIC);
        data.extend_from_slice(&DRIVER_VERSION.to_le_bytes());
        data.extend_from_slice(&self.line.to_le_bytes());
        data.extend_from_slice(&self.line_clock.to_le_bytes());
        data.extend_from_slice(&(self.next_event as u32).to_le_bytes());
        for value in [
            self.tempo_countdown,
            self.blink_countdown,
            self.master_clock,
            self.frame_count,
        ] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&bus);
        data
    }

    /// Restore a [`save_state`](Self::save_state) snapshot. Running resumes
    /// at the saved clock; the current line is not started again. On error
    /// nothing is changed.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        let result = self.apply_state(data);
        if let Err(err) = &result {
            warn!("snapshot rejected: {err}");
        }
        result
    }

    fn apply_state(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        let mut r = Reader::new(data);
        if r.take(4)? != DRIVER_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = r.u32()?;
        if version != DRIVER_VERSION {
            return Err(SnapshotError::VersionMismatch(version));
        }
        let line = r.u16()?;
        let line_clock = r.u32()?;
        let next_event = r.u32()? as usize;
        let tempo_countdown = r.u64()?;
        let blink_countdown = r.u64()?;
        let master_clock = r.u64()?;
        let frame_count = r.u64()?;

        if line >= self.timing.lines_per_frame || line_clock >= self.timing.clocks_per_line {
            return Err(SnapshotError::OutOfRange("raster position"));
        }
        if next_event > self.schedule.len() {
            return Err(SnapshotError::OutOfRange("event index"));
        }
        if !(1..=self.tempo_period).contains(&tempo_countdown)
            || !(1..=self.blink_period).contains(&blink_countdown)
        {
            return Err(SnapshotError::OutOfRange("timer countdown"));
        }

        self.bus.apply_state(r.rest())?;

        self.line = line;
        self.line_clock = line_clock;
        self.next_event = next_event;
        self.tempo_countdown = tempo_countdown;
        self.blink_countdown = blink_countdown;
        self.master_clock = master_clock;
        self.frame_count = frame_count;
        self.frame_complete = false;
        Ok(())
    }

    #[must_use]
    pub fn bus(&self) -> &MzBus<P> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MzBus<P> {
        &mut self.bus
    }

    /// Reference to the framebuffer (ARGB32).
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.framebuffer()
    }

    #[must_use]
    pub fn framebuffer_width(&self) -> u32 {
        OUTPUT_WIDTH as u32
    }

    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        OUTPUT_HEIGHT as u32
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn master_clock(&self) -> u64 {
        self.master_clock
    }

    #[must_use]
    pub fn line(&self) -> u16 {
        self.line
    }

    #[must_use]
    pub fn line_clock(&self) -> u32 {
        self.line_clock
    }
}

impl<P: Peripherals> Tickable for Mz700<P> {
    fn tick(&mut self) {
        if self.line_clock == 0 {
            self.bus.begin_line(self.line);
            self.next_event = 0;
        }
        self.bus.set_line_clock(self.line_clock);
        while let Some(&(clock, event)) = self.schedule.get(self.next_event) {
            if clock > self.line_clock {
                break;
            }
            self.bus.fire(event);
            self.next_event += 1;
        }

        self.tempo_countdown -= 1;
        if self.tempo_countdown == 0 {
            self.tempo_countdown = self.tempo_period;
            self.bus.fire(Event::Tempo);
        }
        self.blink_countdown -= 1;
        if self.blink_countdown == 0 {
            self.blink_countdown = self.blink_period;
            self.bus.fire(Event::Blink);
        }

        self.master_clock += 1;
        self.line_clock += 1;
        if self.line_clock == self.timing.clocks_per_line {
            self.line_clock = 0;
            self.line += 1;
            if self.line == self.timing.lines_per_frame {
                self.line = 0;
                self.bus.present();
                self.frame_count += 1;
                self.frame_complete = true;
            }
        }
    }
}

impl<P: Peripherals> Observable for Mz700<P> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "frame_count" => Some(self.frame_count.into()),
            "master_clock" => Some(self.master_clock.into()),
            _ => self.bus.query(path),
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "latch.<field>",
            "crtc.<field>",
            "flash.<field>",
            "memory.<address>",
            "bank.<address>",
            "frame_count",
            "master_clock",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MzModel, VideoStandard};
    use emu_core::Bus;

    fn make_machine(standard: VideoStandard) -> Mz700 {
        Mz700::new(&MzConfig::new(MzModel::Mz700, standard), NullPeripherals)
    }

    #[test]
    fn run_line_is_228_clocks() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        assert_eq!(mz.run_line(), 228);
        assert_eq!(mz.line(), 1);
    }

    #[test]
    fn run_frame_clock_count() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        assert_eq!(mz.run_frame(), 228 * 262);
        assert_eq!(mz.frame_count(), 1);
        let mut pal = make_machine(VideoStandard::Pal);
        assert_eq!(pal.run_frame(), 228 * 312);
    }

    #[test]
    fn blank_events_fire_mid_line() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        mz.tick_n(160);
        assert!(!mz.bus().crtc().blank());
        mz.tick();
        assert!(mz.bus().crtc().blank());
        assert!(mz.bus().crtc().hblank());
        mz.tick_n(19);
        assert!(!mz.bus().crtc().hsync());
        mz.tick();
        assert!(mz.bus().crtc().hsync());
    }

    #[test]
    fn tempo_toggles_on_period() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        mz.tick_n(55_929);
        assert!(!mz.bus().crtc().tempo());
        mz.tick();
        assert!(mz.bus().crtc().tempo());
    }

    #[test]
    fn vblank_after_visible_lines() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        for _ in 0..200 {
            mz.run_line();
        }
        assert!(!mz.bus().crtc().vblank());
        mz.tick();
        assert!(mz.bus().crtc().vblank());
        assert_eq!(mz.query("crtc.line"), Some(Value::U16(200)));
    }

    #[test]
    fn round_trip_resumes_mid_line() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        mz.tick_n(228 * 5 + 170);
        let saved = mz.save_state();

        let mut restored = make_machine(VideoStandard::Ntsc);
        restored.load_state(&saved).unwrap();
        assert_eq!(restored.line(), 5);
        assert_eq!(restored.line_clock(), 170);
        assert_eq!(restored.master_clock(), mz.master_clock());

        mz.tick();
        restored.tick();
        assert!(restored.bus().crtc().hblank());
        assert_eq!(restored.bus_mut().read(0xE008), mz.bus_mut().read(0xE008));
        assert_eq!(restored.bus_mut().read(0xD000), mz.bus_mut().read(0xD000));
    }

    #[test]
    fn countdowns_survive_round_trip() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        mz.tick_n(40_000);
        let mut restored = make_machine(VideoStandard::Ntsc);
        restored.load_state(&mz.save_state()).unwrap();

        mz.tick_n(15_930);
        restored.tick_n(15_930);
        assert!(mz.bus().crtc().tempo());
        assert_eq!(restored.bus().crtc().tempo(), mz.bus().crtc().tempo());
        assert_eq!(restored.bus_mut().read(0xE008), mz.bus_mut().read(0xE008));
    }

    #[test]
    fn rejects_bus_record_without_scheduler_section() {
        let mz = make_machine(VideoStandard::Ntsc);
        let bus_only = mz.bus().save_state();
        let mut other = make_machine(VideoStandard::Ntsc);
        assert_eq!(other.load_state(&bus_only), Err(SnapshotError::BadMagic));
    }

    #[test]
    fn rejects_out_of_range_position() {
        let mz = make_machine(VideoStandard::Ntsc);
        let mut saved = mz.save_state();
        // Line field follows magic and version.
        saved[8..10].copy_from_slice(&300u16.to_le_bytes());
        let mut other = make_machine(VideoStandard::Ntsc);
        other.tick_n(7);
        assert_eq!(
            other.load_state(&saved),
            Err(SnapshotError::OutOfRange("raster position"))
        );
        assert_eq!(other.master_clock(), 7);
    }

    #[test]
    fn framebuffer_size() {
        let mz = make_machine(VideoStandard::Ntsc);
        assert_eq!(mz.framebuffer_width(), 640);
        assert_eq!(mz.framebuffer_height(), 400);
        assert_eq!(mz.framebuffer().len(), 640 * 400);
    }

    #[test]
    fn shutdown_without_rom_dir_writes_nothing() {
        let mut mz = make_machine(VideoStandard::Ntsc);
        assert!(!mz.shutdown().unwrap());
    }
}
