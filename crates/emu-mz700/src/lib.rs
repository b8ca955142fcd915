//! Sharp MZ-700 / MZ-1500 memory bus, raster timing and display.
//!
//! The bus controller routes every CPU access through a bank map of 2KB
//! windows chosen by the mode latch, inserts the VRAM and monitor-ROM wait
//! states, and services the memory-mapped I/O block. A raster state
//! machine driven once per CPU clock produces the blanking and sync
//! signals and draws each visible line as the beam reaches it.
//!
//! The Z80, 8255 and 8253 are external; see [`Peripherals`].

mod bank;
mod bus;
#[cfg(feature = "native")]
pub mod capture;
mod config;
mod crtc;
mod latch;
mod memory;
mod mz700;
mod palette;
mod pcg;
mod peripherals;
mod render;
pub mod rom;
mod snapshot;

pub use bank::{BankMap, Target, Window};
pub use bus::MzBus;
pub use config::{BootStorage, MzConfig, MzModel, NTSC, PAL, Timing, VideoStandard};
pub use crtc::{Crtc, Event};
pub use latch::{ModeLatch, Remap};
pub use memory::{Memories, Region};
pub use mz700::Mz700;
pub use palette::PALETTE;
pub use pcg::Pcg700;
pub use peripherals::{NullPeripherals, Peripherals};
pub use render::{OUTPUT_HEIGHT, OUTPUT_WIDTH, Renderer, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use snapshot::SnapshotError;
