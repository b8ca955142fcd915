//! Headless MZ-700 / MZ-1500 runner.
//!
//! Runs the bus controller and raster for a number of frames, optionally
//! starting from a snapshot, and writes a PNG screenshot and/or a snapshot
//! at the end. A modified flash image is written back to the ROM directory
//! on exit.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use emu_core::Observable;
use emu_mz700::{BootStorage, Mz700, MzConfig, MzModel, NullPeripherals, VideoStandard, capture};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Mz700,
    Mz1500,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StandardArg {
    Ntsc,
    Pal,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageArg {
    Rom,
    Flash,
}

/// Sharp MZ-700 / MZ-1500 headless runner
#[derive(Parser, Debug)]
#[command(name = "emu-mz700")]
#[command(about = "Run the MZ-700 bus and display headless", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value = "mz700")]
    model: ModelArg,

    #[arg(long, value_enum, default_value = "ntsc")]
    standard: StandardArg,

    /// Boot storage behind $0000-$0FFF
    #[arg(long, value_enum, default_value = "rom")]
    boot: StorageArg,

    /// Directory holding IPL/EXT/XCG ROMs and the flash image
    #[arg(long)]
    rom_dir: Option<PathBuf>,

    /// PCG-700 board fitted (DIP switch 1)
    #[arg(long)]
    pcg700: bool,

    /// Blend each frame with the previous one
    #[arg(long)]
    blend: bool,

    /// Scanline emulation
    #[arg(long)]
    scanlines: bool,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u32,

    /// Snapshot to load before running
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a snapshot after running
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Save a PNG screenshot after running
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Save every frame as a numbered PNG in this directory
    #[arg(long)]
    record: Option<PathBuf>,

    /// Print the value of a state path at exit (repeatable)
    #[arg(long)]
    query: Vec<String>,
}

impl Args {
    fn config(&self) -> MzConfig {
        MzConfig {
            model: match self.model {
                ModelArg::Mz700 => MzModel::Mz700,
                ModelArg::Mz1500 => MzModel::Mz1500,
            },
            standard: match self.standard {
                StandardArg::Ntsc => VideoStandard::Ntsc,
                StandardArg::Pal => VideoStandard::Pal,
            },
            boot_storage: match self.boot {
                StorageArg::Rom => BootStorage::Rom,
                StorageArg::Flash => BootStorage::Flash,
            },
            pcg700: self.pcg700,
            colour_blend: self.blend,
            scanlines: self.scanlines,
            rom_dir: self.rom_dir.clone(),
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut machine = Mz700::new(&args.config(), NullPeripherals);

    if let Some(path) = &args.load_state {
        let data = fs::read(path)
            .unwrap_or_else(|e| fail(&format!("Failed to read {}: {e}", path.display())));
        if let Err(e) = machine.load_state(&data) {
            fail(&format!("Failed to load snapshot: {e}"));
        }
    }

    if let Some(dir) = &args.record {
        if let Err(e) = capture::save_frame_sequence(&mut machine, dir, args.frames) {
            fail(&format!("Failed to record frames: {e}"));
        }
    } else {
        for _ in 0..args.frames {
            machine.run_frame();
        }
    }

    if let Some(path) = &args.screenshot {
        if let Err(e) = capture::save_screenshot(&machine, path) {
            fail(&format!("Failed to save screenshot: {e}"));
        }
        eprintln!("Screenshot saved to {}", path.display());
    }

    if let Some(path) = &args.save_state {
        if let Err(e) = fs::write(path, machine.save_state()) {
            fail(&format!("Failed to save snapshot: {e}"));
        }
    }

    for path in &args.query {
        match machine.query(path) {
            Some(value) => println!("{path} = {value}"),
            None => println!("{path}: unknown path"),
        }
    }

    if let Err(e) = machine.shutdown() {
        fail(&format!("Failed to write flash image: {e}"));
    }
}
