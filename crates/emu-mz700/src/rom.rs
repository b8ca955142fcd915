//! Backing-store images on disk.
//!
//! Each ROM is looked up by its region-specific name first (`IPL-JP.ROM`
//! on NTSC machines, `IPL-EU.ROM` on PAL) and then by the generic name
//! (`IPL.ROM`). A missing image is not an error: the memory keeps its
//! power-on fill and a warning is logged. Only the flash image is ever
//! written back, and only when it changed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::bus::MzBus;
use crate::config::{MzConfig, MzModel};
use crate::peripherals::Peripherals;

pub const FLASH_FILE_NAME: &str = "SST39SF040.BIN";

/// File names to try for a ROM, most specific first.
#[must_use]
pub fn candidates(stem: &str, config: &MzConfig) -> [String; 2] {
    [
        format!("{stem}-{}.ROM", config.standard.rom_region()),
        format!("{stem}.ROM"),
    ]
}

/// Read the first image that exists.
fn find_image(dir: &Path, names: &[String]) -> Option<(PathBuf, Vec<u8>)> {
    names.iter().find_map(|name| {
        let path = dir.join(name);
        fs::read(&path).ok().map(|data| (path, data))
    })
}

fn load_rom(dir: &Path, stem: &str, config: &MzConfig) -> Option<Vec<u8>> {
    let names = candidates(stem, config);
    match find_image(dir, &names) {
        Some((path, data)) => {
            info!("loaded {} ({} bytes)", path.display(), data.len());
            Some(data)
        }
        None => {
            warn!("{} not found in {}", names.join(" / "), dir.display());
            None
        }
    }
}

/// Load every image the machine uses from `dir` into the bus.
pub fn load_images<P: Peripherals>(bus: &mut MzBus<P>, dir: &Path) {
    let config = bus.config().clone();

    if let Some(data) = load_rom(dir, "IPL", &config) {
        bus.load_ipl(&data);
    }
    if config.model == MzModel::Mz1500 {
        if let Some(data) = load_rom(dir, "EXT", &config) {
            bus.load_ext(&data);
        }
    }
    if let Some(data) = load_rom(dir, "XCG", &config) {
        bus.load_font(&data);
    }

    if let Some(flash) = bus.flash_mut() {
        let path = dir.join(FLASH_FILE_NAME);
        match fs::read(&path) {
            Ok(data) => {
                info!("loaded {} ({} bytes)", path.display(), data.len());
                flash.load_image(&data);
            }
            Err(_) => warn!("{} not found, flash starts erased", path.display()),
        }
    }
}

/// Write the flash image back if it was modified since loading.
///
/// Returns whether a file was written.
pub fn save_flash<P: Peripherals>(bus: &mut MzBus<P>, dir: &Path) -> io::Result<bool> {
    let Some(flash) = bus.flash_mut() else {
        return Ok(false);
    };
    if !flash.is_modified() {
        return Ok(false);
    }
    let path = dir.join(FLASH_FILE_NAME);
    fs::write(&path, flash.image())?;
    flash.clear_modified();
    info!("wrote {}", path.display());
    Ok(true)
}
