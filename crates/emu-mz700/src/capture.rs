//! Headless capture: PNG screenshots.

use std::error::Error;
use std::fs;
use std::io::BufWriter;
use std::path::Path;

use crate::Mz700;
use crate::peripherals::Peripherals;

/// Save the current framebuffer as a PNG file.
///
/// The framebuffer is ARGB32; the encoder takes RGBA bytes.
pub fn save_screenshot<P: Peripherals>(
    machine: &Mz700<P>,
    path: &Path,
) -> Result<(), Box<dyn Error>> {
    let width = machine.framebuffer_width();
    let height = machine.framebuffer_height();

    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&to_rgba(machine.framebuffer()))?;
    Ok(())
}

fn to_rgba(framebuffer: &[u32]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(framebuffer.len() * 4);
    for &pixel in framebuffer {
        let [_, r, g, b] = pixel.to_be_bytes();
        rgba.extend_from_slice(&[r, g, b, 0xFF]);
    }
    rgba
}

/// Run `num_frames` frames, saving each as `dir/000001.png` onwards.
pub fn save_frame_sequence<P: Peripherals>(
    machine: &mut Mz700<P>,
    dir: &Path,
    num_frames: u32,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    for i in 1..=num_frames {
        machine.run_frame();
        save_screenshot(machine, &dir.join(format!("{i:06}.png")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_to_rgba() {
        assert_eq!(to_rgba(&[0xFF12_3456, 0xFF00_0000]), vec![0x12, 0x34, 0x56, 0xFF, 0, 0, 0, 0xFF]);
    }
}
