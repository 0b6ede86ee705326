use radiometry::Color;
use scene::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes the averaged image to `path`, choosing the codec by extension: PNG is tonemapped
/// to 8-bit sRGB, EXR stays linear. Anything else is unsupported.
pub fn write(path: &Path, pixels: &[Color], width: u32, height: u32) -> Result<(), Error> {
    assert_eq!(pixels.len(), (width * height) as usize);
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => write_png(path, pixels, width, height),
        "exr" => write_exr(path, pixels, width, height),
        other => Err(Error::Unsupported(format!(
            "output format {:?} (use .png or .exr)",
            other
        ))),
    }
}

fn write_png(path: &Path, pixels: &[Color], width: u32, height: u32) -> Result<(), Error> {
    let mut data = Vec::with_capacity(pixels.len() * 4);
    for c in pixels {
        data.extend_from_slice(&c.to_srgb_u8());
    }
    let file = File::create(path)?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::RGBA);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| Error::Parse(format!("png: {}", e)))?;
    writer
        .write_image_data(&data)
        .map_err(|e| Error::Parse(format!("png: {}", e)))?;
    Ok(())
}

fn write_exr(path: &Path, pixels: &[Color], width: u32, height: u32) -> Result<(), Error> {
    exr::prelude::write_rgba_file(path, width as usize, height as usize, |x, y| {
        let c = pixels[y * width as usize + x];
        (c.r, c.g, c.b, c.a)
    })
    .map_err(|e| Error::Parse(format!("exr: {}", e)))
}
