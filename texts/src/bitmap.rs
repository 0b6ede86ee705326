use crate::service::ServiceError;
use radiometry::Color;

/// An RGBA raster in linear color with straight alpha. Sampling outside [0, 1]^2 is
/// transparent, so billboards need no explicit clipping.
#[derive(Debug, Clone)]
pub struct Bitmap {
    data: Vec<Color>,
    width: u32,
    height: u32,
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn solid(width: u32, height: u32, color: Color) -> Bitmap {
        Bitmap {
            data: vec![color; (width * height) as usize],
            width,
            height,
        }
    }

    /// The stand-in shown until a full-quality raster arrives: a faint box with a solid
    /// outline, in the label's color.
    pub fn placeholder(width: u32, height: u32, color: Color) -> Bitmap {
        let mut bitmap = Bitmap::solid(width, height, Color::TRANSPARENT);
        let (w, h) = (width as i64, height as i64);
        for y in 0..h {
            for x in 0..w {
                let margin = x.min(w - 1 - x).min(y).min(h - 1 - y);
                let c = if margin == 1 {
                    color
                } else if margin > 1 {
                    color.with_alpha(color.a * 0.15)
                } else {
                    Color::TRANSPARENT
                };
                bitmap.data[(y * w + x) as usize] = c;
            }
        }
        bitmap
    }

    pub fn decode_png(bytes: &[u8]) -> Result<Bitmap, ServiceError> {
        let decoder = png::Decoder::new(bytes);
        let (info, mut reader) = decoder
            .read_info()
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        if info.bit_depth != png::BitDepth::Eight {
            return Err(ServiceError::Decode("non 8-bit image".to_string()));
        }
        let mut buf = vec![0u8; info.buffer_size()];
        reader
            .next_frame(&mut buf)
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        let channels = match info.color_type {
            png::ColorType::Grayscale => 1,
            png::ColorType::RGB => 3,
            png::ColorType::RGBA => 4,
            other => {
                return Err(ServiceError::Decode(format!(
                    "unhandled color type {:?}",
                    other
                )))
            }
        };
        let to_f = |v: u8| v as f32 / 255.0;
        let data: Vec<Color> = buf
            .chunks(channels)
            .map(|px| match channels {
                1 => Color::from_srgb([to_f(px[0]), to_f(px[0]), to_f(px[0]), 1.0]),
                3 => Color::from_srgb([to_f(px[0]), to_f(px[1]), to_f(px[2]), 1.0]),
                _ => Color::from_srgb([to_f(px[0]), to_f(px[1]), to_f(px[2]), to_f(px[3])]),
            })
            .collect();
        Ok(Bitmap {
            data,
            width: info.width,
            height: info.height,
        })
    }

    fn texel(&self, x: i64, y: i64) -> Color {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            Color::TRANSPARENT
        } else {
            self.data[(y * self.width as i64 + x) as usize]
        }
    }

    /// Bilinear sample at normalized `(u, v)`, v running down from the top row.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return Color::TRANSPARENT;
        }
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let top = self.texel(x0, y0) * (1.0 - fx) + self.texel(x0 + 1, y0) * fx;
        let bot = self.texel(x0, y0 + 1) * (1.0 - fx) + self.texel(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bot * fy
    }
}
