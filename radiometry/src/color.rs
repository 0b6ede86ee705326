/// Linear-space RGBA color with straight (non-premultiplied) alpha. Scene files carry sRGB
/// values; the loader converts them on read so that everything downstream is linear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Clamps an f32 value to [0, 1], multiplies it by 255 and casts it to u8.
/// Returns 0 if `f` is NaN.
fn saturate_cast_u8(f: f32) -> u8 {
    if f > 1.0 {
        255
    } else if f >= 0.0 {
        (f * 255.0 + 0.5) as u8
    } else {
        0
    }
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub fn gray(v: f32) -> Color {
        Color::new(v, v, v, 1.0)
    }

    /// Converts an 8-bit sRGB quadruple (the scene-file encoding) to linear.
    pub fn from_srgb(rgba: [f32; 4]) -> Color {
        Color::new(
            srgb_to_linear(rgba[0]),
            srgb_to_linear(rgba[1]),
            srgb_to_linear(rgba[2]),
            rgba[3], // alpha is not gamma-encoded
        )
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    pub fn has_non_finite(&self) -> bool {
        !(self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite())
    }

    /// Scales only the alpha channel; used by dash masking and `transparency` mode.
    pub fn with_alpha(self, a: f32) -> Color {
        Color { a, ..self }
    }

    /// Source-over compositing of `self` over `dst`. Both operands use straight alpha; the
    /// operation converts to premultiplied internally:
    ///     out = src + (1 - a_src) * dst
    pub fn over(self, dst: Color) -> Color {
        let k = 1.0 - self.a;
        Color::new(
            self.r * self.a + dst.r * dst.a * k,
            self.g * self.a + dst.g * dst.a * k,
            self.b * self.a + dst.b * dst.a * k,
            self.a + dst.a * k,
        )
        .unpremultiply()
    }

    fn unpremultiply(self) -> Color {
        if self.a <= 0.0 {
            Color::TRANSPARENT
        } else {
            Color::new(self.r / self.a, self.g / self.a, self.b / self.a, self.a)
        }
    }

    /// Tonemaps with exposure 0 (identity in linear space) and encodes to 8-bit sRGB.
    pub fn to_srgb_u8(&self) -> [u8; 4] {
        [
            saturate_cast_u8(linear_to_srgb(self.r)),
            saturate_cast_u8(linear_to_srgb(self.g)),
            saturate_cast_u8(linear_to_srgb(self.b)),
            saturate_cast_u8(self.a),
        ]
    }
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

impl std::ops::Add for Color {
    type Output = Color;
    fn add(self, rhs: Self) -> Self {
        Color::new(
            self.r + rhs.r,
            self.g + rhs.g,
            self.b + rhs.b,
            self.a + rhs.a,
        )
    }
}
impl std::ops::AddAssign for Color {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl std::ops::Mul<f32> for Color {
    type Output = Color;
    fn mul(self, s: f32) -> Self {
        Color::new(self.r * s, self.g * s, self.b * s, self.a * s)
    }
}
impl std::ops::Mul<Color> for f32 {
    type Output = Color;
    fn mul(self, c: Color) -> Color {
        c * self
    }
}
