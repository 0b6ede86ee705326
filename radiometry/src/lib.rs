/// Linear RGBA color type with straight alpha, plus the premultiplied source-over
/// compositing operator and sRGB transfer functions used at the I/O boundaries.
pub mod color;

pub use color::Color;
