//! CPU ray tracer for vector diagrams: strokes become swept volumes sized in screen
//! pixels, faces stay flat geometry, labels become camera-facing billboards, and the
//! whole stack composites front to back with premultiplied alpha.

pub mod cli_options;
pub mod image;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod state;
pub mod tracer;
