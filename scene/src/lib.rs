/// JSON scene ingest: serde-based parsing, sRGB-to-linear conversion, index validation.
pub mod loader;

use math::hcm::{Frame, Point3, Vec2};
use radiometry::Color;

/// Fatal error kinds of the command boundary. Service and numerical errors are handled
/// locally and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Top-level document: page size in abstract units, abstract-units-per-world-unit scale,
/// and an ordered list of scenes composited onto one canvas.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub size: Vec2,
    pub scale: f32,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone)]
pub struct Scene {
    /// Offset of this scene in the composite canvas, in pixels (y down).
    pub offset: Vec2,
    pub cameras: Vec<CameraDesc>,
    pub objects: Vec<Object>,
    pub materials: Vec<Material>,
    pub shapes: Vec<ShapeDesc>,
    pub labels: Vec<LabelGroup>,
}

/// Camera description as stored in the scene; the renderable `geometry::Camera` is derived
/// per render because the film aspect depends on the page.
#[derive(Debug, Clone)]
pub struct CameraDesc {
    pub orthographic: bool,
    pub from: Point3,
    pub to: Point3,
    pub center: Vec2,
    pub lens: f32,
    pub film: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashCap {
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashMode {
    Always,
    Never,
    Transparency,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub fill: Color,
    pub stroke: Color,
    /// Stroke thickness in pixels.
    pub thickness: f32,
    pub dash_period: f32,
    pub dash_phase: f32,
    pub dash_on: f32,
    pub dash_cap: DashCap,
    pub dashed: DashMode,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            fill: Color::new(0.75, 0.75, 0.75, 1.0),
            stroke: Color::BLACK,
            thickness: 1.5,
            dash_period: 0.0,
            dash_phase: 0.0,
            dash_on: 0.0,
            dash_cap: DashCap::Round,
            dashed: DashMode::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowStyle {
    Triangle,
    Stealth,
}

/// Shape definition: SoA positions plus element index lists. `lines` get cap ends on both
/// sides; `arrows` get a cap at the first vertex and an arrow head at the second.
#[derive(Debug, Clone)]
pub struct ShapeDesc {
    pub positions: Vec<Point3>,
    pub points: Vec<u32>,
    pub lines: Vec<[u32; 2]>,
    pub arrows: Vec<[u32; 2]>,
    pub triangles: Vec<[u32; 3]>,
    pub quads: Vec<[u32; 4]>,
    /// Optional per-quad fill override, parallel to `quads` when non-empty.
    pub fills: Vec<Color>,
    pub cull: bool,
    pub boundary: bool,
    pub arrow_style: ArrowStyle,
    /// Convex-clip triangles: consecutive vertex triples. A ray must hit every one of
    /// these triangles for the shape to be considered at all.
    pub cclips: Vec<Point3>,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub frame: Frame,
    pub shape: Option<usize>,
    pub material: Option<usize>,
    pub labels: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct LabelGroup {
    pub positions: Vec<Point3>,
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone)]
pub struct Label {
    /// The raw text as authored; the text service interprets markup.
    pub text: String,
    /// Extra placement offset in pixels.
    pub offset: Vec2,
    /// Horizontal alignment in {-1, 0, +1}; the y component is reserved.
    pub alignment: Vec2,
}

impl Scene {
    /// Material for an object, falling back to defaults when the index is absent.
    pub fn material_of(&self, object: &Object) -> Material {
        match object.material {
            Some(i) => self.materials[i].clone(),
            None => Material::default(),
        }
    }
}
