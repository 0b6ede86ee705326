//! Camera-dependent renderable shapes. A `TraceShape` is rebuilt on every render request
//! because stroke radii, arrow heads, and back-face culling all depend on the camera.
//!
//! Primitives of one shape are addressed by a flat index that decomposes, by range
//! subtraction, into points, then lines, then triangles, then quads, then borders. The
//! acceleration structure builds over these flat indices.

mod prepare;

pub use prepare::prepare;

use geometry::line::LineSeg;
use geometry::{intersect, BBox, Hit, Ray};
use math::hcm::Point3;
use radiometry::Color;
use scene::Material;

/// Per-line data for dash evaluation: the summed screen length of the preceding segments
/// of the same polyline, in pixels, so the dash phase continues across joints.
#[derive(Debug, Clone, Copy)]
pub struct LineAttr {
    pub dash_offset: f32,
    pub screen_len: f32,
}

/// What a flat-index primitive hit resolves to. Line hits carry the line ordinal (for dash
/// offsets) and whether the arrow head was struck (arrow heads are never dashed).
#[derive(Debug, Clone, Copy)]
pub enum PrimKind {
    Point,
    Line { index: usize, arrow: bool },
    Triangle,
    Quad { index: usize },
    Border,
}

#[derive(Debug, Clone, Copy)]
pub struct PrimHit {
    pub hit: Hit,
    pub kind: PrimKind,
}

impl PrimKind {
    /// Strokes use the material's stroke color and may be dashed; faces use fill.
    pub fn is_stroke(&self) -> bool {
        !matches!(self, PrimKind::Triangle | PrimKind::Quad { .. })
    }
}

/// One object's renderable geometry in world space, with camera-derived stroke radii.
#[derive(Debug, Clone)]
pub struct TraceShape {
    pub positions: Vec<Point3>,
    /// Per-vertex world-space stroke radius (half the material thickness on screen).
    pub radii: Vec<f32>,
    pub points: Vec<u32>,
    pub lines: Vec<LineSeg>,
    pub line_attrs: Vec<LineAttr>,
    pub triangles: Vec<[u32; 3]>,
    pub quads: Vec<[u32; 4]>,
    /// Per-quad fill override, parallel to `quads` when non-empty; culled in sync.
    pub fills: Vec<Color>,
    pub borders: Vec<LineSeg>,
    /// Convex-clip triangles in world space, consecutive vertex triples.
    pub cclips: Vec<Point3>,
    pub material: Material,
}

impl TraceShape {
    pub fn prim_count(&self) -> usize {
        self.points.len()
            + self.lines.len()
            + self.triangles.len()
            + self.quads.len()
            + self.borders.len()
    }

    /// Bounds of one flat-index primitive, swept volume included.
    pub fn prim_bbox(&self, mut i: usize) -> BBox {
        if i < self.points.len() {
            let v = self.points[i] as usize;
            return BBox::around(self.positions[v], 3.0 * self.radii[v]);
        }
        i -= self.points.len();
        if i < self.lines.len() {
            return self.lines[i].bbox();
        }
        i -= self.lines.len();
        if i < self.triangles.len() {
            let [a, b, c] = self.triangles[i];
            return BBox::new(self.positions[a as usize], self.positions[b as usize])
                .union(self.positions[c as usize]);
        }
        i -= self.triangles.len();
        if i < self.quads.len() {
            let [a, b, c, d] = self.quads[i];
            return BBox::new(self.positions[a as usize], self.positions[b as usize])
                .union(self.positions[c as usize])
                .union(self.positions[d as usize]);
        }
        i -= self.quads.len();
        self.borders[i].bbox()
    }

    pub fn intersect_prim(&self, mut i: usize, r: &Ray) -> Option<PrimHit> {
        if i < self.points.len() {
            let v = self.points[i] as usize;
            // Points render as enlarged dots, three stroke radii wide.
            let hit = intersect::intersect_sphere(self.positions[v], 3.0 * self.radii[v], r)?;
            return Some(PrimHit {
                hit,
                kind: PrimKind::Point,
            });
        }
        i -= self.points.len();
        if i < self.lines.len() {
            let lh = self.lines[i].intersect(r)?;
            return Some(PrimHit {
                hit: lh.hit,
                kind: PrimKind::Line {
                    index: i,
                    arrow: lh.arrow,
                },
            });
        }
        i -= self.lines.len();
        if i < self.triangles.len() {
            let [a, b, c] = self.triangles[i];
            let hit = intersect::intersect_triangle(
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
                r,
            )?;
            return Some(PrimHit {
                hit,
                kind: PrimKind::Triangle,
            });
        }
        i -= self.triangles.len();
        if i < self.quads.len() {
            let [a, b, c, d] = self.quads[i];
            let hit = intersect::intersect_quad(
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
                self.positions[d as usize],
                c == d,
                r,
            )?;
            return Some(PrimHit {
                hit,
                kind: PrimKind::Quad { index: i },
            });
        }
        i -= self.quads.len();
        let lh = self.borders[i].intersect(r)?;
        Some(PrimHit {
            hit: lh.hit,
            kind: PrimKind::Border,
        })
    }

    /// Fill color of a face hit, honoring per-quad overrides.
    pub fn fill_of(&self, kind: PrimKind) -> Color {
        match kind {
            PrimKind::Quad { index } if !self.fills.is_empty() => self.fills[index],
            _ => self.material.fill,
        }
    }

    /// Dash offset in screen pixels for a stroke hit; zero for non-line strokes.
    pub fn dash_offset(&self, kind: PrimKind) -> f32 {
        match kind {
            PrimKind::Line { index, .. } => self.line_attrs[index].dash_offset,
            _ => 0.0,
        }
    }
}
