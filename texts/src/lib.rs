//! The text layer: billboard quads carrying label bitmaps. Bitmaps come from the external
//! rasterization service when it is reachable, from a prebaked cache directory, or fall
//! back to a placeholder so the render stays live.

mod bitmap;
pub mod service;

pub use bitmap::Bitmap;
pub use service::{HttpRasterizer, RasterRequest, Rasterizer, ServiceError, TextCache};

use geometry::intersect::intersect_triangle;
use geometry::{Camera, Ray};
use math::hcm::{Point3, Vec2};
use radiometry::Color;
use scene::Label;

/// Nominal glyph metrics, in pixels at zoom 1. The service renders real typography; these
/// only size the billboard and the placeholder.
pub const GLYPH_ADVANCE: f32 = 9.0;
pub const LINE_HEIGHT: f32 = 20.0;
pub const BASELINE: f32 = 5.0;

#[derive(Debug, Clone, Copy)]
pub struct LabelMetrics {
    pub width: f32,
    pub height: f32,
    pub baseline: f32,
}

/// Estimated pixel extent of a label. Markup is not interpreted; every character advances
/// the same nominal width.
pub fn measure(text: &str, zoom: f32) -> LabelMetrics {
    let chars = text.chars().count().max(1) as f32;
    LabelMetrics {
        width: chars * GLYPH_ADVANCE * zoom,
        height: LINE_HEIGHT * zoom,
        baseline: BASELINE * zoom,
    }
}

/// A renderable label: four world-space billboard corners plus the bitmap.
///
/// Corners are indexed bottom-first: 0 and 1 at the descender line, 2 and 3 at the top,
/// with 2 the top-left and 3 the top-right in screen terms.
#[derive(Debug, Clone)]
pub struct TraceText {
    pub corners: [Point3; 4],
    pub bitmap: Bitmap,
}

impl TraceText {
    /// Lays out the billboard for `label` anchored at the world point `anchor`. The quad
    /// lives on the plane through the anchor's camera depth, so it never tilts.
    pub fn new(
        label: &Label, anchor: Point3, metrics: &LabelMetrics, camera: &Camera, width_px: f32,
        bitmap: Bitmap,
    ) -> TraceText {
        let px = camera.film.x / width_px; // film units per pixel
        let z = camera.clamped_z(anchor);
        let base = camera.film_coords(anchor)
            + Vec2::new(label.offset.x, -metrics.baseline - label.offset.y) * px;
        let (w, h) = (metrics.width * px, metrics.height * px);
        let xs = if label.alignment.x < -0.5 {
            [0.0, -w, -w, 0.0]
        } else if label.alignment.x > 0.5 {
            [w, 0.0, 0.0, w]
        } else {
            [w * 0.5, -w * 0.5, -w * 0.5, w * 0.5]
        };
        let ys = [-h, -h, 0.0, 0.0];
        let mut corners = [Point3::ORIGIN; 4];
        for i in 0..4 {
            corners[i] = camera.unproject(base + Vec2::new(xs[i], ys[i]), z);
        }
        TraceText { corners, bitmap }
    }

    /// Ray vs. the billboard's two triangles; on a hit, the bitmap is sampled bilinearly
    /// at the planar coordinates of the hit point.
    pub fn intersect(&self, r: &Ray) -> Option<(f32, Color)> {
        let [c0, c1, c2, c3] = self.corners;
        let t = match (
            intersect_triangle(c0, c1, c2, r),
            intersect_triangle(c0, c2, c3, r),
        ) {
            (None, None) => return None,
            (Some(h), None) | (None, Some(h)) => h.t,
            (Some(a), Some(b)) => a.t.min(b.t),
        };
        let pos = r.position_at(t);
        // Planar frame: origin at the top-left corner, u along the top edge, v downward.
        let ex = c3 - c2;
        let ey = c1 - c2;
        let d = pos - c2;
        let u = d.dot(ex) / ex.norm_squared();
        let v = d.dot(ey) / ey.norm_squared();
        Some((t, self.bitmap.sample(u, v)))
    }
}
