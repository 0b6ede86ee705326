use crate::sampler::SamplerKind;
use accel::SceneBvh;
use geometry::{Camera, Ray};
use math::hcm::Vec2;
use radiometry::Color;
use scene::{DashCap, DashMode, Material};
use shape::{PrimKind, TraceShape};
use texts::TraceText;

/// Re-origined gather depth. Each recursion starts at the previous nearest hit, so this
/// only bounds pathological scenes with dozens of stacked translucent layers.
const MAX_DEPTH: u32 = 64;

/// Evaluates radiance for camera rays against a prepared scene. Everything borrowed here
/// is read-only for the duration of a pass.
pub struct Tracer<'a> {
    pub shapes: &'a [TraceShape],
    pub bvh: &'a SceneBvh,
    pub texts: &'a [TraceText],
    pub camera: &'a Camera,
    pub width_px: f32,
    pub sampler: SamplerKind,
    pub background: Color,
}

impl<'a> Tracer<'a> {
    /// Radiance of the image point `uv` in [0, 1]^2. Non-finite results are suppressed to
    /// zero so one bad sample cannot poison the accumulator.
    pub fn radiance(&self, uv: Vec2) -> Color {
        let ray = self.camera.generate_ray(uv);
        let geometry = match self.sampler {
            SamplerKind::Color => self.geometry_color(&ray, true, 0),
            SamplerKind::Normal => self.normal_color(&ray),
            SamplerKind::Uv => self.uv_color(&ray),
            SamplerKind::Eyelight => self.eyelight_color(&ray),
        };
        // The text layer composites in front of all geometry, the background behind.
        let out = self.text_color(&ray).over(geometry).over(self.background);
        if out.has_non_finite() {
            Color::TRANSPARENT
        } else {
            out
        }
    }

    /// Front-to-back composite of the layers along the ray. Each gather returns the
    /// nearest cluster of coincident hits; when compositing them does not reach full
    /// opacity, the next gather restarts from the nearest hit position (not a t-offset
    /// along the direction, which would lose precision far from the origin).
    fn geometry_color(&self, ray: &Ray, first: bool, depth: u32) -> Color {
        let hits = self.bvh.intersect_all(self.shapes, ray);
        if hits.is_empty() {
            return Color::TRANSPARENT;
        }
        let mut acc = Color::TRANSPARENT;
        for (i, h) in hits.iter().enumerate() {
            let shape = &self.shapes[h.shape];
            let material = &shape.material;
            let color = if h.kind.is_stroke() {
                material.stroke
            } else {
                shape.fill_of(h.kind)
            };
            if self.stroke_visible(shape, h.kind, &h.hit, first && i == 0) {
                acc = acc.over(color);
            }
            if acc.is_opaque() {
                return acc;
            }
        }
        if depth < MAX_DEPTH {
            let behind = Ray::new(hits[0].hit.pos, ray.dir);
            acc = acc.over(self.geometry_color(&behind, false, depth + 1));
        }
        acc
    }

    /// Applies the dash pattern to line and border hits. Arrow heads and non-stroke hits
    /// are always visible.
    fn stroke_visible(
        &self, shape: &TraceShape, kind: PrimKind, hit: &geometry::Hit, first_hit: bool,
    ) -> bool {
        let dashable = match kind {
            PrimKind::Line { arrow, .. } => !arrow,
            PrimKind::Border => true,
            _ => false,
        };
        if !dashable {
            return true;
        }
        let material = &shape.material;
        let dashed = match material.dashed {
            DashMode::Always => true,
            DashMode::Never => false,
            // Dashes appear only where the line is seen through something else.
            DashMode::Transparency => !first_hit,
        };
        if !dashed {
            return true;
        }
        // Hit (u, v) is in world units along/off the axis; dash patterns are specified in
        // screen pixels.
        let ppw = self.camera.pixels_per_world(hit.pos, self.width_px);
        let u_px = shape.dash_offset(kind) + hit.uv.0 * ppw;
        let v_px = hit.uv.1 * ppw;
        dash_visible(material, u_px, v_px)
    }

    fn text_color(&self, ray: &Ray) -> Color {
        let mut layers: Vec<(f32, Color)> = self
            .texts
            .iter()
            .filter_map(|t| t.intersect(ray))
            .collect();
        layers.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        layers
            .into_iter()
            .fold(Color::TRANSPARENT, |acc, (_, c)| acc.over(c))
    }

    fn normal_color(&self, ray: &Ray) -> Color {
        match self.bvh.intersect_nearest(self.shapes, ray) {
            None => Color::TRANSPARENT,
            Some(h) => {
                let n = h.hit.normal;
                Color::new(n.x * 0.5 + 0.5, n.y * 0.5 + 0.5, n.z * 0.5 + 0.5, 1.0)
            }
        }
    }

    fn uv_color(&self, ray: &Ray) -> Color {
        match self.bvh.intersect_nearest(self.shapes, ray) {
            None => Color::TRANSPARENT,
            Some(h) => {
                let (u, v) = h.hit.uv;
                Color::new(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0), 0.0, 1.0)
            }
        }
    }

    fn eyelight_color(&self, ray: &Ray) -> Color {
        match self.bvh.intersect_nearest(self.shapes, ray) {
            None => Color::TRANSPARENT,
            Some(h) => {
                let shape = &self.shapes[h.shape];
                let base = if h.kind.is_stroke() {
                    shape.material.stroke
                } else {
                    shape.fill_of(h.kind)
                };
                let shade = h.hit.normal.dot(-ray.dir.hat()).max(0.0);
                Color::new(base.r * shade, base.g * shade, base.b * shade, base.a)
            }
        }
    }
}

/// One-dimensional dash test in pixel units. `u_px` runs along the line (caps included,
/// summed over prior polyline segments), `v_px` is the perpendicular offset.
pub fn dash_visible(material: &Material, u_px: f32, v_px: f32) -> bool {
    let r = 0.5 * material.thickness;
    let period = material.dash_period;
    if period <= 0.0 {
        return true;
    }
    let on = match material.dash_cap {
        DashCap::Round => material.dash_on.max(2.0 * r),
        DashCap::Square => material.dash_on,
    };
    if period < on {
        // The gaps vanished; draw solid.
        return true;
    }
    let f = (u_px + material.dash_phase).rem_euclid(period);
    if f >= on {
        return false;
    }
    match material.dash_cap {
        DashCap::Square => true,
        DashCap::Round => {
            // Rounded dash ends: the point must lie inside the end disk of radius r.
            if f < r {
                (r - f) * (r - f) + v_px * v_px < r * r
            } else if f > on - r {
                let g = r - on + f;
                g * g + v_px * v_px < r * r
            } else {
                true
            }
        }
    }
}
