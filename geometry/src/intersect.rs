use crate::ray::Ray;
use math::float::solve_quadratic;
use math::hcm::{Point3, Vec3};
use std::f32::consts::{FRAC_1_PI, PI};

/// Geometric information of a ray-surface intersection:
/// - `t`: parametric distance of the ray at the intersection,
/// - `pos`: world position,
/// - `normal`: outward surface normal,
/// - `uv`: 2D surface parameter; its meaning is primitive-specific (spherical for points,
///   arc-length/radial for lines, barycentric for triangles and quads).
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f32,
    pub pos: Point3,
    pub normal: Vec3,
    pub uv: (f32, f32),
}

impl Hit {
    pub fn new(t: f32, pos: Point3, normal: Vec3, uv: (f32, f32)) -> Self {
        Hit { t, pos, normal, uv }
    }
}

/// Ray-sphere intersection with spherical `(u, v)`. Diagram points render as spheres of
/// 3x their per-vertex radius; the caller applies that enlargement.
pub fn intersect_sphere(center: Point3, radius: f32, r: &Ray) -> Option<Hit> {
    // |o + t d - c|^2 = radius^2, a quadratic in t:
    // (d.d) t^2 + 2 d.(o-c) t + |o-c|^2 - radius^2 = 0
    let f = r.origin - center;
    let a = r.dir.norm_squared();
    let b = 2.0 * f.dot(r.dir);
    let c = f.norm_squared() - radius * radius;
    let (t0, t1) = solve_quadratic(a, b, c)?;
    let t = r.truncated_t(t0).or_else(|| r.truncated_t(t1))?;
    let pos = r.position_at(t);
    let normal = (pos - center) / radius;
    let phi = normal.z.atan2(normal.x);
    let u = (phi * FRAC_1_PI * 0.5 + 1.0).fract();
    let v = normal.y.clamp(-1.0, 1.0).acos() / PI;
    Some(Hit::new(t, pos, normal, (u, v)))
}

/// Moller-Trumbore ray-triangle intersection. The returned `(u, v)` are the barycentric
/// coordinates of `p1` and `p2`.
pub fn intersect_triangle(p0: Point3, p1: Point3, p2: Point3, r: &Ray) -> Option<Hit> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let pv = r.dir.cross(e2);
    let det = e1.dot(pv);
    if det.abs() < 1e-12 {
        return None; // parallel or degenerate
    }
    let inv_det = 1.0 / det;
    let tv = r.origin - p0;
    let u = tv.dot(pv) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qv = tv.cross(e1);
    let v = r.dir.dot(qv) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = r.truncated_t(e2.dot(qv) * inv_det)?;
    let normal = e1.cross(e2).try_hat()?;
    Some(Hit::new(t, r.position_at(t), normal, (u, v)))
}

/// Quads split into two triangles along the (0, 2) diagonal. Degenerate quads (last two
/// vertices equal) are tested as the single triangle (0, 1, 2).
pub fn intersect_quad(
    p0: Point3, p1: Point3, p2: Point3, p3: Point3, degenerate: bool, r: &Ray,
) -> Option<Hit> {
    let h0 = intersect_triangle(p0, p1, p2, r);
    if degenerate {
        return h0;
    }
    let h1 = intersect_triangle(p0, p2, p3, r);
    match (h0, h1) {
        (None, h) | (h, None) => h,
        (Some(a), Some(b)) => Some(if a.t < b.t { a } else { b }),
    }
}

/// Ray-disk intersection; the disk is the filled circle of `radius` around `center` in the
/// plane of `normal`. `(u, v)` is the radial fraction in both slots.
pub fn intersect_disk(center: Point3, normal: Vec3, radius: f32, r: &Ray) -> Option<Hit> {
    let denom = r.dir.dot(normal);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = r.truncated_t((center - r.origin).dot(normal) / denom)?;
    let pos = r.position_at(t);
    let radial = (pos - center).norm();
    if radial > radius {
        return None;
    }
    let frac = radial / radius;
    Some(Hit::new(t, pos, normal, (frac, frac)))
}
