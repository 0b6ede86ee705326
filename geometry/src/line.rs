use crate::intersect::{intersect_disk, Hit};
use crate::ray::Ray;
use crate::BBox;
use math::float::solve_quadratic;
use math::hcm::{Point3, Vec3};

/// Radii within this cosine-squared of each other are treated as equal (cylinder body
/// instead of a truncated cone).
pub const EQUAL_RADII_COS2: f32 = 0.999999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowKind {
    Triangle,
    Stealth,
}

/// One end of a line segment. Arrow geometry (base center, tip, base radius, stealth notch
/// planes) is precomputed in screen space during shape preparation and stored in world
/// coordinates here.
#[derive(Debug, Clone, Copy)]
pub enum End {
    Cap,
    Arrow {
        kind: ArrowKind,
        base: Point3,
        tip: Point3,
        radius: f32,
        /// Unit normals of the two 45-degree clip planes (stealth only; unused for
        /// triangle arrows). The removed notch is the region behind both planes.
        notch: (Vec3, Vec3),
    },
}

impl End {
    pub fn is_arrow(&self) -> bool {
        matches!(self, End::Arrow { .. })
    }
}

/// A line segment swept volume: capsule or truncated-cone body plus two end pieces.
/// `uv` of a hit is `(axial arc-length from p0 in world units, radial distance from the
/// axis)`; the axial value runs negative on the start cap and past the length on the end
/// cap so dashing stays continuous across caps.
#[derive(Debug, Clone, Copy)]
pub struct LineSeg {
    pub p0: Point3,
    pub p1: Point3,
    pub r0: f32,
    pub r1: f32,
    pub end0: End,
    pub end1: End,
}

/// A line hit additionally reports whether an arrow head was struck, so the material layer
/// can suppress dashing there.
#[derive(Debug, Clone, Copy)]
pub struct LineHit {
    pub hit: Hit,
    pub arrow: bool,
}

/// Both roots of |o + t d - c|^2 = radius^2, in increasing order.
fn sphere_roots(center: Point3, radius: f32, r: &Ray) -> Option<(f32, f32)> {
    let f = r.origin - center;
    solve_quadratic(
        r.dir.norm_squared(),
        2.0 * f.dot(r.dir),
        f.norm_squared() - radius * radius,
    )
}

/// Roots of the infinite double cone with apex `apex`, unit axis `axis`, and half-angle
/// whose cosine-squared is `cos2`. Callers must check the nappe and axial range.
fn cone_roots(apex: Point3, axis: Vec3, cos2: f32, r: &Ray) -> Option<(f32, f32)> {
    // (w . axis)^2 = |w|^2 cos^2  with  w = o + t d - apex.
    let w0 = r.origin - apex;
    let dv = r.dir.dot(axis);
    let wv = w0.dot(axis);
    let a = dv * dv - cos2 * r.dir.norm_squared();
    let b = 2.0 * (dv * wv - cos2 * r.dir.dot(w0));
    let c = wv * wv - cos2 * w0.norm_squared();
    if a.abs() < 1e-12 {
        // Ray parallel to the cone surface: linear equation.
        if b.abs() < 1e-12 {
            return None;
        }
        let t = -c / b;
        return Some((t, t));
    }
    solve_quadratic(a, b, c)
}

struct Candidate {
    t: f32,
    pos: Point3,
    normal: Vec3,
    axial: f32, // along the canonical axis, from canonical p0
    radial: f32,
    arrow: bool,
}

impl LineSeg {
    pub fn length(&self) -> f32 {
        (self.p1 - self.p0).norm()
    }

    /// Swept-volume bounds: endpoint spheres grown by the truncated-cone cap expansion,
    /// plus arrow base spheres. BVH leaves rely on this box containing every sub-piece.
    pub fn bbox(&self) -> BBox {
        let len = self.length();
        let mut inv_cos = 1.0;
        if len > 0.0 {
            let dr = (self.r1 - self.r0).abs();
            inv_cos = (len * len + dr * dr).sqrt() / len;
        }
        let mut bbox = crate::bbox::union(
            BBox::around(self.p0, self.r0 * inv_cos),
            BBox::around(self.p1, self.r1 * inv_cos),
        );
        for end in [self.end0, self.end1].iter() {
            if let End::Arrow {
                base, tip, radius, ..
            } = end
            {
                bbox = crate::bbox::union(bbox, BBox::around(*base, *radius));
                bbox = crate::bbox::union(bbox, BBox::around(*tip, *radius));
            }
        }
        bbox
    }

    pub fn intersect(&self, r: &Ray) -> Option<LineHit> {
        // Canonical order: radius does not decrease from a to b.
        let (pa, pb, ra, rb, ea, eb, swapped) = if self.r0 <= self.r1 {
            (self.p0, self.p1, self.r0, self.r1, self.end0, self.end1, false)
        } else {
            (self.p1, self.p0, self.r1, self.r0, self.end1, self.end0, true)
        };
        let axis = pb - pa;
        let len = axis.norm();
        if len < 1e-12 {
            // Degenerate segment: a sphere of the larger radius.
            let (t0, t1) = sphere_roots(pa, rb, r)?;
            let t = r.truncated_t(t0).or_else(|| r.truncated_t(t1))?;
            let pos = r.position_at(t);
            let normal = (pos - pa).try_hat()?;
            return Some(LineHit {
                hit: Hit::new(t, pos, normal, (0.0, 0.0)),
                arrow: false,
            });
        }
        let dir = axis / len;

        let cos2 = len * len / (len * len + (rb - ra) * (rb - ra));
        let equal = cos2 >= EQUAL_RADII_COS2;
        let sin_a = ((1.0 - cos2).max(0.0)).sqrt();
        let cos_a = cos2.sqrt();
        let tan_a = sin_a / cos_a;

        // Axial range of the body, in canonical coordinates (0 at pa).
        let (mut x_lo, mut x_hi) = if equal {
            (0.0, len)
        } else {
            // Tangent cap spheres: radius rc = r / cos, centered at p + dir (tan * rc);
            // the body meets each cap tangentially at x_c - rc sin.
            let rc_a = ra / cos_a;
            let rc_b = rb / cos_a;
            (
                tan_a * rc_a - rc_a * sin_a,
                len + tan_a * rc_b - rc_b * sin_a,
            )
        };
        if let End::Arrow { base, .. } = ea {
            x_lo = (base - pa).dot(dir);
        }
        if let End::Arrow { base, .. } = eb {
            x_hi = (base - pa).dot(dir);
        }

        let mut best: Option<Candidate> = None;
        let mut consider = |c: Candidate| {
            if best.as_ref().map_or(true, |b| c.t < b.t) {
                best = Some(c);
            }
        };

        // Body: cylinder for equal radii, truncated cone otherwise.
        if equal {
            let rm = 0.5 * (ra + rb);
            // |w - (w . dir) dir|^2 = rm^2 with w = o + t d - pa.
            let w0 = r.origin - pa;
            let d_perp = r.dir - dir * r.dir.dot(dir);
            let w_perp = w0 - dir * w0.dot(dir);
            if let Some((t0, t1)) = solve_quadratic(
                d_perp.norm_squared(),
                2.0 * d_perp.dot(w_perp),
                w_perp.norm_squared() - rm * rm,
            ) {
                for &t in [t0, t1].iter() {
                    if let Some(t) = r.truncated_t(t) {
                        let pos = r.position_at(t);
                        let x = (pos - pa).dot(dir);
                        if x >= x_lo && x <= x_hi {
                            let radial = pos - (pa + dir * x);
                            if let Some(n) = radial.try_hat() {
                                consider(Candidate {
                                    t,
                                    pos,
                                    normal: n,
                                    axial: x,
                                    radial: radial.norm(),
                                    arrow: false,
                                });
                            }
                        }
                    }
                }
            }
        } else {
            let apex = pa - dir * (ra / tan_a);
            if let Some((t0, t1)) = cone_roots(apex, dir, cos2, r) {
                for &t in [t0, t1].iter() {
                    if let Some(t) = r.truncated_t(t) {
                        let pos = r.position_at(t);
                        let x = (pos - pa).dot(dir);
                        let on_nappe = (pos - apex).dot(dir) > 0.0;
                        if on_nappe && x >= x_lo && x <= x_hi {
                            let radial = pos - (pa + dir * x);
                            if let Some(ru) = radial.try_hat() {
                                consider(Candidate {
                                    t,
                                    pos,
                                    normal: (ru * cos_a - dir * sin_a).hat(),
                                    axial: x,
                                    radial: radial.norm(),
                                    arrow: false,
                                });
                            }
                        }
                    }
                }
            }
        }

        // End pieces. `side` is -1 at the a-end, +1 at the b-end.
        let ends = [(ea, pa, ra, -1.0f32, x_lo), (eb, pb, rb, 1.0, x_hi)];
        for &(end, p, radius, side, x_limit) in ends.iter() {
            match end {
                End::Cap => {
                    // Tangent sphere: hemisphere for equal radii.
                    let rc = radius / cos_a;
                    let center = p + dir * (tan_a * rc);
                    if let Some((t0, t1)) = sphere_roots(center, rc, r) {
                        for &t in [t0, t1].iter() {
                            if let Some(t) = r.truncated_t(t) {
                                let pos = r.position_at(t);
                                let x = (pos - pa).dot(dir);
                                let beyond = if side < 0.0 { x <= x_limit } else { x >= x_limit };
                                if beyond {
                                    if let Some(n) = (pos - center).try_hat() {
                                        let radial =
                                            (pos - (pa + dir * x)).norm();
                                        consider(Candidate {
                                            t,
                                            pos,
                                            normal: n,
                                            axial: x,
                                            radial,
                                            arrow: false,
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
                End::Arrow {
                    kind,
                    base,
                    tip,
                    radius: arrow_r,
                    notch,
                } => {
                    self.intersect_arrow(
                        kind, base, tip, arrow_r, notch, pa, dir, r, &mut consider,
                    );
                }
            }
        }

        let c = best?;
        let axial = if swapped { len - c.axial } else { c.axial };
        Some(LineHit {
            hit: Hit::new(c.t, c.pos, c.normal, (axial, c.radial)),
            arrow: c.arrow,
        })
    }

    fn intersect_arrow<F: FnMut(Candidate)>(
        &self, kind: ArrowKind, base: Point3, tip: Point3, radius: f32, notch: (Vec3, Vec3),
        pa: Point3, main_dir: Vec3, r: &Ray, consider: &mut F,
    ) {
        let ax = match (base - tip).try_hat() {
            Some(v) => v,
            None => return,
        };
        let height = (base - tip).norm();
        let cos2 = height * height / (height * height + radius * radius);
        let cos_b = cos2.sqrt();
        let sin_b = ((1.0 - cos2).max(0.0)).sqrt();
        // Notch apex: the concave vertex of the stealth profile, one base-radius ahead of
        // the base plane toward the tip.
        let notch_apex = base - ax * radius;
        let in_notch = |p: Point3| {
            (p - notch_apex).dot(notch.0) < 0.0 && (p - notch_apex).dot(notch.1) < 0.0
        };

        // Lateral surface.
        if let Some((t0, t1)) = cone_roots(tip, ax, cos2, r) {
            for &t in [t0, t1].iter() {
                if let Some(t) = r.truncated_t(t) {
                    let pos = r.position_at(t);
                    let h = (pos - tip).dot(ax);
                    if h < 0.0 || h > height {
                        continue;
                    }
                    if kind == ArrowKind::Stealth && in_notch(pos) {
                        continue;
                    }
                    let radial = pos - (tip + ax * h);
                    if let Some(ru) = radial.try_hat() {
                        consider(Candidate {
                            t,
                            pos,
                            normal: (ru * cos_b - ax * sin_b).hat(),
                            axial: (pos - pa).dot(main_dir),
                            radial: (pos - (pa + main_dir * (pos - pa).dot(main_dir))).norm(),
                            arrow: true,
                        });
                    }
                }
            }
        }

        match kind {
            ArrowKind::Triangle => {
                // Flat base disk closing the cone.
                if let Some(hit) = intersect_disk(base, ax, radius, r) {
                    consider(Candidate {
                        t: hit.t,
                        pos: hit.pos,
                        normal: ax,
                        axial: (hit.pos - pa).dot(main_dir),
                        radial: (hit.pos
                            - (pa + main_dir * (hit.pos - pa).dot(main_dir)))
                        .norm(),
                        arrow: true,
                    });
                }
            }
            ArrowKind::Stealth => {
                // The two 45-degree notch faces. Each face lies on a clip plane, inside
                // the cone, and behind the other plane; outward normal points into the
                // removed wedge.
                let planes = [(notch.0, notch.1), (notch.1, notch.0)];
                for &(n, other) in planes.iter() {
                    let denom = r.dir.dot(n);
                    if denom.abs() < 1e-12 {
                        continue;
                    }
                    let t = (notch_apex - r.origin).dot(n) / denom;
                    if let Some(t) = r.truncated_t(t) {
                        let pos = r.position_at(t);
                        let h = (pos - tip).dot(ax);
                        if h < 0.0 || h > height {
                            continue;
                        }
                        let radial = (pos - (tip + ax * h)).norm();
                        if radial > h / height * radius {
                            continue; // outside the cone
                        }
                        if (pos - notch_apex).dot(other) >= 0.0 {
                            // On the kept side of the other plane; the apex itself sits
                            // on both planes and belongs to neither face.
                            continue;
                        }
                        consider(Candidate {
                            t,
                            pos,
                            normal: -n,
                            axial: (pos - pa).dot(main_dir),
                            radial: (pos
                                - (pa + main_dir * (pos - pa).dot(main_dir)))
                            .norm(),
                            arrow: true,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ray::RAY_EPS;
    use math::hcm::{point3, vec3};

    fn cap_line(p0: Point3, p1: Point3, r: f32) -> LineSeg {
        LineSeg {
            p0,
            p1,
            r0: r,
            r1: r,
            end0: End::Cap,
            end1: End::Cap,
        }
    }

    #[test]
    fn capsule_body_hit() {
        let seg = cap_line(point3(-1.0, 0.0, 0.0), point3(1.0, 0.0, 0.0), 0.1);
        let r = Ray::new(point3(0.3, 0.0, 1.0), vec3(0.0, 0.0, -1.0));
        let lh = seg.intersect(&r).unwrap();
        assert!((lh.hit.t - 0.9).abs() < 1e-4, "t = {}", lh.hit.t);
        assert!(!lh.arrow);
        // Axial arc length from p0; radial equals the radius on the surface.
        assert!((lh.hit.uv.0 - 1.3).abs() < 1e-4);
        assert!((lh.hit.uv.1 - 0.1).abs() < 1e-4);
        assert!((lh.hit.normal - vec3(0.0, 0.0, 1.0)).norm_squared() < 1e-6);
    }

    #[test]
    fn capsule_cap_hit() {
        let seg = cap_line(point3(-1.0, 0.0, 0.0), point3(1.0, 0.0, 0.0), 0.1);
        // Straight down onto the hemisphere past the endpoint.
        let r = Ray::new(point3(1.05, 0.0, 1.0), vec3(0.0, 0.0, -1.0));
        let lh = seg.intersect(&r).unwrap();
        assert!(lh.hit.uv.0 > 2.0, "axial = {}", lh.hit.uv.0);
        // Beyond the swept volume entirely.
        let r = Ray::new(point3(1.2, 0.0, 1.0), vec3(0.0, 0.0, -1.0));
        assert!(seg.intersect(&r).is_none());
    }

    #[test]
    fn capsule_matches_swapped_order() {
        // Equal-radius segments must not depend on endpoint order.
        let a = cap_line(point3(-1.0, 0.2, 0.0), point3(1.0, -0.3, 0.0), 0.15);
        let b = cap_line(a.p1, a.p0, 0.15);
        let r = Ray::new(point3(0.1, 0.0, 2.0), vec3(-0.05, 0.02, -1.0));
        let (ha, hb) = (a.intersect(&r).unwrap(), b.intersect(&r).unwrap());
        assert!((ha.hit.t - hb.hit.t).abs() < RAY_EPS);
        assert!((ha.hit.normal - hb.hit.normal).norm() < 1e-5);
    }

    #[test]
    fn truncated_cone_silhouette_c1() {
        // Cap normal must match the cone side normal at the tangency circle to 1e-4.
        let (r0, r1) = (0.1f32, 0.3f32);
        let seg = LineSeg {
            p0: point3(0.0, 0.0, 0.0),
            p1: point3(2.0, 0.0, 0.0),
            r0,
            r1,
            end0: End::Cap,
            end1: End::Cap,
        };
        let len = 2.0f32;
        let tan_a = (r1 - r0) / len;
        let cos_a = 1.0 / (1.0 + tan_a * tan_a).sqrt();
        let sin_a = tan_a * cos_a;
        // Tangency at the wide end: x_t = len + rc (tan - sin) with rc = r1 / cos.
        let rc = r1 / cos_a;
        let x_t = len + rc * (tan_a - sin_a);
        let surface_r = |x: f32| r0 / cos_a + (x - 0.0) * tan_a; // cone radius along axis
        for &dx in [-1e-3f32, 1e-3].iter() {
            let x = x_t + dx;
            let approach = surface_r(x).max(rc) + 0.5;
            let r = Ray::new(point3(x, approach, 0.0), vec3(0.0, -1.0, 0.0));
            let lh = seg.intersect(&r).unwrap();
            let expected = vec3(-sin_a, cos_a, 0.0);
            // The sample points sit 1e-3 to either side of the tangency circle; the
            // normals drift from the shared tangent value by about dx / rc.
            assert!(
                (lh.hit.normal - expected).norm() < 1e-2,
                "dx = {}, normal = {}, expected = {}",
                dx,
                lh.hit.normal,
                expected
            );
        }
    }

    #[test]
    fn cone_agrees_with_capsule_when_radii_equal() {
        let capsule = cap_line(point3(0.0, 0.0, 0.0), point3(3.0, 0.0, 0.0), 0.2);
        let nearly = LineSeg {
            r1: 0.2 + 1e-7,
            ..capsule
        };
        for i in 0..20 {
            let x = i as f32 * 0.15;
            let r = Ray::new(point3(x, 0.05, 1.0), vec3(0.01, 0.0, -1.0));
            match (capsule.intersect(&r), nearly.intersect(&r)) {
                (None, None) => (),
                (Some(a), Some(b)) => {
                    assert!((a.hit.t - b.hit.t).abs() < 1e-4, "x = {}", x);
                    assert!((a.hit.normal - b.hit.normal).norm() < 1e-5);
                }
                (a, b) => panic!("x = {}: {:?} vs {:?}", x, a.is_some(), b.is_some()),
            }
        }
    }

    #[test]
    fn triangle_arrow_placement() {
        // Segment (0,0,0)-(1,0,0), r = 0.05: base at (0.8, 0, 0), radius 8r/3.
        let r_line = 0.05f32;
        let base = point3(1.0 - 4.0 * r_line, 0.0, 0.0);
        let tip = point3(1.0 + 4.0 * r_line, 0.0, 0.0);
        let radius = 8.0 * r_line / 3.0;
        let seg = LineSeg {
            p0: point3(0.0, 0.0, 0.0),
            p1: point3(1.0, 0.0, 0.0),
            r0: r_line,
            r1: r_line,
            end0: End::Cap,
            end1: End::Arrow {
                kind: ArrowKind::Triangle,
                base,
                tip,
                radius,
                notch: (Vec3::ZERO, Vec3::ZERO),
            },
        };
        // Down onto the widest part of the head, just ahead of the base plane.
        let r = Ray::new(point3(0.801, 0.0, 1.0), vec3(0.0, 0.0, -1.0));
        let lh = seg.intersect(&r).unwrap();
        assert!(lh.arrow);
        assert!(lh.hit.uv.1 < radius && lh.hit.uv.1 > radius * 0.9);
        // Down onto the body before the head: not an arrow hit.
        let r = Ray::new(point3(0.5, 0.0, 1.0), vec3(0.0, 0.0, -1.0));
        let lh = seg.intersect(&r).unwrap();
        assert!(!lh.arrow);
        assert!((lh.hit.uv.1 - r_line).abs() < 1e-4);
        // The tip is hit at x slightly beyond the endpoint.
        let r = Ray::new(point3(1.19, 0.0, 1.0), vec3(0.0, 0.0, -1.0));
        let lh = seg.intersect(&r).unwrap();
        assert!(lh.arrow);
    }

    #[test]
    fn stealth_notch_concave() {
        let r_line = 0.05f32;
        let base = point3(0.8, 0.0, 0.0);
        let tip = point3(1.2, 0.0, 0.0);
        let radius = 8.0 * r_line / 3.0;
        let ax = vec3(1.0, 0.0, 0.0);
        let s = vec3(0.0, 1.0, 0.0);
        let inv_sqrt2 = std::f32::consts::FRAC_1_SQRT_2;
        let seg = LineSeg {
            p0: point3(0.0, 0.0, 0.0),
            p1: point3(1.0, 0.0, 0.0),
            r0: r_line,
            r1: r_line,
            end0: End::Cap,
            end1: End::Arrow {
                kind: ArrowKind::Stealth,
                base,
                tip,
                radius,
                notch: (
                    (ax + s) * inv_sqrt2,
                    (ax - s) * inv_sqrt2,
                ),
            },
        };
        // A ray along -x toward the base center: the triangle arrow would hit the base
        // disk; the stealth notch lets it through to the shortened body.
        let r = Ray::new(point3(0.95, 0.0, 0.0), vec3(-1.0, 0.0, 0.0));
        let lh = seg.intersect(&r);
        assert!(lh.is_none() || !lh.unwrap().arrow, "notch should be open");
        // A ray hitting the barb area near the rim still strikes the head.
        let r = Ray::new(point3(0.81, radius * 0.98, 1.0), vec3(0.0, 0.0, -1.0));
        match seg.intersect(&r) {
            Some(lh) => assert!(lh.arrow),
            None => panic!("barb should be solid"),
        }
    }

    #[test]
    fn bbox_contains_swept_volume() {
        let r_line = 0.05f32;
        let seg = LineSeg {
            p0: point3(0.0, 0.0, 0.0),
            p1: point3(1.0, 0.0, 0.0),
            r0: r_line,
            r1: r_line,
            end0: End::Cap,
            end1: End::Arrow {
                kind: ArrowKind::Triangle,
                base: point3(0.8, 0.0, 0.0),
                tip: point3(1.2, 0.0, 0.0),
                radius: 8.0 * r_line / 3.0,
                notch: (Vec3::ZERO, Vec3::ZERO),
            },
        };
        let bbox = seg.bbox();
        assert!(bbox.contains(point3(1.2, 0.0, 0.0))); // tip
        assert!(bbox.contains(point3(0.8, 8.0 * r_line / 3.0, 0.0))); // base rim
        assert!(bbox.contains(point3(-r_line, 0.0, 0.0))); // start cap
    }
}
