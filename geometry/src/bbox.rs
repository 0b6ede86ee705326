use std::fmt::{Debug, Display, Formatter, Result};

use crate::ray::Ray;
use math::{
    float::min_max,
    hcm::{Point3, Vec3},
};

/// Expands the far slab distance so rays grazing a box edge are not lost to rounding.
const BBOX_EPS: f32 = 1.000_000_24;

/// 3D bounding-box type.
/// - Build one from 2 `Point3`s or grow an `empty()` one;
/// - Expand it by `b.union()` / `union(b1, b2)` or by absorbing points;
/// - Check if it `encloses()` another box, or intersect it with a `Ray`.
#[derive(Debug, Clone, Copy)]
pub struct BBox {
    min: Point3,
    max: Point3,
}

impl BBox {
    pub fn empty() -> BBox {
        BBox {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(-f32::INFINITY, -f32::INFINITY, -f32::INFINITY),
        }
    }
    pub fn new(p0: Point3, p1: Point3) -> BBox {
        let (xmin, xmax) = min_max(p0.x, p1.x);
        let (ymin, ymax) = min_max(p0.y, p1.y);
        let (zmin, zmax) = min_max(p0.z, p1.z);
        BBox {
            min: Point3::new(xmin, ymin, zmin),
            max: Point3::new(xmax, ymax, zmax),
        }
    }

    /// A box covering the sphere of `radius` at `center`. Swept primitives build their
    /// bounds from these, one per endpoint, with the end-piece expansion folded into the
    /// radius.
    pub fn around(center: Point3, radius: f32) -> BBox {
        let half = Vec3::new(radius, radius, radius);
        BBox::new(center - half, center + half)
    }

    pub fn union(self, p: Point3) -> BBox {
        let mut result = self;
        for i in 0..3 {
            result.min[i] = self.min[i].min(p[i]);
            result.max[i] = self.max[i].max(p[i]);
        }
        result
    }

    pub fn midpoint(self) -> Point3 {
        (self.max - self.min) * 0.5 + self.min
    }

    pub fn diag(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn min(&self) -> Point3 {
        self.min
    }
    pub fn max(&self) -> Point3 {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Half surface area, regularized with a small epsilon so the SAH cost of a degenerate
    /// (flat or empty) box never divides by zero.
    pub fn half_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let Vec3 { x, y, z } = self.diag();
        let (x, y, z) = (x + 1e-8, y + 1e-8, z + 1e-8);
        x * y + y * z + z * x
    }

    /// Slab test with precomputed reciprocal direction; the far distance is scaled by
    /// `BBOX_EPS` to avoid edge-case misses.
    pub fn intersect_pre(&self, origin: Point3, inv_dir: Vec3, t_min: f32, t_max: f32) -> bool {
        let (mut t0, mut t1) = (t_min, t_max);
        for axis in 0..3 {
            if inv_dir[axis].is_infinite() {
                // Zero direction component: the slab distances are +/-inf, and an origin
                // exactly on a slab plane turns 0 * inf into NaN. Test containment instead.
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return false;
                }
                continue;
            }
            let d0 = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let d1 = (self.max[axis] - origin[axis]) * inv_dir[axis];
            let (near, far) = min_max(d0, d1);
            t0 = t0.max(near);
            t1 = t1.min(far * BBOX_EPS);
            if t1 < t0 {
                return false;
            }
        }
        true
    }

    pub fn intersect(&self, r: &Ray) -> bool {
        let inv_dir = Vec3::new(1.0 / r.dir.x, 1.0 / r.dir.y, 1.0 / r.dir.z);
        self.intersect_pre(r.origin, inv_dir, r.t_min, r.t_max)
    }

    pub fn encloses(&self, other: Self) -> bool {
        for axis in 0..3 {
            if self.min[axis] > other.min[axis] {
                return false;
            }
            if self.max[axis] < other.max[axis] {
                return false;
            }
        }
        true
    }

    pub fn contains(&self, p: Point3) -> bool {
        for axis in 0..3 {
            if self.min[axis] > p[axis] || self.max[axis] < p[axis] {
                return false;
            }
        }
        true
    }
}

impl Display for BBox {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "box[{} -> {}]", self.min, self.max)
    }
}

pub fn union(b0: BBox, b1: BBox) -> BBox {
    b0.union(b1.min).union(b1.max)
}

#[cfg(test)]
mod test {
    use super::*;
    use math::hcm::{point3, vec3};

    #[test]
    fn slab_hit_and_miss() {
        let b = BBox::new(point3(-1.0, -1.0, -1.0), point3(1.0, 1.0, 1.0));
        let hit = Ray::new(point3(0.0, 0.0, 5.0), vec3(0.0, 0.0, -1.0));
        let miss = Ray::new(point3(0.0, 3.0, 5.0), vec3(0.0, 0.0, -1.0));
        assert!(b.intersect(&hit));
        assert!(!b.intersect(&miss));
    }

    #[test]
    fn grazing_edge_kept() {
        let b = BBox::new(point3(0.0, 0.0, 0.0), point3(1.0, 1.0, 1.0));
        // Ray along the x=0, y=0 edge of the box.
        let r = Ray::new(point3(0.0, 0.0, -1.0), vec3(0.0, 0.0, 1.0));
        assert!(b.intersect(&r));
    }

    #[test]
    fn union_encloses_both() {
        let b0 = BBox::new(point3(0.0, 0.0, 0.0), point3(1.0, 2.0, 1.0));
        let b1 = BBox::new(point3(-3.0, 1.0, 0.5), point3(0.5, 1.5, 4.0));
        let u = union(b0, b1);
        assert!(u.encloses(b0));
        assert!(u.encloses(b1));
    }

    #[test]
    fn respects_ray_extent() {
        let b = BBox::new(point3(-1.0, -1.0, 8.0), point3(1.0, 1.0, 9.0));
        let r = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, 1.0)).with_extent(2.0);
        assert!(!b.intersect(&r));
    }
}
