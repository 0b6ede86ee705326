use std::fmt::{Display, Formatter, Result};

use math::hcm;

/// Gates both ray self-intersection avoidance (`t_min = RAY_EPS`) and the "closer hit"
/// threshold of the all-hits traversal: coincident surfaces within float noise are kept and
/// composited rather than flickering.
pub const RAY_EPS: f32 = 1e-4;

/// Represents a ray:
///
///   origin + t * direction
///
/// where t lies in `(t_min, t_max]`.
///
/// `t_min` defaults to `RAY_EPS` so that a ray spawned from a surface does not immediately
/// re-intersect it. A `Ray` can be used to intersect primitives, a `BBox`, and the BVHs.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: hcm::Point3,
    pub dir: hcm::Vec3,
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    pub fn new(origin: hcm::Point3, dir: hcm::Vec3) -> Self {
        Ray {
            origin,
            dir,
            t_min: RAY_EPS,
            t_max: f32::INFINITY,
        }
    }

    pub fn with_extent(self, t_max: f32) -> Self {
        Ray { t_max, ..self }
    }

    pub fn set_extent(&mut self, t_max: f32) {
        self.t_max = t_max;
    }

    /// Returns `None` if the given `t` is outside the ray's extent `(t_min, t_max]`,
    /// `Some(t)` otherwise.
    pub fn truncated_t(&self, t: f32) -> Option<f32> {
        if t <= self.t_min || t > self.t_max {
            None
        } else {
            Some(t)
        }
    }

    pub fn position_at(&self, t: f32) -> hcm::Point3 {
        self.origin + t * self.dir
    }

    /// Per-axis sign of the direction, used by BVH traversal to favor the near child.
    pub fn dir_signs(&self) -> [bool; 3] {
        [
            self.dir.x.is_sign_negative(),
            self.dir.y.is_sign_negative(),
            self.dir.z.is_sign_negative(),
        ]
    }
}

impl Display for Ray {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let p = f.precision().unwrap_or(2);
        write!(f, "{:.p$} + t{:.p$}", self.origin, self.dir, p = p)
    }
}
