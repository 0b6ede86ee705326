//! Two-level bounding volume hierarchy: a `ShapeBvh` over the primitives of one shape and
//! a `SceneBvh` over shape root boxes. The renderer uses the all-hits traversal because it
//! composites semi-transparent layers front to back; a shrinking nearest-hit traversal is
//! kept for picking-style queries.

pub mod bvh;

pub use bvh::{BuildQuality, Bvh};

use bvh::{NodeKind, STACK_DEPTH};
use geometry::intersect::intersect_triangle;
use geometry::{BBox, Ray, RAY_EPS};
use math::hcm::vec3;
use shape::{PrimHit, PrimKind, TraceShape};

#[derive(Debug, Clone, Copy)]
pub struct SceneHit {
    pub hit: geometry::Hit,
    pub kind: PrimKind,
    /// Ordinal of the shape in the prepared shape list.
    pub shape: usize,
}

/// Accumulates the nearest cluster of hits along a ray: every hit within `RAY_EPS` of the
/// closest one found so far. A hit closer than the cluster by more than `RAY_EPS` discards
/// everything gathered, and a hit farther than the cluster is dropped outright; layers
/// behind the cluster are reached by rays re-origined at the nearest intersection.
struct AllHits {
    hits: Vec<SceneHit>,
    t_min: f32,
}

impl AllHits {
    fn new() -> Self {
        AllHits {
            hits: Vec::new(),
            t_min: f32::INFINITY,
        }
    }
    fn consider(&mut self, h: SceneHit) {
        if h.hit.t < self.t_min - RAY_EPS {
            self.hits.clear();
            self.t_min = h.hit.t;
            self.hits.push(h);
        } else if h.hit.t <= self.t_min + RAY_EPS {
            self.t_min = self.t_min.min(h.hit.t);
            self.hits.push(h);
        }
    }
    /// Extent past which no hit can join the cluster, once a hit exists.
    fn extent(&self) -> Option<f32> {
        self.t_min.is_finite().then(|| self.t_min + RAY_EPS)
    }
}

/// Walks a flat BVH with a fixed stack, favoring the near child along the ray's dominant
/// sign on each node's split axis. The visitor may return a new extent to shrink the ray.
fn walk<F: FnMut(u32, &Ray) -> Option<f32>>(bvh: &Bvh, r: &Ray, mut visit_prim: F) {
    if bvh.nodes.is_empty() {
        return;
    }
    let mut ray = r.clone();
    let inv_dir = vec3(1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z);
    let dsign = ray.dir_signs();
    let mut stack = [0u32; STACK_DEPTH];
    let mut top = 0usize;
    stack[top] = 0;
    top += 1;
    while top > 0 {
        top -= 1;
        let node = &bvh.nodes[stack[top] as usize];
        if !node.bbox.intersect_pre(ray.origin, inv_dir, ray.t_min, ray.t_max) {
            continue;
        }
        match node.kind {
            NodeKind::Leaf { first_prim, count } => {
                for i in first_prim..first_prim + count {
                    if let Some(t) = visit_prim(bvh.order[i as usize], &ray) {
                        ray.set_extent(t);
                    }
                }
            }
            NodeKind::Internal {
                split_axis,
                first_child,
            } => {
                // Near child goes on top of the stack; closer hits then shrink the
                // extent before the far side is tested. The builder puts the
                // smaller-coordinate half at `first_child`.
                let (near, far) = if dsign[split_axis] {
                    (first_child + 1, first_child)
                } else {
                    (first_child, first_child + 1)
                };
                if top + 2 <= STACK_DEPTH {
                    stack[top] = far;
                    stack[top + 1] = near;
                    top += 2;
                }
            }
        }
    }
}

pub struct ShapeBvh {
    bvh: Bvh,
}

impl ShapeBvh {
    pub fn build(shape: &TraceShape, quality: BuildQuality) -> ShapeBvh {
        let bboxes: Vec<BBox> = (0..shape.prim_count()).map(|i| shape.prim_bbox(i)).collect();
        ShapeBvh {
            bvh: Bvh::build(&bboxes, quality),
        }
    }

    pub fn root_bbox(&self) -> BBox {
        self.bvh.root_bbox()
    }

    /// Nearest primitive hit, shrinking the ray extent as hits are found.
    pub fn intersect_nearest(&self, shape: &TraceShape, r: &Ray) -> Option<PrimHit> {
        let mut nearest: Option<PrimHit> = None;
        walk(&self.bvh, r, |prim, ray| {
            // The prim intersection already truncates to the shrunken extent, so any hit
            // here is the new nearest.
            let ph = shape.intersect_prim(prim as usize, ray)?;
            let t = ph.hit.t;
            nearest = Some(ph);
            Some(t)
        });
        nearest
    }
}

pub struct SceneBvh {
    /// Per-shape hierarchies, parallel to the prepared shape list.
    shape_bvhs: Vec<ShapeBvh>,
    /// Ordinals of shapes with at least one primitive; the top-level tree is built over
    /// their root boxes.
    occupied: Vec<u32>,
    top: Bvh,
}

impl SceneBvh {
    pub fn build(shapes: &[TraceShape], quality: BuildQuality) -> SceneBvh {
        let shape_bvhs: Vec<ShapeBvh> =
            shapes.iter().map(|s| ShapeBvh::build(s, quality)).collect();
        let occupied: Vec<u32> = (0..shapes.len())
            .filter(|&i| shapes[i].prim_count() > 0)
            .map(|i| i as u32)
            .collect();
        let bboxes: Vec<BBox> = occupied
            .iter()
            .map(|&i| shape_bvhs[i as usize].root_bbox())
            .collect();
        let top = Bvh::build(&bboxes, quality);
        SceneBvh {
            shape_bvhs,
            occupied,
            top,
        }
    }

    /// The nearest cluster of hits along the ray, sorted near to far: every hit within
    /// `RAY_EPS` of the closest intersection. The caller gathers layers behind the cluster
    /// by re-origining the ray at the nearest hit position.
    pub fn intersect_all(&self, shapes: &[TraceShape], r: &Ray) -> Vec<SceneHit> {
        let mut acc = AllHits::new();
        walk(&self.top, r, |slot, ray| {
            let ordinal = self.occupied[slot as usize] as usize;
            let shape = &shapes[ordinal];
            if passes_clips(shape, ray) {
                walk(&self.shape_bvhs[ordinal].bvh, ray, |prim, ray| {
                    if let Some(ph) = shape.intersect_prim(prim as usize, ray) {
                        acc.consider(SceneHit {
                            hit: ph.hit,
                            kind: ph.kind,
                            shape: ordinal,
                        });
                    }
                    acc.extent()
                });
            }
            acc.extent()
        });
        let mut hits = acc.hits;
        hits.sort_by(|a, b| {
            a.hit.t.partial_cmp(&b.hit.t).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }

    /// Nearest hit over the whole scene (picking-style query).
    pub fn intersect_nearest(&self, shapes: &[TraceShape], r: &Ray) -> Option<SceneHit> {
        let mut nearest: Option<SceneHit> = None;
        walk(&self.top, r, |slot, ray| {
            let ordinal = self.occupied[slot as usize] as usize;
            let shape = &shapes[ordinal];
            if !passes_clips(shape, ray) {
                return None;
            }
            let ph = self.shape_bvhs[ordinal].intersect_nearest(shape, ray)?;
            let t = ph.hit.t;
            nearest = Some(SceneHit {
                hit: ph.hit,
                kind: ph.kind,
                shape: ordinal,
            });
            Some(t)
        });
        nearest
    }
}

/// Convex-clip gate: the shape participates only if the ray hits every clip triangle.
fn passes_clips(shape: &TraceShape, r: &Ray) -> bool {
    // Clip tests ignore the shrunken extent; the gate is about direction, not depth.
    let full = Ray::new(r.origin, r.dir);
    shape
        .cclips
        .chunks_exact(3)
        .all(|t| intersect_triangle(t[0], t[1], t[2], &full).is_some())
}

#[cfg(test)]
mod test {
    use super::*;
    use math::hcm::{point3, vec3, Point3};
    use scene::Material;

    fn point_shape(centers: &[Point3], radius: f32) -> TraceShape {
        TraceShape {
            positions: centers.to_vec(),
            // Point primitives render three radii wide.
            radii: vec![radius / 3.0; centers.len()],
            points: (0..centers.len() as u32).collect(),
            lines: vec![],
            line_attrs: vec![],
            triangles: vec![],
            quads: vec![],
            fills: vec![],
            borders: vec![],
            cclips: vec![],
            material: Material::default(),
        }
    }

    #[test]
    fn all_hits_keep_only_the_nearest_cluster() {
        let shapes = vec![point_shape(
            &[
                point3(3.0, 0.0, 0.0),
                point3(1.0, 0.0, 0.0),
                point3(2.0, 0.0, 0.0),
            ],
            0.2,
        )];
        let bvh = SceneBvh::build(&shapes, BuildQuality::Midpoint);
        let ray = Ray::new(Point3::ORIGIN, vec3(1.0, 0.0, 0.0));
        let hits = bvh.intersect_all(&shapes, &ray);
        // The spheres at x = 2 and x = 3 lie behind the nearest one; re-origined rays
        // reach them, not this gather.
        assert_eq!(hits.len(), 1);
        assert!((hits[0].hit.t - 0.8).abs() < 1e-5);
    }

    #[test]
    fn coincident_surfaces_gather_together() {
        let shapes = vec![
            point_shape(&[point3(1.0, 0.0, 0.0)], 0.2),
            point_shape(&[point3(1.0, 0.0, 0.0)], 0.2),
        ];
        let bvh = SceneBvh::build(&shapes, BuildQuality::Midpoint);
        let ray = Ray::new(Point3::ORIGIN, vec3(1.0, 0.0, 0.0));
        let hits = bvh.intersect_all(&shapes, &ray);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].hit.t - hits[1].hit.t).abs() <= RAY_EPS);
    }

    #[test]
    fn nearest_agrees_with_all_hits() {
        use rand::{rngs::SmallRng, Rng, SeedableRng};
        let mut rng = SmallRng::seed_from_u64(7);
        let centers: Vec<Point3> = (0..64)
            .map(|_| {
                point3(
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                )
            })
            .collect();
        let shapes = vec![point_shape(&centers, 0.25)];
        let bvh = SceneBvh::build(&shapes, BuildQuality::Sah);
        for i in 0..32 {
            let theta = i as f32 * 0.21;
            let ray = Ray::new(
                point3(-5.0, 0.2 * theta.sin(), 0.0),
                vec3(1.0, theta.sin() * 0.2, theta.cos() * 0.2),
            );
            let all = bvh.intersect_all(&shapes, &ray);
            let nearest = bvh.intersect_nearest(&shapes, &ray);
            match (all.first(), nearest) {
                (None, None) => {}
                (Some(a), Some(n)) => assert!((a.hit.t - n.hit.t).abs() < 1e-5),
                other => panic!("all-hits and nearest disagree: {:?}", other),
            }
        }
    }

    #[test]
    fn closer_occluder_discards_gathered_hits() {
        let mut acc = AllHits::new();
        let hit_at = |t: f32| SceneHit {
            hit: geometry::Hit::new(t, point3(t, 0.0, 0.0), vec3(0.0, 0.0, 1.0), (0.0, 0.0)),
            kind: PrimKind::Point,
            shape: 0,
        };
        acc.consider(hit_at(5.0));
        acc.consider(hit_at(2.0));
        assert_eq!(acc.hits.len(), 1);
        // A hit behind the cluster is dropped rather than gathered.
        acc.consider(hit_at(5.0));
        assert_eq!(acc.hits.len(), 1);
        // Within the epsilon band nothing is discarded.
        acc.consider(hit_at(2.0 - 0.5 * RAY_EPS));
        assert_eq!(acc.hits.len(), 2);
    }

    #[test]
    fn convex_clip_gates_the_shape() {
        let mut shape = point_shape(&[point3(0.0, 0.0, -2.0)], 0.3);
        // Clip triangle in the z = -1 plane around the origin.
        shape.cclips = vec![
            point3(-1.0, -1.0, -1.0),
            point3(1.0, -1.0, -1.0),
            point3(0.0, 1.5, -1.0),
        ];
        let shapes = vec![shape];
        let bvh = SceneBvh::build(&shapes, BuildQuality::Midpoint);
        let through = Ray::new(Point3::ORIGIN, vec3(0.0, 0.0, -1.0));
        assert_eq!(bvh.intersect_all(&shapes, &through).len(), 1);

        // Move the clip triangle off to the side; the same ray still points at the sphere
        // but no longer passes the gate.
        let mut shapes = shapes;
        shapes[0].cclips = vec![
            point3(4.0, -1.0, -1.0),
            point3(6.0, -1.0, -1.0),
            point3(5.0, 1.0, -1.0),
        ];
        let bvh = SceneBvh::build(&shapes, BuildQuality::Midpoint);
        assert!(bvh.intersect_all(&shapes, &through).is_empty());
    }
}
