use geometry::BBox;
use math::hcm::Point3;
use partition::partition;

/// Fixed traversal stack depth. With 4-wide leaves the tree height stays far below this
/// for any realistic diagram.
pub const STACK_DEPTH: usize = 128;

const LEAF_SIZE: usize = 4;
const SAH_BINS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildQuality {
    /// Split at the midpoint of the widest centroid extent.
    Midpoint,
    /// Binned surface-area heuristic, 16 bins per axis.
    Sah,
}

#[derive(Debug, Clone, Copy)]
pub enum NodeKind {
    Internal { split_axis: usize, first_child: u32 },
    Leaf { first_prim: u32, count: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub bbox: BBox,
    pub kind: NodeKind,
}

/// A flat binary BVH over externally owned primitives. `order` is the permutation of input
/// indices; leaves address contiguous runs of it.
#[derive(Debug)]
pub struct Bvh {
    pub nodes: Vec<Node>,
    pub order: Vec<u32>,
}

#[derive(Clone, Copy)]
struct Prim {
    index: u32,
    bbox: BBox,
    center: Point3,
}

impl Bvh {
    pub fn build(bboxes: &[BBox], quality: BuildQuality) -> Bvh {
        let mut prims: Vec<Prim> = bboxes
            .iter()
            .enumerate()
            .map(|(i, &b)| Prim {
                index: i as u32,
                bbox: b,
                center: b.midpoint(),
            })
            .collect();
        let mut bvh = Bvh {
            nodes: Vec::new(),
            order: Vec::new(),
        };
        if prims.is_empty() {
            return bvh;
        }
        bvh.nodes.push(placeholder());
        bvh.build_into(0, &mut prims, 0, quality);
        bvh.order = prims.iter().map(|p| p.index).collect();
        log::debug!(
            "bvh over {} prims: {} nodes, height {}",
            bboxes.len(),
            bvh.nodes.len(),
            bvh.height(0)
        );
        bvh
    }

    pub fn root_bbox(&self) -> BBox {
        match self.nodes.first() {
            Some(n) => n.bbox,
            None => BBox::empty(),
        }
    }

    pub fn height(&self, node: usize) -> u32 {
        match self.nodes[node].kind {
            NodeKind::Leaf { .. } => 1,
            NodeKind::Internal { first_child, .. } => {
                let c = first_child as usize;
                self.height(c).max(self.height(c + 1)) + 1
            }
        }
    }

    fn build_into(&mut self, node: usize, prims: &mut [Prim], offset: usize, quality: BuildQuality) {
        let bbox = prims
            .iter()
            .fold(BBox::empty(), |b, p| geometry::bbox::union(b, p.bbox));
        if prims.len() <= LEAF_SIZE {
            self.nodes[node] = Node {
                bbox,
                kind: NodeKind::Leaf {
                    first_prim: offset as u32,
                    count: prims.len() as u32,
                },
            };
            return;
        }

        let centroids = prims
            .iter()
            .fold(BBox::empty(), |b, p| b.union(p.center));
        let (axis, mid) = match quality {
            BuildQuality::Midpoint => midpoint_split(&centroids, prims),
            BuildQuality::Sah => sah_split(&bbox, &centroids, prims),
        };
        // A failed partition (all centroids on one side, or coincident) falls back to the
        // arithmetic midpoint of the index range.
        let mid = if mid == 0 || mid == prims.len() {
            prims.len() / 2
        } else {
            mid
        };

        let first_child = self.nodes.len();
        self.nodes.push(placeholder());
        self.nodes.push(placeholder());
        self.nodes[node] = Node {
            bbox,
            kind: NodeKind::Internal {
                split_axis: axis,
                first_child: first_child as u32,
            },
        };
        let (left, right) = prims.split_at_mut(mid);
        self.build_into(first_child, left, offset, quality);
        self.build_into(first_child + 1, right, offset + mid, quality);
    }
}

fn placeholder() -> Node {
    Node {
        bbox: BBox::empty(),
        kind: NodeKind::Leaf {
            first_prim: 0,
            count: 0,
        },
    }
}

/// Returns the split axis and the partition point within `prims`.
fn midpoint_split(centroids: &BBox, prims: &mut [Prim]) -> (usize, usize) {
    let axis = centroids.diag().max_dimension();
    if centroids.diag()[axis] < 1e-8 {
        return (0, 0);
    }
    let plane = centroids.midpoint()[axis];
    let (left, _) = partition(prims, |p| p.center[axis] < plane);
    (axis, left.len())
}

fn sah_split(bbox: &BBox, centroids: &BBox, prims: &mut [Prim]) -> (usize, usize) {
    let parent_area = bbox.half_area();
    let mut best: Option<(f32, usize, usize)> = None; // cost, axis, split bin
    for axis in 0..3 {
        let extent = centroids.diag()[axis];
        if extent < 1e-8 {
            continue;
        }
        let lo = centroids.min()[axis];
        let bin_of = |p: &Prim| {
            let f = (p.center[axis] - lo) / extent * SAH_BINS as f32;
            (f as usize).min(SAH_BINS - 1)
        };
        let mut bin_boxes = [BBox::empty(); SAH_BINS];
        let mut bin_counts = [0usize; SAH_BINS];
        for p in prims.iter() {
            let b = bin_of(p);
            bin_boxes[b] = geometry::bbox::union(bin_boxes[b], p.bbox);
            bin_counts[b] += 1;
        }
        // Prefix sweep from the left, suffix sweep from the right; a split at bin s puts
        // bins [0, s) on the left.
        let mut right_boxes = [BBox::empty(); SAH_BINS];
        let mut right_box = BBox::empty();
        for s in (1..SAH_BINS).rev() {
            right_box = geometry::bbox::union(right_box, bin_boxes[s]);
            right_boxes[s] = right_box;
        }
        let mut left_box = BBox::empty();
        let mut left_count = 0;
        for s in 1..SAH_BINS {
            left_box = geometry::bbox::union(left_box, bin_boxes[s - 1]);
            left_count += bin_counts[s - 1];
            let right_count = prims.len() - left_count;
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let cost = 1.0
                + left_count as f32 * left_box.half_area() / parent_area
                + right_count as f32 * right_boxes[s].half_area() / parent_area;
            if best.map_or(true, |(c, _, _)| cost < c) {
                best = Some((cost, axis, s));
            }
        }
    }
    match best {
        None => (0, 0),
        Some((_, axis, split_bin)) => {
            let extent = centroids.diag()[axis];
            let lo = centroids.min()[axis];
            let (left, _) = partition(prims, |p| {
                let f = (p.center[axis] - lo) / extent * SAH_BINS as f32;
                ((f as usize).min(SAH_BINS - 1)) < split_bin
            });
            (axis, left.len())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use math::hcm::point3;

    fn grid_boxes(n: usize) -> Vec<BBox> {
        (0..n)
            .map(|i| BBox::around(point3(i as f32 * 2.0, (i % 3) as f32, 0.0), 0.4))
            .collect()
    }

    fn check_sound(bvh: &Bvh, node: usize, bboxes: &[BBox]) {
        let n = &bvh.nodes[node];
        match n.kind {
            NodeKind::Leaf { first_prim, count } => {
                assert!(count as usize <= 4);
                for i in first_prim..first_prim + count {
                    let prim = bvh.order[i as usize] as usize;
                    assert!(n.bbox.encloses(bboxes[prim]));
                }
            }
            NodeKind::Internal { first_child, .. } => {
                let c = first_child as usize;
                assert!(n.bbox.encloses(bvh.nodes[c].bbox));
                assert!(n.bbox.encloses(bvh.nodes[c + 1].bbox));
                check_sound(bvh, c, bboxes);
                check_sound(bvh, c + 1, bboxes);
            }
        }
    }

    #[test]
    fn build_is_geometrically_sound() {
        for &quality in [BuildQuality::Midpoint, BuildQuality::Sah].iter() {
            let bboxes = grid_boxes(37);
            let bvh = Bvh::build(&bboxes, quality);
            assert_eq!(bvh.order.len(), 37);
            let mut sorted = bvh.order.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..37).collect::<Vec<u32>>());
            check_sound(&bvh, 0, &bboxes);
        }
    }

    #[test]
    fn coincident_centroids_still_split() {
        // All centroids equal; the fallback must still produce a bounded-depth tree.
        let bboxes = vec![BBox::around(point3(1.0, 2.0, 3.0), 0.5); 33];
        let bvh = Bvh::build(&bboxes, BuildQuality::Midpoint);
        assert!(bvh.height(0) <= 8);
        check_sound(&bvh, 0, &bboxes);
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        let bvh = Bvh::build(&[], BuildQuality::Sah);
        assert!(bvh.nodes.is_empty());
        assert!(bvh.root_bbox().is_empty());
    }
}
