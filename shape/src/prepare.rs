use crate::{LineAttr, TraceShape};
use geometry::line::{ArrowKind, End, LineSeg};
use geometry::Camera;
use itertools::Itertools;
use math::hcm::{rotate2, vec3, Point3, Vec2, Vec3};
use scene::{ArrowStyle, Object, Scene};
use std::collections::HashMap;

/// Builds the renderable shape of one object, or `None` if the object carries no shape.
/// `width_px` is the output image width; all screen-space quantities derive from it.
pub fn prepare(
    scene: &Scene, object: &Object, camera: &Camera, width_px: f32,
) -> Option<TraceShape> {
    let desc = &scene.shapes[object.shape?];
    let material = scene.material_of(object);

    let positions: Vec<Point3> = desc.positions.iter().map(|&p| object.frame.point(p)).collect();
    let radii: Vec<f32> = positions
        .iter()
        .map(|&p| camera.stroke_radius(material.thickness, p, width_px))
        .collect();

    // Stroke radius in film units is depth-independent (screen thickness is preserved),
    // which makes arrow-head layout a plain 2D construction on the film plane.
    let r_film = 0.5 * material.thickness * camera.film.x / width_px;
    let px_per_film = width_px / camera.film.x;

    let mut lines = Vec::new();
    let mut line_attrs = Vec::new();
    let mut dash_offset = 0.0f32;
    let mut prev_end: Option<u32> = None;
    for &[a, b] in &desc.lines {
        let seg = make_seg(&positions, &radii, a, b, End::Cap, End::Cap);
        let screen_len =
            (camera.film_coords(seg.p1) - camera.film_coords(seg.p0)).length() * px_per_film;
        // Consecutive segments that share a vertex form a polyline; the dash phase runs
        // through the joint.
        if prev_end != Some(a) {
            dash_offset = 0.0;
        }
        line_attrs.push(LineAttr {
            dash_offset,
            screen_len,
        });
        dash_offset += screen_len;
        prev_end = Some(b);
        lines.push(seg);
    }
    for &[a, b] in &desc.arrows {
        let head = arrow_end(
            camera,
            desc.arrow_style,
            &positions,
            &radii,
            a,
            b,
            r_film,
        );
        let seg = make_seg(&positions, &radii, a, b, End::Cap, head);
        let screen_len =
            (camera.film_coords(seg.p1) - camera.film_coords(seg.p0)).length() * px_per_film;
        line_attrs.push(LineAttr {
            dash_offset: 0.0,
            screen_len,
        });
        lines.push(seg);
    }

    let (triangles, quads, fills) = cull_faces(desc, &positions, camera);
    // Borders outline the declared mesh, so culled faces keep their edges.
    let borders = make_borders(desc, &positions, &radii, &desc.triangles, &desc.quads);

    let cclips = desc.cclips.iter().map(|&p| object.frame.point(p)).collect();

    let shape = TraceShape {
        positions,
        radii,
        points: desc.points.clone(),
        lines,
        line_attrs,
        triangles,
        quads,
        fills,
        borders,
        cclips,
        material,
    };
    log::debug!(
        "prepared shape: {} pts, {} lines, {} tris, {} quads, {} borders",
        shape.points.len(),
        shape.lines.len(),
        shape.triangles.len(),
        shape.quads.len(),
        shape.borders.len()
    );
    Some(shape)
}

fn make_seg(positions: &[Point3], radii: &[f32], a: u32, b: u32, e0: End, e1: End) -> LineSeg {
    LineSeg {
        p0: positions[a as usize],
        p1: positions[b as usize],
        r0: radii[a as usize],
        r1: radii[b as usize],
        end0: e0,
        end1: e1,
    }
}

/// Precomputes the arrow head at vertex `b` of segment `a -> b`. The head is laid out on
/// the film plane: tip four radii past the endpoint, base center four radii before it,
/// base radius 8r/3, each at the depth of the extended line at that screen position
/// (perspective-correct under a perspective camera). Stealth heads additionally carry the
/// two clip plane normals, at 45 degrees to the screen direction.
fn arrow_end(
    camera: &Camera, style: ArrowStyle, positions: &[Point3], radii: &[f32], a: u32, b: u32,
    r_film: f32,
) -> End {
    let end_w = positions[b as usize];
    let r_w = radii[b as usize];
    let from_q = camera.film_coords(positions[a as usize]);
    let end_q = camera.film_coords(end_w);
    let s = screen_dir(end_q - from_q);
    let z0 = camera.clamped_z(positions[a as usize]);
    let z1 = camera.clamped_z(end_w);
    let seg_len = (end_q - from_q).length();
    // Depth of the line at parameter u of the screen segment: linear in z for the
    // orthographic camera, linear in 1/z under perspective.
    let depth_at = |u: f32| {
        if camera.orthographic {
            z0 + (z1 - z0) * u
        } else {
            (1.0 / ((1.0 - u) / z0 + u / z1)).min(-geometry::RAY_EPS)
        }
    };
    let step = 4.0 * r_film;
    let (z_tip, z_base) = if seg_len < 1e-8 {
        (z1, z1)
    } else {
        (depth_at(1.0 + step / seg_len), depth_at(1.0 - step / seg_len))
    };
    let tip = camera.unproject(end_q + s * step, z_tip);
    let base = camera.unproject(end_q - s * step, z_base);
    let (kind, notch) = match style {
        ArrowStyle::Triangle => (ArrowKind::Triangle, (Vec3::ZERO, Vec3::ZERO)),
        ArrowStyle::Stealth => (
            ArrowKind::Stealth,
            (
                film_vector(camera, rotate2(s, std::f32::consts::FRAC_PI_4)),
                film_vector(camera, rotate2(s, -std::f32::consts::FRAC_PI_4)),
            ),
        ),
    };
    End::Arrow {
        kind,
        base,
        tip,
        radius: r_w * 8.0 / 3.0,
        notch,
    }
}

fn screen_dir(d: Vec2) -> Vec2 {
    let n = d.length();
    if n < 1e-8 {
        // Segment points straight at the camera; any screen direction will do.
        Vec2::new(1.0, 0.0)
    } else {
        d / n
    }
}

/// A film-plane 2D vector as a world vector (film x right, film y up).
fn film_vector(camera: &Camera, v: Vec2) -> Vec3 {
    camera.frame.vector(vec3(v.x, v.y, 0.0))
}

/// Back-face culling against the camera; quad fill overrides stay parallel to the
/// retained quads.
fn cull_faces(
    desc: &scene::ShapeDesc, positions: &[Point3], camera: &Camera,
) -> (Vec<[u32; 3]>, Vec<[u32; 4]>, Vec<radiometry::Color>) {
    let facing = |n: Vec3, centroid: Point3| {
        if camera.orthographic {
            n.dot(camera.forward()) > 0.0
        } else {
            n.dot(camera.position() - centroid) > 0.0
        }
    };
    let keep_tri = |idx: &[u32; 3]| {
        if !desc.cull {
            return true;
        }
        let (a, b, c) = (
            positions[idx[0] as usize],
            positions[idx[1] as usize],
            positions[idx[2] as usize],
        );
        facing((b - a).cross(c - a), a + ((b - a) + (c - a)) / 3.0)
    };
    let keep_quad = |idx: &[u32; 4]| {
        if !desc.cull {
            return true;
        }
        let (a, b, c) = (
            positions[idx[0] as usize],
            positions[idx[1] as usize],
            positions[idx[2] as usize],
        );
        let d = positions[idx[3] as usize];
        let centroid = a + ((b - a) + (c - a) + (d - a)) / 4.0;
        facing((b - a).cross(c - a), centroid)
    };
    let triangles = desc.triangles.iter().copied().filter(keep_tri).collect();
    let keep: Vec<bool> = desc.quads.iter().map(keep_quad).collect();
    let quads = desc
        .quads
        .iter()
        .zip(&keep)
        .filter_map(|(q, &k)| if k { Some(*q) } else { None })
        .collect();
    let fills = desc
        .fills
        .iter()
        .zip(&keep)
        .filter_map(|(f, &k)| if k { Some(*f) } else { None })
        .collect();
    (triangles, quads, fills)
}

/// Border segments of the declared face set (culling does not remove edges). With
/// `boundary` set, only edges used by exactly one face remain (the mesh boundary);
/// otherwise every unique edge is stroked.
fn make_borders(
    desc: &scene::ShapeDesc, positions: &[Point3], radii: &[f32], triangles: &[[u32; 3]],
    quads: &[[u32; 4]],
) -> Vec<LineSeg> {
    let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
    let mut record = |a: u32, b: u32| {
        if a != b {
            *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    };
    for t in triangles {
        record(t[0], t[1]);
        record(t[1], t[2]);
        record(t[2], t[0]);
    }
    for q in quads {
        record(q[0], q[1]);
        record(q[1], q[2]);
        if q[2] == q[3] {
            record(q[2], q[0]);
        } else {
            record(q[2], q[3]);
            record(q[3], q[0]);
        }
    }
    // Sorted by vertex pair for a deterministic order.
    counts
        .into_iter()
        .filter(|&(_, n)| !desc.boundary || n == 1)
        .map(|(e, _)| e)
        .sorted()
        .map(|(a, b)| make_seg(positions, radii, a, b, End::Cap, End::Cap))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use math::hcm::{point3, vec2, Frame};
    use scene::{Material, ShapeDesc};

    fn ortho_camera() -> Camera {
        Camera::new(
            true,
            point3(0.0, 0.0, 1.0),
            Point3::ORIGIN,
            vec2(0.0, 0.0),
            0.05,
            0.036,
            1.0,
            0.018,
        )
    }

    fn shape_desc(positions: Vec<Point3>) -> ShapeDesc {
        ShapeDesc {
            positions,
            points: vec![],
            lines: vec![],
            arrows: vec![],
            triangles: vec![],
            quads: vec![],
            fills: vec![],
            cull: false,
            boundary: false,
            arrow_style: ArrowStyle::Triangle,
            cclips: vec![],
        }
    }

    fn one_object_scene(desc: ShapeDesc) -> (Scene, Object) {
        let scene = Scene {
            offset: vec2(0.0, 0.0),
            cameras: vec![],
            objects: vec![],
            materials: vec![],
            shapes: vec![desc],
            labels: vec![],
        };
        let object = Object {
            frame: Frame::IDENTITY,
            shape: Some(0),
            material: None,
            labels: None,
        };
        (scene, object)
    }

    #[test]
    fn orthographic_radii_are_constant() {
        let mut desc = shape_desc(vec![point3(0.0, 0.0, 0.0), point3(0.3, 0.1, -5.0)]);
        desc.points = vec![0, 1];
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        // 128 pixels per world unit; default thickness 1.5.
        let expected = 0.5 * Material::default().thickness / 128.0;
        assert!((shape.radii[0] - expected).abs() < 1e-7);
        assert_eq!(shape.radii[0], shape.radii[1]);
    }

    #[test]
    fn arrow_head_layout() {
        let mut desc = shape_desc(vec![point3(-0.5, 0.0, 0.0), point3(0.5, 0.0, 0.0)]);
        desc.arrows = vec![[0, 1]];
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        let r = shape.radii[1];
        match shape.lines[0].end1 {
            End::Arrow {
                base, tip, radius, ..
            } => {
                assert!((tip.x - (0.5 + 4.0 * r)).abs() < 1e-6, "tip at {:?}", tip);
                assert!((base.x - (0.5 - 4.0 * r)).abs() < 1e-6, "base at {:?}", base);
                assert!((radius - r * 8.0 / 3.0).abs() < 1e-7);
            }
            other => panic!("expected an arrow end, got {:?}", other),
        }
        assert!(matches!(shape.lines[0].end0, End::Cap));
    }

    #[test]
    fn arrow_head_tracks_depth_of_a_receding_line() {
        let camera = Camera::new(
            false,
            point3(0.0, 0.0, 1.0),
            Point3::ORIGIN,
            vec2(0.0, 0.0),
            0.05,
            0.036,
            1.0,
            0.018,
        );
        let a = point3(-0.2, 0.0, 0.0);
        let b = point3(0.2, 0.0, -0.5);
        let mut desc = shape_desc(vec![a, b]);
        desc.arrows = vec![[0, 1]];
        let (mut scene, mut object) = one_object_scene(desc);
        // A thick stroke makes the head large enough that a constant-depth layout would
        // land visibly off the line.
        scene.materials.push(Material {
            thickness: 60.0,
            ..Material::default()
        });
        object.material = Some(0);
        let shape = prepare(&scene, &object, &camera, 256.0).unwrap();
        let (base, tip) = match shape.lines[0].end1 {
            End::Arrow { base, tip, .. } => (base, tip),
            other => panic!("expected an arrow end, got {:?}", other),
        };
        // Both head anchors lie on the infinite line through the segment.
        let d = (b - a).hat();
        for &p in [base, tip].iter() {
            let off = (p - a) - d * (p - a).dot(d);
            assert!(off.norm() < 1e-3, "head anchor off the line: {:?}", p);
        }
    }

    #[test]
    fn stealth_notch_normals_are_diagonal() {
        let mut desc = shape_desc(vec![point3(-0.5, 0.0, 0.0), point3(0.5, 0.0, 0.0)]);
        desc.arrows = vec![[0, 1]];
        desc.arrow_style = ArrowStyle::Stealth;
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        match shape.lines[0].end1 {
            End::Arrow { notch, .. } => {
                let inv_sqrt2 = std::f32::consts::FRAC_1_SQRT_2;
                assert!((notch.0 - vec3(inv_sqrt2, inv_sqrt2, 0.0)).norm() < 1e-6);
                assert!((notch.1 - vec3(inv_sqrt2, -inv_sqrt2, 0.0)).norm() < 1e-6);
            }
            other => panic!("expected an arrow end, got {:?}", other),
        }
    }

    #[test]
    fn cull_drops_faces_by_winding() {
        let mut desc = shape_desc(vec![
            point3(0.0, 0.0, 0.0),
            point3(1.0, 0.0, 0.0),
            point3(0.0, 1.0, 0.0),
        ]);
        // Same triangle, both windings. Camera forward is -z, so the retained face is the
        // one whose normal points along -z.
        desc.triangles = vec![[0, 1, 2], [0, 2, 1]];
        desc.cull = true;
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        assert_eq!(shape.triangles, vec![[0, 2, 1]]);
    }

    #[test]
    fn boundary_keeps_single_use_edges() {
        let positions = vec![
            point3(0.0, 0.0, 0.0),
            point3(1.0, 0.0, 0.0),
            point3(1.0, 1.0, 0.0),
            point3(0.0, 1.0, 0.0),
        ];
        let mut desc = shape_desc(positions.clone());
        desc.triangles = vec![[0, 1, 2], [0, 2, 3]];
        desc.boundary = true;
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        // The shared diagonal (0, 2) drops out.
        assert_eq!(shape.borders.len(), 4);

        let mut desc = shape_desc(positions);
        desc.triangles = vec![[0, 1, 2], [0, 2, 3]];
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        assert_eq!(shape.borders.len(), 5);
    }

    #[test]
    fn polyline_dash_offsets_accumulate() {
        let mut desc = shape_desc(vec![
            point3(0.0, 0.0, 0.0),
            point3(1.0, 0.0, 0.0),
            point3(1.0, 1.0, 0.0),
            point3(5.0, 5.0, 0.0),
        ]);
        // First two segments chain; the third starts a new polyline.
        desc.lines = vec![[0, 1], [1, 2], [3, 0]];
        let (scene, object) = one_object_scene(desc);
        let shape = prepare(&scene, &object, &ortho_camera(), 256.0).unwrap();
        assert_eq!(shape.line_attrs[0].dash_offset, 0.0);
        // One world unit is 128 pixels under this camera.
        assert!((shape.line_attrs[0].screen_len - 128.0).abs() < 1e-3);
        assert!((shape.line_attrs[1].dash_offset - 128.0).abs() < 1e-3);
        assert_eq!(shape.line_attrs[2].dash_offset, 0.0);
    }
}
