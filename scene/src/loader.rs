use crate::{
    ArrowStyle, CameraDesc, DashCap, DashMode, Diagram, Error, Label, LabelGroup, Material,
    Object, Scene, ShapeDesc,
};
use math::hcm::{point3, Frame, Point3, Vec2};
use radiometry::Color;
use serde::Deserialize;
use std::path::Path;

// Raw document types mirror the JSON schema one-to-one; everything is optional with the
// format's defaults, and the conversion step below validates cross-references and converts
// sRGB colors to linear.

fn default_resolution() -> f32 {
    1.0
}
fn default_lens() -> f32 {
    0.05
}
fn default_film() -> f32 {
    0.036
}
fn default_from() -> [f32; 3] {
    [0.0, 0.0, 1.0]
}
fn default_frame() -> [f32; 12] {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
}
fn default_fill() -> [f32; 4] {
    [0.75, 0.75, 0.75, 1.0]
}
fn default_stroke() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
fn default_thickness() -> f32 {
    1.5
}
fn default_style() -> String {
    String::new()
}

#[derive(Deserialize)]
struct RawDiagram {
    size: [f32; 2],
    #[serde(default = "default_resolution")]
    resolution: f32,
    #[serde(default)]
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(default)]
    offset: [f32; 2],
    #[serde(default)]
    cameras: Vec<RawCamera>,
    #[serde(default)]
    objects: Vec<RawObject>,
    #[serde(default)]
    materials: Vec<RawMaterial>,
    #[serde(default)]
    shapes: Vec<RawShape>,
    #[serde(default)]
    labels: Vec<RawLabelGroup>,
}

#[derive(Deserialize)]
struct RawCamera {
    #[serde(default)]
    orthographic: bool,
    #[serde(default)]
    center: [f32; 2],
    #[serde(default = "default_from")]
    from: [f32; 3],
    #[serde(default)]
    to: [f32; 3],
    #[serde(default = "default_lens")]
    lens: f32,
    #[serde(default = "default_film")]
    film: f32,
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default = "default_frame")]
    frame: [f32; 12],
    #[serde(default)]
    shape: Option<i64>,
    #[serde(default)]
    material: Option<i64>,
    #[serde(default)]
    labels: Option<i64>,
}

#[derive(Deserialize)]
struct RawMaterial {
    #[serde(default = "default_fill")]
    fill: [f32; 4],
    #[serde(default = "default_stroke")]
    stroke: [f32; 4],
    #[serde(default = "default_thickness")]
    thickness: f32,
    #[serde(default)]
    dash_period: f32,
    #[serde(default)]
    dash_phase: f32,
    #[serde(default)]
    dash_on: f32,
    #[serde(default = "default_style")]
    dash_cap: String,
    #[serde(default = "default_style")]
    dashed: String,
}

#[derive(Deserialize)]
struct RawShape {
    #[serde(default)]
    positions: Vec<[f32; 3]>,
    #[serde(default)]
    points: Vec<u32>,
    #[serde(default)]
    lines: Vec<[u32; 2]>,
    #[serde(default)]
    arrows: Vec<[u32; 2]>,
    #[serde(default)]
    triangles: Vec<[u32; 3]>,
    #[serde(default)]
    quads: Vec<[u32; 4]>,
    #[serde(default)]
    fills: Vec<[f32; 4]>,
    #[serde(default)]
    cull: bool,
    #[serde(default)]
    boundary: bool,
    #[serde(default = "default_style")]
    arrow_style: String,
    #[serde(default)]
    cclips: Vec<[f32; 3]>,
}

#[derive(Deserialize)]
struct RawLabelGroup {
    #[serde(default)]
    positions: Vec<[f32; 3]>,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

#[derive(Deserialize)]
struct RawLabel {
    #[serde(default)]
    unprocessed: String,
    #[serde(default)]
    offset: [f32; 2],
    #[serde(default)]
    alignment: [f32; 2],
}

fn to_point(p: [f32; 3]) -> Point3 {
    point3(p[0], p[1], p[2])
}
fn to_vec2(v: [f32; 2]) -> Vec2 {
    Vec2::new(v[0], v[1])
}

fn index(raw: Option<i64>, len: usize, what: &str) -> Result<Option<usize>, Error> {
    match raw {
        None => Ok(None),
        Some(i) if i < 0 => Ok(None),
        Some(i) if (i as usize) < len => Ok(Some(i as usize)),
        Some(i) => Err(Error::Parse(format!(
            "object refers to {} {} but only {} exist",
            what, i, len
        ))),
    }
}

fn check_elements(indices: &[u32], positions: usize, what: &str) -> Result<(), Error> {
    match indices.iter().find(|&&i| i as usize >= positions) {
        None => Ok(()),
        Some(i) => Err(Error::Parse(format!(
            "{} index {} out of range ({} positions)",
            what, i, positions
        ))),
    }
}

fn convert_material(raw: RawMaterial) -> Result<Material, Error> {
    let dash_cap = match raw.dash_cap.as_str() {
        "" | "round" => DashCap::Round,
        "square" => DashCap::Square,
        other => return Err(Error::Parse(format!("unknown dash_cap {:?}", other))),
    };
    let dashed = match raw.dashed.as_str() {
        "" | "always" => DashMode::Always,
        "never" => DashMode::Never,
        "transparency" => DashMode::Transparency,
        other => return Err(Error::Parse(format!("unknown dashed mode {:?}", other))),
    };
    Ok(Material {
        fill: Color::from_srgb(raw.fill),
        stroke: Color::from_srgb(raw.stroke),
        thickness: raw.thickness,
        dash_period: raw.dash_period,
        dash_phase: raw.dash_phase,
        dash_on: raw.dash_on,
        dash_cap,
        dashed,
    })
}

fn convert_shape(raw: RawShape) -> Result<ShapeDesc, Error> {
    let n = raw.positions.len();
    check_elements(&raw.points, n, "point")?;
    check_elements(raw.lines.iter().flatten().copied().collect::<Vec<_>>().as_slice(), n, "line")?;
    check_elements(
        raw.arrows.iter().flatten().copied().collect::<Vec<_>>().as_slice(),
        n,
        "arrow",
    )?;
    check_elements(
        raw.triangles.iter().flatten().copied().collect::<Vec<_>>().as_slice(),
        n,
        "triangle",
    )?;
    check_elements(raw.quads.iter().flatten().copied().collect::<Vec<_>>().as_slice(), n, "quad")?;
    if !raw.fills.is_empty() && raw.fills.len() != raw.quads.len() {
        return Err(Error::Parse(format!(
            "{} quad fills for {} quads",
            raw.fills.len(),
            raw.quads.len()
        )));
    }
    if raw.cclips.len() % 3 != 0 {
        return Err(Error::Parse(format!(
            "cclips holds {} vertices, not a multiple of 3",
            raw.cclips.len()
        )));
    }
    let arrow_style = match raw.arrow_style.as_str() {
        "" | "triangle" => ArrowStyle::Triangle,
        "stealth" => ArrowStyle::Stealth,
        other => return Err(Error::Parse(format!("unknown arrow_style {:?}", other))),
    };
    Ok(ShapeDesc {
        positions: raw.positions.into_iter().map(to_point).collect(),
        points: raw.points,
        lines: raw.lines,
        arrows: raw.arrows,
        triangles: raw.triangles,
        quads: raw.quads,
        fills: raw.fills.into_iter().map(Color::from_srgb).collect(),
        cull: raw.cull,
        boundary: raw.boundary,
        arrow_style,
        cclips: raw.cclips.into_iter().map(to_point).collect(),
    })
}

fn convert_scene(raw: RawScene) -> Result<Scene, Error> {
    let materials = raw
        .materials
        .into_iter()
        .map(convert_material)
        .collect::<Result<Vec<_>, _>>()?;
    let shapes = raw
        .shapes
        .into_iter()
        .map(convert_shape)
        .collect::<Result<Vec<_>, _>>()?;
    let labels = raw
        .labels
        .into_iter()
        .map(|g| {
            if g.labels.len() > g.positions.len() {
                return Err(Error::Parse(format!(
                    "{} labels for {} anchor positions",
                    g.labels.len(),
                    g.positions.len()
                )));
            }
            Ok(LabelGroup {
                positions: g.positions.into_iter().map(to_point).collect(),
                labels: g
                    .labels
                    .into_iter()
                    .map(|l| Label {
                        text: l.unprocessed,
                        offset: to_vec2(l.offset),
                        alignment: to_vec2(l.alignment),
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let objects = raw
        .objects
        .into_iter()
        .map(|o| {
            Ok(Object {
                frame: Frame::from_raw(o.frame),
                shape: index(o.shape, shapes.len(), "shape")?,
                material: index(o.material, materials.len(), "material")?,
                labels: index(o.labels, labels.len(), "label group")?,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;
    let cameras = raw
        .cameras
        .into_iter()
        .map(|c| CameraDesc {
            orthographic: c.orthographic,
            from: to_point(c.from),
            to: to_point(c.to),
            center: to_vec2(c.center),
            lens: c.lens,
            film: c.film,
        })
        .collect::<Vec<_>>();
    if cameras.is_empty() {
        return Err(Error::Parse("scene has no cameras".to_string()));
    }
    Ok(Scene {
        offset: to_vec2(raw.offset),
        cameras,
        objects,
        materials,
        shapes,
        labels,
    })
}

pub fn from_json(text: &str) -> Result<Diagram, Error> {
    let raw: RawDiagram = serde_json::from_str(text)?;
    if raw.size[0] <= 0.0 || raw.size[1] <= 0.0 {
        return Err(Error::Parse(format!(
            "non-positive page size {} x {}",
            raw.size[0], raw.size[1]
        )));
    }
    if raw.resolution <= 0.0 {
        return Err(Error::Parse("non-positive resolution".to_string()));
    }
    let scenes = raw
        .scenes
        .into_iter()
        .map(convert_scene)
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!(
        "loaded diagram: {} x {} units, {} scene(s)",
        raw.size[0],
        raw.size[1],
        scenes.len()
    );
    Ok(Diagram {
        size: to_vec2(raw.size),
        scale: raw.resolution,
        scenes,
    })
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Diagram, Error> {
    let text = std::fs::read_to_string(path)?;
    from_json(&text)
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"{
        "size": [100, 50],
        "resolution": 0.018,
        "scenes": [{
            "offset": [0, 0],
            "cameras": [{"orthographic": true, "from": [0, 0, 1], "to": [0, 0, 0], "lens": 0.05}],
            "materials": [{
                "fill": [1, 0, 0, 0.5], "stroke": [0, 0, 0, 1], "thickness": 3,
                "dash_period": 20, "dash_on": 12, "dash_cap": "round", "dashed": "always"
            }],
            "shapes": [{
                "positions": [[-1, 0, 0], [1, 0, 0], [0, 1, 0]],
                "lines": [[0, 1]],
                "triangles": [[0, 1, 2]]
            }],
            "objects": [{"shape": 0, "material": 0}]
        }]
    }"#;

    #[test]
    fn parses_minimal_scene() {
        let diagram = from_json(MINIMAL).unwrap();
        assert_eq!(diagram.scenes.len(), 1);
        assert!((diagram.scale - 0.018).abs() < 1e-9);
        let scene = &diagram.scenes[0];
        assert_eq!(scene.shapes[0].lines, vec![[0, 1]]);
        assert_eq!(scene.objects[0].shape, Some(0));
        // Fill alpha survives; rgb goes through sRGB-to-linear.
        let fill = scene.materials[0].fill;
        assert!((fill.a - 0.5).abs() < 1e-6);
        assert!((fill.r - 1.0).abs() < 1e-6);
        assert!(fill.g == 0.0 && fill.b == 0.0);
    }

    #[test]
    fn rejects_dangling_reference() {
        let bad = MINIMAL.replace("\"material\": 0", "\"material\": 7");
        match from_json(&bad) {
            Err(Error::Parse(msg)) => assert!(msg.contains("material"), "{}", msg),
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_out_of_range_vertex() {
        let bad = MINIMAL.replace("\"lines\": [[0, 1]]", "\"lines\": [[0, 9]]");
        assert!(matches!(from_json(&bad), Err(Error::Parse(_))));
    }

    #[test]
    fn defaults_applied() {
        let diagram = from_json(
            r#"{"size": [10, 10], "scenes": [{"cameras": [{}],
                "shapes": [{"positions": [[0,0,0]], "points": [0]}],
                "objects": [{"shape": 0}]}]}"#,
        )
        .unwrap();
        let scene = &diagram.scenes[0];
        assert!(!scene.cameras[0].orthographic);
        assert!((scene.cameras[0].film - 0.036).abs() < 1e-9);
        assert!(scene.objects[0].material.is_none());
        assert_eq!(diagram.scale, 1.0);
    }

    #[test]
    fn negative_index_means_none() {
        let diagram = from_json(
            r#"{"size": [10, 10], "scenes": [{"cameras": [{}],
                "objects": [{"shape": -1, "material": -1, "labels": -1}]}]}"#,
        )
        .unwrap();
        let object = &diagram.scenes[0].objects[0];
        assert!(object.shape.is_none() && object.material.is_none() && object.labels.is_none());
    }
}
