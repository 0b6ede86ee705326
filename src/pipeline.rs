use crate::sampler::{Antialiasing, SamplerKind};
use accel::{BuildQuality, SceneBvh};
use geometry::Camera;
use math::hcm::Point3;
use radiometry::Color;
use rayon::prelude::*;
use scene::{Diagram, Error, Label, Scene};
use shape::TraceShape;
use texts::{Rasterizer, TextCache, TraceText};

/// The nominal output width; label zoom is measured relative to it.
pub const NOMINAL_WIDTH: u32 = 1440;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub samples: u32,
    pub transparent_background: bool,
    pub high_quality_bvh: bool,
    pub parallel: bool,
    pub sampler: SamplerKind,
    pub antialiasing: Antialiasing,
    pub seed: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: NOMINAL_WIDTH,
            samples: 4,
            transparent_background: false,
            high_quality_bvh: false,
            parallel: true,
            sampler: SamplerKind::Color,
            antialiasing: Antialiasing::RandomSampling,
            seed: 0,
        }
    }
}

impl RenderOptions {
    pub fn bvh_quality(&self) -> BuildQuality {
        if self.high_quality_bvh {
            BuildQuality::Sah
        } else {
            BuildQuality::Midpoint
        }
    }
}

/// Output height follows the page aspect ratio.
pub fn canvas_size(diagram: &Diagram, width: u32) -> (u32, u32) {
    let height = (width as f32 * diagram.size.y / diagram.size.x).round().max(1.0) as u32;
    (width, height)
}

/// Everything one scene needs for a render pass, rebuilt per request because shape radii
/// and billboard quads depend on the camera.
pub struct Pipeline {
    pub camera: Camera,
    pub shapes: Vec<TraceShape>,
    pub bvh: SceneBvh,
    pub texts: Vec<TraceText>,
}

impl Pipeline {
    pub fn build(
        diagram: &Diagram, index: usize, options: &RenderOptions, cache: Option<&TextCache>,
        rasterizer: Option<&dyn Rasterizer>,
    ) -> Result<Pipeline, Error> {
        let scn = &diagram.scenes[index];
        let desc = scn
            .cameras
            .first()
            .ok_or_else(|| Error::Parse(format!("scene {} has no cameras", index)))?;
        let page_aspect = diagram.size.x / diagram.size.y;
        let width_px = options.width as f32;
        let mut camera = Camera::new(
            desc.orthographic,
            desc.from,
            desc.to,
            desc.center,
            desc.lens,
            desc.film,
            page_aspect,
            diagram.scale,
        );
        // The scene offset pans the principal point, placing this scene's view inside the
        // composite canvas. It is given in pixels (y down); one pixel spans
        // film.x / width in abstract units.
        let pixel = camera.film.x / width_px;
        camera.center.x += scn.offset.x * pixel;
        camera.center.y -= scn.offset.y * pixel;
        let camera = camera;

        let shapes: Vec<TraceShape> = if options.parallel {
            scn.objects
                .par_iter()
                .filter_map(|o| shape::prepare(scn, o, &camera, width_px))
                .collect()
        } else {
            scn.objects
                .iter()
                .filter_map(|o| shape::prepare(scn, o, &camera, width_px))
                .collect()
        };
        let bvh = SceneBvh::build(&shapes, options.bvh_quality());

        let jobs = label_jobs(scn);
        let zoom = width_px / NOMINAL_WIDTH as f32;
        let make_text = |(label, anchor, stroke): &(&Label, Point3, Color)| {
            let metrics = texts::measure(&label.text, zoom);
            let align_x = label.alignment.x.round() as i32;
            let bitmap = texts::service::bitmap_for(
                &label.text, &metrics, zoom, align_x, *stroke, cache, rasterizer,
            );
            TraceText::new(label, *anchor, &metrics, &camera, width_px, bitmap)
        };
        let texts: Vec<TraceText> = if options.parallel {
            jobs.par_iter().map(make_text).collect()
        } else {
            jobs.iter().map(make_text).collect()
        };

        log::info!(
            "scene {}: {} shapes, {} labels, bvh quality {:?}",
            index,
            shapes.len(),
            texts.len(),
            options.bvh_quality()
        );
        Ok(Pipeline {
            camera,
            shapes,
            bvh,
            texts,
        })
    }
}

/// Flattens (object, label group) pairs into per-label work items with world anchors and
/// the owning material's stroke color.
pub fn label_jobs(scn: &Scene) -> Vec<(&Label, Point3, Color)> {
    let mut jobs = Vec::new();
    for object in &scn.objects {
        let group = match object.labels {
            Some(i) => &scn.labels[i],
            None => continue,
        };
        let stroke = scn.material_of(object).stroke;
        for (label, &anchor) in group.labels.iter().zip(&group.positions) {
            jobs.push((label, object.frame.point(anchor), stroke));
        }
    }
    jobs
}
