use dgram_rt::cli_options::{self, Command};
use dgram_rt::pipeline::{self, Pipeline, RenderOptions, NOMINAL_WIDTH};
use dgram_rt::render;
use dgram_rt::state::TraceState;
use dgram_rt::tracer::Tracer;
use dgram_rt::image;

use indicatif::ProgressBar;
use radiometry::Color;
use scene::Error;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use texts::{HttpRasterizer, RasterRequest, Rasterizer, TextCache};

fn main() {
    env_logger::init();
    let command = match cli_options::parse_args(std::env::args().collect()) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };
    let result = match command {
        Command::Render {
            scene,
            output,
            options,
        } => render_diagram(&scene, &output, &options),
        Command::RenderText { scene, resolution } => bake_texts(&scene, resolution),
    };
    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Renders every scene of the diagram onto one canvas, later scenes over earlier ones,
/// then resolves the background and writes the result.
fn render_diagram(scene_path: &str, output: &str, options: &RenderOptions) -> Result<(), Error> {
    let diagram = scene::loader::load(scene_path)?;
    let (width, height) = pipeline::canvas_size(&diagram, options.width);
    log::info!("rendering {} at {}x{}", scene_path, width, height);

    let cache = TextCache::for_scene(Path::new(scene_path));
    let rasterizer = HttpRasterizer::default();
    let cancel = AtomicBool::new(false);
    let mut canvas = vec![Color::TRANSPARENT; (width * height) as usize];

    for index in 0..diagram.scenes.len() {
        let pipeline = Pipeline::build(
            &diagram,
            index,
            options,
            Some(&cache),
            Some(&rasterizer),
        )?;
        let tracer = Tracer {
            shapes: &pipeline.shapes,
            bvh: &pipeline.bvh,
            texts: &pipeline.texts,
            camera: &pipeline.camera,
            width_px: width as f32,
            sampler: options.sampler,
            background: Color::TRANSPARENT,
        };
        let mut state = TraceState::new(width, height, options.sampler, options.antialiasing, options.seed);
        let progress = ProgressBar::new(options.samples as u64);
        for pass in 0..options.samples {
            render::render_pass(&mut state, &tracer, pass, options.samples, options.parallel, &cancel);
            progress.inc(1);
        }
        progress.finish_and_clear();

        for (dst, src) in canvas.iter_mut().zip(state.average()) {
            *dst = src.over(*dst);
        }
    }

    if !options.transparent_background {
        for pixel in canvas.iter_mut() {
            *pixel = pixel.over(Color::WHITE);
        }
    }
    image::write(Path::new(output), &canvas, width, height)
}

/// Rasterizes every label through the text service and bakes the PNGs next to the scene
/// file, so later renders work offline. Individual failures are logged and skipped.
fn bake_texts(scene_path: &str, resolution: u32) -> Result<(), Error> {
    let diagram = scene::loader::load(scene_path)?;
    let cache = TextCache::for_scene(Path::new(scene_path));
    let rasterizer = HttpRasterizer::default();
    let zoom = resolution as f32 / NOMINAL_WIDTH as f32;

    let mut baked = 0usize;
    for scn in &diagram.scenes {
        for (label, _, stroke) in pipeline::label_jobs(scn) {
            let metrics = texts::measure(&label.text, zoom);
            let req = RasterRequest {
                text: &label.text,
                width: metrics.width.ceil().max(1.0) as u32,
                height: metrics.height.ceil().max(1.0) as u32,
                zoom,
                align_x: label.alignment.x.round() as i32,
                color: stroke,
            };
            match rasterizer.rasterize_png(&req) {
                Ok(bytes) => match cache.store(&label.text, &bytes) {
                    Ok(()) => baked += 1,
                    Err(e) => log::warn!("could not store raster of {:?}: {}", label.text, e),
                },
                Err(e) => log::warn!("text service failed for {:?}: {}", label.text, e),
            }
        }
    }
    log::info!("baked {} label rasters for {}", baked, scene_path);
    Ok(())
}
