use crate::sampler::Antialiasing;
use crate::state::TraceState;
use crate::tracer::Tracer;
use radiometry::Color;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Renders one full pass over the image, one ticket per row. Returns false if the cancel
/// flag was raised; a canceled pass leaves `samples` untouched so the accumulator stays
/// consistent with its counter.
pub fn render_pass(
    state: &mut TraceState, tracer: &Tracer, pass: u32, total: u32, parallel: bool,
    cancel: &AtomicBool,
) -> bool {
    let (width, height) = (state.width as usize, state.height as usize);
    let seed = state.seed();
    let aa = state.antialiasing;
    let row_job = |(y, row): (usize, &mut [Color])| {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        render_row(tracer, row, y, width, height, seed, aa, pass, total);
    };
    if parallel {
        state.image.par_chunks_mut(width).enumerate().for_each(row_job);
    } else {
        state.image.chunks_mut(width).enumerate().for_each(row_job);
    }
    if cancel.load(Ordering::Relaxed) {
        return false;
    }
    // All rows joined above; bumping the counter here publishes a consistent pair.
    state.samples += 1;
    true
}

fn render_row(
    tracer: &Tracer, row: &mut [Color], y: usize, width: usize, height: usize, seed: u64,
    aa: Antialiasing, pass: u32, total: u32,
) {
    for (x, pixel) in row.iter_mut().enumerate() {
        let mut rng = TraceState::pixel_rng(seed, y * width + x, pass);
        let offset = aa.sample_offset(pass, total, &mut rng);
        let uv = math::hcm::vec2(
            (x as f32 + offset.x) / width as f32,
            (y as f32 + offset.y) / height as f32,
        );
        *pixel += tracer.radiance(uv);
    }
}

/// A publishable snapshot of the accumulator.
#[derive(Debug, Clone)]
pub struct Published {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
    pub samples: u32,
}

/// Progressive driver: an eighth-resolution single-sample preview published immediately,
/// then accumulating full-resolution passes. A display loop polls `take_update` and may
/// raise `cancel` at any time; workers notice it at row boundaries.
pub struct Progressive {
    published: Mutex<Published>,
    updated: AtomicBool,
    pub cancel: AtomicBool,
}

impl Progressive {
    pub fn new() -> Progressive {
        Progressive {
            published: Mutex::new(Published {
                width: 0,
                height: 0,
                pixels: Vec::new(),
                samples: 0,
            }),
            updated: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
        }
    }

    /// The latest snapshot, or `None` if nothing new was published since the last call.
    pub fn take_update(&self) -> Option<Published> {
        if !self.updated.swap(false, Ordering::Acquire) {
            return None;
        }
        Some(self.published.lock().unwrap().clone())
    }

    fn publish(&self, state: &TraceState) {
        let mut published = self.published.lock().unwrap();
        *published = Published {
            width: state.width,
            height: state.height,
            pixels: state.average(),
            samples: state.samples,
        };
        self.updated.store(true, Ordering::Release);
    }

    /// Runs the whole progressive loop on the calling thread, publishing after the preview
    /// and after every completed pass.
    pub fn run(&self, tracer: &Tracer, state: &mut TraceState, total: u32, parallel: bool) {
        self.render_preview(tracer, state, parallel);
        self.publish(state);
        for pass in 0..total {
            if !render_pass(state, tracer, pass, total, parallel, &self.cancel) {
                return;
            }
            self.publish(state);
        }
    }

    /// One sample at an eighth of the linear resolution, upscaled nearest-neighbor into
    /// the accumulator as its initial content.
    fn render_preview(&self, tracer: &Tracer, state: &mut TraceState, parallel: bool) {
        let (pw, ph) = ((state.width / 8).max(1), (state.height / 8).max(1));
        let mut preview = TraceState::new(pw, ph, state.sampler, state.antialiasing, state.seed());
        if !render_pass(&mut preview, tracer, 0, 1, parallel, &self.cancel) {
            return;
        }
        let (w, h) = (state.width as usize, state.height as usize);
        for y in 0..h {
            let sy = y * ph as usize / h;
            for x in 0..w {
                let sx = x * pw as usize / w;
                state.image[y * w + x] = preview.image[sy * pw as usize + sx];
            }
        }
        state.samples = 1;
    }
}

impl Default for Progressive {
    fn default() -> Self {
        Progressive::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sampler::SamplerKind;
    use accel::{BuildQuality, SceneBvh};
    use geometry::Camera;
    use math::hcm::{point3, vec2, Point3};

    fn empty_setup() -> (Vec<shape::TraceShape>, Camera) {
        let camera = Camera::new(
            true,
            point3(0.0, 0.0, 1.0),
            Point3::ORIGIN,
            vec2(0.0, 0.0),
            0.05,
            0.036,
            1.0,
            0.018,
        );
        (Vec::new(), camera)
    }

    #[test]
    fn canceled_pass_keeps_counter_consistent() {
        let (shapes, camera) = empty_setup();
        let bvh = SceneBvh::build(&shapes, BuildQuality::Midpoint);
        let tracer = Tracer {
            shapes: &shapes,
            bvh: &bvh,
            texts: &[],
            camera: &camera,
            width_px: 16.0,
            sampler: SamplerKind::Color,
            background: radiometry::Color::WHITE,
        };
        let mut state = TraceState::new(
            16,
            16,
            SamplerKind::Color,
            crate::sampler::Antialiasing::SuperSampling,
            1,
        );
        let cancel = AtomicBool::new(true);
        assert!(!render_pass(&mut state, &tracer, 0, 4, false, &cancel));
        assert_eq!(state.samples, 0);

        let cancel = AtomicBool::new(false);
        assert!(render_pass(&mut state, &tracer, 0, 4, false, &cancel));
        assert_eq!(state.samples, 1);
        // Empty scene, opaque white background.
        assert_eq!(state.image[0].r, 1.0);
        assert_eq!(state.image[0].a, 1.0);
    }

    #[test]
    fn progressive_publishes_preview_then_passes() {
        let (shapes, camera) = empty_setup();
        let bvh = SceneBvh::build(&shapes, BuildQuality::Midpoint);
        let tracer = Tracer {
            shapes: &shapes,
            bvh: &bvh,
            texts: &[],
            camera: &camera,
            width_px: 32.0,
            sampler: SamplerKind::Color,
            background: radiometry::Color::WHITE,
        };
        let mut state = TraceState::new(
            32,
            32,
            SamplerKind::Color,
            crate::sampler::Antialiasing::RandomSampling,
            1,
        );
        let driver = Progressive::new();
        driver.run(&tracer, &mut state, 2, false);
        let last = driver.take_update().unwrap();
        // Preview plus two full passes.
        assert_eq!(last.samples, 3);
        assert_eq!(last.pixels.len(), 32 * 32);
        assert!(driver.take_update().is_none());
    }
}
