use crate::{Bitmap, LabelMetrics};
use base64::Engine;
use radiometry::Color;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Failures of the text rasterization service. These never abort a render; the affected
/// label falls back to its placeholder bitmap.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("http: {0}")]
    Http(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5500/rasterize";

#[derive(Debug, Clone)]
pub struct RasterRequest<'a> {
    pub text: &'a str,
    pub width: u32,
    pub height: u32,
    pub zoom: f32,
    /// Horizontal alignment, -1 / 0 / +1.
    pub align_x: i32,
    pub color: Color,
}

/// Anything that can turn a label into pixels. The HTTP client is the real implementation;
/// tests substitute their own. Label tickets run on the worker pool, hence the bounds.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, req: &RasterRequest) -> Result<Bitmap, ServiceError>;

    /// The raw PNG bytes of a raster, for prebaking to disk.
    fn rasterize_png(&self, req: &RasterRequest) -> Result<Vec<u8>, ServiceError>;
}

/// Client of the external text service: form-encoded POST, base64 PNG response.
pub struct HttpRasterizer {
    endpoint: String,
}

impl Default for HttpRasterizer {
    fn default() -> Self {
        HttpRasterizer {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl HttpRasterizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpRasterizer {
            endpoint: endpoint.into(),
        }
    }
}

impl Rasterizer for HttpRasterizer {
    fn rasterize(&self, req: &RasterRequest) -> Result<Bitmap, ServiceError> {
        Bitmap::decode_png(&self.rasterize_png(req)?)
    }

    fn rasterize_png(&self, req: &RasterRequest) -> Result<Vec<u8>, ServiceError> {
        let [r, g, b, a] = req.color.to_srgb_u8();
        let response = ureq::post(&self.endpoint)
            .send_form(&[
                ("text", req.text),
                ("width", &req.width.to_string()),
                ("height", &req.height.to_string()),
                ("zoom", &req.zoom.to_string()),
                ("align_x", &req.align_x.to_string()),
                ("r", &r.to_string()),
                ("g", &g.to_string()),
                ("b", &b.to_string()),
                ("a", &a.to_string()),
            ])
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        let body = response
            .into_string()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(body.trim())
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

/// Prebaked label bitmaps on disk, one PNG per distinct label text. The file name is a
/// hash of the text so arbitrary markup stays a valid path.
pub struct TextCache {
    dir: PathBuf,
}

impl TextCache {
    /// Cache directory for a scene file: `<scene-stem>_texts/` next to the scene.
    pub fn for_scene(scene_path: &std::path::Path) -> TextCache {
        let stem = scene_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string());
        let dir = scene_path.with_file_name(format!("{}_texts", stem));
        TextCache { dir }
    }

    fn path_of(&self, text: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        self.dir.join(format!("{:016x}.png", hasher.finish()))
    }

    pub fn load(&self, text: &str) -> Option<Bitmap> {
        let bytes = std::fs::read(self.path_of(text)).ok()?;
        match Bitmap::decode_png(&bytes) {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                log::warn!("ignoring corrupt cached bitmap for {:?}: {}", text, e);
                None
            }
        }
    }

    pub fn store(&self, text: &str, png_bytes: &[u8]) -> Result<(), ServiceError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_of(text), png_bytes)?;
        Ok(())
    }
}

/// Bitmap resolution order: baked cache, then the live service, then the placeholder.
pub fn bitmap_for(
    text: &str, metrics: &LabelMetrics, zoom: f32, align_x: i32, color: Color,
    cache: Option<&TextCache>, rasterizer: Option<&dyn Rasterizer>,
) -> Bitmap {
    if let Some(bitmap) = cache.and_then(|c| c.load(text)) {
        return bitmap;
    }
    let (w, h) = (
        metrics.width.ceil().max(1.0) as u32,
        metrics.height.ceil().max(1.0) as u32,
    );
    if let Some(service) = rasterizer {
        let req = RasterRequest {
            text,
            width: w,
            height: h,
            zoom,
            align_x,
            color,
        };
        match service.rasterize(&req) {
            Ok(bitmap) => return bitmap,
            Err(e) => log::warn!("text service failed for {:?}: {}", text, e),
        }
    }
    Bitmap::placeholder(w, h, color)
}

#[cfg(test)]
mod test {
    use super::*;

    struct CannedRasterizer(Bitmap);
    impl Rasterizer for CannedRasterizer {
        fn rasterize(&self, _: &RasterRequest) -> Result<Bitmap, ServiceError> {
            Ok(self.0.clone())
        }
        fn rasterize_png(&self, _: &RasterRequest) -> Result<Vec<u8>, ServiceError> {
            Err(ServiceError::Http("not implemented".to_string()))
        }
    }

    struct FailingRasterizer;
    impl Rasterizer for FailingRasterizer {
        fn rasterize(&self, _: &RasterRequest) -> Result<Bitmap, ServiceError> {
            Err(ServiceError::Http("connection refused".to_string()))
        }
        fn rasterize_png(&self, _: &RasterRequest) -> Result<Vec<u8>, ServiceError> {
            Err(ServiceError::Http("connection refused".to_string()))
        }
    }

    #[test]
    fn service_bitmap_wins_over_placeholder() {
        let metrics = crate::measure("hi", 1.0);
        let canned = CannedRasterizer(Bitmap::solid(3, 3, Color::WHITE));
        let b = bitmap_for("hi", &metrics, 1.0, 0, Color::BLACK, None, Some(&canned));
        assert_eq!(b.width(), 3);
    }

    #[test]
    fn service_failure_falls_back_to_placeholder() {
        let metrics = crate::measure("hi", 1.0);
        let b = bitmap_for("hi", &metrics, 1.0, 0, Color::BLACK, None, Some(&FailingRasterizer));
        assert_eq!(b.width(), metrics.width.ceil() as u32);
        assert_eq!(b.height(), metrics.height.ceil() as u32);
    }

    #[test]
    fn cache_paths_depend_only_on_text() {
        let cache = TextCache::for_scene(std::path::Path::new("/tmp/foo/demo.json"));
        assert_eq!(cache.path_of("x"), cache.path_of("x"));
        assert_ne!(cache.path_of("x"), cache.path_of("y"));
        assert!(cache.path_of("x").starts_with("/tmp/foo/demo_texts"));
    }
}
