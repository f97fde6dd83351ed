//! Single-level slides backed by a fully decoded raster.
//!
//! Used for inputs that are not tiled pyramids: PNG, JPEG and stripped TIFF
//! files small enough to decode in one go.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use image::{imageops, DynamicImage, ImageError, RgbaImage};
use tracing::debug;

use crate::error::{IoError, SlideError};

use super::accessor::SlideAccessor;
use super::tile_image::TileImage;

/// A slide with a single full-resolution level held in memory.
pub struct RasterSlide {
    image: DynamicImage,
    closed: AtomicBool,
}

impl RasterSlide {
    /// Decode `path` on the blocking pool.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SlideError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();
        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| SlideError::Decode {
                message: format!("decoder task failed: {}", e),
            })?
            .map_err(|e| map_image_error(identifier, e))?;

        Ok(Self::from_image(decoded))
    }

    /// Wrap an already decoded image. Layouts other than 8-bit RGB/RGBA are
    /// converted to the nearest of the two.
    pub fn from_image(image: DynamicImage) -> Self {
        let image = match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
        debug!(
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "decoded raster slide"
        );
        Self {
            image,
            closed: AtomicBool::new(false),
        }
    }
}

fn map_image_error(path: String, err: ImageError) -> SlideError {
    match err {
        ImageError::Unsupported(e) => SlideError::UnsupportedFormat {
            reason: e.to_string(),
        },
        ImageError::IoError(e) => SlideError::Io(IoError::from_std(path, e)),
        other => SlideError::Decode {
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl SlideAccessor for RasterSlide {
    fn format_name(&self) -> &'static str {
        "Raster Image"
    }

    fn level_count(&self) -> usize {
        1
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        (level == 0).then(|| (self.image.width(), self.image.height()))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        (level == 0).then_some(1.0)
    }

    async fn read_region(
        &self,
        x: u32,
        y: u32,
        level: usize,
        width: u32,
        height: u32,
    ) -> Result<TileImage, SlideError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SlideError::Closed);
        }
        if level != 0 {
            return Err(SlideError::InvalidLevel { level, count: 1 });
        }
        if width == 0 || height == 0 {
            return Err(SlideError::EmptyRegion { width, height });
        }

        let (image_w, image_h) = (self.image.width() as u64, self.image.height() as u64);
        let inside = x as u64 + width as u64 <= image_w && y as u64 + height as u64 <= image_h;
        if inside {
            return Ok(TileImage::from_dynamic(
                self.image.crop_imm(x, y, width, height),
            ));
        }

        // Partially or fully outside: transparent canvas with the overlap pasted in
        let mut region = RgbaImage::new(width, height);
        if (x as u64) < image_w && (y as u64) < image_h {
            let overlap_w = (image_w - x as u64).min(width as u64) as u32;
            let overlap_h = (image_h - y as u64).min(height as u64) as u32;
            let overlap = self.image.crop_imm(x, y, overlap_w, overlap_h).to_rgba8();
            imageops::replace(&mut region, &overlap, 0, 0);
        }
        Ok(TileImage::Rgba(region))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
