//! Slide abstraction layer.
//!
//! This module provides a unified interface for reading pixel regions from
//! Whole Slide Images regardless of their underlying format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Tile Grid Engine             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          SlideAccessor Trait            │
//! │  (levels, read_region, close)           │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   TiffSlide     │    │    RasterSlide      │
//! │ (SVS, tiled TIFF│    │ (PNG, JPEG, strip   │
//! │  + tile cache)  │    │  TIFF in memory)    │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use wsi_tiler::slide::{open_slide, SlideAccessor};
//!
//! let slide = open_slide("slides/CMU-1.svs").await?;
//! let (width, height) = slide.dimensions();
//! let region = slide.read_region(0, 0, 0, 1024, 1024).await?;
//! slide.close().await;
//! ```

mod accessor;
mod tile_image;
mod raster;
mod tiff_slide;

use std::path::Path;

use tracing::debug;

use crate::error::SlideError;
use crate::format::detect::MAGIC_BYTES;
use crate::format::is_tiff_header;
use crate::io::{LocalFileReader, RangeReader};

pub use tile_image::TileImage;
pub use accessor::{LevelInfo, SlideAccessor};
pub use raster::RasterSlide;
pub use tiff_slide::{TiffSlide, DEFAULT_TILE_CACHE_CAPACITY};

/// Open the slide at `path` with the default decoded-tile cache.
pub async fn open_slide(path: impl AsRef<Path>) -> Result<Box<dyn SlideAccessor>, SlideError> {
    open_slide_with_cache(path, DEFAULT_TILE_CACHE_CAPACITY).await
}

/// Open the slide at `path`, keeping up to `cache_capacity` decoded source
/// tiles in memory.
///
/// Files with a TIFF or BigTIFF header are read as tiled pyramids; TIFFs
/// without tiled levels and any other file are decoded as a flat raster.
pub async fn open_slide_with_cache(
    path: impl AsRef<Path>,
    cache_capacity: usize,
) -> Result<Box<dyn SlideAccessor>, SlideError> {
    let path = path.as_ref();
    let reader = LocalFileReader::open(path).await?;

    let magic_len = MAGIC_BYTES.min(reader.size() as usize);
    let magic = reader.read_exact_at(0, magic_len).await?;

    if is_tiff_header(&magic) {
        match TiffSlide::open(reader, cache_capacity).await {
            Ok(slide) => return Ok(Box::new(slide)),
            Err(SlideError::NoTiledLevels) => {
                debug!(path = %path.display(), "TIFF has no tiled levels, decoding as raster");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Box::new(RasterSlide::open(path).await?))
}
