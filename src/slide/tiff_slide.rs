//! Pyramidal TIFF and Aperio SVS slides.
//!
//! Regions are composed from decoded source tiles. Decoded tiles are kept in
//! an LRU cache because consecutive output tiles usually straddle the same
//! source tiles when the output tile size is not a multiple of the source
//! tile size.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{SlideError, TiffError};
use crate::format::tiff::{
    Compression, PyramidLevel, TiffPyramid, TiffTag, TileData, ValueReader, PHOTOMETRIC_RGB,
    PLANAR_CONTIGUOUS,
};
use crate::format::{is_complete_stream, prepare_tile_jpeg, SlideFormat, SvsMetadata};
use crate::io::RangeReader;

use super::accessor::SlideAccessor;
use super::tile_image::TileImage;

/// Default number of decoded source tiles kept in memory.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64;

/// Cache key: (level, tile_x, tile_y).
type TileKey = (usize, u32, u32);

/// A slide backed by a tiled TIFF pyramid.
pub struct TiffSlide<R: RangeReader> {
    reader: R,
    pyramid: TiffPyramid,
    /// Tile locations, one entry per pyramid level
    tile_data: Vec<TileData>,
    format: SlideFormat,
    properties: BTreeMap<String, String>,
    cache: Mutex<LruCache<TileKey, Arc<RgbImage>>>,
    closed: AtomicBool,
}

impl<R: RangeReader> TiffSlide<R> {
    /// Parse the pyramid of a TIFF file and load its tile tables.
    ///
    /// Fails with [`SlideError::NoTiledLevels`] when the file has no tiled
    /// IFD, and with [`TiffError::UnsupportedCompression`] when a level uses
    /// a compression other than JPEG or none.
    pub async fn open(reader: R, cache_capacity: usize) -> Result<Self, SlideError> {
        let pyramid = TiffPyramid::parse(&reader).await?;
        if pyramid.levels.is_empty() {
            return Err(SlideError::NoTiledLevels);
        }

        let mut tile_data = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            check_level_supported(&reader, &pyramid, level).await?;
            tile_data.push(TileData::load(&reader, level, &pyramid.header).await?);
        }

        let description = read_description(&reader, &pyramid).await?;
        let format = SlideFormat::from_description(description.as_deref());

        let mut properties = BTreeMap::new();
        if let Some(description) = description {
            if format == SlideFormat::AperioSvs {
                properties.extend(SvsMetadata::parse(&description).properties);
            }
            properties.insert("tiff.ImageDescription".to_string(), description);
        }

        debug!(
            slide = reader.identifier(),
            format = format.name(),
            levels = pyramid.levels.len(),
            "opened TIFF slide"
        );

        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(TiffSlide {
            reader,
            pyramid,
            tile_data,
            format,
            properties,
            cache: Mutex::new(LruCache::new(capacity)),
            closed: AtomicBool::new(false),
        })
    }

    fn level(&self, level: usize) -> Result<&PyramidLevel, SlideError> {
        self.pyramid
            .levels
            .get(level)
            .ok_or(SlideError::InvalidLevel {
                level,
                count: self.pyramid.levels.len(),
            })
    }

    /// A decoded source tile, from the cache when possible.
    async fn decoded_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Arc<RgbImage>, SlideError> {
        let key = (level, tile_x, tile_y);
        if let Some(tile) = self.cache.lock().await.get(&key) {
            return Ok(Arc::clone(tile));
        }

        let tile = Arc::new(self.decode_tile(level, tile_x, tile_y).await?);
        self.cache.lock().await.put(key, Arc::clone(&tile));
        Ok(tile)
    }

    async fn decode_tile(&self, level: usize, tile_x: u32, tile_y: u32) -> Result<RgbImage, SlideError> {
        let info = self.level(level)?;
        let data = &self.tile_data[level];

        let (offset, byte_count) = info
            .tile_index(tile_x, tile_y)
            .and_then(|index| data.get_tile_location(index))
            .ok_or_else(|| SlideError::Decode {
                message: format!("tile ({}, {}) missing from level {}", tile_x, tile_y, level),
            })?;
        if byte_count == 0 {
            return Err(SlideError::Decode {
                message: format!("tile ({}, {}) of level {} is empty", tile_x, tile_y, level),
            });
        }

        let len = usize::try_from(byte_count).map_err(|_| SlideError::Decode {
            message: format!("tile of {} bytes is too large", byte_count),
        })?;
        let raw = self.reader.read_exact_at(offset, len).await?;

        match info.compression {
            Compression::Jpeg => {
                let stream = prepare_tile_jpeg(
                    data.jpeg_tables.as_deref(),
                    &raw,
                    info.photometric == Some(PHOTOMETRIC_RGB),
                );
                if !is_complete_stream(&stream) {
                    return Err(SlideError::Decode {
                        message: format!(
                            "JPEG tile ({}, {}) of level {} has no quantization or Huffman tables",
                            tile_x, tile_y, level
                        ),
                    });
                }
                let decoded = image::load_from_memory_with_format(&stream, ImageFormat::Jpeg)
                    .map_err(|e| SlideError::Decode {
                        message: format!("JPEG tile ({}, {}): {}", tile_x, tile_y, e),
                    })?;
                Ok(decoded.into_rgb8())
            }
            Compression::None => {
                let expected = info.tile_width as usize * info.tile_height as usize * 3;
                if raw.len() < expected {
                    return Err(SlideError::Decode {
                        message: format!(
                            "uncompressed tile ({}, {}) has {} bytes, expected {}",
                            tile_x,
                            tile_y,
                            raw.len(),
                            expected
                        ),
                    });
                }
                RgbImage::from_raw(info.tile_width, info.tile_height, raw[..expected].to_vec())
                    .ok_or_else(|| SlideError::Decode {
                        message: format!("uncompressed tile ({}, {}) is malformed", tile_x, tile_y),
                    })
            }
            other => Err(TiffError::UnsupportedCompression(other.name()).into()),
        }
    }
}

/// Reject levels this reader cannot decode before any tile is read.
async fn check_level_supported<R: RangeReader>(
    reader: &R,
    pyramid: &TiffPyramid,
    level: &PyramidLevel,
) -> Result<(), SlideError> {
    if !level.compression.is_supported() {
        return Err(TiffError::UnsupportedCompression(level.compression.name()).into());
    }

    let planar = level.ifd.planar_configuration(pyramid.header.byte_order);
    if planar != PLANAR_CONTIGUOUS {
        return Err(SlideError::UnsupportedFormat {
            reason: format!(
                "level {} stores samples in separate planes (PlanarConfiguration {})",
                level.level_index, planar
            ),
        });
    }

    if level.compression != Compression::None {
        return Ok(());
    }

    if level.samples_per_pixel != 3 {
        return Err(SlideError::UnsupportedFormat {
            reason: format!(
                "uncompressed level {} has {} samples per pixel, expected 3",
                level.level_index, level.samples_per_pixel
            ),
        });
    }

    let bits = match level.ifd.get_entry_by_tag(TiffTag::BitsPerSample) {
        Some(entry) => {
            ValueReader::new(reader, &pyramid.header)
                .read_u64_array(entry)
                .await?
        }
        None => vec![1],
    };
    if bits.iter().any(|&b| b != 8) {
        return Err(SlideError::UnsupportedFormat {
            reason: format!(
                "uncompressed level {} has {:?} bits per sample, expected 8",
                level.level_index, bits
            ),
        });
    }

    Ok(())
}

/// ImageDescription of the first IFD in the file.
async fn read_description<R: RangeReader>(
    reader: &R,
    pyramid: &TiffPyramid,
) -> Result<Option<String>, SlideError> {
    let Some(base) = pyramid.levels.first() else {
        return Ok(None);
    };
    match base.ifd.get_entry_by_tag(TiffTag::ImageDescription) {
        Some(entry) => Ok(Some(
            ValueReader::new(reader, &pyramid.header)
                .read_string(entry)
                .await?,
        )),
        None => Ok(None),
    }
}

#[async_trait]
impl<R: RangeReader> SlideAccessor for TiffSlide<R> {
    fn format_name(&self) -> &'static str {
        self.format.name()
    }

    fn level_count(&self) -> usize {
        self.pyramid.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.pyramid
            .levels
            .get(level)
            .map(|l| (l.width, l.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.pyramid.levels.get(level).map(|l| l.downsample)
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.properties.clone()
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
        if width == 0 || height == 0 {
            return Err(SlideError::EmptyRegion { width, height });
        }
        let info = self.level(level)?;

        // Region origin in level pixels
        let left = (x as f64 / info.downsample) as u64;
        let top = (y as f64 / info.downsample) as u64;
        let (level_w, level_h) = (info.width as u64, info.height as u64);
        let right = (left + width as u64).min(level_w);
        let bottom = (top + height as u64).min(level_h);

        debug!(x, y, level, width, height, "reading region");

        let mut canvas = RgbImage::new(width, height);
        if left < right && top < bottom {
            let (tw, th) = (info.tile_width as u64, info.tile_height as u64);
            for tile_y in (top / th)..=((bottom - 1) / th) {
                for tile_x in (left / tw)..=((right - 1) / tw) {
                    let tile = self
                        .decoded_tile(level, tile_x as u32, tile_y as u32)
                        .await?;
                    let (tile_left, tile_top) = (tile_x * tw, tile_y * th);

                    for py in top.max(tile_top)..bottom.min(tile_top + th) {
                        for px in left.max(tile_left)..right.min(tile_left + tw) {
                            let src = tile.get_pixel_checked(
                                (px - tile_left) as u32,
                                (py - tile_top) as u32,
                            );
                            if let Some(pixel) = src {
                                canvas.put_pixel((px - left) as u32, (py - top) as u32, *pixel);
                            }
                        }
                    }
                }
            }
        }

        let inside = left + width as u64 <= level_w && top + height as u64 <= level_h;
        if inside {
            return Ok(TileImage::Rgb(canvas));
        }

        let region = RgbaImage::from_fn(width, height, |px, py| {
            let Rgb([r, g, b]) = *canvas.get_pixel(px, py);
            let covered = left + (px as u64) < level_w && top + (py as u64) < level_h;
            Rgba([r, g, b, if covered { 255 } else { 0 }])
        });
        Ok(TileImage::Rgba(region))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.cache.lock().await.clear();
        debug!(slide = self.reader.identifier(), "closed slide");
    }
}
