//! The `SlideAccessor` trait for format-agnostic region reads.
//!
//! The tiling engine only ever talks to a slide through this trait, so any
//! pyramidal source (a TIFF on disk, a decoded raster, a mock in tests) can be
//! tiled the same way.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SlideError;

use super::tile_image::TileImage;

// =============================================================================
// Level Information
// =============================================================================

/// Information about a single pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelInfo {
    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Downsample factor relative to level 0
    ///
    /// Level 0 has downsample 1.0, level 1 might have 4.0, etc.
    pub downsample: f64,
}

// =============================================================================
// SlideAccessor Trait
// =============================================================================

/// Format-agnostic interface to an opened slide.
///
/// Level 0 is always the finest level. Region coordinates are given in level-0
/// pixels, region sizes in pixels of the requested level.
#[async_trait]
pub trait SlideAccessor: Send + Sync {
    /// Human-readable name of the underlying format.
    fn format_name(&self) -> &'static str;

    /// Get the number of pyramid levels.
    fn level_count(&self) -> usize;

    /// Get dimensions of a specific level.
    ///
    /// Returns `(width, height)` in pixels, or `None` if level is out of range.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    /// Get the downsample factor for a level, `None` if out of range.
    fn level_downsample(&self, level: usize) -> Option<f64>;

    /// Dimensions of the full-resolution (level 0) image.
    fn dimensions(&self) -> (u32, u32) {
        self.level_dimensions(0).unwrap_or((0, 0))
    }

    /// All levels, finest first.
    fn levels(&self) -> Vec<LevelInfo> {
        (0..self.level_count())
            .filter_map(|level| {
                let (width, height) = self.level_dimensions(level)?;
                let downsample = self.level_downsample(level)?;
                Some(LevelInfo {
                    width,
                    height,
                    downsample,
                })
            })
            .collect()
    }

    /// Find the best level for a given downsample factor.
    ///
    /// Returns the level with the largest downsample that does not exceed
    /// `downsample`, or level 0 when every level is coarser.
    fn best_level_for_downsample(&self, downsample: f64) -> usize {
        (0..self.level_count())
            .filter_map(|level| Some((level, self.level_downsample(level)?)))
            .filter(|&(_, d)| d <= downsample)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(level, _)| level)
            .unwrap_or(0)
    }

    /// Vendor metadata as flat key/value pairs. Empty when the format has none.
    fn properties(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Read a `width` x `height` region of `level` whose top-left corner is
    /// `(x, y)` in level-0 coordinates.
    ///
    /// Pixels outside the level are transparent, in which case the region is
    /// returned with an alpha channel.
    async fn read_region(
        &self,
        x: u32,
        y: u32,
        level: usize,
        width: u32,
        height: u32,
    ) -> Result<TileImage, SlideError>;

    /// Release the slide. Reads after `close()` fail with
    /// [`SlideError::Closed`].
    async fn close(&self);
}
