//! The tiling run loop.
//!
//! ```text
//! dimensions → TileGrid → for each TileRequest (row-major):
//!     read_region → normalize → PNG encode → write tile_{x}_{y}.png
//! ```
//!
//! The run is sequential: requests never overlap, and the slide handle is
//! read by one task at a time. The slide is closed exactly once whatever the
//! outcome, and tiles written before a failure are left on disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ProcessingFailure, SlideError, TilingError};
use crate::slide::{open_slide_with_cache, SlideAccessor, DEFAULT_TILE_CACHE_CAPACITY};

use super::encoder::{is_valid_quality, PngTileEncoder, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY};
use super::grid::{TileGrid, TileRequest};
use super::normalize::normalize;
use super::progress::{CancellationFlag, ProgressObserver, RunStatus};

/// Default edge length of output tiles in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 1024;

/// Parameters of a tiling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TilingOptions {
    /// Edge length of output tiles in pixels
    pub tile_size: u32,
    /// Accepted for compatibility; PNG output is lossless regardless
    pub quality: u8,
}

impl Default for TilingOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl TilingOptions {
    pub fn new(tile_size: u32, quality: u8) -> Self {
        Self { tile_size, quality }
    }

    pub fn validate(&self) -> Result<(), TilingError> {
        if self.tile_size == 0 {
            return Err(TilingError::InvalidArgument(
                "tile size must be positive".to_string(),
            ));
        }
        if !is_valid_quality(self.quality) {
            return Err(TilingError::InvalidArgument(format!(
                "quality must be between {} and {}, got {}",
                MIN_QUALITY, MAX_QUALITY, self.quality
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TilingSummary {
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub level: usize,
    pub tile_size: u32,
    pub columns: u32,
    pub rows: u32,
    pub tiles_written: u64,
    pub elapsed_ms: u64,
}

/// Tile `slide` into `output_dir`.
///
/// The directory is created with its parents if absent. The slide is closed
/// before returning on every path, and `observer` receives the terminal
/// status.
pub async fn tile(
    slide: &dyn SlideAccessor,
    output_dir: &Path,
    options: &TilingOptions,
    observer: &dyn ProgressObserver,
    cancel: Option<&CancellationFlag>,
) -> Result<TilingSummary, ProcessingFailure> {
    let result = run(slide, output_dir, options, observer, cancel).await;
    slide.close().await;

    let status = match &result {
        Ok(summary) => RunStatus::Completed {
            tiles: summary.tiles_written,
        },
        Err(failure) if matches!(failure.kind, TilingError::Cancelled) => RunStatus::Cancelled,
        Err(failure) => RunStatus::Failed {
            reason: failure.kind.to_string(),
            coordinate: failure.coordinate,
        },
    };
    observer.on_finish(&status);

    result
}

/// Open the slide at `path` and tile it into `output_dir`.
///
/// Options are validated and the slide opened before the output directory is
/// touched, so an unreadable input leaves no trace on disk.
pub async fn tile_slide_file(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &TilingOptions,
    observer: &dyn ProgressObserver,
    cancel: Option<&CancellationFlag>,
) -> Result<TilingSummary, ProcessingFailure> {
    tile_slide_file_with_cache(
        path,
        output_dir,
        options,
        observer,
        cancel,
        DEFAULT_TILE_CACHE_CAPACITY,
    )
    .await
}

/// [`tile_slide_file`] with an explicit decoded-tile cache capacity.
pub async fn tile_slide_file_with_cache(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &TilingOptions,
    observer: &dyn ProgressObserver,
    cancel: Option<&CancellationFlag>,
    cache_capacity: usize,
) -> Result<TilingSummary, ProcessingFailure> {
    let path = path.as_ref();
    if let Err(kind) = options.validate() {
        let failure = ProcessingFailure::new(kind);
        observer.on_finish(&RunStatus::Failed {
            reason: failure.kind.to_string(),
            coordinate: None,
        });
        return Err(failure);
    }

    let slide = match open_slide_with_cache(path, cache_capacity).await {
        Ok(slide) => slide,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open slide");
            let failure = ProcessingFailure::new(TilingError::Open(e));
            observer.on_finish(&RunStatus::Failed {
                reason: failure.kind.to_string(),
                coordinate: None,
            });
            return Err(failure);
        }
    };

    info!(
        path = %path.display(),
        format = slide.format_name(),
        "opened slide"
    );
    tile(slide.as_ref(), output_dir.as_ref(), options, observer, cancel).await
}

async fn run(
    slide: &dyn SlideAccessor,
    output_dir: &Path,
    options: &TilingOptions,
    observer: &dyn ProgressObserver,
    cancel: Option<&CancellationFlag>,
) -> Result<TilingSummary, ProcessingFailure> {
    let started = Instant::now();
    options.validate()?;

    let (width, height) = slide.dimensions();
    let grid = TileGrid::new(width, height, options.tile_size)?;

    let level = slide.best_level_for_downsample(1.0);
    let downsample = slide.level_downsample(level).unwrap_or(1.0);
    if downsample != 1.0 {
        warn!(level, downsample, "finest level is not full resolution");
    }

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| TilingError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let total = grid.total();
    info!(
        width,
        height,
        level,
        downsample,
        levels = slide.level_count(),
        tile_size = grid.tile_size(),
        columns = grid.columns(),
        rows = grid.rows(),
        total,
        output = %output_dir.display(),
        "tiling slide"
    );
    observer.on_start(total);

    let encoder = PngTileEncoder::new();
    let mut completed = 0u64;
    for request in grid.requests() {
        if cancel.is_some_and(CancellationFlag::is_cancelled) {
            info!(completed, total, "tiling cancelled");
            return Err(TilingError::Cancelled.into());
        }

        let path = output_dir.join(grid.file_name(&request));
        write_tile(slide, level, &encoder, &request, &path)
            .await
            .map_err(|kind| ProcessingFailure::at(request.x, request.y, kind))?;

        completed += 1;
        debug!(
            x = request.x,
            y = request.y,
            width = request.width,
            height = request.height,
            completed,
            total,
            "wrote tile"
        );
        observer.on_tile(completed, total, &request, &path);
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(tiles = completed, elapsed_ms, "tiling complete");

    Ok(TilingSummary {
        output_dir: output_dir.to_path_buf(),
        width,
        height,
        level,
        tile_size: grid.tile_size(),
        columns: grid.columns(),
        rows: grid.rows(),
        tiles_written: completed,
        elapsed_ms,
    })
}

async fn write_tile(
    slide: &dyn SlideAccessor,
    level: usize,
    encoder: &PngTileEncoder,
    request: &TileRequest,
    path: &Path,
) -> Result<(), TilingError> {
    let region = slide
        .read_region(request.x, request.y, level, request.width, request.height)
        .await
        .map_err(TilingError::Read)?;

    let (width, height) = region.dimensions();
    if (width, height) != (request.width, request.height) {
        return Err(TilingError::Read(SlideError::Decode {
            message: format!(
                "region is {}x{}, expected {}x{}",
                width, height, request.width, request.height
            ),
        }));
    }

    let rgb = normalize(region)?;
    let png = encoder.encode(&rgb)?;

    tokio::fs::write(path, &png)
        .await
        .map_err(|source| TilingError::Io {
            path: path.to_path_buf(),
            source,
        })
}
