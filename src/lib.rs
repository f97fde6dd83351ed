//! # WSI Tiler
//!
//! Cuts Whole Slide Images (WSI) into a regular grid of lossless PNG tiles.
//!
//! A slide of `width x height` pixels becomes
//! `ceil(width / tile_size) * ceil(height / tile_size)` files named after their
//! top-left pixel, `tile_{x:05}_{y:05}.png`. Tiles are read at full
//! resolution, flattened onto white when the source carries alpha, and
//! written in row-major order.
//!
//! ## Features
//!
//! - **Native TIFF parsing**: Aperio SVS and tiled pyramidal TIFF/BigTIFF are
//!   read tile by tile through byte ranges, never loaded whole
//! - **Flat rasters**: PNG, JPEG and stripped TIFF inputs are tiled as single-level slides
//! - **Deterministic output**: identical inputs give identical file sets
//! - **Progress and cancellation**: observer callbacks, a progress channel and
//!   a shared cancellation flag for background runs
//!
//! ## Architecture
//!
//! - [`io`] - Byte-range readers for local files and memory
//! - [`mod@format`] - TIFF/SVS parsers and JPEG handling
//! - [`slide`] - Slide accessor trait and its TIFF and raster implementations
//! - [`tile`] - Tile grid engine: grid, normalization, PNG encoding, progress
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_tiler::{open_slide, tile, NoopObserver, TilingOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let slide = open_slide("slides/CMU-1.svs").await?;
//!     let summary = tile(
//!         slide.as_ref(),
//!         "tiles/CMU-1".as_ref(),
//!         &TilingOptions::default(),
//!         &NoopObserver,
//!         None,
//!     )
//!     .await?;
//!     println!("{} tiles", summary.tiles_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, InfoConfig, TileConfig};
pub use error::{IoError, ProcessingFailure, SlideError, TiffError, TilingError};
pub use format::tiff::{
    parse_u64_array, ByteOrder, Compression, FieldType, Ifd, IfdEntry, PyramidLevel, TiffHeader,
    TiffPyramid, TiffTag, TileData, ValueReader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};
pub use format::{is_tiff_header, SlideFormat};
pub use format::{
    is_abbreviated_stream, is_complete_stream, merge_jpeg_tables, prepare_tile_jpeg, SvsMetadata,
};
pub use io::{BytesReader, LocalFileReader, RangeReader};
pub use slide::{
    open_slide, open_slide_with_cache, LevelInfo, RasterSlide, SlideAccessor, TiffSlide, TileImage,
    DEFAULT_TILE_CACHE_CAPACITY,
};
pub use tile::{
    normalize, spawn_tiling, tile, tile_slide_file, tile_slide_file_with_cache, CancellationFlag,
    ChannelObserver, NoopObserver, PngTileEncoder, ProgressEvent, ProgressObserver, RunStatus,
    TileGrid, TileRequest, TilingOptions, TilingSummary, TilingTask, DEFAULT_QUALITY,
    DEFAULT_TILE_SIZE,
};
