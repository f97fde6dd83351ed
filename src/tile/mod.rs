//! Tile grid engine.
//!
//! This module cuts a slide into a regular grid of PNG tiles on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     CLI  /  spawn_tiling (background)   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                 Engine                  │
//! │  ┌──────────┐ ┌───────────┐ ┌────────┐  │
//! │  │ TileGrid │ │ normalize │ │  PNG   │  │
//! │  │(row-major│ │ (alpha →  │ │encoder │  │
//! │  │ requests)│ │   white)  │ │        │  │
//! │  └──────────┘ └───────────┘ └────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             SlideAccessor               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`tile`]: run the engine over an opened slide
//! - [`tile_slide_file`]: open a slide by path, then run the engine
//! - [`spawn_tiling`]: run the whole pipeline on a tokio task
//! - [`TileGrid`] / [`TileRequest`]: grid extents, iteration order and file names
//! - [`normalize`]: flatten any alpha onto white
//! - [`PngTileEncoder`]: lossless, fast, 300 DPI
//! - [`ProgressObserver`], [`CancellationFlag`]: progress and cancellation
//!
//! # Example
//!
//! ```no_run
//! use wsi_tiler::tile::{tile_slide_file, NoopObserver, TilingOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = TilingOptions::new(512, 100);
//!     match tile_slide_file("slide.svs", "tiles/", &options, &NoopObserver, None).await {
//!         Ok(summary) => println!("wrote {} tiles", summary.tiles_written),
//!         Err(failure) => eprintln!("tiling failed: {}", failure),
//!     }
//! }
//! ```

mod encoder;
mod engine;
mod grid;
mod normalize;
mod progress;
mod task;

pub use encoder::{
    is_valid_quality, PngTileEncoder, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY, TILE_DPI,
};
pub use engine::{
    tile, tile_slide_file, tile_slide_file_with_cache, TilingOptions, TilingSummary,
    DEFAULT_TILE_SIZE,
};
pub use grid::{TileGrid, TileRequest, MIN_COORDINATE_DIGITS, TILE_EXTENSION};
pub use normalize::normalize;
pub use progress::{
    CancellationFlag, ChannelObserver, NoopObserver, ProgressEvent, ProgressObserver, RunStatus,
};
pub use task::{spawn_tiling, TilingTask};
