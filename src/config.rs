//! Configuration management for the tiler.
//!
//! Options come from command-line arguments via clap, with environment
//! variables (`WSI_` prefix) as fallback and defaults for everything else.
//!
//! # Example
//!
//! ```bash
//! # Tile a slide into 512px tiles
//! wsi-tiler tile slides/CMU-1.svs out/CMU-1 --tile-size 512
//!
//! # Same, configured through the environment
//! WSI_TILE_SIZE=512 wsi-tiler tile slides/CMU-1.svs out/CMU-1
//!
//! # Inspect a slide
//! wsi-tiler info slides/CMU-1.svs --json
//! ```
//!
//! # Environment Variables
//!
//! - `WSI_TILE_SIZE` - Output tile edge length in pixels (default: 1024)
//! - `WSI_QUALITY` - Quality, 1-100 (default: 100; PNG output is lossless)
//! - `WSI_CACHE_TILES` - Decoded source tiles kept in memory (default: 64)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::slide::DEFAULT_TILE_CACHE_CAPACITY;
use crate::tile::{is_valid_quality, TilingOptions, DEFAULT_QUALITY, DEFAULT_TILE_SIZE};

// =============================================================================
// CLI Structure
// =============================================================================

/// WSI Tiler - Cut Whole Slide Images into PNG tiles.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Tile a slide into a directory of PNG files
    Tile(TileConfig),

    /// Print dimensions, levels and vendor properties of a slide
    Info(InfoConfig),
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

// =============================================================================
// Tile Command
// =============================================================================

/// Configuration for the `tile` command.
#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// Slide to tile (SVS, pyramidal TIFF, or a flat PNG/JPEG/TIFF).
    pub input: PathBuf,

    /// Output directory; created with its parents if absent.
    pub output: PathBuf,

    /// Edge length of output tiles in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_TILE_SIZE")]
    pub tile_size: u32,

    /// Quality (1-100). PNG output is lossless; the value is only validated.
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "WSI_QUALITY")]
    pub quality: u8,

    /// Maximum number of decoded source tiles kept in memory.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "WSI_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Print the run summary as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl TileConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }

        if !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }

        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if self.output.as_os_str().is_empty() {
            return Err("output directory must not be empty".to_string());
        }

        Ok(())
    }

    pub fn options(&self) -> TilingOptions {
        TilingOptions::new(self.tile_size, self.quality)
    }
}

// =============================================================================
// Info Command
// =============================================================================

/// Configuration for the `info` command.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Slide to inspect.
    pub input: PathBuf,

    /// Print as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.input.as_os_str().is_empty() {
            return Err("input path must not be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
