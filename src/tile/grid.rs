//! Tile grid computation and output file naming.
//!
//! The grid is never materialized: [`TileGrid::requests`] yields the tiles
//! lazily in row-major order, every tile of one row before the next row.

use serde::Serialize;

use crate::error::TilingError;

/// Minimum number of digits in a coordinate of an output file name.
pub const MIN_COORDINATE_DIGITS: usize = 5;

/// Extension of the output tile files.
pub const TILE_EXTENSION: &str = "png";

/// One cell of the grid: its top-left corner in level-0 pixels and its size,
/// clamped at the right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileRequest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The grid of tiles covering a `width` x `height` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    columns: u32,
    rows: u32,
}

impl TileGrid {
    /// Fails with [`TilingError::InvalidArgument`] when any dimension is zero.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Result<Self, TilingError> {
        if tile_size == 0 {
            return Err(TilingError::InvalidArgument(
                "tile size must be positive".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(TilingError::InvalidArgument(format!(
                "slide dimensions must be positive, got {}x{}",
                width, height
            )));
        }

        Ok(Self {
            width,
            height,
            tile_size,
            columns: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
        })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Total number of tiles.
    pub fn total(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// Digits per coordinate in file names: at least five, more when the
    /// image is wide or tall enough to need them.
    pub fn coordinate_digits(&self) -> usize {
        let largest = self.width.max(self.height);
        let digits = largest.checked_ilog10().map_or(1, |d| d as usize + 1);
        digits.max(MIN_COORDINATE_DIGITS)
    }

    /// Tile at `column`, `row`, `None` when outside the grid.
    pub fn request(&self, column: u32, row: u32) -> Option<TileRequest> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        let x = column * self.tile_size;
        let y = row * self.tile_size;
        Some(TileRequest {
            x,
            y,
            width: self.tile_size.min(self.width - x),
            height: self.tile_size.min(self.height - y),
        })
    }

    /// All tiles in row-major order.
    pub fn requests(&self) -> impl Iterator<Item = TileRequest> {
        let grid = *self;
        (0..grid.rows).flat_map(move |row| {
            (0..grid.columns).filter_map(move |column| grid.request(column, row))
        })
    }

    /// File name of a tile, e.g. `tile_01024_00000.png`.
    pub fn file_name(&self, request: &TileRequest) -> String {
        let digits = self.coordinate_digits();
        format!(
            "tile_{:0digits$}_{:0digits$}.{}",
            request.x,
            request.y,
            TILE_EXTENSION,
            digits = digits
        )
    }
}
