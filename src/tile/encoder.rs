//! Lossless PNG tile encoder.
//!
//! # Design Decisions
//!
//! - **Fast compression**: tiling a slide writes thousands of files, so the
//!   fastest deflate setting is used. Output stays lossless.
//!
//! - **300 DPI**: every tile carries a pHYs chunk of 11811 pixels per metre.
//!   This is a display hint only.
//!
//! - **Quality is not a PNG setting**: the quality parameter is validated for
//!   callers that pass one, but PNG has no quality knob.

use bytes::Bytes;
use image::RgbImage;
use png::{BitDepth, ColorType, Compression, PixelDimensions, Unit};

use crate::error::TilingError;

/// Default quality (1-100).
pub const DEFAULT_QUALITY: u8 = 100;

/// Minimum allowed quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed quality.
pub const MAX_QUALITY: u8 = 100;

/// Resolution tag of output tiles.
pub const TILE_DPI: u32 = 300;

const METERS_PER_INCH: f64 = 0.0254;

// =============================================================================
// PNG Encoder
// =============================================================================

/// Encodes normalized RGB tiles as PNG.
#[derive(Debug, Clone)]
pub struct PngTileEncoder {
    compression: Compression,
    pixels_per_meter: u32,
}

impl Default for PngTileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PngTileEncoder {
    /// Fast compression, 300 DPI.
    pub fn new() -> Self {
        Self {
            compression: Compression::Fast,
            pixels_per_meter: dpi_to_pixels_per_meter(TILE_DPI),
        }
    }

    /// Encode `image` as an 8-bit RGB PNG.
    pub fn encode(&self, image: &RgbImage) -> Result<Bytes, TilingError> {
        let (width, height) = image.dimensions();
        let mut output = Vec::new();

        let mut encoder = png::Encoder::new(&mut output, width, height);
        encoder.set_color(ColorType::Rgb);
        encoder.set_depth(BitDepth::Eight);
        encoder.set_compression(self.compression);
        encoder.set_pixel_dims(Some(PixelDimensions {
            xppu: self.pixels_per_meter,
            yppu: self.pixels_per_meter,
            unit: Unit::Meter,
        }));

        let mut writer = encoder.write_header().map_err(encode_error)?;
        writer
            .write_image_data(image.as_raw())
            .map_err(encode_error)?;
        writer.finish().map_err(encode_error)?;

        Ok(Bytes::from(output))
    }
}

fn encode_error(err: png::EncodingError) -> TilingError {
    TilingError::Encode(err.to_string())
}

fn dpi_to_pixels_per_meter(dpi: u32) -> u32 {
    (dpi as f64 / METERS_PER_INCH).round() as u32
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

// =============================================================================
// Tests
// =============================================================================
