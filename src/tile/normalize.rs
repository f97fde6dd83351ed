//! Color normalization to opaque 8-bit RGB.
//!
//! PNG consumers downstream expect three channels, so every region is
//! flattened before encoding:
//!
//! - straight alpha is composited over opaque white,
//!   `out = c * a + 255 * (1 - a)`;
//! - premultiplied float alpha already holds `c * a`, so only the background
//!   term is added, `out = c + (1 - a)`;
//! - opaque RGB passes through untouched.

use image::{Rgb, RgbImage};

use crate::error::TilingError;
use crate::slide::TileImage;

/// Flatten `tile` to opaque RGB with the same dimensions.
pub fn normalize(tile: TileImage) -> Result<RgbImage, TilingError> {
    match tile {
        TileImage::Rgb(rgb) => Ok(rgb),
        TileImage::Rgba(rgba) => {
            let (width, height) = rgba.dimensions();
            Ok(RgbImage::from_fn(width, height, |x, y| {
                let [r, g, b, a] = rgba.get_pixel(x, y).0;
                Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
            }))
        }
        TileImage::PremultipliedRgba(float) => {
            let (width, height) = float.dimensions();
            Ok(RgbImage::from_fn(width, height, |x, y| {
                let [r, g, b, a] = float.get_pixel(x, y).0;
                let background = 1.0 - a.clamp(0.0, 1.0);
                Rgb([
                    unit_to_u8(r + background),
                    unit_to_u8(g + background),
                    unit_to_u8(b + background),
                ])
            }))
        }
        other => Err(TilingError::UnsupportedPixelFormat(other.layout_name())),
    }
}

/// Composite one straight-alpha channel over white, rounding to nearest.
#[inline]
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[inline]
fn unit_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
