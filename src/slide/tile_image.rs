//! Pixel buffers returned by region reads.

use image::{DynamicImage, Rgba32FImage, RgbImage, RgbaImage};

/// A decoded region, tagged with its color representation.
#[derive(Debug, Clone, PartialEq)]
pub enum TileImage {
    /// 8-bit opaque RGB
    Rgb(RgbImage),
    /// 8-bit RGB with straight (non-premultiplied) alpha
    Rgba(RgbaImage),
    /// Linear float RGBA with premultiplied alpha, channels in `[0, 1]`
    PremultipliedRgba(Rgba32FImage),
    /// Any other layout
    Other(DynamicImage),
}

impl TileImage {
    /// Tag a decoded image. 8-bit RGB and RGBA keep their own variants.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(rgb) => TileImage::Rgb(rgb),
            DynamicImage::ImageRgba8(rgba) => TileImage::Rgba(rgba),
            other => TileImage::Other(other),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            TileImage::Rgb(img) => img.dimensions(),
            TileImage::Rgba(img) => img.dimensions(),
            TileImage::PremultipliedRgba(img) => img.dimensions(),
            TileImage::Other(img) => (img.width(), img.height()),
        }
    }

    /// Short name of the pixel layout, used in error messages.
    pub fn layout_name(&self) -> String {
        match self {
            TileImage::Rgb(_) => "Rgb8".to_string(),
            TileImage::Rgba(_) => "Rgba8".to_string(),
            TileImage::PremultipliedRgba(_) => "premultiplied Rgba32F".to_string(),
            TileImage::Other(img) => format!("{:?}", img.color()),
        }
    }
}

impl From<RgbImage> for TileImage {
    fn from(image: RgbImage) -> Self {
        TileImage::Rgb(image)
    }
}

impl From<RgbaImage> for TileImage {
    fn from(image: RgbaImage) -> Self {
        TileImage::Rgba(image)
    }
}
