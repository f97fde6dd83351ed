//! Format detection for slide files.
//!
//! TIFF and BigTIFF files are recognized by their magic bytes; an Aperio
//! marker in the base level's ImageDescription distinguishes SVS from a
//! generic pyramidal TIFF. Anything else is handed to the raster decoder.

use super::svs::APERIO_MARKER;

/// Bytes needed to recognize a TIFF or BigTIFF header.
pub const MAGIC_BYTES: usize = 4;

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS (TIFF with abbreviated JPEG tiles)
    AperioSvs,
    /// Tiled TIFF with one or more resolution levels
    GenericTiff,
    /// Flat raster image decoded in full (PNG, JPEG, stripped TIFF)
    Raster,
}

impl SlideFormat {
    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
            SlideFormat::Raster => "Raster Image",
        }
    }

    /// Classify a TIFF by its base level ImageDescription.
    pub fn from_description(description: Option<&str>) -> Self {
        match description {
            Some(text) if text.contains(APERIO_MARKER) => SlideFormat::AperioSvs,
            _ => SlideFormat::GenericTiff,
        }
    }
}

/// Whether `bytes` start with a TIFF (42) or BigTIFF (43) header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    matches!(
        bytes.get(..MAGIC_BYTES),
        Some([0x49, 0x49, 0x2A | 0x2B, 0x00]) | Some([0x4D, 0x4D, 0x00, 0x2A | 0x2B])
    )
}
