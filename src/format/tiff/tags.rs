//! TIFF tag and field type definitions.
//!
//! Only the vocabulary needed to locate and decode the tiles of a pyramidal
//! slide is defined here. Unknown tags and field types are carried through
//! parsing untouched and simply never looked up.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two Longs: numerator and denominator
    Rational = 5,
    /// Opaque byte data
    Undefined = 7,
    /// Unsigned 64-bit integer (BigTIFF only)
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Check if `count` values of this type fit in the entry's value field.
    ///
    /// The value field is 4 bytes wide in classic TIFF and 8 in BigTIFF.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff { 8 } else { 4 };
        (self.size_in_bytes() as u64).saturating_mul(count) <= threshold
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs used when reading slide pyramids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    /// Free-form description; Aperio stores its metadata here
    ImageDescription = 270,
    SamplesPerPixel = 277,
    PlanarConfiguration = 284,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    /// Shared quantization and Huffman tables for abbreviated JPEG tiles
    JpegTables = 347,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            270 => Some(TiffTag::ImageDescription),
            277 => Some(TiffTag::SamplesPerPixel),
            284 => Some(TiffTag::PlanarConfiguration),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            347 => Some(TiffTag::JpegTables),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
    OldJpeg,
    Jpeg,
    Deflate,
    AdobeDeflate,
    /// Aperio JPEG 2000, YCbCr (33003) or RGB (33005)
    Jpeg2000,
    Unknown(u16),
}

impl Compression {
    /// Map a Compression tag value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Compression::None,
            5 => Compression::Lzw,
            6 => Compression::OldJpeg,
            7 => Compression::Jpeg,
            8 => Compression::Deflate,
            32946 => Compression::AdobeDeflate,
            33003 | 33005 => Compression::Jpeg2000,
            other => Compression::Unknown(other),
        }
    }

    /// Tile decoding is implemented for these schemes.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::None | Compression::Jpeg)
    }

    /// Human-readable name.
    pub fn name(self) -> String {
        match self {
            Compression::None => "None".to_string(),
            Compression::Lzw => "LZW".to_string(),
            Compression::OldJpeg => "Old JPEG".to_string(),
            Compression::Jpeg => "JPEG".to_string(),
            Compression::Deflate => "Deflate".to_string(),
            Compression::AdobeDeflate => "Adobe Deflate".to_string(),
            Compression::Jpeg2000 => "JPEG 2000".to_string(),
            Compression::Unknown(value) => format!("unknown ({})", value),
        }
    }
}

/// PhotometricInterpretation value for RGB samples.
pub const PHOTOMETRIC_RGB: u16 = 2;

/// PlanarConfiguration value for interleaved (chunky) samples.
pub const PLANAR_CONTIGUOUS: u16 = 1;
