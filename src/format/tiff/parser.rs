//! TIFF header and IFD parsing.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```
//!
//! ## IFD
//! ```text
//! entry count (2 | 8 bytes)
//! entries     (12 | 20 bytes each: tag, type, count, value-or-offset)
//! next offset (4 | 8 bytes, 0 terminates the chain)
//! ```

use crate::error::TiffError;

use super::tags::{FieldType, TiffTag};

const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;
const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II" (Intel)
    LittleEndian,
    /// "MM" (Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from the first two bytes of `bytes`.
    ///
    /// Callers guarantee the slice is long enough.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    /// Read a u32 from the first four bytes of `bytes`.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    /// Read a u64 from the first eight bytes of `bytes`.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    pub is_bigtiff: bool,
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// `bytes` must hold at least 8 bytes (16 for BigTIFF). `file_size` is
    /// used to reject a first IFD offset pointing past the end of the file.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let (is_bigtiff, first_ifd_offset) = match byte_order.read_u16(&bytes[2..4]) {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            version => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Size of an IFD entry: 12 bytes classic, 20 bytes BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of offsets (next IFD pointer, value offsets).
    #[inline]
    pub const fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Read an offset-sized value.
    #[inline]
    pub fn read_offset(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u32(bytes) as u64
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single 12/20-byte IFD entry.
///
/// The value field is kept as raw bytes: it holds the value itself when it
/// fits inline and an offset into the file otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,
    pub field_type: Option<FieldType>,
    pub field_type_raw: u16,
    pub count: u64,
    pub value_offset_bytes: [u8; 8],
    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let byte_order = header.byte_order;
        let tag_id = byte_order.read_u16(&bytes[0..2]);
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (byte_order.read_u64(&bytes[4..12]), 12)
        } else {
            (byte_order.read_u32(&bytes[4..8]) as u64, 8)
        };

        let mut value_offset_bytes = [0u8; 8];
        let value_len = header.offset_size();
        value_offset_bytes[..value_len].copy_from_slice(&bytes[value_start..value_start + value_len]);

        let is_inline = field_type
            .map(|t| t.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
        }
    }

    /// The known tag this entry carries, if any.
    pub fn tag(&self) -> Option<TiffTag> {
        TiffTag::from_u16(self.tag_id)
    }

    /// Total size of the value in bytes, `None` for unknown field types.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .and_then(|t| (t.size_in_bytes() as u64).checked_mul(self.count))
    }

    /// Interpret the value field as a file offset.
    pub fn value_offset(&self, header: &TiffHeader) -> u64 {
        header.read_offset(&self.value_offset_bytes)
    }

    /// Single Short/Long/Long8 value stored inline.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u64),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(&self.value_offset_bytes)),
            _ => None,
        }
    }

    /// Same as [`inline_u64`](Self::inline_u64), narrowed to u32.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u64(byte_order)
            .and_then(|v| u32::try_from(v).ok())
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Byte length of an IFD with `entry_count` entries.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.offset_size()
    }

    /// Parse an IFD from bytes starting at its entry count field.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = if header.is_bigtiff {
            header.byte_order.read_u64(bytes)
        } else {
            header.byte_order.read_u16(bytes) as u64
        };

        let required = Self::calculate_size(entry_count, header);
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let entries = (0..entry_count as usize)
            .map(|i| {
                let start = count_size + i * entry_size;
                IfdEntry::parse(&bytes[start..start + entry_size], header)
            })
            .collect();

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = header.read_offset(&bytes[next_start..]);

        Ok(Ifd {
            entries,
            next_ifd_offset,
        })
    }

    /// Find the entry for `tag`.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag_id == tag.as_u16())
    }

    /// Inline scalar value of `tag`.
    pub fn get_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileLength, byte_order)
    }

    /// Compression tag value; TIFF defaults to 1 (none) when absent.
    pub fn compression(&self, byte_order: ByteOrder) -> u16 {
        self.get_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
            .unwrap_or(1)
    }

    /// SamplesPerPixel; TIFF defaults to 1 when absent.
    pub fn samples_per_pixel(&self, byte_order: ByteOrder) -> u16 {
        self.get_u32(TiffTag::SamplesPerPixel, byte_order)
            .map(|v| v as u16)
            .unwrap_or(1)
    }

    /// PlanarConfiguration; TIFF defaults to 1 (contiguous) when absent.
    pub fn planar_configuration(&self, byte_order: ByteOrder) -> u16 {
        self.get_u32(TiffTag::PlanarConfiguration, byte_order)
            .map(|v| v as u16)
            .unwrap_or(1)
    }

    pub fn photometric(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(TiffTag::PhotometricInterpretation, byte_order)
            .map(|v| v as u16)
    }

    /// Whether the image is organized in tiles rather than strips.
    pub fn is_tiled(&self) -> bool {
        self.get_entry_by_tag(TiffTag::TileWidth).is_some()
            && self.get_entry_by_tag(TiffTag::TileOffsets).is_some()
            && self.get_entry_by_tag(TiffTag::TileByteCounts).is_some()
    }
}
