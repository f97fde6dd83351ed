//! Pyramid level identification.
//!
//! A slide file holds more IFDs than pyramid levels: Aperio SVS adds a
//! thumbnail, a label and a macro image. Only tiled IFDs are candidates; they
//! are ordered by area and kept when their aspect ratio agrees with the
//! largest one.

use bytes::Bytes;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

/// Safety limit on the IFD chain length.
const MAX_IFDS: usize = 256;

/// Maximum relative disagreement between the x and y downsample factors.
const DOWNSAMPLE_TOLERANCE: f64 = 0.15;

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level in the image pyramid. Level 0 is full resolution.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level_index: usize,
    /// Position of the IFD in the file's chain
    pub ifd_index: usize,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Downsample factor relative to level 0 (1.0 for level 0)
    pub downsample: f64,
    pub compression: Compression,
    pub samples_per_pixel: u16,
    pub photometric: Option<u16>,
    pub ifd: Ifd,
}

impl PyramidLevel {
    fn from_ifd(ifd: Ifd, ifd_index: usize, header: &TiffHeader) -> Option<Self> {
        if !ifd.is_tiled() {
            return None;
        }

        let byte_order = header.byte_order;
        let tile_width = ifd.tile_width(byte_order)?;
        let tile_height = ifd.tile_height(byte_order)?;
        let width = ifd.image_width(byte_order)?;
        let height = ifd.image_height(byte_order)?;
        if tile_width == 0 || tile_height == 0 || width == 0 || height == 0 {
            return None;
        }

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            downsample: 1.0,
            compression: Compression::from_u16(ifd.compression(byte_order)),
            samples_per_pixel: ifd.samples_per_pixel(byte_order),
            photometric: ifd.photometric(byte_order),
            ifd,
        })
    }

    /// Row-major index of a tile, `None` when out of bounds.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A parsed TIFF image pyramid, levels sorted finest first.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,
    pub levels: Vec<PyramidLevel>,
}

impl TiffPyramid {
    /// Parse the header and IFD chain of a TIFF file and identify its levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
        if header_len < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: reader.size(),
            });
        }
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header).await?;
        Ok(Self::build(header, ifds))
    }

    async fn parse_all_ifds<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if offset >= reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };

            let ifd_bytes = reader
                .read_exact_at(offset, Ifd::calculate_size(entry_count, header))
                .await?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    fn build(header: TiffHeader, ifds: Vec<Ifd>) -> Self {
        let mut candidates: Vec<PyramidLevel> = ifds
            .into_iter()
            .enumerate()
            .filter_map(|(index, ifd)| PyramidLevel::from_ifd(ifd, index, &header))
            .collect();

        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let mut levels: Vec<PyramidLevel> = Vec::with_capacity(candidates.len());
        for mut level in candidates {
            let Some(base) = levels.first() else {
                levels.push(level);
                continue;
            };

            let downsample_x = base.width as f64 / level.width as f64;
            let downsample_y = base.height as f64 / level.height as f64;
            let disagreement = (downsample_x - downsample_y).abs() / downsample_x.max(downsample_y);
            let duplicate = levels
                .last()
                .is_some_and(|prev| prev.width == level.width && prev.height == level.height);

            if disagreement > DOWNSAMPLE_TOLERANCE || duplicate {
                debug!(
                    ifd = level.ifd_index,
                    width = level.width,
                    height = level.height,
                    "skipping tiled IFD that is not a pyramid level"
                );
                continue;
            }

            level.level_index = levels.len();
            level.downsample = (downsample_x + downsample_y) / 2.0;
            levels.push(level);
        }

        TiffPyramid { header, levels }
    }

    /// Dimensions of level 0.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.width, l.height))
    }
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile locations and shared JPEG tables of one level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Load the TileOffsets/TileByteCounts arrays and JPEGTables of a level.
    pub async fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets_entry = level
            .ifd
            .get_entry_by_tag(TiffTag::TileOffsets)
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let counts_entry = level
            .ifd
            .get_entry_by_tag(TiffTag::TileByteCounts)
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;

        let offsets = values.read_u64_array(offsets_entry).await?;
        let byte_counts = values.read_u64_array(counts_entry).await?;

        let expected = level.tiles_x as usize * level.tiles_y as usize;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "level {} needs {} tiles, found {} offsets and {} byte counts",
                    level.level_index,
                    expected,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match level.ifd.get_entry_by_tag(TiffTag::JpegTables) {
            Some(entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size of a tile by row-major index.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}
