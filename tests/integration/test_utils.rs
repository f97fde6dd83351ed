//! Test utilities for integration tests.
//!
//! This module provides a tracking range reader and a builder for tiled TIFF
//! files (uncompressed, JPEG and Aperio-style abbreviated JPEG tiles, either
//! byte order, classic or BigTIFF).

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wsi_tiler::error::IoError;
use wsi_tiler::io::RangeReader;

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// An in-memory range reader that counts read requests.
#[derive(Clone)]
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Test Pixels
// =============================================================================

/// Deterministic test pattern, a pure function of the pixel position.
pub fn pattern_pixel(x: u32, y: u32) -> Rgb<u8> {
    Rgb([(x % 251) as u8, (y % 241) as u8, ((x + 2 * y) % 239) as u8])
}

/// Encode an RGB image as a baseline JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(img).unwrap();
    buf
}

/// Split a complete JPEG into a JPEGTables blob (SOI DQT DHT EOI) and an
/// abbreviated stream without tables.
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut stream = vec![0xFF, 0xD8];

    let mut i = 2;
    while i + 4 <= jpeg.len() {
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        let segment = &jpeg[i..i + 2 + len];
        if marker == 0xDB || marker == 0xC4 {
            tables.extend_from_slice(segment);
        } else {
            stream.extend_from_slice(segment);
        }
        i += 2 + len;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    stream.extend_from_slice(&jpeg[i..]);
    (tables, stream)
}

// =============================================================================
// TIFF File Builder
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// How tiles of a level are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileCodec {
    /// Uncompressed 8-bit RGB
    Raw,
    /// Self-contained JPEG per tile
    Jpeg,
    /// JPEG without tables, tables in the JPEGTables tag
    AbbreviatedJpeg,
    /// Tagged as LZW; tile bytes are raw and never decoded
    Lzw,
}

/// One tiled IFD. Pixels follow [`pattern_pixel`] in level coordinates.
#[derive(Clone, Debug)]
pub struct LevelSpec {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub codec: TileCodec,
    pub description: Option<String>,
    /// Leave out the JPEGTables tag of an abbreviated level
    pub omit_tables: bool,
}

impl LevelSpec {
    pub fn new(width: u32, height: u32, tile_size: u32, codec: TileCodec) -> Self {
        Self {
            width,
            height,
            tile_size,
            codec,
            description: None,
            omit_tables: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn without_tables(mut self) -> Self {
        self.omit_tables = true;
        self
    }
}

/// Builder for creating test TIFF files.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    levels: Vec<LevelSpec>,
}

/// A tag value before layout: raw bytes already in file byte order.
struct Entry {
    tag: u16,
    field_type: u16,
    count: u64,
    bytes: Vec<u8>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            levels: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    pub fn add_level(mut self, level: LevelSpec) -> Self {
        self.levels.push(level);
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        if self.is_bigtiff {
            self.put(&mut data, 43, 2);
            self.put(&mut data, 8, 2);
            self.put(&mut data, 0, 2);
        } else {
            self.put(&mut data, 42, 2);
        }
        let first_ifd_pos = data.len();
        self.put(&mut data, 0, self.offset_size());

        let mut link_pos = first_ifd_pos;
        for level in &self.levels {
            let ifd_start = data.len() as u64;
            self.patch(&mut data, link_pos, ifd_start, self.offset_size());
            link_pos = self.write_level(&mut data, level);
        }

        data
    }

    /// Write one IFD with its external values and tiles, returning the
    /// position of its next-IFD field.
    fn write_level(&self, data: &mut Vec<u8>, level: &LevelSpec) -> usize {
        let (tiles, tables) = encode_tiles(level);
        let inline = self.offset_size();
        let long = if self.is_bigtiff { 16 } else { 4 };

        let (compression, photometric) = match level.codec {
            TileCodec::Raw => (1, 2),
            TileCodec::Jpeg | TileCodec::AbbreviatedJpeg => (7, 6),
            TileCodec::Lzw => (5, 2),
        };

        let mut entries = vec![
            self.scalar(256, 4, level.width as u64),
            self.scalar(257, 4, level.height as u64),
            self.shorts(258, &[8, 8, 8]),
            self.scalar(259, 3, compression),
            self.scalar(262, 3, photometric),
            self.scalar(277, 3, 3),
            self.scalar(322, 4, level.tile_size as u64),
            self.scalar(323, 4, level.tile_size as u64),
            // TileOffsets are patched once the layout is known
            self.array(324, long, &vec![0; tiles.len()]),
            self.array(
                325,
                long,
                &tiles.iter().map(|t| t.len() as u64).collect::<Vec<_>>(),
            ),
        ];
        if let Some(description) = &level.description {
            let mut bytes = description.as_bytes().to_vec();
            bytes.push(0);
            entries.push(Entry {
                tag: 270,
                field_type: 2,
                count: bytes.len() as u64,
                bytes,
            });
        }
        if let Some(tables) = tables.filter(|_| !level.omit_tables) {
            entries.push(Entry {
                tag: 347,
                field_type: 7,
                count: tables.len() as u64,
                bytes: tables,
            });
        }
        entries.sort_by_key(|e| e.tag);

        // Layout: IFD, external values, tile data
        let count_size = if self.is_bigtiff { 8 } else { 2 };
        let entry_size = if self.is_bigtiff { 20 } else { 12 };
        let ifd_start = data.len() as u64;
        let ifd_size = (count_size + entries.len() * entry_size + inline) as u64;

        let mut cursor = ifd_start + ifd_size;
        let mut external_offsets = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.bytes.len() > inline {
                external_offsets.push(Some(cursor));
                cursor += entry.bytes.len() as u64;
            } else {
                external_offsets.push(None);
            }
        }

        let mut tile_offsets = Vec::with_capacity(tiles.len());
        for tile in &tiles {
            tile_offsets.push(cursor);
            cursor += tile.len() as u64;
        }
        if let Some(entry) = entries.iter_mut().find(|e| e.tag == 324) {
            entry.bytes = self.array(324, long, &tile_offsets).bytes;
        }

        self.put(data, entries.len() as u64, count_size);
        for (entry, external) in entries.iter().zip(&external_offsets) {
            self.put(data, entry.tag as u64, 2);
            self.put(data, entry.field_type as u64, 2);
            self.put(data, entry.count, if self.is_bigtiff { 8 } else { 4 });
            match external {
                Some(offset) => self.put(data, *offset, inline),
                None => {
                    let mut field = entry.bytes.clone();
                    field.resize(inline, 0);
                    data.extend_from_slice(&field);
                }
            }
        }
        let next_pos = data.len();
        self.put(data, 0, inline);

        for (entry, external) in entries.iter().zip(&external_offsets) {
            if external.is_some() {
                data.extend_from_slice(&entry.bytes);
            }
        }
        for tile in &tiles {
            data.extend_from_slice(tile);
        }

        next_pos
    }

    fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    fn encode(&self, value: u64, size: usize) -> Vec<u8> {
        let bytes = match self.byte_order {
            ByteOrderType::LittleEndian => value.to_le_bytes().to_vec(),
            ByteOrderType::BigEndian => value.to_be_bytes().to_vec(),
        };
        match self.byte_order {
            ByteOrderType::LittleEndian => bytes[..size].to_vec(),
            ByteOrderType::BigEndian => bytes[8 - size..].to_vec(),
        }
    }

    fn put(&self, data: &mut Vec<u8>, value: u64, size: usize) {
        data.extend(self.encode(value, size));
    }

    fn patch(&self, data: &mut [u8], pos: usize, value: u64, size: usize) {
        data[pos..pos + size].copy_from_slice(&self.encode(value, size));
    }

    fn scalar(&self, tag: u16, field_type: u16, value: u64) -> Entry {
        self.array(tag, field_type, &[value])
    }

    fn shorts(&self, tag: u16, values: &[u64]) -> Entry {
        self.array(tag, 3, values)
    }

    fn array(&self, tag: u16, field_type: u16, values: &[u64]) -> Entry {
        let width = match field_type {
            3 => 2,
            4 => 4,
            _ => 8,
        };
        Entry {
            tag,
            field_type,
            count: values.len() as u64,
            bytes: values.iter().flat_map(|&v| self.encode(v, width)).collect(),
        }
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tile payloads in row-major order, plus JPEGTables for abbreviated levels.
fn encode_tiles(level: &LevelSpec) -> (Vec<Vec<u8>>, Option<Vec<u8>>) {
    let size = level.tile_size;
    let tiles_x = level.width.div_ceil(size);
    let tiles_y = level.height.div_ceil(size);

    let mut tiles = Vec::new();
    let mut tables = None;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let img = RgbImage::from_fn(size, size, |x, y| pattern_pixel(tx * size + x, ty * size + y));
            let payload = match level.codec {
                TileCodec::Raw | TileCodec::Lzw => img.into_raw(),
                TileCodec::Jpeg => encode_jpeg(&img, 95),
                TileCodec::AbbreviatedJpeg => {
                    let (blob, stream) = split_jpeg_tables(&encode_jpeg(&img, 95));
                    tables.get_or_insert(blob);
                    stream
                }
            };
            tiles.push(payload);
        }
    }

    (tiles, tables)
}

// =============================================================================
// Ready-made Files
// =============================================================================

/// Single-level uncompressed slide.
pub fn create_raw_tiff(width: u32, height: u32, tile_size: u32) -> Vec<u8> {
    TiffBuilder::new()
        .add_level(LevelSpec::new(width, height, tile_size, TileCodec::Raw))
        .build()
}

/// Two-level Aperio-style slide with abbreviated JPEG tiles.
pub fn create_svs(width: u32, height: u32) -> Vec<u8> {
    TiffBuilder::new()
        .add_level(
            LevelSpec::new(width, height, 256, TileCodec::AbbreviatedJpeg).with_description(
                "Aperio Image Library v12.0.15\r\n\
                 test [0,0 100x100] (256x256) JPEG/RGB Q=95|AppMag = 40|MPP = 0.2520",
            ),
        )
        .add_level(LevelSpec::new(
            width / 4,
            height / 4,
            256,
            TileCodec::AbbreviatedJpeg,
        ))
        .build()
}

/// Write `data` into `dir` as `name`, returning the path.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Sorted file names in `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Largest per-channel difference between two pixels.
pub fn channel_distance(a: Rgb<u8>, b: Rgb<u8>) -> u8 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}
