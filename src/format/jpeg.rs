//! JPEG stream handling for TIFF tiles.
//!
//! Aperio SVS stores "abbreviated" JPEG streams: each tile lacks the
//! quantization (DQT) and Huffman (DHT) tables, which live once per level in
//! the `JPEGTables` tag. Before decoding, the tables are spliced in:
//!
//! ```text
//! tables: SOI DQT DHT EOI      tile: SOI SOF SOS ... EOI
//! merged: SOI DQT DHT SOF SOS ... EOI
//! ```
//!
//! Tiles tagged with RGB photometric interpretation are not YCbCr-encoded;
//! an Adobe APP14 segment with transform 0 tells the decoder so.

use bytes::{BufMut, Bytes, BytesMut};

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];

const MARKER_DHT: u8 = 0xC4;
const MARKER_DQT: u8 = 0xDB;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP14: u8 = 0xEE;

/// APP14 "Adobe" segment declaring untransformed (RGB) components.
const ADOBE_RGB_SEGMENT: [u8; 16] = [
    0xFF, MARKER_APP14, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00, 0x64, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

/// What the marker segments before the first scan contain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct HeaderScan {
    has_tables: bool,
    has_adobe: bool,
    reached_scan: bool,
}

fn scan_header(data: &[u8]) -> Option<HeaderScan> {
    if data.len() < 4 || data[0..2] != SOI {
        return None;
    }

    let mut scan = HeaderScan::default();
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        match data[pos + 1] {
            // Fill byte before a marker
            0xFF => pos += 1,
            // Standalone markers carry no length field
            0x01 | 0xD0..=0xD9 => pos += 2,
            MARKER_SOS => {
                scan.reached_scan = true;
                break;
            }
            marker => {
                if marker == MARKER_DQT || marker == MARKER_DHT {
                    scan.has_tables = true;
                }
                if marker == MARKER_APP14 {
                    scan.has_adobe = true;
                }
                if pos + 3 >= data.len() {
                    break;
                }
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + length;
            }
        }
    }

    Some(scan)
}

/// A stream that reaches its scan without defining any tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    scan_header(data).is_some_and(|s| s.reached_scan && !s.has_tables)
}

/// A stream that defines its own tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    scan_header(data).is_some_and(|s| s.has_tables)
}

/// Splice `tables` (SOI ... EOI) in front of the body of `tile_data`.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let body = tile_data.strip_prefix(&SOI).unwrap_or(tile_data);

    let mut merged = BytesMut::with_capacity(tables.len() + body.len());
    merged.put_slice(tables);
    merged.put_slice(body);
    merged.freeze()
}

/// Make raw tile bytes decodable by a standard JPEG decoder.
///
/// Merges `tables` when the tile is abbreviated, and marks the stream as
/// untransformed RGB when `rgb_components` is set and the stream does not
/// already carry an Adobe segment.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8], rgb_components: bool) -> Bytes {
    let stream = match tables {
        Some(tables) if is_abbreviated_stream(tile_data) => merge_jpeg_tables(tables, tile_data),
        _ => Bytes::copy_from_slice(tile_data),
    };

    let needs_adobe = rgb_components && scan_header(&stream).is_some_and(|s| !s.has_adobe);
    if !needs_adobe {
        return stream;
    }

    let mut marked = BytesMut::with_capacity(stream.len() + ADOBE_RGB_SEGMENT.len());
    marked.put_slice(&SOI);
    marked.put_slice(&ADOBE_RGB_SEGMENT);
    marked.put_slice(&stream[2..]);
    marked.freeze()
}
