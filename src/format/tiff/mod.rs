//! TIFF parser for Whole Slide Images.
//!
//! Handles classic TIFF and BigTIFF in either byte order. Only what is needed
//! to find the pyramid levels and their tiles is parsed; pixel data is left to
//! the slide layer.

mod parser;
mod pyramid;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag, PHOTOMETRIC_RGB, PLANAR_CONTIGUOUS};
pub use values::{parse_u64_array, ValueReader};
