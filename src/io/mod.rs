//! Byte-range access to slide files.
//!
//! The TIFF parser never loads a whole slide into memory: it asks a
//! [`RangeReader`] for the header, the IFDs, the tile offset arrays and then
//! one compressed tile at a time.

mod file_reader;
mod range_reader;

pub use file_reader::LocalFileReader;
pub use range_reader::{BytesReader, RangeReader};
