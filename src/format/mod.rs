//! Format parsers for Whole Slide Image files.
//!
//! - [`tiff`]: TIFF/BigTIFF structure and pyramid levels
//! - [`jpeg`]: repair of abbreviated JPEG tile streams
//! - [`svs`]: Aperio ImageDescription metadata
//! - [`detect`]: format identification from magic bytes and vendor markers

pub mod detect;
pub mod jpeg;
pub mod svs;
pub mod tiff;

pub use detect::{is_tiff_header, SlideFormat};
pub use jpeg::{is_abbreviated_stream, is_complete_stream, merge_jpeg_tables, prepare_tile_jpeg};
pub use svs::SvsMetadata;
