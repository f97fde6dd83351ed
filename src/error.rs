use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading slide bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error on {path}: {message}")]
    Os { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Wrap a `std::io::Error` with the path it occurred on.
    pub fn from_std(path: impl Into<String>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path)
        } else {
            IoError::Os {
                path,
                message: err.to_string(),
            }
        }
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only JPEG and uncompressed tiles are supported)")]
    UnsupportedCompression(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised by a slide accessor.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// I/O error while reading the slide
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// The file is not a slide this crate can read
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// A source tile or raster could not be decoded
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Level index outside the pyramid
    #[error("Invalid level {level}: slide has {count} level(s)")]
    InvalidLevel { level: usize, count: usize },

    /// Region with a zero dimension
    #[error("Invalid region {width}x{height}: dimensions must be positive")]
    EmptyRegion { width: u32, height: u32 },

    /// TIFF without any tiled resolution level
    #[error("TIFF has no tiled pyramid levels")]
    NoTiledLevels,

    /// The slide was read after `close()`
    #[error("Slide has been closed")]
    Closed,
}

/// Failure categories of a tiling run.
#[derive(Debug, Error)]
pub enum TilingError {
    /// Rejected input (tile size, quality, paths) before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The slide could not be opened
    #[error("Failed to open slide: {0}")]
    Open(#[source] SlideError),

    /// A region could not be read from the slide
    #[error("Failed to read region: {0}")]
    Read(#[source] SlideError),

    /// The slide returned a pixel layout the normalizer does not handle
    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// The tile could not be encoded
    #[error("Failed to encode tile: {0}")]
    Encode(String),

    /// Output directory or file could not be written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller cancelled the run
    #[error("Tiling cancelled")]
    Cancelled,

    /// The background task running the pipeline panicked or was aborted
    #[error("Tiling task failed: {0}")]
    Task(String),
}

/// Error surfaced at the boundary of a tiling run.
///
/// Carries the top-left coordinate of the tile being processed when the
/// failure happened inside the tile loop.
#[derive(Debug)]
pub struct ProcessingFailure {
    pub coordinate: Option<(u32, u32)>,
    pub kind: TilingError,
}

impl ProcessingFailure {
    /// Failure not tied to a particular tile.
    pub fn new(kind: TilingError) -> Self {
        Self {
            coordinate: None,
            kind,
        }
    }

    /// Failure while processing the tile at `(x, y)`.
    pub fn at(x: u32, y: u32, kind: TilingError) -> Self {
        Self {
            coordinate: Some((x, y)),
            kind,
        }
    }
}

impl From<TilingError> for ProcessingFailure {
    fn from(kind: TilingError) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ProcessingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.coordinate {
            Some((x, y)) => write!(f, "tile ({}, {}): {}", x, y, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ProcessingFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
