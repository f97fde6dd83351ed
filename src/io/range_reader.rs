use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a slide file.
///
/// This abstraction allows the TIFF parser to work with local files and
/// in-memory buffers alike. Implementations must be thread-safe.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get a unique identifier for this resource (for logging).
    ///
    /// For local files this is the path as given to the reader.
    fn identifier(&self) -> &str;
}

/// Check that `len` bytes at `offset` fit inside a resource of `size` bytes.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

// =============================================================================
// BytesReader
// =============================================================================

/// A [`RangeReader`] over bytes that are already in memory.
#[derive(Debug, Clone)]
pub struct BytesReader {
    data: Bytes,
    identifier: String,
}

impl BytesReader {
    /// Create a reader over `data`, identified by `identifier` in logs.
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl RangeReader for BytesReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
