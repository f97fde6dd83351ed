use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// [`RangeReader`] over a file on the local filesystem.
///
/// Reads are serialized through a mutex around a single file handle, which
/// matches the one-region-at-a-time access pattern of a tiling run.
#[derive(Debug)]
pub struct LocalFileReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open `path` for reading.
    ///
    /// Fails with [`IoError::NotFound`] if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = File::open(path)
            .await
            .map_err(|e| IoError::from_std(identifier.clone(), e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| IoError::from_std(identifier.clone(), e))?;

        if !metadata.is_file() {
            return Err(IoError::Os {
                path: identifier,
                message: "not a regular file".to_string(),
            });
        }

        Ok(Self {
            file: Mutex::new(file),
            size: metadata.len(),
            identifier,
        })
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IoError::from_std(self.identifier.clone(), e))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| IoError::from_std(self.identifier.clone(), e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
