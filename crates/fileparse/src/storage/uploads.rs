use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::sanitize::sanitize_filename;

/// Directory holding uploaded bytes, one file per job.
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if needed.
    pub fn ensure_root(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|e| StorageError::CreateDirectory {
            path: self.root.clone(),
            source: e,
        })
    }

    /// Where the bytes of job `id` live: `{root}/{id}_{sanitized filename}`.
    pub fn location_for(&self, id: &str, filename: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}", id, sanitize_filename(filename)))
    }

    /// Streams `body` into `location`, returning the number of bytes written.
    ///
    /// A partially written file is removed before the error is returned.
    pub async fn persist<S, E>(&self, location: &Path, body: S) -> Result<u64, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        if let Some(parent) = location.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let result = write_stream(location, body).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(location).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!(
                        "Failed to remove partial upload {}: {}",
                        location.display(),
                        e
                    );
                }
            }
        }
        result
    }

    /// Deletes the bytes at `location`. A file that is already gone counts
    /// as released.
    pub fn release(&self, location: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::ReleaseFile {
                path: location.to_path_buf(),
                source: e,
            }),
        }
    }
}

async fn write_stream<S, E>(location: &Path, body: S) -> Result<u64, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let write_err = |e: std::io::Error| StorageError::WriteFile {
        path: location.to_path_buf(),
        source: e,
    };

    let mut file = tokio::fs::File::create(location).await.map_err(write_err)?;
    let mut body = std::pin::pin!(body);
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StorageError::ReadBody {
            path: location.to_path_buf(),
            reason: e.to_string(),
        })?;
        file.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    Ok(written)
}
