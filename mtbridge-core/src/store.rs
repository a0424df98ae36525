//! Best-effort file access for the shared mailbox.
//!
//! The terminal writes and deletes the same files without any locking, so
//! reads may observe a missing, locked or half-written file. Every operation
//! here opens and closes its own handle.

use crate::error::Result;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Configuration for file store behaviour.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Attempts made to delete a file before giving up.
    pub remove_attempts: usize,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self { remove_attempts: 10 }
    }
}

/// File access that tolerates concurrent access from the terminal.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    config: FileStoreConfig,
}

impl FileStore {
    /// Creates a file store with the given configuration.
    #[must_use]
    pub fn new(config: FileStoreConfig) -> Self {
        Self { config }
    }

    /// Reads a whole file as text.
    ///
    /// A missing or momentarily unreadable file reads as the empty string.
    pub async fn read(&self, path: &Path) -> String {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "read failed, treating as empty");
                String::new()
            }
        }
    }

    /// Replaces the content of a file.
    ///
    /// # Errors
    /// Returns IO error if the write fails.
    pub async fn write(&self, path: &Path, text: &str) -> Result<()> {
        tokio::fs::write(path, text).await?;
        Ok(())
    }

    /// Writes a file only if it does not exist yet.
    ///
    /// Existence check and creation are a single filesystem operation, so a
    /// file that is present (an unconsumed command) is never overwritten.
    ///
    /// # Returns
    /// `Ok(true)` if written, `Ok(false)` if the file already exists.
    ///
    /// # Errors
    /// Returns IO error if the file cannot be created or written.
    pub async fn write_new(&self, path: &Path, text: &str) -> Result<bool> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }

    /// Deletes a file, retrying while the terminal holds it open.
    ///
    /// # Returns
    /// `true` if the file is gone afterwards.
    pub async fn remove(&self, path: &Path) -> bool {
        for _ in 0..self.config.remove_attempts {
            match tokio::fs::remove_file(path).await {
                Ok(()) => return true,
                Err(e) if e.kind() == ErrorKind::NotFound => return true,
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "remove failed, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        tracing::warn!(path = %path.display(), "could not remove file");
        false
    }

    /// Returns true if the path exists.
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}
