//! src/services/storage_service.rs
//!
//! StorageService is the image store's only view of the filesystem. Every
//! stored image is a plain file directly under `base_path`; there is no index,
//! so each read re-derives size and modification time from the directory.
//! In-flight uploads and write checks live in the `.staging` subdirectory, which
//! no generated filename can collide with.

use crate::{models::image::StoredImage, services::validation::ensure_plain_filename};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use std::{
    fs::Metadata,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Subdirectory of the storage directory holding in-flight uploads and write checks.
///
/// Generated names always carry `-<millis>`, so none of them equals this entry.
pub const STAGING_DIR: &str = ".staging";

/// Default per-file upload cap: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Validation(String),
    #[error("File too large")]
    PayloadTooLarge { limit: u64 },
    #[error("file `{0}` not found")]
    NotFound(String),
    #[error("storage directory unavailable: {0}")]
    Unavailable(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Directory-backed image storage shared by all handlers.
///
/// Cloning is cheap; no state lives here besides the configured directory and
/// upload cap, so concurrent requests only meet at the filesystem.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Directory holding every stored image.
    pub base_path: PathBuf,

    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
}

impl StorageService {
    pub fn new(base_path: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            base_path: base_path.into(),
            max_upload_bytes,
        }
    }

    fn file_path(&self, filename: &str) -> PathBuf {
        self.base_path.join(filename)
    }

    /// Fresh path inside the staging directory, creating the directory if needed.
    ///
    /// Staging sits on the same filesystem as the stored files, so renaming out
    /// of it is atomic.
    async fn staging_path(&self, label: &str) -> StorageResult<PathBuf> {
        let staging = self.base_path.join(STAGING_DIR);
        fs::create_dir_all(&staging).await?;
        Ok(staging.join(format!("{}-{}", label, Uuid::new_v4())))
    }

    /// Create the storage directory (and parents) if missing, then prove it is writable.
    pub async fn ensure_directory(&self) -> StorageResult<()> {
        if fs::metadata(&self.base_path).await.is_err() {
            fs::create_dir_all(&self.base_path).await?;
            debug!("created storage directory {}", self.base_path.display());
        }
        self.check_writable().await
    }

    /// Write, read back, and delete a scratch file in the staging directory.
    pub async fn check_writable(&self) -> StorageResult<()> {
        let scratch = self.staging_path("check").await?;
        fs::write(&scratch, b"ready").await?;

        let read_back = fs::read(&scratch).await;
        let removed = fs::remove_file(&scratch).await;
        if read_back? != b"ready" {
            return Err(StorageError::Io(io::Error::other("scratch file content mismatch")));
        }
        removed?;
        Ok(())
    }

    /// Stream an upload into `filename` inside the storage directory.
    ///
    /// Bytes go to a staging file first and are renamed into place only once
    /// the whole stream arrived within `max_upload_bytes`. On any error the
    /// staging file is removed, so a failed upload leaves nothing behind. The
    /// returned record is read from the written file before the rename, so
    /// nothing can fail once the file is visible. A stream error of kind
    /// `FileTooLarge` is reported as `PayloadTooLarge`.
    pub async fn write_upload_stream<S>(
        &self,
        filename: &str,
        stream: S,
    ) -> StorageResult<StoredImage>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        ensure_plain_filename(filename)?;
        let file_path = self.file_path(filename);
        let tmp_path = self.staging_path("upload").await?;

        let stored = match self.stream_to_file(&tmp_path, stream).await {
            Ok(meta) => stored_image(filename, &meta),
            Err(err) => Err(err),
        };
        let stored = match stored {
            Ok(stored) => stored,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        Ok(stored)
    }

    async fn stream_to_file<S>(&self, path: &Path, stream: S) -> StorageResult<Metadata>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut file = File::create(path).await?;
        let mut size_bytes: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| match err.kind() {
                ErrorKind::FileTooLarge => StorageError::PayloadTooLarge {
                    limit: self.max_upload_bytes,
                },
                _ => StorageError::Io(err),
            })?;

            size_bytes += chunk.len() as u64;
            if size_bytes > self.max_upload_bytes {
                return Err(StorageError::PayloadTooLarge {
                    limit: self.max_upload_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(file.metadata().await?)
    }

    /// Names of every stored file, in the order the OS reports them.
    pub async fn list_files(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(StorageError::Unavailable)?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(StorageError::Unavailable)?
        {
            match entry.file_name().into_string() {
                Ok(name) if name == STAGING_DIR => {}
                Ok(name) => names.push(name),
                Err(raw) => warn!("skipping non UTF-8 entry {:?}", raw),
            }
        }
        Ok(names)
    }

    /// Size and modification time of one stored file.
    pub async fn stat_file(&self, filename: &str) -> StorageResult<StoredImage> {
        ensure_plain_filename(filename)?;
        let path = self.file_path(filename);

        let meta = fs::metadata(&path).await.map_err(|err| {
            if err.kind() != ErrorKind::NotFound {
                warn!("stat {} failed: {}", path.display(), err);
            }
            StorageError::NotFound(filename.to_string())
        })?;

        stored_image(filename, &meta).map_err(|_| StorageError::NotFound(filename.to_string()))
    }

    /// Resolve a stored regular file for serving. Directories count as missing.
    pub async fn locate_file(&self, filename: &str) -> StorageResult<(StoredImage, PathBuf)> {
        ensure_plain_filename(filename)?;
        let path = self.file_path(filename);

        let meta = fs::metadata(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory => {
                StorageError::NotFound(filename.to_string())
            }
            _ => StorageError::Io(err),
        })?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(filename.to_string()));
        }

        Ok((stored_image(filename, &meta)?, path))
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn remove_file(&self, filename: &str) -> StorageResult<()> {
        ensure_plain_filename(filename)?;
        match fs::remove_file(self.file_path(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

fn stored_image(filename: &str, meta: &Metadata) -> StorageResult<StoredImage> {
    Ok(StoredImage {
        filename: filename.to_string(),
        size_bytes: meta.len(),
        modified_at: DateTime::<Utc>::from(meta.modified()?),
    })
}
