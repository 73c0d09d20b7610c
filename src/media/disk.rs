use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::post::MediaRef;
use crate::media::{MediaStore, check_payload, sanitize_name};

/// Assets stored under this prefix are served read-only by whatever sits
/// in front of the service; the locator is the prefix plus the file name.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Local-filesystem media backend. Storage names combine the upload
/// instant with the sanitized client file name, so unrelated concurrent
/// uploads land in distinct files.
pub struct DiskMediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    fn io_err(path: &Path, action: &str, e: std::io::Error) -> DomainError {
        DomainError::StoreUnavailable(format!("failed to {action} {}: {e}", path.display()))
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn store(
        &self,
        data: Vec<u8>,
        mime: &str,
        original_name: &str,
    ) -> Result<MediaRef, DomainError> {
        check_payload(data.len(), mime, self.max_bytes)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_err(&self.root, "create upload directory", e))?;

        let base = format!("{}-{}", Utc::now().timestamp_millis(), sanitize_name(original_name));
        let mut candidate = base.clone();
        loop {
            let path = self.path_for(&candidate);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&data)
                        .await
                        .map_err(|e| Self::io_err(&path, "write", e))?;
                    file.flush()
                        .await
                        .map_err(|e| Self::io_err(&path, "flush", e))?;
                    break;
                }
                // Same millisecond, same name: disambiguate and try again.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = format!("{}-{base}", Uuid::new_v4().simple());
                }
                Err(e) => return Err(Self::io_err(&path, "create", e)),
            }
        }

        info!(file = %candidate, size = data.len(), "asset stored");
        Ok(MediaRef {
            locator: format!("{PUBLIC_PREFIX}/{candidate}"),
            delete_key: candidate,
        })
    }

    async fn delete(&self, media: &MediaRef) -> Result<(), DomainError> {
        let path = self.path_for(&media.delete_key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = %media.delete_key, "asset deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&path, "delete", e)),
        }
    }

    async fn exists(&self, media: &MediaRef) -> Result<bool, DomainError> {
        let path = self.path_for(&media.delete_key);
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_err(&path, "probe", e)),
        }
    }

    fn resolve(&self, media: &MediaRef) -> String {
        media.locator.clone()
    }
}
