use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::data::post_repository::PostRepository;
use crate::domain::error::DomainError;
use crate::domain::post::{MediaRef, NewPost, Post, PostPatch};
use crate::media::MediaStore;

/// An image payload taken off the wire, not yet persisted anywhere.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

/// Orchestrates the post use cases across the record store and the media
/// store. The record write is the commit point of every operation; media
/// cleanup after it is best-effort and never fails the request.
#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    media: Arc<dyn MediaStore>,
    media_timeout: Duration,
    cleanup_misses: Arc<AtomicU64>,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        media: Arc<dyn MediaStore>,
        media_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            media,
            media_timeout,
            cleanup_misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>, DomainError> {
        self.repo.list().await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, DomainError> {
        self.repo.get(id).await
    }

    /// The asset is stored before the record: a media failure aborts the
    /// whole operation with no record written. The reverse window, where
    /// the insert fails validation after the asset landed, orphans the
    /// asset; that is accepted and left to out-of-band cleanup.
    #[instrument(skip(self, draft, image))]
    pub async fn create_post(
        &self,
        mut draft: NewPost,
        image: Option<ImageUpload>,
    ) -> Result<Post, DomainError> {
        if let Some(image) = image {
            draft.media = Some(self.store_asset(image).await?);
        }
        self.repo.insert(draft).await
    }

    /// Replacement protocol: the new asset is stored first, so a media
    /// failure aborts cleanly while the existing image stays valid; the
    /// old asset is only discarded once the replacement is present.
    #[instrument(skip(self, patch, image))]
    pub async fn update_post(
        &self,
        id: Uuid,
        mut patch: PostPatch,
        image: Option<ImageUpload>,
    ) -> Result<Post, DomainError> {
        let existing = self.repo.get(id).await?;

        if let Some(image) = image {
            let replacement = self.store_asset(image).await?;
            if let Some(old) = existing.media.as_ref() {
                self.discard_asset(old).await;
            }
            patch.media = Some(replacement);
        }

        self.repo.update(id, patch).await
    }

    /// Record removal is authoritative; the asset delete after it is
    /// cleanup and may fail without being reported.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: Uuid) -> Result<Post, DomainError> {
        let removed = self.repo.delete(id).await?;
        if let Some(media) = removed.media.as_ref() {
            self.discard_asset(media).await;
        }
        Ok(removed)
    }

    pub fn resolve_locator(&self, media: &MediaRef) -> String {
        self.media.resolve(media)
    }

    /// How many best-effort asset deletions have failed since startup.
    /// Orphans accumulate at this rate.
    pub fn cleanup_miss_count(&self) -> u64 {
        self.cleanup_misses.load(Ordering::Relaxed)
    }

    async fn store_asset(&self, image: ImageUpload) -> Result<MediaRef, DomainError> {
        match timeout(
            self.media_timeout,
            self.media.store(image.data, &image.mime, &image.file_name),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::StoreUnavailable(format!(
                "media store timed out after {:?}",
                self.media_timeout
            ))),
        }
    }

    async fn discard_asset(&self, media: &MediaRef) {
        let failure = match timeout(self.media_timeout, self.media.delete(media)).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(_) => DomainError::StoreUnavailable(format!(
                "media store timed out after {:?}",
                self.media_timeout
            )),
        };
        self.cleanup_misses.fetch_add(1, Ordering::Relaxed);
        warn!(locator = %media.locator, error = %failure, "asset cleanup failed, orphan left behind");
    }
}
