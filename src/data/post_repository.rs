use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::post::{NewPost, Post, PostPatch};

/// Storage contract for post records. Implementations assign ids and
/// timestamps on insert and keep `list` ordered newest-first.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// All posts, ordered by `created_at` descending. An empty collection
    /// is an empty vec, never an error.
    async fn list(&self) -> Result<Vec<Post>, DomainError>;

    async fn get(&self, id: Uuid) -> Result<Post, DomainError>;

    /// Assigns id and timestamps. Fails `Validation` when `title` or
    /// `author` is empty; nothing is written in that case.
    async fn insert(&self, new: NewPost) -> Result<Post, DomainError>;

    /// Applies the supplied fields, refreshes `updated_at` and returns the
    /// full updated record.
    async fn update(&self, id: Uuid, patch: PostPatch) -> Result<Post, DomainError>;

    /// Removes and returns the deleted record, so callers can clean up the
    /// media reference it carried.
    async fn delete(&self, id: Uuid) -> Result<Post, DomainError>;
}
