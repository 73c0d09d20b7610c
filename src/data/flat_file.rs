use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::data::post_repository::PostRepository;
use crate::domain::error::DomainError;
use crate::domain::post::{NewPost, Post, PostPatch};

/// Flat-file backend: the whole collection lives in one JSON array file
/// and every mutation is a load, an in-memory change, and a wholesale
/// rewrite. The file has no per-record atomicity, so all mutations are
/// serialized behind a single writer lock; without it two concurrent
/// writers would silently clobber each other.
pub struct FlatFilePostRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FlatFilePostRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<Post>, DomainError> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!("corrupt data file {}: {}", self.path.display(), e);
                DomainError::StoreUnavailable(format!("corrupt data file: {e}"))
            }),
            // A file that does not exist yet is an empty collection.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                error!("failed to read {}: {}", self.path.display(), e);
                Err(DomainError::StoreUnavailable(format!(
                    "failed to read data file: {e}"
                )))
            }
        }
    }

    /// Rewrites the collection through a temp file and a rename, so a
    /// crash mid-write never leaves a half-written file behind.
    async fn persist(&self, posts: &[Post]) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(posts)
            .map_err(|e| DomainError::StoreUnavailable(format!("failed to encode posts: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    DomainError::StoreUnavailable(format!("failed to create data directory: {e}"))
                })?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).await.map_err(|e| {
            error!("failed to write {}: {}", tmp.display(), e);
            DomainError::StoreUnavailable(format!("failed to write data file: {e}"))
        })?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            error!("failed to replace {}: {}", self.path.display(), e);
            DomainError::StoreUnavailable(format!("failed to replace data file: {e}"))
        })?;

        Ok(())
    }
}

#[async_trait]
impl PostRepository for FlatFilePostRepository {
    async fn list(&self) -> Result<Vec<Post>, DomainError> {
        let mut posts = self.load().await?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn get(&self, id: Uuid) -> Result<Post, DomainError> {
        self.load()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(DomainError::PostNotFound(id))
    }

    async fn insert(&self, new: NewPost) -> Result<Post, DomainError> {
        new.validate()?;
        let post = Post::from_new(new);

        let _guard = self.write_lock.lock().await;
        let mut posts = self.load().await?;
        posts.push(post.clone());
        self.persist(&posts).await?;

        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    async fn update(&self, id: Uuid, patch: PostPatch) -> Result<Post, DomainError> {
        patch.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut posts = self.load().await?;
        let post = posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(DomainError::PostNotFound(id))?;
        post.apply(patch);
        let updated = post.clone();
        self.persist(&posts).await?;

        info!(post_id = %id, "post updated");
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<Post, DomainError> {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.load().await?;
        let index = posts
            .iter()
            .position(|p| p.id == id)
            .ok_or(DomainError::PostNotFound(id))?;
        let removed = posts.remove(index);
        self.persist(&posts).await?;

        info!(post_id = %id, "post deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn repo_in(dir: &tempfile::TempDir) -> FlatFilePostRepository {
        FlatFilePostRepository::new(dir.path().join("blogs.json"))
    }

    fn draft(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            author: "ann".into(),
            category: "news".into(),
            excerpt: "short".into(),
            content: "<p>body</p>".into(),
            media: None,
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_collection() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);

        let created = repo.insert(draft("First")).await.unwrap();
        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.title, "First");
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn records_survive_a_reopen() {
        let dir = tempdir().unwrap();
        let created = repo_in(&dir).insert(draft("Persisted")).await.unwrap();

        let reopened = repo_in(&dir);
        assert_eq!(reopened.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);

        for title in ["one", "two", "three"] {
            repo.insert(draft(title)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let posts = repo.list().await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["three", "two", "one"]);
        assert!(posts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn update_applies_fields_and_refreshes_updated_at() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);
        let created = repo.insert(draft("First")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = repo
            .update(
                created.id,
                PostPatch {
                    content: Some("<p>edited</p>".into()),
                    ..PostPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "First");
        assert_eq!(updated.content, "<p>edited</p>");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);
        let id = Uuid::new_v4();

        assert!(matches!(
            repo.get(id).await,
            Err(DomainError::PostNotFound(missing)) if missing == id
        ));
        assert!(matches!(
            repo.update(id, PostPatch::default()).await,
            Err(DomainError::PostNotFound(_))
        ));
        assert!(matches!(
            repo.delete(id).await,
            Err(DomainError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_returns_the_removed_record() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);
        let created = repo.insert(draft("Doomed")).await.unwrap();

        let removed = repo.delete(created.id).await.unwrap();
        assert_eq!(removed, created);
        assert!(matches!(
            repo.get(created.id).await,
            Err(DomainError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_insert_leaves_the_collection_unchanged() {
        let dir = tempdir().unwrap();
        let repo = repo_in(&dir);

        let mut invalid = draft("");
        invalid.title = String::new();
        assert!(matches!(
            repo.insert(invalid).await,
            Err(DomainError::Validation(_))
        ));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_updates_resolve_to_one_complete_payload() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(repo_in(&dir));
        let id = repo.insert(draft("Original")).await.unwrap().id;

        let full = |title: &str, content: &str| PostPatch {
            title: Some(title.into()),
            author: Some("ann".into()),
            category: Some("news".into()),
            excerpt: Some("short".into()),
            content: Some(content.into()),
            media: None,
        };

        let a = {
            let repo = Arc::clone(&repo);
            let patch = full("A", "<p>a</p>");
            tokio::spawn(async move { repo.update(id, patch).await })
        };
        let b = {
            let repo = Arc::clone(&repo);
            let patch = full("B", "<p>b</p>");
            tokio::spawn(async move { repo.update(id, patch).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // The final state must be exactly one writer's payload, never a
        // field-level merge of the two.
        let post = repo.get(id).await.unwrap();
        let outcome = (post.title.as_str(), post.content.as_str());
        assert!(outcome == ("A", "<p>a</p>") || outcome == ("B", "<p>b</p>"));
    }
}
