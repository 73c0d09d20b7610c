use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Opaque handle to a stored binary asset. `locator` is the address a
/// client fetches the asset from; `delete_key` is what the owning store
/// needs to remove it again. The two coincide for simple backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub locator: String,
    pub delete_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload: everything a [`Post`] carries except the id and
/// timestamps, which the record store assigns.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub author: String,
    pub category: String,
    pub excerpt: String,
    pub content: String,
    pub media: Option<MediaRef>,
}

/// Partial update. `None` leaves the field untouched; a supplied media ref
/// replaces the previous one (there is no way to detach an image without
/// replacing it).
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub media: Option<MediaRef>,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("title must not be empty".into()));
        }
        if self.author.trim().is_empty() {
            return Err(DomainError::Validation("author must not be empty".into()));
        }
        Ok(())
    }
}

impl PostPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(DomainError::Validation("title must not be empty".into()));
        }
        if matches!(&self.author, Some(a) if a.trim().is_empty()) {
            return Err(DomainError::Validation("author must not be empty".into()));
        }
        Ok(())
    }
}

impl Post {
    pub fn from_new(new: NewPost) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            author: new.author,
            category: new.category,
            excerpt: new.excerpt,
            content: new.content,
            media: new.media,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a patch in place and refreshes `updated_at`. The caller is
    /// responsible for validating the patch first.
    pub fn apply(&mut self, patch: PostPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(excerpt) = patch.excerpt {
            self.excerpt = excerpt;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(media) = patch.media {
            self.media = Some(media);
        }
        self.updated_at = Utc::now();
    }
}
