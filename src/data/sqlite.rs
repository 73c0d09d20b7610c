use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{error, info};
use uuid::Uuid;

use crate::data::post_repository::PostRepository;
use crate::domain::error::DomainError;
use crate::domain::post::{MediaRef, NewPost, Post, PostPatch};

/// Embedded-database backend: one row per post, single-statement mutations
/// with `RETURNING`. The engine provides per-record atomicity and the
/// descending sort server-side, so no additional locking is needed.
#[derive(Clone)]
pub struct SqlitePostRepository {
    pool: SqlitePool,
}

impl SqlitePostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, title, author, category, excerpt, content, \
                            media_locator, media_delete_key, created_at, updated_at";

fn db_err(e: sqlx::Error) -> DomainError {
    error!("database error: {}", e);
    DomainError::StoreUnavailable(format!("database error: {e}"))
}

// MediaRef spans two nullable columns, so rows are mapped by hand instead
// of through FromRow.
fn row_to_post(row: &SqliteRow) -> Result<Post, DomainError> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| DomainError::StoreUnavailable(format!("malformed post id {id}: {e}")))?;

    let locator: Option<String> = row.try_get("media_locator").map_err(db_err)?;
    let delete_key: Option<String> = row.try_get("media_delete_key").map_err(db_err)?;
    let media = match (locator, delete_key) {
        (Some(locator), Some(delete_key)) => Some(MediaRef {
            locator,
            delete_key,
        }),
        _ => None,
    };

    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(db_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(db_err)?;

    Ok(Post {
        id,
        title: row.try_get("title").map_err(db_err)?,
        author: row.try_get("author").map_err(db_err)?,
        category: row.try_get("category").map_err(db_err)?,
        excerpt: row.try_get("excerpt").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        media,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn list(&self) -> Result<Vec<Post>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_post).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Post, DomainError> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => row_to_post(&row),
            None => Err(DomainError::PostNotFound(id)),
        }
    }

    async fn insert(&self, new: NewPost) -> Result<Post, DomainError> {
        new.validate()?;
        let post = Post::from_new(new);

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, author, category, excerpt, content,
                               media_locator, media_delete_key, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(post.id.to_string())
        .bind(&post.title)
        .bind(&post.author)
        .bind(&post.category)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.media.as_ref().map(|m| m.locator.clone()))
        .bind(post.media.as_ref().map(|m| m.delete_key.clone()))
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    async fn update(&self, id: Uuid, patch: PostPatch) -> Result<Post, DomainError> {
        patch.validate()?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            UPDATE posts
            SET
                title = COALESCE(?1, title),
                author = COALESCE(?2, author),
                category = COALESCE(?3, category),
                excerpt = COALESCE(?4, excerpt),
                content = COALESCE(?5, content),
                media_locator = COALESCE(?6, media_locator),
                media_delete_key = COALESCE(?7, media_delete_key),
                updated_at = ?8
            WHERE id = ?9
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(patch.title)
        .bind(patch.author)
        .bind(patch.category)
        .bind(patch.excerpt)
        .bind(patch.content)
        .bind(patch.media.as_ref().map(|m| m.locator.clone()))
        .bind(patch.media.as_ref().map(|m| m.delete_key.clone()))
        .bind(now)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                info!(post_id = %id, "post updated");
                row_to_post(&row)
            }
            None => Err(DomainError::PostNotFound(id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Post, DomainError> {
        let row = sqlx::query(&format!(
            "DELETE FROM posts WHERE id = ?1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                info!(post_id = %id, "post deleted");
                row_to_post(&row)
            }
            None => Err(DomainError::PostNotFound(id)),
        }
    }
}
