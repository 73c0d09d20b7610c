use actix_multipart::{Field, Multipart};
use actix_web::http::header;
use futures_util::StreamExt;
use serde::Serialize;

use crate::application::post_service::{ImageUpload, PostService};
use crate::domain::error::DomainError;
use crate::domain::post::{NewPost, Post, PostPatch};

/// Wire shape of a post: the record itself plus the resolved image
/// address, so clients never have to assume a locator scheme.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PostResponse {
    pub fn new(post: Post, service: &PostService) -> Self {
        let image_url = post.media.as_ref().map(|m| service.resolve_locator(m));
        Self { post, image_url }
    }
}

/// Fields collected from the create/update multipart form.
#[derive(Debug, Default)]
pub struct PostForm {
    pub title: String,
    pub author: String,
    pub category: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<ImageUpload>,
}

impl PostForm {
    pub fn into_create(self) -> (NewPost, Option<ImageUpload>) {
        (
            NewPost {
                title: self.title,
                author: self.author,
                category: self.category,
                excerpt: self.excerpt,
                content: self.content,
                media: None,
            },
            self.image,
        )
    }

    /// PUT carries the full field set, so every field is supplied and the
    /// patch replaces the record wholesale.
    pub fn into_replacement(self) -> (PostPatch, Option<ImageUpload>) {
        (
            PostPatch {
                title: Some(self.title),
                author: Some(self.author),
                category: Some(self.category),
                excerpt: Some(self.excerpt),
                content: Some(self.content),
                media: None,
            },
            self.image,
        )
    }
}

fn malformed(e: impl std::fmt::Display) -> DomainError {
    DomainError::Validation(format!("malformed multipart payload: {e}"))
}

async fn read_text(field: &mut Field) -> Result<String, DomainError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        data.extend_from_slice(&chunk.map_err(malformed)?);
    }
    String::from_utf8(data).map_err(malformed)
}

async fn read_image(field: &mut Field, limit: usize) -> Result<Option<ImageUpload>, DomainError> {
    let file_name = field
        .content_disposition()
        .get_filename()
        .unwrap_or_default()
        .to_owned();
    let mime = field
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(malformed)?;
        // Transport-level guard; the media store enforces the same limit.
        if data.len() + chunk.len() > limit {
            return Err(DomainError::TooLarge {
                size: data.len() + chunk.len(),
                limit,
            });
        }
        data.extend_from_slice(&chunk);
    }

    // A form submitted without choosing a file arrives as an empty part.
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(ImageUpload {
        data,
        mime,
        file_name,
    }))
}

pub async fn read_post_form(
    mut payload: Multipart,
    max_image_bytes: usize,
) -> Result<PostForm, DomainError> {
    let mut form = PostForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(malformed)?;
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_owned();

        match name.as_str() {
            "image" => form.image = read_image(&mut field, max_image_bytes).await?,
            "title" => form.title = read_text(&mut field).await?,
            "author" => form.author = read_text(&mut field).await?,
            "category" => form.category = read_text(&mut field).await?,
            "excerpt" => form.excerpt = read_text(&mut field).await?,
            "content" => form.content = read_text(&mut field).await?,
            // Unknown parts are drained and ignored.
            _ => {
                let _ = read_text(&mut field).await;
            }
        }
    }

    Ok(form)
}
