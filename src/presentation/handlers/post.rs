use actix_multipart::Multipart;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, delete, get, post, put, web};
use tracing::info;
use uuid::Uuid;

use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::infrastructure::config::AppConfig;
use crate::presentation::dto::{PostResponse, read_post_form};
use crate::presentation::middleware::RequestId;

#[get("/blogs")]
pub async fn list_posts(service: web::Data<PostService>) -> Result<HttpResponse, DomainError> {
    let posts = service.list_posts().await?;
    let body: Vec<PostResponse> = posts
        .into_iter()
        .map(|p| PostResponse::new(p, service.get_ref()))
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

#[get("/blogs/{id}")]
pub async fn get_post(
    service: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post = service.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostResponse::new(post, service.get_ref())))
}

#[post("/blogs")]
pub async fn create_post(
    req: HttpRequest,
    service: web::Data<PostService>,
    config: web::Data<AppConfig>,
    payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let form = read_post_form(payload, config.max_image_bytes).await?;
    let (draft, image) = form.into_create();
    let post = service.create_post(draft, image).await?;

    info!(
        request_id = %request_id(&req),
        post_id = %post.id,
        "post created"
    );

    Ok(HttpResponse::Created().json(PostResponse::new(post, service.get_ref())))
}

#[put("/blogs/{id}")]
pub async fn update_post(
    req: HttpRequest,
    service: web::Data<PostService>,
    config: web::Data<AppConfig>,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let form = read_post_form(payload, config.max_image_bytes).await?;
    let (patch, image) = form.into_replacement();
    let post = service.update_post(post_id, patch, image).await?;

    info!(
        request_id = %request_id(&req),
        post_id = %post.id,
        "post updated"
    );

    Ok(HttpResponse::Ok().json(PostResponse::new(post, service.get_ref())))
}

#[delete("/blogs/{id}")]
pub async fn delete_post(
    req: HttpRequest,
    service: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    service.delete_post(post_id).await?;

    info!(
        request_id = %request_id(&req),
        post_id = %post_id,
        "post deleted"
    );

    Ok(HttpResponse::NoContent().finish())
}

fn request_id(req: &HttpRequest) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|rid| rid.0.clone())
        .unwrap_or_else(|| "unknown".into())
}
