use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use chrono::{DateTime, Utc};
use serde::Serialize;

use blog_server::application::post_service::PostService;
use blog_server::data::flat_file::FlatFilePostRepository;
use blog_server::data::post_repository::PostRepository;
use blog_server::data::sqlite::SqlitePostRepository;
use blog_server::infrastructure::config::{AppConfig, MediaBackend, RecordBackend};
use blog_server::infrastructure::database::{create_pool, run_migrations};
use blog_server::infrastructure::logging::init_logging;
use blog_server::media::MediaStore;
use blog_server::media::disk::DiskMediaStore;
use blog_server::media::remote::RemoteMediaStore;
use blog_server::presentation::handlers;
use blog_server::presentation::middleware::{RequestIdMiddleware, TimingMiddleware};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;

    let repo: Arc<dyn PostRepository> = match &config.record_backend {
        RecordBackend::FlatFile { data_file } => {
            Arc::new(FlatFilePostRepository::new(data_file.clone()))
        }
        RecordBackend::Sqlite { database_path } => {
            let pool = create_pool(database_path).await?;
            run_migrations(&pool).await?;
            Arc::new(SqlitePostRepository::new(pool))
        }
    };

    let media: Arc<dyn MediaStore> = match &config.media_backend {
        MediaBackend::Disk { upload_dir } => Arc::new(DiskMediaStore::new(
            upload_dir.clone(),
            config.max_image_bytes,
        )),
        MediaBackend::Remote {
            base_url,
            access_token,
        } => Arc::new(RemoteMediaStore::new(
            base_url.clone(),
            access_token.clone(),
            config.max_image_bytes,
            config.media_timeout,
        )?),
    };

    let post_service = PostService::new(repo, media, config.media_timeout);
    let config_data = config.clone();

    HttpServer::new(move || {
        let cors = build_cors(&config_data);
        App::new()
            .wrap(Logger::default())
            .wrap(RequestIdMiddleware)
            .wrap(TimingMiddleware)
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(cors)
            .app_data(web::Data::new(post_service.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health))
                    .service(handlers::post::list_posts)
                    .service(handlers::post::get_post)
                    .service(handlers::post::create_post)
                    .service(handlers::post::update_post)
                    .service(handlers::post::delete_post),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.cors_origins {
        cors = cors.allowed_origin(origin);
    }

    cors
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}
