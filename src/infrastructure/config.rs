use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub enum RecordBackend {
    /// Whole collection in one JSON file.
    FlatFile { data_file: PathBuf },
    /// Embedded database, one row per post.
    Sqlite { database_path: PathBuf },
}

#[derive(Debug, Clone)]
pub enum MediaBackend {
    /// Assets beside the server, under the upload directory.
    Disk { upload_dir: PathBuf },
    /// Assets in a remote object store.
    Remote {
        base_url: String,
        access_token: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub record_backend: RecordBackend,
    pub media_backend: MediaBackend,
    pub max_image_bytes: usize,
    pub media_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?;

        let record_backend = match std::env::var("RECORD_STORE")
            .unwrap_or_else(|_| "file".into())
            .as_str()
        {
            "file" => RecordBackend::FlatFile {
                data_file: std::env::var("DATA_FILE")
                    .unwrap_or_else(|_| "blogs.json".into())
                    .into(),
            },
            "sqlite" => RecordBackend::Sqlite {
                database_path: std::env::var("DATABASE_PATH")
                    .unwrap_or_else(|_| "blog.db".into())
                    .into(),
            },
            other => anyhow::bail!("unknown RECORD_STORE: {other} (expected file or sqlite)"),
        };

        let media_backend = match std::env::var("MEDIA_STORE")
            .unwrap_or_else(|_| "disk".into())
            .as_str()
        {
            "disk" => MediaBackend::Disk {
                upload_dir: std::env::var("UPLOAD_DIR")
                    .unwrap_or_else(|_| "uploads".into())
                    .into(),
            },
            "remote" => MediaBackend::Remote {
                base_url: std::env::var("MEDIA_BASE_URL")
                    .map_err(|_| anyhow::anyhow!("MEDIA_BASE_URL must be set"))?,
                access_token: std::env::var("MEDIA_ACCESS_TOKEN")
                    .map_err(|_| anyhow::anyhow!("MEDIA_ACCESS_TOKEN must be set"))?,
            },
            other => anyhow::bail!("unknown MEDIA_STORE: {other} (expected disk or remote)"),
        };

        let max_image_bytes = match std::env::var("MAX_IMAGE_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid MAX_IMAGE_BYTES: {}", e))?,
            Err(_) => DEFAULT_MAX_IMAGE_BYTES,
        };

        let media_timeout_secs = match std::env::var("MEDIA_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid MEDIA_TIMEOUT_SECS: {}", e))?,
            Err(_) => DEFAULT_MEDIA_TIMEOUT_SECS,
        };

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            record_backend,
            media_backend,
            max_image_bytes,
            media_timeout: Duration::from_secs(media_timeout_secs),
            cors_origins,
        })
    }
}
