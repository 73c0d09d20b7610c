use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, info};

use crate::domain::error::DomainError;
use crate::domain::post::MediaRef;
use crate::media::{MediaStore, check_payload, sanitize_name};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
    id: String,
}

/// Remote object-store backend. Assets live in a third-party service: the
/// locator is the absolute URL the service hands back, the delete key is
/// its asset id.
pub struct RemoteMediaStore {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    max_bytes: usize,
}

impl RemoteMediaStore {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::StoreUnavailable(format!("failed to build client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            max_bytes,
        })
    }

    fn assets_endpoint(&self) -> String {
        format!("{}/v1/assets", self.base_url)
    }

    fn asset_endpoint(&self, id: &str) -> String {
        format!("{}/v1/assets/{id}", self.base_url)
    }
}

fn transport_err(e: reqwest::Error) -> DomainError {
    error!("media backend request failed: {}", e);
    DomainError::StoreUnavailable(format!("media backend unreachable: {e}"))
}

#[async_trait]
impl MediaStore for RemoteMediaStore {
    async fn store(
        &self,
        data: Vec<u8>,
        mime: &str,
        original_name: &str,
    ) -> Result<MediaRef, DomainError> {
        check_payload(data.len(), mime, self.max_bytes)?;

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(sanitize_name(original_name))
            .mime_str(mime)
            .map_err(|e| DomainError::InvalidAsset(format!("unparseable media type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.assets_endpoint())
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(DomainError::StoreUnavailable(format!(
                "media backend rejected upload with status {}",
                response.status()
            )));
        }

        let uploaded: UploadResponse = response.json().await.map_err(transport_err)?;
        info!(asset_id = %uploaded.id, "asset uploaded");
        Ok(MediaRef {
            locator: uploaded.url,
            delete_key: uploaded.id,
        })
    }

    async fn delete(&self, media: &MediaRef) -> Result<(), DomainError> {
        let response = self
            .http
            .delete(self.asset_endpoint(&media.delete_key))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_err)?;

        // An already-absent asset is a successful delete.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            info!(asset_id = %media.delete_key, "asset deleted");
            Ok(())
        } else {
            Err(DomainError::StoreUnavailable(format!(
                "media backend rejected delete with status {}",
                response.status()
            )))
        }
    }

    async fn exists(&self, media: &MediaRef) -> Result<bool, DomainError> {
        let response = self
            .http
            .get(self.asset_endpoint(&media.delete_key))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_err)?;

        if response.status() == StatusCode::NOT_FOUND {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            Err(DomainError::StoreUnavailable(format!(
                "media backend probe failed with status {}",
                response.status()
            )))
        }
    }

    fn resolve(&self, media: &MediaRef) -> String {
        // The stored URL is the fetchable address; no prefix assumptions.
        media.locator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> RemoteMediaStore {
        RemoteMediaStore::new(server.uri(), "test-token", 1024, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn store_returns_the_remote_url_and_delete_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/assets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "url": "https://cdn.example/assets/abc123.png",
                "id": "abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let media = store
            .store(b"png bytes".to_vec(), "image/png", "pic.png")
            .await
            .unwrap();

        assert_eq!(media.locator, "https://cdn.example/assets/abc123.png");
        assert_eq!(media.delete_key, "abc123");
        assert_eq!(store.resolve(&media), media.locator);
    }

    #[tokio::test]
    async fn upload_rejection_is_store_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/assets"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(matches!(
            store.store(b"x".to_vec(), "image/png", "pic.png").await,
            Err(DomainError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalid_payloads_never_reach_the_network() {
        let server = MockServer::start().await;
        // No mock mounted: any request would fail the test with a 404
        // turned into StoreUnavailable rather than the expected classes.
        let store = store_for(&server);

        assert!(matches!(
            store.store(b"x".to_vec(), "text/plain", "a.txt").await,
            Err(DomainError::InvalidAsset(_))
        ));
        assert!(matches!(
            store.store(vec![0u8; 2048], "image/png", "big.png").await,
            Err(DomainError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn delete_treats_absent_assets_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/assets/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let media = MediaRef {
            locator: "https://cdn.example/assets/gone.png".into(),
            delete_key: "gone".into(),
        };
        store.delete(&media).await.unwrap();
    }

    #[tokio::test]
    async fn exists_probes_the_asset_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/assets/abc123"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let present = MediaRef {
            locator: "https://cdn.example/assets/abc123.png".into(),
            delete_key: "abc123".into(),
        };
        let absent = MediaRef {
            locator: "https://cdn.example/assets/missing.png".into(),
            delete_key: "missing".into(),
        };

        assert!(store.exists(&present).await.unwrap());
        assert!(!store.exists(&absent).await.unwrap());
    }
}
