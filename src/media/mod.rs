pub mod disk;
pub mod remote;

use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::post::MediaRef;

/// Storage contract for binary image assets.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists the payload and returns a reference to it. Rejects
    /// payloads whose declared type is not an image or that exceed the
    /// configured byte ceiling, before anything is written.
    async fn store(
        &self,
        data: Vec<u8>,
        mime: &str,
        original_name: &str,
    ) -> Result<MediaRef, DomainError>;

    /// Removes the asset. Deleting an asset that is already absent is not
    /// an error.
    async fn delete(&self, media: &MediaRef) -> Result<(), DomainError>;

    /// Whether the referenced asset is currently present.
    async fn exists(&self, media: &MediaRef) -> Result<bool, DomainError>;

    /// The externally fetchable address for the asset.
    fn resolve(&self, media: &MediaRef) -> String;
}

pub(crate) fn check_payload(len: usize, mime: &str, limit: usize) -> Result<(), DomainError> {
    if !mime.starts_with("image/") {
        return Err(DomainError::InvalidAsset(format!(
            "unsupported media type: {mime}"
        )));
    }
    if len > limit {
        return Err(DomainError::TooLarge { size: len, limit });
    }
    Ok(())
}

/// Strips everything outside `[A-Za-z0-9.]` from a client-supplied file
/// name before it becomes part of a storage name.
pub(crate) fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_must_declare_an_image_type() {
        assert!(check_payload(10, "image/png", 100).is_ok());
        assert!(matches!(
            check_payload(10, "application/pdf", 100),
            Err(DomainError::InvalidAsset(_))
        ));
    }

    #[test]
    fn payloads_over_the_ceiling_are_rejected() {
        assert!(matches!(
            check_payload(101, "image/jpeg", 100),
            Err(DomainError::TooLarge { size: 101, limit: 100 })
        ));
        assert!(check_payload(100, "image/jpeg", 100).is_ok());
    }

    #[test]
    fn names_are_reduced_to_safe_characters() {
        assert_eq!(sanitize_name("my photo (1).png"), "myphoto1.png");
        assert_eq!(sanitize_name("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_name("¯\\_(ツ)_/¯"), "upload");
    }
}
