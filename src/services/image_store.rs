use crate::models::candidate::Candidate;
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("Image is larger than 5 MiB")]
    TooLarge,
    #[error("Image is empty")]
    Empty,
    #[error("Invalid picture id")]
    InvalidId,
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persists candidate pictures and resolves them to public URLs.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String, ImageStoreError>;
    fn url_for(&self, picture_id: &str) -> String;
    async fn remove(&self, picture_id: &str) -> Result<(), ImageStoreError>;
}

/// Public picture URL of a candidate, falling back to a generated avatar.
pub fn candidate_picture_url(store: &dyn ImageStore, candidate: &Candidate) -> String {
    match candidate.picture_id.as_deref() {
        Some(picture_id) => store.url_for(picture_id),
        None => candidate.default_avatar_url(),
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Writes images under a local directory that the router serves at
/// `/uploads`.
pub struct LocalImageStore {
    root: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, picture_id: &str) -> Result<PathBuf, ImageStoreError> {
        let valid = !picture_id.is_empty()
            && picture_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !picture_id.contains("..");
        if !valid {
            return Err(ImageStoreError::InvalidId);
        }
        Ok(self.root.join(picture_id))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String, ImageStoreError> {
        let extension = extension_for(content_type)
            .ok_or_else(|| ImageStoreError::UnsupportedType(content_type.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageStoreError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageStoreError::TooLarge);
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let picture_id = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&picture_id), bytes).await?;

        tracing::debug!("Stored picture {} ({} bytes)", picture_id, bytes.len());
        Ok(picture_id)
    }

    fn url_for(&self, picture_id: &str) -> String {
        format!("{}/uploads/{}", self.base_url, picture_id)
    }

    async fn remove(&self, picture_id: &str) -> Result<(), ImageStoreError> {
        let path = self.path_for(picture_id)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path(), "http://localhost:8080/");

        let id = store.store(b"\x89PNG....", "image/png").await.unwrap();
        assert!(id.ends_with(".png"));
        assert!(dir.path().join(&id).exists());
        assert_eq!(
            store.url_for(&id),
            format!("http://localhost:8080/uploads/{}", id)
        );

        store.remove(&id).await.unwrap();
        assert!(!dir.path().join(&id).exists());
        // Removing twice is not an error
        store.remove(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_unsupported_and_oversized() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path(), "http://localhost");

        assert!(matches!(
            store.store(b"hello", "text/plain").await,
            Err(ImageStoreError::UnsupportedType(_))
        ));

        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            store.store(&big, "image/jpeg").await,
            Err(ImageStoreError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn test_remove_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path(), "http://localhost");

        assert!(matches!(
            store.remove("../etc/passwd").await,
            Err(ImageStoreError::InvalidId)
        ));
    }
}
