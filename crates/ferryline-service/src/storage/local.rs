use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{ObjectStorage, check_path};
use crate::errors::UploadError;

/// URL prefix the media directory is served under.
pub const MEDIA_PREFIX: &str = "/media/";

/// Images kept as plain files under a media directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        check_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;

        debug!(path, size = bytes.len(), "Stored image");
        Ok(format!("{MEDIA_PREFIX}{path}"))
    }

    async fn delete(&self, path: &str) -> Result<(), UploadError> {
        check_path(path)?;
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(UploadError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(MEDIA_PREFIX)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_delete() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let url = storage
            .upload("articles/deck.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "/media/articles/deck.png");
        assert!(dir.path().join("articles/deck.png").exists());

        let path = storage.path_for_url(&url).unwrap();
        storage.delete(&path).await.unwrap();
        assert!(!dir.path().join("articles/deck.png").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(matches!(
            storage.delete("articles/missing.png").await,
            Err(UploadError::NotFound)
        ));
    }

    #[test]
    fn test_foreign_urls_have_no_path() {
        let storage = LocalStorage::new("media");
        assert_eq!(storage.path_for_url("https://cdn.example.com/a.png"), None);
        assert_eq!(storage.path_for_url("/media/"), None);
    }
}
