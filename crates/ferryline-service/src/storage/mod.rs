//! Image storage for uploaded article and product pictures.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::UploadError;
use crate::models::Collection;

pub mod hosted;
pub mod local;

pub use hosted::HostedStorage;
pub use local::LocalStorage;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_EXTENSION: &str = "bin";

/// An image file received from the admin form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: Option<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// File extension taken from the original name, or the registered
    /// extension of the content type.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()));

        from_name
            .or_else(|| extension_for(&self.content_type()).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }

    /// The declared content type, or one guessed from the file name when the
    /// part carried none (or only the generic binary type).
    pub fn content_type(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != DEFAULT_CONTENT_TYPE);

        match (declared, self.file_name.as_deref()) {
            (Some(declared), _) => declared.to_string(),
            (None, Some(name)) => mime_guess::from_path(name)
                .first_or_octet_stream()
                .to_string(),
            (None, None) => DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Registered extension for a MIME type, preferring the one spelled like the
/// subtype (`image/jpeg` -> `jpeg`, `image/svg+xml` -> `svg`).
fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let extensions = mime_guess::get_mime_extensions_str(essence)?;
    let subtype = essence
        .split_once('/')
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or(subtype));

    extensions
        .iter()
        .find(|ext| Some(**ext) == subtype)
        .or_else(|| extensions.first())
        .copied()
}

/// Fresh, collision-free object path: `{folder}/{uuid}.{ext}`.
pub fn object_path(collection: Collection, upload: &ImageUpload) -> String {
    format!(
        "{}/{}.{}",
        collection.storage_folder(),
        Uuid::new_v4(),
        upload.extension()
    )
}

/// Rejects empty, absolute and parent-relative object paths.
pub(crate) fn check_path(path: &str) -> Result<(), UploadError> {
    let escapes = path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if path.is_empty() || escapes {
        return Err(UploadError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` at `path` and returns the public URL.
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str)
    -> Result<String, UploadError>;

    /// Fails with [`UploadError::NotFound`] when nothing is stored at `path`.
    async fn delete(&self, path: &str) -> Result<(), UploadError>;

    /// Object path behind a public URL handed out by [`ObjectStorage::upload`].
    /// `None` for URLs that point elsewhere.
    fn path_for_url(&self, url: &str) -> Option<String>;
}
