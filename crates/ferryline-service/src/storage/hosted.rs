use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode, Url, header::CONTENT_TYPE};

use super::{ObjectStorage, check_path};
use crate::backend::HostedBackend;
use crate::errors::UploadError;
use crate::session::SessionContext;

/// Bucket in the hosted project's object storage.
pub struct HostedStorage {
    backend: HostedBackend,
    bucket: String,
    session: SessionContext,
}

impl HostedStorage {
    pub fn new(backend: HostedBackend, bucket: String, session: SessionContext) -> Self {
        Self {
            backend,
            bucket,
            session,
        }
    }

    fn object_url(&self, path: &str) -> Result<Url, UploadError> {
        self.backend
            .endpoint(&format!("storage/v1/object/{}/{path}", self.bucket))
            .map_err(|err| UploadError::InvalidPath(err.to_string()))
    }

    fn public_prefix(&self) -> String {
        format!(
            "{}storage/v1/object/public/{}/",
            self.backend.base_url(),
            self.bucket
        )
    }
}

#[async_trait]
impl ObjectStorage for HostedStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, UploadError> {
        check_path(path)?;
        let response = self
            .backend
            .request(
                Method::POST,
                self.object_url(path)?,
                self.session.access_token(),
            )
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        Ok(format!("{}{path}", self.public_prefix()))
    }

    async fn delete(&self, path: &str) -> Result<(), UploadError> {
        check_path(path)?;
        let response = self
            .backend
            .request(
                Method::DELETE,
                self.object_url(path)?,
                self.session.access_token(),
            )
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(UploadError::NotFound),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(UploadError::Backend {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix())
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }
}
