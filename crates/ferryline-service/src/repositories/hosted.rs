//! Content store bound to a hosted PostgREST data API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::traits::{ListParams, Repository};
use crate::backend::HostedBackend;
use crate::errors::StoreError;
use crate::models::{Collection, Entity};
use crate::session::SessionContext;

#[derive(Clone)]
pub struct HostedStore {
    backend: HostedBackend,
    session: SessionContext,
}

impl HostedStore {
    pub fn new(backend: HostedBackend, session: SessionContext) -> Self {
        Self { backend, session }
    }

    fn table_url(&self, collection: Collection) -> Result<Url, StoreError> {
        self.backend
            .endpoint(&format!("rest/v1/{collection}"))
            .map_err(|err| StoreError::InvalidEndpoint(err.to_string()))
    }

    /// Carries the signed-in user's token when there is one, so row-level
    /// policies apply, and the public key otherwise.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.backend.request(method, url, self.session.access_token())
    }
}

async fn read_rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(message));
        }
        return Err(StoreError::Backend {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<Vec<T>>()
        .await
        .map_err(|err| StoreError::Decode(err.to_string()))
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait]
impl<E: Entity> Repository<E> for HostedStore {
    async fn fetch_all(&self, params: ListParams) -> Result<Vec<E>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", format!("created_at.{}", params.order.direction())),
        ];
        if E::COLLECTION == Collection::Articles {
            if let Some(is_default) = params.is_default {
                query.push(("is_default", format!("eq.{is_default}")));
            }
        }

        let url = self.table_url(E::COLLECTION)?;
        read_rows(self.request(Method::GET, url).query(&query)).await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<E>, StoreError> {
        let url = self.table_url(E::COLLECTION)?;
        let rows: Vec<E> = read_rows(
            self.request(Method::GET, url)
                .query(&[("select", "*")])
                .query(&id_filter(id)),
        )
        .await?;

        Ok(rows.into_iter().next())
    }

    async fn create(&self, new: &E::New) -> Result<E, StoreError> {
        let url = self.table_url(E::COLLECTION)?;
        let rows: Vec<E> = read_rows(
            self.request(Method::POST, url)
                .header("Prefer", "return=representation")
                .json(new),
        )
        .await?;

        rows.into_iter().next().ok_or_else(|| {
            StoreError::Decode(format!("insert into {} returned no rows", E::COLLECTION))
        })
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<E, StoreError> {
        let url = self.table_url(E::COLLECTION)?;
        let rows: Vec<E> = read_rows(
            self.request(Method::PATCH, url)
                .query(&id_filter(id))
                .header("Prefer", "return=representation")
                .json(patch),
        )
        .await?;

        rows.into_iter().next().ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let url = self.table_url(E::COLLECTION)?;
        let rows: Vec<serde_json::Value> = read_rows(
            self.request(Method::DELETE, url)
                .query(&id_filter(id))
                .header("Prefer", "return=representation"),
        )
        .await?;

        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
