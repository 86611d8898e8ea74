use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::StoreError;
use crate::models::{Article, Entity, Product, Schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// `created_at` descending.
    #[default]
    Newest,
    /// `created_at` ascending.
    Oldest,
}

impl SortOrder {
    pub fn direction(&self) -> &'static str {
        match self {
            SortOrder::Newest => "desc",
            SortOrder::Oldest => "asc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListParams {
    pub order: SortOrder,
    /// Articles only: keep rows whose `is_default` flag matches.
    pub is_default: Option<bool>,
}

impl ListParams {
    pub fn newest_first() -> Self {
        Self {
            order: SortOrder::Newest,
            is_default: None,
        }
    }

    pub fn oldest_first() -> Self {
        Self {
            order: SortOrder::Oldest,
            is_default: None,
        }
    }

    pub fn only_defaults(mut self, is_default: bool) -> Self {
        self.is_default = Some(is_default);
        self
    }
}

/// Typed access to one collection of the content store.
#[async_trait]
pub trait Repository<E: Entity>: Clone + Send + Sync + 'static {
    async fn fetch_all(&self, params: ListParams) -> Result<Vec<E>, StoreError>;
    async fn fetch_by_id(&self, id: &str) -> Result<Option<E>, StoreError>;
    async fn create(&self, new: &E::New) -> Result<E, StoreError>;
    /// Merges `patch` over the stored record. Fails with
    /// [`StoreError::NotFound`] when `id` does not exist.
    async fn update(&self, id: &str, patch: &E::Patch) -> Result<E, StoreError>;
    /// Fails with [`StoreError::NotFound`] when `id` does not exist.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// A store holding every collection the site uses.
pub trait ContentStore: Repository<Article> + Repository<Schedule> + Repository<Product> {}

impl<T> ContentStore for T where T: Repository<Article> + Repository<Schedule> + Repository<Product> {}
