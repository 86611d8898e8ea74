//! Reads and writes of site content on behalf of the admin.
//!
//! Saves follow one order for every collection: validate locally, resolve
//! the acting session, load the record being updated, upload a replacement
//! image, write, and only then touch the cache and the previous image.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::auth::Session;
use crate::cache::{CacheStats, QueryCache, QueryKey};
use crate::errors::{ContentError, UploadError};
use crate::merge::{ContentEntity, MergedContent};
use crate::models::{
    Article, ArticleInput, ArticlePatch, Collection, Entity, NewArticle, NewProduct, NewSchedule,
    Product, ProductInput, ProductPatch, Schedule, ScheduleInput, SchedulePatch,
};
use crate::registry;
use crate::repositories::{ContentStore, ListParams, Repository};
use crate::retry::{RetryConfig, retry_read};
use crate::session::SessionContext;
use crate::storage::{ImageUpload, ObjectStorage, object_path};
use crate::validation::{self, ValidationError};

const DEFAULT_CATEGORY: &str = "News";
const DEFAULT_AUTHOR: &str = "Admin";
const DEFAULT_READ_TIME: &str = "3 min read";

/// A validated save, chosen solely by whether the input carried an id.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<N, P> {
    Create(N),
    Update { id: String, patch: P },
}

impl<N, P> Mutation<N, P> {
    pub fn id(&self) -> Option<&str> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update { id, .. } => Some(id),
        }
    }
}

fn supplied_id(id: Option<String>) -> Option<String> {
    id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
}

impl ArticleInput {
    /// Validates the input and derives the slug and fallback values. Never
    /// touches the network.
    pub fn into_mutation(
        self,
        now: DateTime<Utc>,
    ) -> Result<Mutation<NewArticle, ArticlePatch>, ValidationError> {
        match supplied_id(self.id) {
            None => {
                let title = validation::required("title", self.title.as_deref())?;
                let content = validation::required("content", self.content.as_deref())?;

                Ok(Mutation::Create(NewArticle {
                    slug: validation::generated_slug(&title, now),
                    title,
                    content,
                    excerpt: self.excerpt.unwrap_or_default(),
                    category: self.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                    author: self.author.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
                    read_time: self
                        .read_time
                        .unwrap_or_else(|| DEFAULT_READ_TIME.to_string()),
                    image_url: self.image_url,
                    is_default: self.is_default.unwrap_or(false),
                    user_id: None,
                }))
            }
            Some(id) => {
                let title = validation::non_blank("title", self.title.as_deref())?;
                let content = validation::non_blank("content", self.content.as_deref())?;
                let slug = self
                    .slug
                    .as_deref()
                    .map(validation::explicit_slug)
                    .transpose()?;

                Ok(Mutation::Update {
                    id,
                    patch: ArticlePatch {
                        slug,
                        title,
                        content,
                        excerpt: self.excerpt,
                        category: self.category,
                        author: self.author,
                        read_time: self.read_time,
                        image_url: self.image_url,
                        is_default: self.is_default,
                        user_id: None,
                        updated_at: None,
                    },
                })
            }
        }
    }
}

impl ScheduleInput {
    pub fn into_mutation(self) -> Result<Mutation<NewSchedule, SchedulePatch>, ValidationError> {
        match supplied_id(self.id) {
            None => Ok(Mutation::Create(NewSchedule {
                ship_name: validation::required("ship_name", self.ship_name.as_deref())?,
                route: validation::required("route", self.route.as_deref())?,
                days: self.days.unwrap_or_default(),
                departure: self.departure.unwrap_or_default(),
                arrival: self.arrival.unwrap_or_default(),
                duration: self.duration.unwrap_or_default(),
                notes: self.notes.unwrap_or_default(),
            })),
            Some(id) => Ok(Mutation::Update {
                id,
                patch: SchedulePatch {
                    ship_name: validation::non_blank("ship_name", self.ship_name.as_deref())?,
                    route: validation::non_blank("route", self.route.as_deref())?,
                    days: self.days,
                    departure: self.departure,
                    arrival: self.arrival,
                    duration: self.duration,
                    notes: self.notes,
                },
            }),
        }
    }
}

impl ProductInput {
    /// `has_upload` tells whether an image file accompanies the input; a new
    /// product needs either that or an `image_url`.
    pub fn into_mutation(
        self,
        has_upload: bool,
    ) -> Result<Mutation<NewProduct, ProductPatch>, ValidationError> {
        match supplied_id(self.id) {
            None => {
                let name = validation::required("name", self.name.as_deref())?;
                let price = validation::required("price", self.price.as_deref())?;
                let image_url = if has_upload {
                    self.image_url.unwrap_or_default()
                } else {
                    validation::required("image", self.image_url.as_deref())?
                };

                Ok(Mutation::Create(NewProduct {
                    name,
                    price,
                    image_url,
                    description: self.description.unwrap_or_default(),
                    phone: self.phone.unwrap_or_default(),
                }))
            }
            Some(id) => Ok(Mutation::Update {
                id,
                patch: ProductPatch {
                    name: validation::non_blank("name", self.name.as_deref())?,
                    price: validation::non_blank("price", self.price.as_deref())?,
                    image_url: validation::non_blank("image_url", self.image_url.as_deref())?,
                    description: self.description,
                    phone: self.phone,
                },
            }),
        }
    }
}

/// Fields the orchestrator fills in just before a write.
pub trait Stamp {
    fn stamp(&mut self, actor: &Session, now: DateTime<Utc>);

    fn attach_image(&mut self, url: String);
}

impl Stamp for NewArticle {
    fn stamp(&mut self, actor: &Session, _now: DateTime<Utc>) {
        self.user_id = Some(actor.user_id().to_string());
    }

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl Stamp for ArticlePatch {
    fn stamp(&mut self, actor: &Session, now: DateTime<Utc>) {
        self.user_id = Some(actor.user_id().to_string());
        self.updated_at = Some(now);
    }

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl Stamp for NewSchedule {
    fn stamp(&mut self, _actor: &Session, _now: DateTime<Utc>) {}

    fn attach_image(&mut self, _url: String) {}
}

impl Stamp for SchedulePatch {
    fn stamp(&mut self, _actor: &Session, _now: DateTime<Utc>) {}

    fn attach_image(&mut self, _url: String) {}
}

impl Stamp for NewProduct {
    fn stamp(&mut self, _actor: &Session, _now: DateTime<Utc>) {}

    fn attach_image(&mut self, url: String) {
        self.image_url = url;
    }
}

impl Stamp for ProductPatch {
    fn stamp(&mut self, _actor: &Session, _now: DateTime<Utc>) {}

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

struct StoredImage {
    path: String,
    url: String,
}

pub struct ContentService<S> {
    store: S,
    storage: Arc<dyn ObjectStorage>,
    session: SessionContext,
    cache: Arc<QueryCache>,
    retry: RetryConfig,
}

impl<S: Clone> Clone for ContentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            storage: self.storage.clone(),
            session: self.session.clone(),
            cache: self.cache.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: ContentStore> ContentService<S> {
    pub fn new(
        store: S,
        storage: Arc<dyn ObjectStorage>,
        session: SessionContext,
        cache: Arc<QueryCache>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            storage,
            session,
            cache,
            retry,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cached listing of a collection. Misses go to the store with retries.
    #[instrument(skip(self), fields(collection = %E::COLLECTION))]
    pub async fn list<E: Entity>(&self, params: ListParams) -> Result<Arc<Vec<E>>, ContentError>
    where
        S: Repository<E>,
    {
        let key = QueryKey::new(E::COLLECTION, params);
        if let Some(cached) = self.cache.get::<Vec<E>>(&key) {
            debug!(count = cached.len(), "Serving cached listing");
            return Ok(cached);
        }

        let epoch = self.cache.epoch(E::COLLECTION);
        let rows = retry_read(&self.retry, "fetch_all", || {
            <S as Repository<E>>::fetch_all(&self.store, params)
        })
        .await?;

        let rows = Arc::new(rows);
        if !self.cache.insert_if_current(key, epoch, rows.clone()) {
            debug!("Listing went stale while loading, not caching it");
        }
        Ok(rows)
    }

    pub async fn find<E: Entity>(&self, id: &str) -> Result<Option<E>, ContentError>
    where
        S: Repository<E>,
    {
        let found = retry_read(&self.retry, "fetch_by_id", || {
            <S as Repository<E>>::fetch_by_id(&self.store, id)
        })
        .await?;
        Ok(found)
    }

    async fn find_existing<E: Entity>(&self, id: &str) -> Result<E, ContentError>
    where
        S: Repository<E>,
    {
        self.find::<E>(id).await?.ok_or_else(|| ContentError::NotFound {
            collection: E::COLLECTION,
            id: id.to_string(),
        })
    }

    /// Bundled articles followed by stored ones, newest first. With
    /// `only_defaults`, only stored articles flagged `is_default` are kept.
    pub async fn merged_articles(&self, only_defaults: bool) -> Result<MergedContent, ContentError> {
        let mut params = ListParams::newest_first();
        if only_defaults {
            params = params.only_defaults(true);
        }

        let stored = self.list::<Article>(params).await?;
        Ok(MergedContent::merge(
            registry::list(),
            stored.iter().cloned(),
        ))
    }

    #[instrument(skip(self))]
    pub async fn find_article_by_slug(&self, slug: &str) -> Result<ContentEntity, ContentError> {
        let merged = self.merged_articles(false).await?;
        merged
            .find_by_slug(slug)
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                collection: Collection::Articles,
                id: slug.to_string(),
            })
    }

    #[instrument(skip_all, fields(id = input.id.as_deref(), has_image = image.is_some()))]
    pub async fn save_article(
        &self,
        input: ArticleInput,
        image: Option<ImageUpload>,
    ) -> Result<Article, ContentError> {
        let mutation = input.into_mutation(Utc::now())?;
        self.save::<Article>(mutation, image).await
    }

    #[instrument(skip_all, fields(id = input.id.as_deref()))]
    pub async fn save_schedule(&self, input: ScheduleInput) -> Result<Schedule, ContentError> {
        let mutation = input.into_mutation()?;
        self.save::<Schedule>(mutation, None).await
    }

    #[instrument(skip_all, fields(id = input.id.as_deref(), has_image = image.is_some()))]
    pub async fn save_product(
        &self,
        input: ProductInput,
        image: Option<ImageUpload>,
    ) -> Result<Product, ContentError> {
        let mutation = input.into_mutation(image.is_some())?;
        self.save::<Product>(mutation, image).await
    }

    async fn save<E>(
        &self,
        mutation: Mutation<E::New, E::Patch>,
        image: Option<ImageUpload>,
    ) -> Result<E, ContentError>
    where
        E: Entity,
        E::New: Stamp,
        E::Patch: Stamp,
        S: Repository<E>,
    {
        let actor = self.session.actor().await?;

        let previous = match mutation.id() {
            Some(id) => Some(self.find_existing::<E>(id).await?),
            None => None,
        };

        let uploaded = match image {
            Some(image) => Some(self.upload(E::COLLECTION, image).await?),
            None => None,
        };

        let now = Utc::now();
        let attached = uploaded.as_ref().map(|stored| stored.url.clone());
        let written = match mutation {
            Mutation::Create(mut new) => {
                new.stamp(&actor, now);
                if let Some(url) = attached {
                    new.attach_image(url);
                }
                <S as Repository<E>>::create(&self.store, &new).await
            }
            Mutation::Update { id, mut patch } => {
                patch.stamp(&actor, now);
                if let Some(url) = attached {
                    patch.attach_image(url);
                }
                <S as Repository<E>>::update(&self.store, &id, &patch).await
            }
        };

        match written {
            Ok(saved) => {
                self.cache.invalidate(E::COLLECTION);
                info!(collection = %E::COLLECTION, id = saved.id(), "Saved record");

                let replaced = previous
                    .as_ref()
                    .and_then(Entity::image_url)
                    .filter(|old| Some(*old) != saved.image_url());
                if let Some(old) = replaced {
                    self.discard_image(old).await;
                }
                Ok(saved)
            }
            Err(err) => {
                if let Some(stored) = uploaded {
                    self.discard_upload(&stored.path).await;
                }
                Err(ContentError::for_write(
                    err,
                    E::COLLECTION,
                    previous.as_ref().map(|previous| previous.id()),
                ))
            }
        }
    }

    /// Deletes a record and, best-effort, its stored image.
    #[instrument(skip(self), fields(collection = %E::COLLECTION))]
    pub async fn delete_entity<E: Entity>(&self, id: &str) -> Result<(), ContentError>
    where
        S: Repository<E>,
    {
        self.session.actor().await?;
        let existing = self.find_existing::<E>(id).await?;

        <S as Repository<E>>::delete(&self.store, id)
            .await
            .map_err(|err| ContentError::for_record(err, E::COLLECTION, id))?;

        self.cache.invalidate(E::COLLECTION);
        info!(id, "Deleted record");

        if let Some(url) = existing.image_url() {
            self.discard_image(url).await;
        }
        Ok(())
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), ContentError> {
        match collection {
            Collection::Articles => self.delete_entity::<Article>(id).await,
            Collection::Schedules => self.delete_entity::<Schedule>(id).await,
            Collection::Products => self.delete_entity::<Product>(id).await,
        }
    }

    async fn upload(
        &self,
        collection: Collection,
        image: ImageUpload,
    ) -> Result<StoredImage, UploadError> {
        let path = object_path(collection, &image);
        let content_type = image.content_type();
        let url = self
            .storage
            .upload(&path, image.bytes, &content_type)
            .await?;

        debug!(%path, "Uploaded image");
        Ok(StoredImage { path, url })
    }

    /// Removes an image that is no longer referenced. Failures are logged and
    /// never reach the caller.
    async fn discard_image(&self, url: &str) {
        let Some(path) = self.storage.path_for_url(url) else {
            debug!(url, "Image is not in our storage, leaving it alone");
            return;
        };
        self.discard_upload(&path).await;
    }

    async fn discard_upload(&self, path: &str) {
        match self.storage.delete(path).await {
            Ok(()) => debug!(path, "Removed image"),
            Err(UploadError::NotFound) => debug!(path, "Image already gone"),
            Err(err) => warn!(path, error = %err, "Failed to remove image"),
        }
    }
}
