use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::MigrationHarness;
use parking_lot::Mutex;

use crate::DefaultAppState;
use crate::auth::LocalAuth;
use crate::cache::QueryCache;
use crate::errors::{StoreError, UploadError};
use crate::models::Entity;
use crate::mutations::ContentService;
use crate::repositories::sqlite::MIGRATIONS;
use crate::repositories::{ListParams, Repository, SqliteStore};
use crate::retry::RetryConfig;
use crate::session::SessionContext;
use crate::storage::ObjectStorage;

pub const TEST_ADMIN_EMAIL: &str = "ops@ferryline.test";
pub const TEST_ADMIN_PASSWORD: &str = "test-backend-key";

pub fn establish_test_connection() -> SqliteConnection {
    let mut connection =
        SqliteConnection::establish(":memory:").expect("Failed to create in-memory database");

    connection
        .run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");

    connection
}

/// Store wrapper that counts calls and can be told to fail.
#[derive(Clone)]
pub struct RecordingStore<S> {
    inner: S,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
    transient_read_failures: Arc<AtomicU32>,
}

impl<S> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            transient_read_failures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.reads() + self.writes()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The next `count` reads fail with a retryable error.
    pub fn fail_next_reads(&self, count: u32) {
        self.transient_read_failures.store(count, Ordering::SeqCst);
    }

    fn record_read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .transient_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Connection("injected read failure".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                status: 500,
                message: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<E, S> Repository<E> for RecordingStore<S>
where
    E: Entity,
    S: Repository<E>,
{
    async fn fetch_all(&self, params: ListParams) -> Result<Vec<E>, StoreError> {
        self.record_read()?;
        self.inner.fetch_all(params).await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<E>, StoreError> {
        self.record_read()?;
        self.inner.fetch_by_id(id).await
    }

    async fn create(&self, new: &E::New) -> Result<E, StoreError> {
        self.record_write()?;
        self.inner.create(new).await
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<E, StoreError> {
        self.record_write()?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.record_write()?;
        self.inner.delete(id).await
    }
}

pub const MEMORY_URL_PREFIX: &str = "memory://";

/// Object storage kept in memory, with failure switches.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    deleted: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(path: &str) -> String {
        format!("{MEMORY_URL_PREFIX}{path}")
    }

    /// Places an object directly, bypassing the failure switches.
    pub fn put(&self, path: &str, bytes: &'static [u8]) -> String {
        self.objects
            .lock()
            .insert(path.to_string(), Bytes::from_static(bytes));
        Self::url_for(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(UploadError::Backend {
                status: 503,
                message: "injected upload failure".to_string(),
            });
        }
        self.objects.lock().insert(path.to_string(), bytes);
        Ok(Self::url_for(path))
    }

    async fn delete(&self, path: &str) -> Result<(), UploadError> {
        self.deleted.lock().push(path.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(UploadError::Backend {
                status: 500,
                message: "injected delete failure".to_string(),
            });
        }
        match self.objects.lock().remove(path) {
            Some(_) => Ok(()),
            None => Err(UploadError::NotFound),
        }
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(MEMORY_URL_PREFIX).map(str::to_string)
    }
}

pub type TestStore = RecordingStore<SqliteStore>;

/// A fully wired application over in-memory SQLite and in-memory images.
/// The session starts out `Loading`, as it does in a freshly started server.
pub struct TestApp {
    pub state: DefaultAppState<TestStore>,
    pub store: TestStore,
    pub storage: Arc<MemoryStorage>,
    pub session: SessionContext,
    pub db: Arc<Mutex<SqliteConnection>>,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(Mutex::new(establish_test_connection()));
        let store = RecordingStore::new(SqliteStore::new(db.clone()));
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionContext::new(Arc::new(LocalAuth::new(
            TEST_ADMIN_EMAIL,
            TEST_ADMIN_PASSWORD,
        )));

        let content = ContentService::new(
            store.clone(),
            storage.clone(),
            session.clone(),
            Arc::new(QueryCache::new(Duration::from_secs(300))),
            RetryConfig::immediate(3),
        );

        Self {
            state: DefaultAppState::new(content),
            store,
            storage,
            session,
            db,
        }
    }

    /// Session restored, nobody signed in.
    pub async fn restored() -> Self {
        let app = Self::new();
        app.session.restore().await;
        app
    }

    pub async fn signed_in() -> Self {
        let app = Self::restored().await;
        app.session
            .sign_in(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD)
            .await
            .expect("test credentials are accepted");
        app
    }

    pub fn content(&self) -> &ContentService<TestStore> {
        crate::AppState::content(&self.state)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

pub mod test_utils {
    use super::*;
    use crate::schema::{articles, products, schedules};
    use chrono::{DateTime, Utc};

    pub fn count_articles(conn: &mut SqliteConnection) -> i64 {
        articles::table
            .count()
            .get_result(conn)
            .expect("Failed to count articles")
    }

    pub fn count_schedules(conn: &mut SqliteConnection) -> i64 {
        schedules::table
            .count()
            .get_result(conn)
            .expect("Failed to count schedules")
    }

    pub fn count_products(conn: &mut SqliteConnection) -> i64 {
        products::table
            .count()
            .get_result(conn)
            .expect("Failed to count products")
    }

    /// Inserts an article with a known id, as if created by an earlier
    /// session.
    pub fn insert_article(
        conn: &mut SqliteConnection,
        id: &str,
        slug: &str,
        title: &str,
        image_url: Option<&str>,
        created_at: DateTime<Utc>,
    ) {
        diesel::insert_into(articles::table)
            .values((
                articles::id.eq(id),
                articles::slug.eq(slug),
                articles::title.eq(title),
                articles::content.eq("<p>Original</p>"),
                articles::excerpt.eq(""),
                articles::category.eq("News"),
                articles::author.eq("Admin"),
                articles::read_time.eq("3 min read"),
                articles::image_url.eq(image_url),
                articles::is_default.eq(false),
                articles::created_at.eq(created_at.naive_utc()),
            ))
            .execute(conn)
            .expect("Failed to insert article");
    }

    pub fn insert_product(
        conn: &mut SqliteConnection,
        id: &str,
        name: &str,
        image_url: &str,
        created_at: DateTime<Utc>,
    ) {
        diesel::insert_into(products::table)
            .values((
                products::id.eq(id),
                products::name.eq(name),
                products::price.eq("1000"),
                products::image_url.eq(image_url),
                products::description.eq(""),
                products::phone.eq(""),
                products::created_at.eq(created_at.naive_utc()),
            ))
            .execute(conn)
            .expect("Failed to insert product");
    }

    pub fn get_schedule_routes(conn: &mut SqliteConnection) -> Vec<String> {
        schedules::table
            .order(schedules::created_at.asc())
            .select(schedules::route)
            .load(conn)
            .expect("Failed to load schedules")
    }
}
