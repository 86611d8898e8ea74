//! Self-hosted content store on SQLite, used for local development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use super::traits::{ListParams, Repository, SortOrder};
use crate::errors::StoreError;
use crate::models::{
    Article, ArticlePatch, NewArticle, NewProduct, NewSchedule, Product, ProductPatch, Schedule,
    SchedulePatch,
};
use crate::schema::{articles, products, schedules};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }

    /// Connects to `database_url` and applies pending migrations.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        let mut connection = SqliteConnection::establish(database_url)
            .map_err(|err| StoreError::Connection(err.to_string()))?;

        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        info!(database_url, applied = applied.len(), "SQLite store ready");

        Ok(Self::new(Arc::new(Mutex::new(connection))))
    }

    pub fn connection(&self) -> Arc<Mutex<SqliteConnection>> {
        self.db.clone()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct ArticleRow {
    id: String,
    slug: String,
    title: String,
    content: String,
    excerpt: String,
    category: String,
    author: String,
    read_time: String,
    image_url: Option<String>,
    is_default: bool,
    user_id: Option<String>,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            slug: row.slug,
            title: row.title,
            content: row.content,
            excerpt: row.excerpt,
            category: row.category,
            author: row.author,
            read_time: row.read_time,
            image_url: row.image_url,
            is_default: row.is_default,
            user_id: row.user_id,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.map(|at| at.and_utc()),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = articles)]
struct NewArticleRow<'a> {
    id: String,
    slug: &'a str,
    title: &'a str,
    content: &'a str,
    excerpt: &'a str,
    category: &'a str,
    author: &'a str,
    read_time: &'a str,
    image_url: Option<&'a str>,
    is_default: bool,
    user_id: Option<&'a str>,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

impl<'a> From<&'a NewArticle> for NewArticleRow<'a> {
    fn from(new: &'a NewArticle) -> Self {
        let created_at = now();
        NewArticleRow {
            id: new_id(),
            slug: &new.slug,
            title: &new.title,
            content: &new.content,
            excerpt: &new.excerpt,
            category: &new.category,
            author: &new.author,
            read_time: &new.read_time,
            image_url: new.image_url.as_deref(),
            is_default: new.is_default,
            user_id: new.user_id.as_deref(),
            created_at,
            updated_at: Some(created_at),
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = articles)]
struct ArticleChanges<'a> {
    slug: Option<&'a str>,
    title: Option<&'a str>,
    content: Option<&'a str>,
    excerpt: Option<&'a str>,
    category: Option<&'a str>,
    author: Option<&'a str>,
    read_time: Option<&'a str>,
    image_url: Option<&'a str>,
    is_default: Option<bool>,
    user_id: Option<&'a str>,
    updated_at: NaiveDateTime,
}

impl<'a> From<&'a ArticlePatch> for ArticleChanges<'a> {
    fn from(patch: &'a ArticlePatch) -> Self {
        ArticleChanges {
            slug: patch.slug.as_deref(),
            title: patch.title.as_deref(),
            content: patch.content.as_deref(),
            excerpt: patch.excerpt.as_deref(),
            category: patch.category.as_deref(),
            author: patch.author.as_deref(),
            read_time: patch.read_time.as_deref(),
            image_url: patch.image_url.as_deref(),
            is_default: patch.is_default,
            user_id: patch.user_id.as_deref(),
            updated_at: patch
                .updated_at
                .map(|at| at.naive_utc())
                .unwrap_or_else(now),
        }
    }
}

#[async_trait]
impl Repository<Article> for SqliteStore {
    async fn fetch_all(&self, params: ListParams) -> Result<Vec<Article>, StoreError> {
        let mut conn = self.db.lock();
        let mut query = articles::table
            .select(ArticleRow::as_select())
            .into_boxed();

        if let Some(is_default) = params.is_default {
            query = query.filter(articles::is_default.eq(is_default));
        }
        query = match params.order {
            SortOrder::Newest => query.order(articles::created_at.desc()),
            SortOrder::Oldest => query.order(articles::created_at.asc()),
        };

        let rows = query.load::<ArticleRow>(&mut *conn)?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Article>, StoreError> {
        let mut conn = self.db.lock();
        let row = articles::table
            .find(id)
            .select(ArticleRow::as_select())
            .first::<ArticleRow>(&mut *conn)
            .optional()?;
        Ok(row.map(Article::from))
    }

    async fn create(&self, new: &NewArticle) -> Result<Article, StoreError> {
        let mut conn = self.db.lock();
        let row = diesel::insert_into(articles::table)
            .values(NewArticleRow::from(new))
            .returning(ArticleRow::as_returning())
            .get_result::<ArticleRow>(&mut *conn)?;
        Ok(row.into())
    }

    async fn update(&self, id: &str, patch: &ArticlePatch) -> Result<Article, StoreError> {
        let mut conn = self.db.lock();
        let row = diesel::update(articles::table.find(id))
            .set(ArticleChanges::from(patch))
            .returning(ArticleRow::as_returning())
            .get_result::<ArticleRow>(&mut *conn)
            .optional()?;
        row.map(Article::from).ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.db.lock();
        let deleted = diesel::delete(articles::table.find(id)).execute(&mut *conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = schedules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct ScheduleRow {
    id: String,
    ship_name: String,
    route: String,
    days: String,
    departure: String,
    arrival: String,
    duration: String,
    notes: String,
    created_at: NaiveDateTime,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            ship_name: row.ship_name,
            route: row.route,
            days: row.days,
            departure: row.departure,
            arrival: row.arrival,
            duration: row.duration,
            notes: row.notes,
            created_at: row.created_at.and_utc(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schedules)]
struct NewScheduleRow<'a> {
    id: String,
    ship_name: &'a str,
    route: &'a str,
    days: &'a str,
    departure: &'a str,
    arrival: &'a str,
    duration: &'a str,
    notes: &'a str,
    created_at: NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = schedules)]
struct ScheduleChanges<'a> {
    ship_name: Option<&'a str>,
    route: Option<&'a str>,
    days: Option<&'a str>,
    departure: Option<&'a str>,
    arrival: Option<&'a str>,
    duration: Option<&'a str>,
    notes: Option<&'a str>,
}

#[async_trait]
impl Repository<Schedule> for SqliteStore {
    async fn fetch_all(&self, params: ListParams) -> Result<Vec<Schedule>, StoreError> {
        let mut conn = self.db.lock();
        let query = schedules::table.select(ScheduleRow::as_select());
        let rows = match params.order {
            SortOrder::Newest => query
                .order(schedules::created_at.desc())
                .load::<ScheduleRow>(&mut *conn)?,
            SortOrder::Oldest => query
                .order(schedules::created_at.asc())
                .load::<ScheduleRow>(&mut *conn)?,
        };
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Schedule>, StoreError> {
        let mut conn = self.db.lock();
        let row = schedules::table
            .find(id)
            .select(ScheduleRow::as_select())
            .first::<ScheduleRow>(&mut *conn)
            .optional()?;
        Ok(row.map(Schedule::from))
    }

    async fn create(&self, new: &NewSchedule) -> Result<Schedule, StoreError> {
        let mut conn = self.db.lock();
        let row = diesel::insert_into(schedules::table)
            .values(NewScheduleRow {
                id: new_id(),
                ship_name: &new.ship_name,
                route: &new.route,
                days: &new.days,
                departure: &new.departure,
                arrival: &new.arrival,
                duration: &new.duration,
                notes: &new.notes,
                created_at: now(),
            })
            .returning(ScheduleRow::as_returning())
            .get_result::<ScheduleRow>(&mut *conn)?;
        Ok(row.into())
    }

    async fn update(&self, id: &str, patch: &SchedulePatch) -> Result<Schedule, StoreError> {
        // Diesel refuses an UPDATE without columns.
        if patch.is_empty() {
            return Repository::<Schedule>::fetch_by_id(self, id)
                .await?
                .ok_or(StoreError::NotFound);
        }

        let mut conn = self.db.lock();
        let row = diesel::update(schedules::table.find(id))
            .set(ScheduleChanges {
                ship_name: patch.ship_name.as_deref(),
                route: patch.route.as_deref(),
                days: patch.days.as_deref(),
                departure: patch.departure.as_deref(),
                arrival: patch.arrival.as_deref(),
                duration: patch.duration.as_deref(),
                notes: patch.notes.as_deref(),
            })
            .returning(ScheduleRow::as_returning())
            .get_result::<ScheduleRow>(&mut *conn)
            .optional()?;
        row.map(Schedule::from).ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.db.lock();
        let deleted = diesel::delete(schedules::table.find(id)).execute(&mut *conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct ProductRow {
    id: String,
    name: String,
    price: String,
    image_url: String,
    description: String,
    phone: String,
    created_at: NaiveDateTime,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price: row.price,
            image_url: row.image_url,
            description: row.description,
            phone: row.phone,
            created_at: row.created_at.and_utc(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = products)]
struct NewProductRow<'a> {
    id: String,
    name: &'a str,
    price: &'a str,
    image_url: &'a str,
    description: &'a str,
    phone: &'a str,
    created_at: NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = products)]
struct ProductChanges<'a> {
    name: Option<&'a str>,
    price: Option<&'a str>,
    image_url: Option<&'a str>,
    description: Option<&'a str>,
    phone: Option<&'a str>,
}

#[async_trait]
impl Repository<Product> for SqliteStore {
    async fn fetch_all(&self, params: ListParams) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.db.lock();
        let query = products::table.select(ProductRow::as_select());
        let rows = match params.order {
            SortOrder::Newest => query
                .order(products::created_at.desc())
                .load::<ProductRow>(&mut *conn)?,
            SortOrder::Oldest => query
                .order(products::created_at.asc())
                .load::<ProductRow>(&mut *conn)?,
        };
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.db.lock();
        let row = products::table
            .find(id)
            .select(ProductRow::as_select())
            .first::<ProductRow>(&mut *conn)
            .optional()?;
        Ok(row.map(Product::from))
    }

    async fn create(&self, new: &NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.db.lock();
        let row = diesel::insert_into(products::table)
            .values(NewProductRow {
                id: new_id(),
                name: &new.name,
                price: &new.price,
                image_url: &new.image_url,
                description: &new.description,
                phone: &new.phone,
                created_at: now(),
            })
            .returning(ProductRow::as_returning())
            .get_result::<ProductRow>(&mut *conn)?;
        Ok(row.into())
    }

    async fn update(&self, id: &str, patch: &ProductPatch) -> Result<Product, StoreError> {
        if patch.is_empty() {
            return Repository::<Product>::fetch_by_id(self, id)
                .await?
                .ok_or(StoreError::NotFound);
        }

        let mut conn = self.db.lock();
        let row = diesel::update(products::table.find(id))
            .set(ProductChanges {
                name: patch.name.as_deref(),
                price: patch.price.as_deref(),
                image_url: patch.image_url.as_deref(),
                description: patch.description.as_deref(),
                phone: patch.phone.as_deref(),
            })
            .returning(ProductRow::as_returning())
            .get_result::<ProductRow>(&mut *conn)
            .optional()?;
        row.map(Product::from).ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.db.lock();
        let deleted = diesel::delete(products::table.find(id)).execute(&mut *conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
