//! Merging of bundled articles with articles from the content store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Article;
use crate::registry::StaticArticle;

/// An article from either source.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentEntity {
    Static(&'static StaticArticle),
    Dynamic(Article),
}

/// Read-only projection shared by both sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleView<'a> {
    /// Store-assigned id; bundled articles have none.
    pub id: Option<&'a str>,
    pub slug: &'a str,
    pub title: &'a str,
    pub excerpt: &'a str,
    pub content: &'a str,
    pub category: &'a str,
    pub author: &'a str,
    pub read_time: &'a str,
    pub image_url: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_static: bool,
}

impl ContentEntity {
    pub fn slug(&self) -> &str {
        match self {
            ContentEntity::Static(article) => article.slug,
            ContentEntity::Dynamic(article) => &article.slug,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, ContentEntity::Static(_))
    }

    pub fn view(&self) -> ArticleView<'_> {
        match self {
            ContentEntity::Static(article) => ArticleView {
                id: None,
                slug: article.slug,
                title: article.title,
                excerpt: article.excerpt,
                content: article.content,
                category: article.category,
                author: article.author,
                read_time: article.read_time,
                image_url: article.image_url,
                created_at: article.created_at(),
                updated_at: None,
                is_static: true,
            },
            ContentEntity::Dynamic(article) => ArticleView {
                id: Some(&article.id),
                slug: &article.slug,
                title: &article.title,
                excerpt: &article.excerpt,
                content: &article.content,
                category: &article.category,
                author: &article.author,
                read_time: &article.read_time,
                image_url: article.image_url.as_deref(),
                created_at: article.created_at,
                updated_at: article.updated_at,
                is_static: false,
            },
        }
    }
}

/// Bundled articles followed by stored ones, each group in its given order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedContent {
    entries: Vec<ContentEntity>,
}

impl MergedContent {
    /// No de-duplication: a stored article sharing a bundled slug appears
    /// twice, and lookups prefer the stored one.
    pub fn merge(
        static_articles: &'static [StaticArticle],
        dynamic_articles: impl IntoIterator<Item = Article>,
    ) -> Self {
        let entries = static_articles
            .iter()
            .map(ContentEntity::Static)
            .chain(dynamic_articles.into_iter().map(ContentEntity::Dynamic))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ContentEntity] {
        &self.entries
    }

    pub fn views(&self) -> Vec<ArticleView<'_>> {
        self.entries.iter().map(ContentEntity::view).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact, case-sensitive slug lookup. Stored articles are searched
    /// before bundled ones.
    pub fn find_by_slug(&self, slug: &str) -> Option<&ContentEntity> {
        self.entries
            .iter()
            .find(|entry| !entry.is_static() && entry.slug() == slug)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| entry.is_static() && entry.slug() == slug)
            })
    }

    pub fn into_entries(self) -> Vec<ContentEntity> {
        self.entries
    }
}
