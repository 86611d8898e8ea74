//! Articles bundled with the binary.
//!
//! These are shown ahead of stored articles and keep the news page populated
//! while the store is still empty. They are never written back to the
//! store, and their slugs are reserved.

use chrono::{DateTime, Utc};

/// A bundled article. Same shape as a stored [`crate::models::Article`],
/// minus the store-assigned fields.
#[derive(Debug, PartialEq, Eq)]
pub struct StaticArticle {
    pub slug: &'static str,
    pub title: &'static str,
    pub excerpt: &'static str,
    pub content: &'static str,
    pub category: &'static str,
    pub author: &'static str,
    pub read_time: &'static str,
    pub image_url: Option<&'static str>,
    /// Publication time, seconds since the Unix epoch.
    pub published_at: i64,
}

impl StaticArticle {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.published_at, 0).unwrap_or_default()
    }
}

static STATIC_ARTICLES: [StaticArticle; 4] = [
    StaticArticle {
        slug: "welcome-to-ferryline",
        title: "Welcome to Ferryline",
        excerpt: "Daily sailings between the mainland and the islands, now with live timetables.",
        content: "<p>Ferryline runs daily sailings between the mainland terminals and the islands. \
                  Timetables on this site are updated by our operations team as soon as departures change.</p>",
        category: "News",
        author: "Ferryline Team",
        read_time: "2 min read",
        image_url: Some("/static/images/welcome.jpg"),
        published_at: 1_704_099_600,
    },
    StaticArticle {
        slug: "boarding-and-ticketing-guide",
        title: "Boarding and Ticketing Guide",
        excerpt: "What to bring, when to arrive and how to collect your ticket at the terminal.",
        content: "<p>Arrive at the terminal at least 45 minutes before departure. \
                  Bring a photo ID matching the name on your booking and collect your boarding pass at the counter.</p>",
        category: "Travel Guide",
        author: "Ferryline Team",
        read_time: "4 min read",
        image_url: Some("/static/images/boarding.jpg"),
        published_at: 1_704_186_000,
    },
    StaticArticle {
        slug: "luggage-and-vehicle-policy",
        title: "Luggage and Vehicle Policy",
        excerpt: "Allowances for cabin luggage, cargo and vehicles on every crossing.",
        content: "<p>Each passenger may carry two pieces of luggage up to 25 kg in total. \
                  Vehicles must be booked in advance and checked in one hour before sailing.</p>",
        category: "Travel Guide",
        author: "Ferryline Team",
        read_time: "3 min read",
        image_url: None,
        published_at: 1_704_272_400,
    },
    StaticArticle {
        slug: "safety-on-board",
        title: "Safety on Board",
        excerpt: "Life jackets, muster stations and what to do in rough weather.",
        content: "<p>Life jackets are stowed under every seat. Follow crew instructions during the safety briefing \
                  and keep to the marked decks when the sea is rough.</p>",
        category: "Safety",
        author: "Ferryline Team",
        read_time: "3 min read",
        image_url: None,
        published_at: 1_704_358_800,
    },
];

pub fn list() -> &'static [StaticArticle] {
    &STATIC_ARTICLES
}

/// Whether `slug` belongs to a bundled article.
pub fn is_reserved(slug: &str) -> bool {
    STATIC_ARTICLES.iter().any(|article| article.slug == slug)
}
