use chrono::{DateTime, Utc};
use ferryline_service::merge::{ContentEntity, MergedContent};
use ferryline_service::models::Article;
use ferryline_service::registry;
use ferryline_service::validation::{explicit_slug, generated_slug, slugify};
use proptest::prelude::*;
use serde_json::{Value, json};

mod common;

prop_compose! {
    fn arb_title()(title in "[a-zA-Z0-9 ,.!?&'-]{1,60}") -> String {
        title
    }
}

prop_compose! {
    fn arb_created_at()(millis in 1_500_000_000_000i64..2_000_000_000_000i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }
}

prop_compose! {
    fn arb_article()(
        id in "[0-9]{1,6}",
        slug in "[a-z]{1,8}(-[a-z0-9]{1,6}){0,2}",
        title in arb_title(),
        created_at in arb_created_at(),
    ) -> Article {
        Article {
            id,
            slug,
            title,
            content: "<p>body</p>".to_string(),
            excerpt: String::new(),
            category: "News".to_string(),
            author: "Admin".to_string(),
            read_time: "3 min read".to_string(),
            image_url: None,
            is_default: false,
            user_id: None,
            created_at,
            updated_at: None,
        }
    }
}

fn is_normalized(slug: &str) -> bool {
    !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

proptest! {
    #[test]
    fn slugify_output_is_normalized(text in "\\PC{0,80}") {
        let slug = slugify(&text);
        prop_assert!(is_normalized(&slug), "slug {:?} from {:?}", slug, text);
        prop_assert_eq!(slugify(&slug), slug.clone());
    }

    #[test]
    fn generated_slugs_end_in_creation_millis(title in arb_title(), created_at in arb_created_at()) {
        let slug = generated_slug(&title, created_at);
        let suffix = format!("-{}", created_at.timestamp_millis());

        prop_assert!(slug.ends_with(&suffix));
        prop_assert!(is_normalized(&slug));
        prop_assert!(!registry::is_reserved(&slug));
    }

    #[test]
    fn explicit_slugs_never_take_a_bundled_slug(index in 0..registry::list().len(), shout in any::<bool>()) {
        let bundled = registry::list()[index].slug;
        let supplied = if shout { bundled.to_uppercase() } else { bundled.to_string() };
        prop_assert!(explicit_slug(&supplied).is_err());
    }

    #[test]
    fn merge_puts_bundled_articles_first(articles in prop::collection::vec(arb_article(), 0..12)) {
        let merged = MergedContent::merge(registry::list(), articles.clone());
        let statics = registry::list().len();

        prop_assert_eq!(merged.len(), statics + articles.len());
        prop_assert!(merged.entries()[..statics].iter().all(ContentEntity::is_static));
        prop_assert!(merged.entries()[statics..].iter().all(|entry| !entry.is_static()));

        let again = MergedContent::merge(registry::list(), articles);
        prop_assert_eq!(merged, again);
    }

    #[test]
    fn every_merged_slug_can_be_found(articles in prop::collection::vec(arb_article(), 0..12)) {
        let merged = MergedContent::merge(registry::list(), articles.clone());

        for entry in merged.entries() {
            let found = merged.find_by_slug(entry.slug());
            prop_assert!(found.is_some());
            let found = found.unwrap();
            prop_assert_eq!(found.slug(), entry.slug());

            let stored = articles.iter().any(|article| article.slug == entry.slug());
            prop_assert_eq!(found.is_static(), !stored);
        }
    }

    #[test]
    fn created_articles_are_reachable_by_slug(title in arb_title()) {
        prop_assume!(!title.trim().is_empty());

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (server, _app) = common::signed_in_server().await;

            let created: Value = server
                .post("/admin/api/articles")
                .json(&json!({ "title": title, "content": "<p>body</p>" }))
                .await
                .json();
            let slug = created["slug"].as_str().unwrap().to_string();

            let fetched: Value = server.get(&format!("/api/v1/articles/{slug}")).await.json();
            assert_eq!(fetched["id"], created["id"]);
            assert_eq!(fetched["is_static"], false);
        });
    }
}
