use anyhow::Result;
use axum::http::StatusCode;
use ferryline_service::registry;
use ferryline_service::test_helpers::{TestApp, test_utils};
use serde_json::Value;

mod common;

use common::{at, create_test_server};

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = TestApp::new();
    let server = create_test_server(&app);

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");

    Ok(())
}

#[tokio::test]
async fn test_articles_with_empty_store_are_the_bundled_ones() -> Result<()> {
    let app = TestApp::new();
    let server = create_test_server(&app);

    let response = server.get("/api/v1/articles").await;
    response.assert_status_ok();

    let articles: Vec<Value> = response.json();
    assert_eq!(articles.len(), registry::list().len());
    for (article, bundled) in articles.iter().zip(registry::list()) {
        assert_eq!(article["slug"], bundled.slug);
        assert_eq!(article["is_static"], true);
    }

    Ok(())
}

#[tokio::test]
async fn test_stored_articles_follow_bundled_ones_newest_first() -> Result<()> {
    let app = TestApp::new();
    {
        let mut conn = app.db.lock();
        test_utils::insert_article(&mut conn, "1", "older-news-1", "Older", None, at(1_710_000_000));
        test_utils::insert_article(&mut conn, "2", "newer-news-2", "Newer", None, at(1_720_000_000));
    }
    let server = create_test_server(&app);

    let articles: Vec<Value> = server.get("/api/v1/articles").await.json();
    let statics = registry::list().len();

    assert_eq!(articles.len(), statics + 2);
    assert_eq!(articles[statics]["slug"], "newer-news-2");
    assert_eq!(articles[statics]["is_static"], false);
    assert_eq!(articles[statics]["id"], "2");
    assert_eq!(articles[statics + 1]["slug"], "older-news-1");

    Ok(())
}

#[tokio::test]
async fn test_get_article_by_slug() -> Result<()> {
    let app = TestApp::new();
    {
        let mut conn = app.db.lock();
        test_utils::insert_article(&mut conn, "7", "ferry-news", "Ferry news", None, at(1_720_000_000));
    }
    let server = create_test_server(&app);

    let stored: Value = server.get("/api/v1/articles/ferry-news").await.json();
    assert_eq!(stored["title"], "Ferry news");
    assert_eq!(stored["is_static"], false);

    let bundled_slug = registry::list()[0].slug;
    let bundled: Value = server
        .get(&format!("/api/v1/articles/{bundled_slug}"))
        .await
        .json();
    assert_eq!(bundled["title"], registry::list()[0].title);
    assert_eq!(bundled["is_static"], true);

    Ok(())
}

#[tokio::test]
async fn test_unknown_slug_is_not_found() -> Result<()> {
    let app = TestApp::new();
    let server = create_test_server(&app);

    let response = server.get("/api/v1/articles/no-such-article").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("no-such-article"));

    Ok(())
}

#[tokio::test]
async fn test_slug_lookup_is_case_sensitive() -> Result<()> {
    let app = TestApp::new();
    let server = create_test_server(&app);

    let upper = registry::list()[0].slug.to_uppercase();
    server
        .get(&format!("/api/v1/articles/{upper}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_products_are_listed_newest_first() -> Result<()> {
    let app = TestApp::new();
    {
        let mut conn = app.db.lock();
        test_utils::insert_product(&mut conn, "p1", "Cabin upgrade", "/media/a.png", at(1_700_000_000));
        test_utils::insert_product(&mut conn, "p2", "Meal voucher", "/media/b.png", at(1_710_000_000));
    }
    let server = create_test_server(&app);

    let products: Vec<Value> = server.get("/api/v1/products").await.json();
    let names: Vec<_> = products.iter().map(|p| p["name"].clone()).collect();
    assert_eq!(names, vec!["Meal voucher", "Cabin upgrade"]);

    Ok(())
}

#[tokio::test]
async fn test_public_listings_are_cached() -> Result<()> {
    let app = TestApp::new();
    let server = create_test_server(&app);

    server.get("/api/v1/schedules").await.assert_status_ok();
    server.get("/api/v1/schedules").await.assert_status_ok();

    assert_eq!(app.store.reads(), 1);
    assert_eq!(app.content().cache_stats().hits, 1);

    Ok(())
}

#[tokio::test]
async fn test_transient_read_failures_are_retried() -> Result<()> {
    let app = TestApp::new();
    app.store.fail_next_reads(2);
    let server = create_test_server(&app);

    server.get("/api/v1/products").await.assert_status_ok();
    assert_eq!(app.store.reads(), 3);

    Ok(())
}

#[tokio::test]
async fn test_persistent_read_failures_surface() -> Result<()> {
    let app = TestApp::new();
    app.store.fail_next_reads(10);
    let server = create_test_server(&app);

    let response = server.get("/api/v1/products").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.reads(), 3);

    Ok(())
}

#[tokio::test]
async fn test_defaults_filter_keeps_only_flagged_articles() -> Result<()> {
    let app = TestApp::new();
    {
        let mut conn = app.db.lock();
        test_utils::insert_article(&mut conn, "1", "regular-1", "Regular", None, at(1_710_000_000));
    }
    let server = create_test_server(&app);

    let articles: Vec<Value> = server.get("/api/v1/articles?defaults=true").await.json();
    assert_eq!(articles.len(), registry::list().len());
    assert!(articles.iter().all(|article| article["is_static"] == true));

    Ok(())
}
