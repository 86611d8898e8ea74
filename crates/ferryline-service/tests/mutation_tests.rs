use anyhow::Result;
use bytes::Bytes;
use ferryline_service::errors::{AuthError, ContentError};
use ferryline_service::models::{Article, ArticleInput, Collection, Product, ProductInput, ScheduleInput};
use ferryline_service::repositories::ListParams;
use ferryline_service::storage::ImageUpload;
use ferryline_service::test_helpers::{TestApp, test_utils};

mod common;

use common::at;

fn png(name: &str) -> ImageUpload {
    ImageUpload::new(
        Some(name.to_string()),
        Some("image/png".to_string()),
        Bytes::from_static(b"png"),
    )
}

fn product_input(id: Option<&str>) -> ProductInput {
    ProductInput {
        id: id.map(str::to_string),
        name: Some("Cabin upgrade".to_string()),
        price: Some("1500".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_store() -> Result<()> {
    let app = TestApp::signed_in().await;

    let err = app
        .content()
        .save_schedule(ScheduleInput {
            route: Some("Dhaka - Barishal".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ContentError::Validation(_)));
    assert_eq!(app.store.calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_mutation_without_session_is_refused() -> Result<()> {
    let app = TestApp::restored().await;

    let err = app
        .content()
        .save_article(
            ArticleInput {
                title: Some("Monsoon advisory".to_string()),
                content: Some("<p>Check before travelling</p>".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Auth(AuthError::NoActiveSession)));

    let err = app
        .content()
        .delete(Collection::Products, "p1")
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Auth(AuthError::NoActiveSession)));

    assert_eq!(app.store.calls(), 0);
    assert!(app.storage.paths().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_upload_skips_the_write() -> Result<()> {
    let app = TestApp::signed_in().await;
    app.storage.fail_uploads(true);

    let err = app
        .content()
        .save_product(product_input(None), Some(png("cabin.png")))
        .await
        .unwrap_err();

    assert!(matches!(err, ContentError::Upload(_)));
    assert_eq!(app.store.writes(), 0);
    assert_eq!(test_utils::count_products(&mut app.db.lock()), 0);

    Ok(())
}

#[tokio::test]
async fn test_failed_write_removes_fresh_upload_and_keeps_cache() -> Result<()> {
    let app = TestApp::signed_in().await;
    app.content().list::<Product>(ListParams::newest_first()).await?;
    app.store.fail_writes(true);

    let err = app
        .content()
        .save_product(product_input(None), Some(png("cabin.png")))
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Store(_)));

    let deleted = app.storage.deleted();
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].starts_with("products/"));
    assert!(app.storage.paths().is_empty());

    // The cached listing is still served.
    app.content().list::<Product>(ListParams::newest_first()).await?;
    assert_eq!(app.store.reads(), 1);

    Ok(())
}

#[tokio::test]
async fn test_replaced_image_is_deleted_after_update() -> Result<()> {
    let app = TestApp::signed_in().await;
    let old_url = app.storage.put("products/old.png", b"old");
    test_utils::insert_product(&mut app.db.lock(), "p1", "Meal voucher", &old_url, at(1_700_000_000));

    let saved = app
        .content()
        .save_product(product_input(Some("p1")), Some(png("new.png")))
        .await?;

    assert_ne!(saved.image_url, old_url);
    assert!(!app.storage.contains("products/old.png"));
    assert_eq!(app.storage.paths().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_update_without_new_image_keeps_old_one() -> Result<()> {
    let app = TestApp::signed_in().await;
    let old_url = app.storage.put("products/old.png", b"old");
    test_utils::insert_product(&mut app.db.lock(), "p1", "Meal voucher", &old_url, at(1_700_000_000));

    let saved = app
        .content()
        .save_product(product_input(Some("p1")), None)
        .await?;

    assert_eq!(saved.image_url, old_url);
    assert_eq!(saved.name, "Cabin upgrade");
    assert!(app.storage.contains("products/old.png"));
    assert!(app.storage.deleted().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_old_image_cleanup_does_not_fail_the_save() -> Result<()> {
    let app = TestApp::signed_in().await;
    let old_url = app.storage.put("articles/old.jpg", b"old");
    test_utils::insert_article(
        &mut app.db.lock(),
        "42",
        "welcome",
        "Welcome",
        Some(old_url.as_str()),
        at(1_700_000_000),
    );
    app.storage.fail_deletes(true);

    let saved = app
        .content()
        .save_article(
            ArticleInput {
                id: Some("42".to_string()),
                ..Default::default()
            },
            Some(png("cover.png")),
        )
        .await?;

    assert_eq!(saved.slug, "welcome");
    assert_eq!(app.storage.deleted(), vec!["articles/old.jpg".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_update_of_missing_record_is_not_found() -> Result<()> {
    let app = TestApp::signed_in().await;

    let err = app
        .content()
        .save_schedule(ScheduleInput {
            id: Some("nope".to_string()),
            notes: Some("Delayed".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ContentError::NotFound { collection: Collection::Schedules, ref id } if id == "nope"
    ));
    assert_eq!(app.store.writes(), 0);

    Ok(())
}

#[tokio::test]
async fn test_delete_of_missing_record_leaves_cache_alone() -> Result<()> {
    let app = TestApp::signed_in().await;
    app.content().list::<Article>(ListParams::newest_first()).await?;
    let reads = app.store.reads();

    let err = app
        .content()
        .delete(Collection::Articles, "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::NotFound { .. }));
    assert_eq!(app.store.writes(), 0);

    let reads_after_delete = app.store.reads();
    app.content().list::<Article>(ListParams::newest_first()).await?;
    assert_eq!(app.store.reads(), reads_after_delete);
    assert_eq!(reads_after_delete, reads + 1);

    Ok(())
}

#[tokio::test]
async fn test_successful_save_invalidates_only_its_collection() -> Result<()> {
    let app = TestApp::signed_in().await;
    let content = app.content();
    content.list::<Article>(ListParams::newest_first()).await?;
    content.list::<Product>(ListParams::newest_first()).await?;
    assert_eq!(app.store.reads(), 2);

    content
        .save_schedule(ScheduleInput {
            ship_name: Some("MV Sundarban".to_string()),
            route: Some("Dhaka - Barishal".to_string()),
            ..Default::default()
        })
        .await?;
    content.list::<Article>(ListParams::newest_first()).await?;
    assert_eq!(app.store.reads(), 2);

    content
        .save_article(
            ArticleInput {
                title: Some("Monsoon advisory".to_string()),
                content: Some("<p>Check before travelling</p>".to_string()),
                ..Default::default()
            },
            None,
        )
        .await?;
    let articles = content.list::<Article>(ListParams::newest_first()).await?;
    assert_eq!(app.store.reads(), 3);
    assert_eq!(articles.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_deleted_record_disappears_from_listing() -> Result<()> {
    let app = TestApp::signed_in().await;
    test_utils::insert_article(&mut app.db.lock(), "1", "ferry-news-1", "Ferry news", None, at(1_700_000_000));
    let content = app.content();

    let slug = content.find_article_by_slug("ferry-news-1").await?;
    assert!(!slug.is_static());

    content.delete(Collection::Articles, "1").await?;

    let err = content.find_article_by_slug("ferry-news-1").await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound { .. }));
    assert_eq!(test_utils::count_articles(&mut app.db.lock()), 0);

    Ok(())
}

#[tokio::test]
async fn test_schedules_are_written_in_order() -> Result<()> {
    let app = TestApp::signed_in().await;

    for route in ["Dhaka - Barishal", "Dhaka - Bhola"] {
        app.content()
            .save_schedule(ScheduleInput {
                ship_name: Some("MV Sundarban".to_string()),
                route: Some(route.to_string()),
                ..Default::default()
            })
            .await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert_eq!(
        test_utils::get_schedule_routes(&mut app.db.lock()),
        vec!["Dhaka - Barishal", "Dhaka - Bhola"]
    );

    Ok(())
}
