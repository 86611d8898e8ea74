use axum::{
    Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::errors::ApiError;
use crate::models::{Product, Schedule};
use crate::repositories::ListParams;

#[derive(Debug, Default, Deserialize)]
struct ArticlesQuery {
    /// Only stored articles flagged as defaults.
    #[serde(default)]
    defaults: bool,
}

#[instrument(skip_all, fields(defaults = query.defaults))]
async fn list_articles<S: AppState>(
    State(state): State<S>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Response, ApiError> {
    debug!("Processing list articles request");

    let merged = state.content().merged_articles(query.defaults).await?;

    info!(returned_count = merged.len(), "Successfully retrieved articles");
    Ok(Json(merged.views()).into_response())
}

#[instrument(skip_all, fields(slug = %slug))]
async fn get_article<S: AppState>(
    State(state): State<S>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    debug!("Processing get article by slug request");

    let article = state.content().find_article_by_slug(&slug).await?;

    info!(is_static = article.is_static(), "Successfully retrieved article");
    Ok(Json(article.view()).into_response())
}

#[instrument(skip_all)]
async fn list_schedules<S: AppState>(State(state): State<S>) -> Result<Response, ApiError> {
    let schedules = state
        .content()
        .list::<Schedule>(ListParams::newest_first())
        .await?;

    info!(returned_count = schedules.len(), "Successfully retrieved schedules");
    Ok(Json(&*schedules).into_response())
}

#[instrument(skip_all)]
async fn list_products<S: AppState>(State(state): State<S>) -> Result<Response, ApiError> {
    let products = state
        .content()
        .list::<Product>(ListParams::newest_first())
        .await?;

    info!(returned_count = products.len(), "Successfully retrieved products");
    Ok(Json(&*products).into_response())
}

pub fn create_api_v1_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/articles", get(list_articles::<S>))
        .route("/articles/{slug}", get(get_article::<S>))
        .route("/schedules", get(list_schedules::<S>))
        .route("/products", get(list_products::<S>))
}
