use crate::AppState;
use axum::{Router, routing::get};

pub mod admin;
pub mod api;
pub mod web;

async fn health() -> &'static str {
    "OK"
}

/// The admin routes need the state up front for their session middleware.
pub fn create_router<S: AppState>(state: &S) -> Router<S> {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api::create_api_router())
        .nest("/admin", admin::create_admin_router(state))
        .merge(web::create_web_router(state.media_dir()))
}
