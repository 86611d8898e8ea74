use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;

/// Serves locally stored images under `/media` when the backend keeps them on
/// disk. Hosted storage hands out its own public URLs.
pub fn create_web_router<S>(media_dir: Option<&Path>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match media_dir {
        Some(dir) => Router::new().nest_service("/media", ServeDir::new(dir)),
        None => Router::new(),
    }
}
