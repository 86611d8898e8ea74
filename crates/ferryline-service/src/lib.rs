use std::path::{Path, PathBuf};

use axum::Router;

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod editor;
pub mod errors;
pub mod guard;
pub mod merge;
pub mod models;
pub mod mutations;
pub mod registry;
pub mod repositories;
pub mod retry;
pub mod routes;
pub mod schema;
pub mod session;
pub mod storage;
pub mod validation;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use editor::Editors;
use guard::SessionGuard;
use mutations::ContentService;
use repositories::ContentStore;
use session::SessionContext;

pub trait AppState: Clone + Send + Sync + 'static {
    type Store: ContentStore;

    fn content(&self) -> &ContentService<Self::Store>;
    fn session(&self) -> &SessionContext;
    fn editors(&self) -> &Editors;
    fn guard(&self) -> SessionGuard;
    /// Directory served under `/media`, if images are kept on local disk.
    fn media_dir(&self) -> Option<&Path>;
}

#[derive(Clone)]
pub struct DefaultAppState<S> {
    content: ContentService<S>,
    editors: Editors,
    guard: SessionGuard,
    media_dir: Option<PathBuf>,
}

impl<S: ContentStore> DefaultAppState<S> {
    pub fn new(content: ContentService<S>) -> Self {
        Self {
            content,
            editors: Editors::new(),
            guard: SessionGuard::default(),
            media_dir: None,
        }
    }

    pub fn with_media_dir(mut self, media_dir: impl Into<PathBuf>) -> Self {
        self.media_dir = Some(media_dir.into());
        self
    }
}

impl<S: ContentStore> AppState for DefaultAppState<S> {
    type Store = S;

    fn content(&self) -> &ContentService<S> {
        &self.content
    }

    fn session(&self) -> &SessionContext {
        self.content.session()
    }

    fn editors(&self) -> &Editors {
        &self.editors
    }

    fn guard(&self) -> SessionGuard {
        self.guard
    }

    fn media_dir(&self) -> Option<&Path> {
        self.media_dir.as_deref()
    }
}

pub fn create_app<S: AppState>(state: S) -> Router {
    routes::create_router(&state).with_state(state)
}
