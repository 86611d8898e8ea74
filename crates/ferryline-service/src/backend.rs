//! Connection to the hosted backend and assembly of the application state for
//! whichever backend the configuration selects.

use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Url};
use thiserror::Error;
use tracing::info;

use crate::auth::{AuthProvider, HostedAuth, LocalAuth};
use crate::cache::QueryCache;
use crate::config::Config;
use crate::errors::StoreError;
use crate::mutations::ContentService;
use crate::repositories::{ContentStore, HostedStore, SqliteStore};
use crate::retry::RetryConfig;
use crate::session::SessionContext;
use crate::storage::{HostedStorage, LocalStorage, ObjectStorage};
use crate::DefaultAppState;

/// HTTP access to a hosted backend-as-a-service project.
#[derive(Clone)]
pub struct HostedBackend {
    client: Client,
    base_url: Url,
    api_key: Arc<str>,
}

impl HostedBackend {
    pub fn new(client: Client, base_url: Url, api_key: &str) -> Self {
        Self {
            client,
            base_url: with_trailing_slash(base_url),
            api_key: Arc::from(api_key),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` (no leading slash) against the project URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    /// Starts a request authorized with `token`, or with the project key when
    /// there is no token.
    pub fn request(&self, method: Method, url: Url, token: Option<String>) -> RequestBuilder {
        let bearer = token.unwrap_or_else(|| self.api_key.to_string());
        self.client
            .request(method, url)
            .header("apikey", &*self.api_key)
            .bearer_auth(bearer)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Which backend a `FERRY_BACKEND_URL` selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendUrl {
    Hosted(Url),
    /// Path (or `:memory:`) of a SQLite database.
    Sqlite(String),
}

impl BackendUrl {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if let Some(path) = raw.strip_prefix("sqlite:") {
            let path = path.strip_prefix("//").unwrap_or(path);
            if path.is_empty() {
                return Err("sqlite backend needs a database path".to_string());
            }
            return Ok(BackendUrl::Sqlite(path.to_string()));
        }

        let url = Url::parse(raw).map_err(|err| err.to_string())?;
        match url.scheme() {
            "http" | "https" => Ok(BackendUrl::Hosted(with_trailing_slash(url))),
            scheme => Err(format!("unsupported backend scheme: {scheme}")),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to prepare media directory: {0}")]
    Media(#[from] std::io::Error),

    #[error("configuration selects a different backend")]
    WrongBackend,
}

fn content_service<S: ContentStore>(
    config: &Config,
    store: S,
    storage: Arc<dyn ObjectStorage>,
    session: SessionContext,
) -> ContentService<S> {
    ContentService::new(
        store,
        storage,
        session,
        Arc::new(QueryCache::new(config.cache_ttl)),
        RetryConfig::default().with_max_attempts(config.read_retries),
    )
}

/// State backed by a hosted project: PostgREST tables, object storage and
/// password auth, all behind one base URL.
pub fn hosted_state(config: &Config) -> Result<DefaultAppState<HostedStore>, BackendError> {
    let BackendUrl::Hosted(base_url) = &config.backend else {
        return Err(BackendError::WrongBackend);
    };

    let client = Client::builder().timeout(config.request_timeout).build()?;
    let backend = HostedBackend::new(client, base_url.clone(), &config.backend_key);

    let auth: Arc<dyn AuthProvider> = Arc::new(HostedAuth::new(
        backend.clone(),
        config.session_file.clone(),
    ));
    let session = SessionContext::new(auth);
    let store = HostedStore::new(backend.clone(), session.clone());
    let storage = Arc::new(HostedStorage::new(
        backend,
        config.storage_bucket.clone(),
        session.clone(),
    ));

    info!(base_url = %base_url, bucket = %config.storage_bucket, "Using hosted backend");
    Ok(DefaultAppState::new(content_service(
        config, store, storage, session,
    )))
}

/// Self-hosted state: SQLite tables, images on local disk and a single
/// operator account.
pub fn local_state(config: &Config) -> Result<DefaultAppState<SqliteStore>, BackendError> {
    let BackendUrl::Sqlite(database) = &config.backend else {
        return Err(BackendError::WrongBackend);
    };

    let store = SqliteStore::open(database)?;
    std::fs::create_dir_all(&config.media_dir)?;
    let storage = Arc::new(LocalStorage::new(&config.media_dir));

    let auth: Arc<dyn AuthProvider> = Arc::new(LocalAuth::new(
        &config.admin_email,
        &config.backend_key,
    ));
    let session = SessionContext::new(auth);

    info!(database = %database, media_dir = %config.media_dir.display(), "Using SQLite backend");
    Ok(
        DefaultAppState::new(content_service(config, store, storage, session))
            .with_media_dir(&config.media_dir),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_selects_binding() {
        assert_eq!(
            BackendUrl::parse("sqlite:ferry.db").unwrap(),
            BackendUrl::Sqlite("ferry.db".to_string())
        );
        assert_eq!(
            BackendUrl::parse("sqlite::memory:").unwrap(),
            BackendUrl::Sqlite(":memory:".to_string())
        );

        let hosted = BackendUrl::parse("https://project.example.co").unwrap();
        assert_eq!(
            hosted,
            BackendUrl::Hosted(Url::parse("https://project.example.co/").unwrap())
        );
    }

    #[test]
    fn test_backend_url_rejects_unknown_schemes() {
        assert!(BackendUrl::parse("ftp://files.example.com").is_err());
        assert!(BackendUrl::parse("sqlite:").is_err());
        assert!(BackendUrl::parse("not a url").is_err());
    }

    #[test]
    fn test_endpoints_keep_the_project_path() {
        let backend = HostedBackend::new(
            Client::new(),
            Url::parse("https://gateway.example.com/project").unwrap(),
            "anon-key",
        );

        assert_eq!(
            backend.endpoint("rest/v1/articles").unwrap().as_str(),
            "https://gateway.example.com/project/rest/v1/articles"
        );
    }
}
