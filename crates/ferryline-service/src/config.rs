use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::backend::BackendUrl;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Service settings read from `FERRY_*` environment variables.
///
/// Deliberately not `Debug`: it holds the backend key.
#[derive(Clone)]
pub struct Config {
    pub backend: BackendUrl,
    pub backend_key: String,
    pub bind_address: String,
    pub storage_bucket: String,
    pub media_dir: PathBuf,
    pub cache_ttl: Duration,
    pub read_retries: u32,
    pub request_timeout: Duration,
    pub admin_email: String,
    pub session_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend_url = var("FERRY_BACKEND_URL").ok_or(ConfigError::Missing("FERRY_BACKEND_URL"))?;
        let backend = BackendUrl::parse(backend_url.trim()).map_err(|message| ConfigError::Invalid {
            key: "FERRY_BACKEND_URL",
            message,
        })?;
        let backend_key = var("FERRY_BACKEND_KEY").ok_or(ConfigError::Missing("FERRY_BACKEND_KEY"))?;

        Ok(Self {
            backend,
            backend_key,
            bind_address: or_default(&var, "FERRY_BIND_ADDRESS", "0.0.0.0:3000"),
            storage_bucket: or_default(&var, "FERRY_STORAGE_BUCKET", "images"),
            media_dir: PathBuf::from(or_default(&var, "FERRY_MEDIA_DIR", "./media")),
            cache_ttl: Duration::from_secs(parsed(&var, "FERRY_CACHE_TTL_SECS", 300)?),
            read_retries: parsed(&var, "FERRY_READ_RETRIES", 3)?,
            request_timeout: Duration::from_secs(parsed(&var, "FERRY_REQUEST_TIMEOUT_SECS", 15)?),
            admin_email: or_default(&var, "FERRY_ADMIN_EMAIL", "admin@localhost"),
            session_file: var("FERRY_SESSION_FILE").map(PathBuf::from),
        })
    }
}

fn or_default(var: &impl Fn(&str) -> Option<String>, key: &'static str, default: &str) -> String {
    var(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            message: err.to_string(),
        }),
        None => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
