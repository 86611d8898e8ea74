use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{AuthProvider, Session, SessionUser};
use crate::backend::HostedBackend;
use crate::errors::AuthError;

/// Password auth against the hosted project's `auth/v1` endpoints.
///
/// With a session file configured, the session is written there on sign-in
/// and read back on the next start, so a restart does not log the operator
/// out.
pub struct HostedAuth {
    backend: HostedBackend,
    session_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0),
            (None, Some(seconds)) => Some(now + Duration::seconds(seconds)),
            (None, None) => None,
        };

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

fn provider_error(err: impl std::fmt::Display) -> AuthError {
    AuthError::Provider(err.to_string())
}

impl HostedAuth {
    pub fn new(backend: HostedBackend, session_file: Option<PathBuf>) -> Self {
        Self {
            backend,
            session_file,
        }
    }

    async fn persist(&self, session: &Session) {
        let Some(path) = &self.session_file else {
            return;
        };

        let result = match serde_json::to_vec(session) {
            Ok(bytes) => tokio::fs::write(path, bytes).await,
            Err(err) => Err(std::io::Error::other(err)),
        };
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "Failed to persist session");
        }
    }

    async fn forget(&self) {
        let Some(path) = &self.session_file else {
            return;
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove session file"),
        }
    }
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(path) = &self.session_file else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(provider_error(err)),
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => {
                debug!(user_id = %session.user.id, "Restored persisted session");
                Ok(Some(session))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = self
            .backend
            .endpoint("auth/v1/token?grant_type=password")
            .map_err(provider_error)?;

        let response = self
            .backend
            .request(Method::POST, url, None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(provider_error)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!("{status}: {message}")));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(provider_error)?;
        let session = token.into_session(Utc::now());

        self.persist(&session).await;
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.forget().await;

        let url = self
            .backend
            .endpoint("auth/v1/logout")
            .map_err(provider_error)?;
        let response = self
            .backend
            .request(Method::POST, url, Some(session.access_token.clone()))
            .send()
            .await
            .map_err(provider_error)?;

        let status = response.status();
        // An already revoked token is as good as a successful logout.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(AuthError::Provider(format!("logout failed with {status}")))
    }
}
