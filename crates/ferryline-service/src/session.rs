//! Process-wide operator session.
//!
//! The status starts as [`SessionStatus::Loading`] and becomes
//! [`SessionStatus::Ready`] once the provider has been asked for a persisted
//! session. Login and logout replace it; every mutation reads it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::auth::{AuthProvider, Session};
use crate::errors::AuthError;

/// How long a mutation waits for the initial restore before giving up.
const RESTORE_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Ready(Option<Session>),
}

impl SessionStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionStatus::Loading)
    }
}

#[derive(Clone)]
pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Loading);
        Self {
            provider,
            status: Arc::new(status),
        }
    }

    /// Asks the provider for a persisted session. Provider failures count
    /// as "no session" so the status always resolves. Only a still-loading
    /// status is replaced.
    #[instrument(skip_all)]
    pub async fn restore(&self) {
        let restored = match self.provider.get_session().await {
            Ok(session) => session.filter(|session| !session.is_expired_at(Utc::now())),
            Err(err) => {
                warn!(error = %err, "Session restore failed");
                None
            }
        };

        // A login (or logout) that finished while the provider was being
        // asked wins over the restored value.
        let signed_in = restored.is_some();
        let applied = self.status.send_if_modified(|status| {
            if !status.is_loading() {
                return false;
            }
            *status = SessionStatus::Ready(restored);
            true
        });

        if applied {
            info!(signed_in, "Session restored");
        } else {
            debug!("Session already resolved, discarding restored value");
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// The live session, treating an expired one as absent.
    pub fn current(&self) -> Option<Session> {
        match &*self.status.borrow() {
            SessionStatus::Ready(Some(session)) if !session.is_expired_at(Utc::now()) => {
                Some(session.clone())
            }
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.current().map(|session| session.access_token)
    }

    /// The session a mutation is performed as. Waits for the initial restore
    /// if it is still running.
    pub async fn actor(&self) -> Result<Session, AuthError> {
        let mut status = self.subscribe();
        let resolved = tokio::time::timeout(
            RESTORE_WAIT,
            status.wait_for(|status| !status.is_loading()),
        )
        .await
        .is_ok_and(|changed| changed.is_ok());

        if !resolved {
            return Err(AuthError::NoActiveSession);
        }
        self.current().ok_or(AuthError::NoActiveSession)
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.provider.sign_in(email, password).await?;
        info!(user_id = %session.user.id, "Operator signed in");
        self.status
            .send_replace(SessionStatus::Ready(Some(session.clone())));
        Ok(session)
    }

    /// Clears the local session. A provider failure is logged; the operator
    /// is signed out locally either way.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) {
        let previous = self.status.send_replace(SessionStatus::Ready(None));

        if let SessionStatus::Ready(Some(session)) = previous {
            if let Err(err) = self.provider.sign_out(&session).await {
                warn!(error = %err, "Provider sign-out failed");
            }
            info!(user_id = %session.user.id, "Operator signed out");
        }
    }
}
