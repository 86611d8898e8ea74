//! Gate in front of the admin API.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::AppState;
use crate::session::SessionStatus;

pub const LOGIN_PATH: &str = "/admin/login";

/// Seconds a client should wait while the session is still being restored.
const RETRY_AFTER_SECS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
    /// Session state not known yet. Neither allow nor redirect.
    Pending,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionGuard {
    login_path: &'static str,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH,
        }
    }
}

impl SessionGuard {
    pub fn authorize(&self, status: &SessionStatus) -> GuardDecision {
        match status {
            SessionStatus::Loading => GuardDecision::Pending,
            SessionStatus::Ready(Some(session)) if !session.is_expired_at(chrono::Utc::now()) => {
                GuardDecision::Allow
            }
            SessionStatus::Ready(_) => GuardDecision::Redirect(self.login_path),
        }
    }
}

/// Middleware applying [`SessionGuard`] to every request of the wrapped
/// routes.
pub async fn require_session<S: AppState>(
    State(state): State<S>,
    request: Request,
    next: Next,
) -> Response {
    let status = state.session().status();

    match state.guard().authorize(&status) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(to) => {
            debug!(path = %request.uri().path(), "No session, redirecting to login");
            Redirect::to(to).into_response()
        }
        GuardDecision::Pending => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS))],
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Session, SessionUser};
    use chrono::{Duration, Utc};

    fn session(expires_in: Duration) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + expires_in),
            user: SessionUser {
                id: "user-1".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn test_loading_is_pending() {
        let guard = SessionGuard::default();
        assert_eq!(guard.authorize(&SessionStatus::Loading), GuardDecision::Pending);
    }

    #[test]
    fn test_resolved_absent_redirects_to_login() {
        let guard = SessionGuard::default();
        assert_eq!(
            guard.authorize(&SessionStatus::Ready(None)),
            GuardDecision::Redirect("/admin/login")
        );
    }

    #[test]
    fn test_live_session_is_allowed_and_expired_is_not() {
        let guard = SessionGuard::default();
        assert_eq!(
            guard.authorize(&SessionStatus::Ready(Some(session(Duration::hours(1))))),
            GuardDecision::Allow
        );
        assert_eq!(
            guard.authorize(&SessionStatus::Ready(Some(session(Duration::hours(-1))))),
            GuardDecision::Redirect(LOGIN_PATH)
        );
    }
}
