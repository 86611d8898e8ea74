use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{AuthProvider, Session, SessionUser};
use crate::errors::AuthError;

const SESSION_LIFETIME_HOURS: i64 = 12;

/// Single operator account for the self-hosted backend. Sessions live only
/// in memory, so nothing survives a restart.
pub struct LocalAuth {
    email: String,
    password: String,
}

impl LocalAuth {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(None)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.trim().to_lowercase() != self.email || password != self.password {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS)),
            user: SessionUser {
                id: format!("local:{}", self.email),
                email: Some(self.email.clone()),
            },
        })
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_checks_both_credentials() {
        let auth = LocalAuth::new("Ops@Ferryline.test", "secret");

        let session = auth.sign_in("ops@ferryline.test ", "secret").await.unwrap();
        assert_eq!(session.user_id(), "local:ops@ferryline.test");
        assert!(!session.is_expired_at(Utc::now()));

        assert_eq!(
            auth.sign_in("ops@ferryline.test", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            auth.sign_in("someone@else.test", "secret").await,
            Err(AuthError::InvalidCredentials)
        );
    }
}
