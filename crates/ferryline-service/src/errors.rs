use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::editor::EditorError;
use crate::models::Collection;
use crate::validation::ValidationError;

/// Failure talking to the content store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request to content store failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("content store responded with {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("database error: {0}")]
    Database(#[source] DieselError),

    /// A write collided with a unique key already held by another row.
    #[error("conflicting record: {0}")]
    Conflict(String),

    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("unexpected content store response: {0}")]
    Decode(String),

    #[error("invalid content store endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("record not found")]
    NotFound,
}

impl StoreError {
    /// Whether a read that failed this way may be attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(err) => !err.is_decode() && !err.is_builder(),
            StoreError::Backend { status, .. } => *status >= 500 || *status == 429,
            StoreError::Connection(_) => true,
            StoreError::Database(_)
            | StoreError::Conflict(_)
            | StoreError::Decode(_)
            | StoreError::InvalidEndpoint(_)
            | StoreError::NotFound => false,
        }
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no active session")]
    NoActiveSession,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("authentication provider error: {0}")]
    Provider(String),
}

/// Failure transferring or removing a stored image.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("request to object storage failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("object storage responded with {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("object not found")]
    NotFound,
}

/// Everything a content read or mutation can fail with.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("image upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("content store error: {0}")]
    Store(StoreError),

    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("{0}")]
    Conflict(String),
}

impl ContentError {
    /// Maps a store failure for a specific record, turning a missing row into
    /// [`ContentError::NotFound`].
    pub fn for_record(err: StoreError, collection: Collection, id: &str) -> Self {
        match err {
            StoreError::NotFound => ContentError::NotFound {
                collection,
                id: id.to_string(),
            },
            other => other.into(),
        }
    }

    /// Maps a failed insert (no `id`) or update.
    pub fn for_write(err: StoreError, collection: Collection, id: Option<&str>) -> Self {
        match id {
            Some(id) => Self::for_record(err, collection, id),
            None => err.into(),
        }
    }
}

impl From<StoreError> for ContentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => {
                debug!(%detail, "Unique key conflict");
                ContentError::Conflict("slug already in use".to_string())
            }
            other => ContentError::Store(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Content(err.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Content(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Editor(err) => (StatusCode::CONFLICT, err.to_string()),
            ApiError::Content(err) => match err {
                ContentError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                ContentError::Auth(AuthError::Provider(_)) => {
                    error!(error = %err, "Authentication provider error");
                    (StatusCode::BAD_GATEWAY, err.to_string())
                }
                ContentError::Auth(_) => (StatusCode::UNAUTHORIZED, err.to_string()),
                ContentError::Upload(inner) => {
                    error!(error = %inner, "Image upload failed");
                    (StatusCode::BAD_GATEWAY, "Image upload failed".to_string())
                }
                ContentError::Store(inner) => {
                    // Log the detailed error but don't expose it to the client
                    error!(error = %inner, "Content store error occurred");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Content store unavailable, please try again".to_string(),
                    )
                }
                ContentError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
                ContentError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
            },
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_transient_only_for_server_failures() {
        let unavailable = StoreError::Backend {
            status: 503,
            message: "upstream".to_string(),
        };
        let rejected = StoreError::Backend {
            status: 400,
            message: "bad filter".to_string(),
        };

        assert!(unavailable.is_transient());
        assert!(!rejected.is_transient());
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::Conflict("slug".to_string()).is_transient());
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let err = StoreError::from(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("UNIQUE constraint failed: articles.slug".to_string()),
        ));
        assert!(matches!(err, StoreError::Conflict(ref detail) if detail.contains("articles.slug")));

        let content = ContentError::for_write(err, Collection::Articles, Some("42"));
        assert!(matches!(content, ContentError::Conflict(_)));
        assert_eq!(content.to_string(), "slug already in use");

        let other = StoreError::from(DieselError::NotFound);
        assert!(matches!(other, StoreError::Database(_)));
    }

    #[test]
    fn test_missing_record_maps_to_not_found() {
        let err = ContentError::for_record(StoreError::NotFound, Collection::Articles, "42");
        assert!(matches!(
            err,
            ContentError::NotFound { collection: Collection::Articles, ref id } if id == "42"
        ));
        assert_eq!(err.to_string(), "articles record 42 not found");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::from(ValidationError::MissingField("title")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(AuthError::NoActiveSession),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Editor(EditorError::SubmissionInProgress),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Content(ContentError::Store(StoreError::Decode("x".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Content(ContentError::Conflict("slug already in use".into())),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
