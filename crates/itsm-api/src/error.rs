use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use itsm_types::api::ErrorBody;

/// Everything an operation can fail with. Storage and other unexpected
/// failures collapse into `Internal`, which is logged and never shown.
#[derive(Debug, Error)]
pub enum ItsmError {
    #[error("invalid login or password")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ItsmError>;

impl ItsmError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::DuplicateUsername => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "server error, please try again later".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ItsmError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Request failed: {:#}", e);
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ItsmError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ItsmError::DuplicateUsername.status(), StatusCode::CONFLICT);
        assert_eq!(ItsmError::NotFound("incident").status(), StatusCode::NOT_FOUND);
        assert_eq!(ItsmError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ItsmError::validation("x").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_details_stay_private() {
        let err = ItsmError::from(anyhow::anyhow!("disk I/O error at /var/lib/itsm.db"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("/var/lib"));
        assert_eq!(ItsmError::NotFound("service").public_message(), "service not found");
    }
}
