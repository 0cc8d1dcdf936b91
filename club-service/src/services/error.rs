use service_core::error::AppError;
use thiserror::Error;

/// Failures of the session token codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed")]
    Malformed,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("Identity provider did not return required claims")]
    IncompleteIdentity,

    #[error("Invalid or expired login state")]
    StateMismatch,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot change role of admin user")]
    AdminLocked,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),
}

impl From<TokenError> for ServiceError {
    fn from(_: TokenError) -> Self {
        ServiceError::Unauthorized
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::ProviderError(detail) => {
                // Provider text stays in the logs.
                tracing::warn!(detail = %detail, "Identity provider failure");
                AppError::BadRequest(anyhow::anyhow!(
                    "Authentication with the identity provider failed"
                ))
            }
            e @ (ServiceError::IncompleteIdentity
            | ServiceError::StateMismatch
            | ServiceError::EmailAlreadyExists
            | ServiceError::Validation(_)) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::InvalidCredentials | ServiceError::Unauthorized) => {
                AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
            }
            e @ (ServiceError::Forbidden(_) | ServiceError::AdminLocked) => {
                AppError::Forbidden(anyhow::anyhow!(e.to_string()))
            }
            e @ ServiceError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
        }
    }
}

impl ServiceError {
    /// Message safe to hand back to a browser in a redirect query string.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                "Internal server error".to_string()
            }
            ServiceError::ProviderError(_) => {
                "Authentication with the identity provider failed".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(status_of(ServiceError::ProviderError("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ServiceError::IncompleteIdentity), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ServiceError::StateMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ServiceError::EmailAlreadyExists), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ServiceError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ServiceError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ServiceError::Forbidden("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ServiceError::AdminLocked), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ServiceError::NotFound("Event")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServiceError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_errors_collapse_to_unauthorized() {
        for e in [TokenError::InvalidSignature, TokenError::Expired, TokenError::Malformed] {
            assert!(matches!(ServiceError::from(e), ServiceError::Unauthorized));
        }
    }

    #[test]
    fn public_message_hides_internals() {
        let err = ServiceError::ProviderError("token endpoint said: invalid_client".into());
        assert!(!err.public_message().contains("invalid_client"));

        let err = ServiceError::Internal(anyhow::anyhow!("mongodb://user:pw@host"));
        assert_eq!(err.public_message(), "Internal server error");
    }
}
