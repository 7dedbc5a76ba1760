use thiserror::Error;
use uuid::Uuid;

use crate::{error::HttpError, rules::RuleError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("{0} not found")]
    ReferenceNotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<RuleError> for ServiceError {
    fn from(error: RuleError) -> Self {
        match error {
            RuleError::Forbidden(message) => ServiceError::Forbidden(message.to_string()),
            RuleError::Conflict(message) => ServiceError::Conflict(message.to_string()),
            RuleError::Validation(message) => ServiceError::Validation(message),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::JobNotFound(_)
            | ServiceError::ApplicationNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::NotificationNotFound(_)
            | ServiceError::ReferenceNotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::Forbidden(_) => HttpError::forbidden(error.to_string()),

            ServiceError::Conflict(_) => HttpError::conflict(error.to_string()),

            ServiceError::Validation(_) => HttpError::bad_request(error.to_string()),

            ServiceError::Database(ref e) => {
                tracing::error!("database error: {}", e);
                HttpError::server_error(error.to_string())
            }

            ServiceError::Upstream(ref e) => {
                tracing::error!("upstream error: {}", e);
                HttpError::server_error(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn maps_service_errors_to_status_codes() {
        let cases = vec![
            (ServiceError::JobNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (ServiceError::ReferenceNotFound("Location".into()), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (ServiceError::Conflict("taken".into()), StatusCode::CONFLICT),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(HttpError::from(error).status, status);
        }
    }

    #[test]
    fn rule_errors_keep_their_kind() {
        let error: ServiceError = RuleError::Conflict("Application is already resolved").into();
        assert!(matches!(error, ServiceError::Conflict(ref m) if m == "Application is already resolved"));
    }
}
