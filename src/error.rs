use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::automation::AutomationError;
use crate::payload::HandoffError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("No site profile for {0}")]
    ProfileNotFound(String),

    #[error("No fresh payload under {0}")]
    PayloadNotFound(String),

    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<HandoffError> for AppError {
    fn from(e: HandoffError) -> Self {
        match e {
            HandoffError::NoEntryUrl(_) | HandoffError::InvalidUrl(_) => {
                AppError::ValidationError(e.to_string())
            }
            HandoffError::Encode(_) => AppError::Internal(e.into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::PageNotFound(_)
            | AppError::ProfileNotFound(_)
            | AppError::PayloadNotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::Automation(AutomationError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Automation Unavailable")
            }
            AppError::Automation(_) => (StatusCode::BAD_GATEWAY, "Automation Error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::PageNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::ValidationError("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AutomationError::NotConfigured)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(HandoffError::NoEntryUrl("a.test".into()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
