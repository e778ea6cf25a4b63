// web-server/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use common::models::ErrorBody;
use common::{AppError, HandoffFailure};
use thiserror::Error;

/// `AppError` rendered as a JSON HTTP response
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl ApiError {
    pub fn inner(&self) -> &AppError {
        &self.0
    }
}

impl From<actix_web::error::PayloadError> for ApiError {
    fn from(e: actix_web::error::PayloadError) -> Self {
        ApiError(AppError::Internal(format!("failed reading request body: {}", e)))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::BackendRequestFailed { status: Some(s), .. } if (400..500).contains(s) => {
                StatusCode::from_u16(*s).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::BackendRequestFailed { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::ExtensionHandoffFailed(HandoffFailure::TimedOut) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ExtensionHandoffFailed(HandoffFailure::Rejected(_)) => StatusCode::BAD_GATEWAY,
            AppError::TokenUnavailable | AppError::Protocol(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match &self.0 {
            AppError::Protocol(_) | AppError::Internal(_) => {
                tracing::error!("Request failed: {}", self.0);
                "Internal server error".to_string()
            }
            AppError::Http(e) => {
                tracing::error!("Backend unreachable: {}", e);
                "Backend unavailable".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody { error })
    }
}
