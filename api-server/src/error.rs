use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use share_queue::ShareQueueError;
use shared::messages::ErrorResponse;
use thiserror::Error;

/// Failures surfaced by the HTTP façade, each with a stable code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
    #[error("Missing required fields: cookie, link and limit are required")]
    MissingFields,
    #[error("Limit must be a positive integer")]
    InvalidLimit,
    #[error("Limit exceeds the maximum of {0}")]
    LimitTooHigh(u32),
    #[error("Link must be an absolute http or https URL")]
    InvalidLink,
    #[error("Cookie must be a list of name=value pairs separated by ';'")]
    InvalidCookie,
    #[error("Invalid share id")]
    InvalidId,
    #[error("Share not found")]
    ShareNotFound,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Server is shutting down")]
    ShuttingDown,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidBody(_) => "INVALID_BODY",
            ApiError::InvalidQuery(_) => "INVALID_QUERY",
            ApiError::MissingFields => "MISSING_FIELDS",
            ApiError::InvalidLimit => "INVALID_LIMIT",
            ApiError::LimitTooHigh(_) => "LIMIT_TOO_HIGH",
            ApiError::InvalidLink => "INVALID_LINK",
            ApiError::InvalidCookie => "INVALID_COOKIE",
            ApiError::InvalidId => "INVALID_ID",
            ApiError::ShareNotFound => "SHARE_NOT_FOUND",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::ShuttingDown => "SHUTTING_DOWN",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody(_)
            | ApiError::InvalidQuery(_)
            | ApiError::MissingFields
            | ApiError::InvalidLimit
            | ApiError::LimitTooHigh(_)
            | ApiError::InvalidLink
            | ApiError::InvalidCookie
            | ApiError::InvalidId => StatusCode::BAD_REQUEST,
            ApiError::ShareNotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ShareQueueError> for ApiError {
    fn from(err: ShareQueueError) -> Self {
        match err {
            ShareQueueError::ShareNotFound(_) => ApiError::ShareNotFound,
            ShareQueueError::ShuttingDown => ApiError::ShuttingDown,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: false,
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
