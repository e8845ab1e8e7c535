use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

use crate::generation::backends::BackendError;
use crate::ipfs::StoreError;
use crate::registry::StorageError;

/// Request-level failure taxonomy.
///
/// `Unauthorized` means no valid identity; `Forbidden` means a valid
/// identity with insufficient privilege. Nothing here is fatal to the
/// process; every request fails independently.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidFormat(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("wallet address already has an active instance")]
    AlreadyRegistered,
    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("inference backend timed out")]
    BackendTimeout,
    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("content store timed out")]
    StoreTimeout,
    #[error("no object for content id {0}")]
    StoreNotFound(String),
    #[error("registry storage degraded: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl actix_web::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) | GatewayError::StoreNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AlreadyRegistered => StatusCode::CONFLICT,
            GatewayError::BackendUnavailable(_) | GatewayError::StoreUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::BackendTimeout | GatewayError::StoreTimeout => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => GatewayError::StoreUnavailable(msg),
            StoreError::Timeout => GatewayError::StoreTimeout,
            StoreError::NotFound(content_id) => GatewayError::StoreNotFound(content_id),
            StoreError::InvalidResponse(msg) => GatewayError::StoreUnavailable(msg),
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => GatewayError::BackendUnavailable(msg),
            BackendError::Timeout => GatewayError::BackendTimeout,
        }
    }
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        GatewayError::ServiceUnavailable(err.to_string())
    }
}
