use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use capsule_db::StoreError;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    /// The capsule exists but its unlock condition is not met yet.
    #[error("{0}")]
    Locked(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(e) => match e {
                StoreError::Validation(msg) => {
                    debug!("Validation error: {}", msg);
                    (StatusCode::BAD_REQUEST, msg.clone())
                }
                StoreError::NotFound => {
                    debug!("Resource not found");
                    (StatusCode::NOT_FOUND, "Resource not found".to_string())
                }
                StoreError::Permission => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
                StoreError::Conflict(msg) => {
                    debug!("Conflict: {}", msg);
                    (StatusCode::CONFLICT, msg.clone())
                }
                StoreError::Transient(msg) => {
                    warn!("Store unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Storage temporarily unavailable, retry shortly".to_string(),
                    )
                }
                StoreError::Corrupt { .. } | StoreError::Database(_) | StoreError::Internal(_) => {
                    error!("Store error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Locked(msg) => (StatusCode::LOCKED, msg.clone()),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(serde_json::json!({ "error": message }));
        if status == StatusCode::SERVICE_UNAVAILABLE {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", e))
    }
}
