use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use pantry_claims::ClaimError;
use pantry_types::api::ErrorResponse;

/// Handler error: either a core outcome carrying a reason, or a bare status.
#[derive(Debug)]
pub enum ApiError {
    Claim(ClaimError),
    Status(StatusCode),
}

impl From<ClaimError> for ApiError {
    fn from(e: ClaimError) -> Self {
        Self::Claim(e)
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        Self::Status(status)
    }
}

pub fn status_for(e: &ClaimError) -> StatusCode {
    match e {
        ClaimError::NotFound(_) => StatusCode::NOT_FOUND,
        ClaimError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        ClaimError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ClaimError::InvalidStateTransition(_) | ClaimError::ConcurrentClaimDetected { .. } => {
            StatusCode::CONFLICT
        }
        ClaimError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Status(status) => status.into_response(),
            Self::Claim(e) => {
                if let ClaimError::StorageFailure(inner) = &e {
                    error!("Storage failure: {:#}", inner);
                }
                let body = ErrorResponse {
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                };
                (status_for(&e), Json(body)).into_response()
            }
        }
    }
}

/// Run blocking store work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ClaimError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)
        })?
        .map_err(ApiError::from)
}
