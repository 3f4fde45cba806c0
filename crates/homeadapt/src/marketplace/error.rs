use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::store::StoreError;

/// Error taxonomy surfaced at the request boundary. Every variant carries a
/// stable kind plus a human-readable message; none of them crash the process.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("missing or invalid session identity")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("external service failure: {0}")]
    ExternalService(String),
    #[error("webhook signature invalid")]
    SignatureInvalid,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MarketError {
    pub const fn kind(&self) -> &'static str {
        match self {
            MarketError::Unauthorized => "unauthorized",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::NotFound(_) => "not_found",
            MarketError::Validation(_) => "validation",
            MarketError::Conflict(_) => "conflict",
            MarketError::ExternalService(_) => "external_service_failure",
            MarketError::SignatureInvalid => "signature_invalid",
            MarketError::Store(_) => "store",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            MarketError::Unauthorized => StatusCode::UNAUTHORIZED,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketError::Conflict(_) => StatusCode::CONFLICT,
            MarketError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            MarketError::SignatureInvalid => StatusCode::BAD_REQUEST,
            MarketError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            MarketError::Store(err) => {
                tracing::error!("store failure: {err}");
            }
            MarketError::ExternalService(msg) => {
                tracing::error!("external service failure: {msg}");
            }
            MarketError::SignatureInvalid => {
                tracing::warn!("rejected webhook delivery with invalid signature");
            }
            _ => {}
        }

        let body = Json(json!({
            "kind": self.kind(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(MarketError::Unauthorized.kind(), "unauthorized");
        assert_eq!(
            MarketError::Conflict("already purchased".to_string()).kind(),
            "conflict"
        );
        assert_eq!(MarketError::SignatureInvalid.kind(), "signature_invalid");
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            MarketError::Forbidden("not matched".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(MarketError::NotFound("lead").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            MarketError::Validation("empty breakdown".to_string()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(MarketError::SignatureInvalid.status(), StatusCode::BAD_REQUEST);
    }
}
