//! HTTP-facing error taxonomy.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::repo::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Authentication(String),

    #[error("Not authorized, no token")]
    MissingToken,

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(vec![msg.into()])
    }

    /// The one message every credential or token failure gets.
    pub fn invalid_credentials() -> Self {
        AppError::Authentication("Invalid credentials".into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) | AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => {
                AppError::Conflict("A user with this email is already registered".into())
            }
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Validation(errors) => ErrorBody {
                success: false,
                message: "Invalid input".into(),
                errors: Some(errors),
            },
            AppError::Internal(ref e) => {
                error!(error = ?e, "internal error");
                // Detailed messages in debug builds, generic otherwise
                let message = if cfg!(debug_assertions) {
                    self.to_string()
                } else {
                    "Internal server error".to_string()
                };
                ErrorBody {
                    success: false,
                    message,
                    errors: None,
                }
            }
            other => ErrorBody {
                success: false,
                message: other.to_string(),
                errors: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::invalid_credentials().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_map_to_conflict_and_internal() {
        assert!(matches!(
            AppError::from(StoreError::DuplicateEmail),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::Backend(anyhow::anyhow!("db down"))),
            AppError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn validation_body_lists_every_error() {
        let (status, json) =
            body_json(AppError::Validation(vec!["a".into(), "b".into()])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn authentication_body_has_no_errors_field() {
        let (status, json) = body_json(AppError::invalid_credentials()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Invalid credentials");
        assert!(json.get("errors").is_none());
    }
}
