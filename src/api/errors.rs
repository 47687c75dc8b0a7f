// Unified API error taxonomy with machine-readable error codes.
use crate::reconcile::ReconcileError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(&'static str),
    #[error("authentication required")]
    Authentication,
    #[error("access denied")]
    Authorization,
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("upstream failure: {code}")]
    Upstream {
        code: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn storage(source: anyhow::Error) -> Self {
        Self::Upstream {
            code: "storage_failed",
            source,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(code) | Self::NotFound(code) => code,
            Self::Authentication => "auth_required",
            Self::Authorization => "access_denied",
            Self::Upstream { code, .. } => *code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Upstream { code, source } = &self {
            // Internal causes stay in the log; the client only sees the code.
            error!("upstream failure ({code}): {source:#}");
        }
        (self.status(), Json(json!({ "error": self.code() }))).into_response()
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Storage(source) => ApiError::storage(source),
            ReconcileError::Runtime(source) => ApiError::Upstream {
                code: "agent_runtime_failed",
                source,
            },
            timeout @ ReconcileError::Timeout(_) => ApiError::Upstream {
                code: "agent_runtime_failed",
                source: anyhow::Error::new(timeout),
            },
        }
    }
}
