use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("permission store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("no pending deployments: {0}")]
    NoPendingApprovals(String),
    #[error("approval rejected with status {status}: {message}")]
    ApprovalRejected { status: u16, message: String },
    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("github request failed: {0}")]
    GitHub(#[from] reqwest::Error),
    #[error("operation cancelled: {0}")]
    Cancelled(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    pub fn no_pending_approvals(message: impl Into<String>) -> Self {
        Self::NoPendingApprovals(message.into())
    }

    pub fn approval_rejected(status: u16, message: impl Into<String>) -> Self {
        Self::ApprovalRejected {
            status,
            message: message.into(),
        }
    }

    pub fn unsupported_event(message: impl Into<String>) -> Self {
        Self::UnsupportedEvent(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind used in response bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::NoPendingApprovals(_) => "no_pending_approvals",
            AppError::ApprovalRejected { .. } => "approval_rejected",
            AppError::UnsupportedEvent(_) => "unsupported_event",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Upstream { .. } => "upstream",
            AppError::GitHub(_) => "github",
            AppError::Cancelled(_) => "cancelled",
            AppError::Configuration(_) => "configuration",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NoPendingApprovals(_) => StatusCode::CONFLICT,
            AppError::ApprovalRejected { .. } => StatusCode::BAD_GATEWAY,
            AppError::UnsupportedEvent(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::GitHub(_) => StatusCode::BAD_GATEWAY,
            AppError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
