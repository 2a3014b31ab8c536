use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure the core surfaces to a caller.
///
/// `InvalidCredentials` deliberately covers unknown users, wrong passwords
/// and federated-only accounts alike so the message never reveals which.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("username already exists")]
    AlreadyExists,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("not authorized")]
    NotAuthorized,

    #[error("the dashboard is under maintenance")]
    Maintenance,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::InvalidToken | Self::NotAuthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotAuthorized => StatusCode::FORBIDDEN,
            Self::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::Maintenance => "MAINTENANCE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
