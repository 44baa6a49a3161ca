use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid or expired access token")]
    InvalidCredential,

    #[error("Invalid email or password")]
    InvalidLogin,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Expired or tampered refresh token")]
    ExpiredOrTamperedToken,

    #[error("User not found")]
    UnknownSubject,

    #[error("Service not configured: {0}")]
    ServiceNotConfigured(String),

    #[error("Upstream request timed out after {0:?}")]
    UpstreamTimeout(std::time::Duration),

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Token signing failed: {0}")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingCredential
            | GatewayError::InvalidLogin
            | GatewayError::InvalidRefreshToken
            | GatewayError::ExpiredOrTamperedToken => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidCredential => StatusCode::FORBIDDEN,
            GatewayError::UnknownSubject => StatusCode::NOT_FOUND,
            GatewayError::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamTimeout(_) | GatewayError::UpstreamUnreachable(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::ServiceNotConfigured(_)
            | GatewayError::TokenSigning(_)
            | GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code for programmatic error handling by clients
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::MissingCredential => "MISSING_CREDENTIAL",
            GatewayError::InvalidCredential => "INVALID_CREDENTIAL",
            GatewayError::InvalidLogin => "INVALID_LOGIN",
            GatewayError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            GatewayError::ExpiredOrTamperedToken => "EXPIRED_OR_TAMPERED_TOKEN",
            GatewayError::UnknownSubject => "UNKNOWN_SUBJECT",
            GatewayError::ServiceNotConfigured(_) => "SERVICE_NOT_CONFIGURED",
            GatewayError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            GatewayError::UpstreamUnreachable(_) => "UPSTREAM_UNREACHABLE",
            GatewayError::InvalidRequestBody(_) => "INVALID_REQUEST_BODY",
            GatewayError::TokenSigning(_) => "TOKEN_SIGNING_ERROR",
            GatewayError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Message sent to the client. Internal causes are logged, not returned.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::UpstreamUnreachable(_) => {
                "Error connecting to target service".to_string()
            }
            GatewayError::TokenSigning(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{} ({})", self, self.error_code());
        } else {
            tracing::debug!("{} ({})", self, self.error_code());
        }

        let body = json!({
            "error": self.user_message(),
            "code": self.error_code(),
        });
        (status, Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
