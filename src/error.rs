//! # Error Handling
//!
//! Application-wide error type and its HTTP mapping.
//!
//! Codec and framing errors are local by design: a malformed frame
//! terminates at most its own connection and never crashes the process or
//! touches other sessions. `BackendUnavailable` exists in the taxonomy but
//! is always recovered through registry fallback before it could reach a
//! caller.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// All the ways a request or frame can fail.
#[derive(Debug)]
pub enum AppError {
    /// A sample value outside the representable PCM16 range [-32768, 32767].
    /// Only reachable on paths where samples arrive as wide integers; the
    /// slice-based codec API clamps internally instead.
    InvalidSample(i64),

    /// A byte buffer that cannot be interpreted as PCM16 frames, e.g. odd
    /// length. Never silently truncated.
    MalformedInput(String),

    /// The transport received something outside the binary-frame contract.
    ProtocolViolation(String),

    /// A codec backend was requested by kind but is not usable in this
    /// process. Internal only: selection falls back instead of surfacing
    /// this.
    BackendUnavailable(String),

    /// Client sent invalid or malformed request data.
    BadRequest(String),

    /// Configuration file or environment variable problems.
    ConfigError(String),

    /// Anything the server cannot blame on the client.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidSample(value) => {
                write!(f, "Invalid sample: {} is outside [-32768, 32767]", value)
            }
            AppError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            AppError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            AppError::BackendUnavailable(name) => {
                write!(f, "Codec backend unavailable: {}", name)
            }
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::InvalidSample(value) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "invalid_sample",
                format!("sample {} is outside [-32768, 32767]", value),
            ),
            AppError::MalformedInput(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "malformed_input",
                msg.clone(),
            ),
            AppError::ProtocolViolation(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "protocol_violation",
                msg.clone(),
            ),
            AppError::BackendUnavailable(name) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "backend_unavailable",
                format!("codec backend '{}' is not usable in this process", name),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_client_errors_map_to_400() {
        for err in [
            AppError::InvalidSample(40000),
            AppError::MalformedInput("odd length".into()),
            AppError::ProtocolViolation("text frame".into()),
            AppError::BadRequest("bad json".into()),
        ] {
            assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_server_errors_map_to_500() {
        for err in [
            AppError::BackendUnavailable("accelerated".into()),
            AppError::ConfigError("bad port".into()),
            AppError::Internal("boom".into()),
        ] {
            assert_eq!(
                err.error_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn test_display_includes_value() {
        let msg = AppError::InvalidSample(-32769).to_string();
        assert!(msg.contains("-32769"));
    }
}
