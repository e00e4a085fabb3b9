//! Error types for the classroom services
//!
//! Provides:
//! - Distinct error types for the lesson lifecycle failure modes
//! - HTTP status code mapping
//! - Structured error responses with stable machine-readable codes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors
    InvalidRequest,
    InvalidJson,

    // Authentication errors
    Unauthorized,

    // Lesson lifecycle errors
    NoActiveLesson,
    LessonNotFound,
    LessonStartFailed,

    // Media service errors
    LivekitTokenError,

    // Rate limiting
    RateLimited,

    // Database errors
    DatabaseError,
    ConnectionError,

    // Internal errors
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NoActiveLesson => "NO_ACTIVE_LESSON",
            ErrorCode::LessonNotFound => "LESSON_NOT_FOUND",
            ErrorCode::LessonStartFailed => "LESSON_START_FAILED",
            ErrorCode::LivekitTokenError => "LIVEKIT_TOKEN_ERROR",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ConnectionError => "CONNECTION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid JSON body: {message}")]
    InvalidJson { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Lifecycle errors
    #[error("No active lesson in room {room}")]
    NoActiveLesson { room: String },

    #[error("Lesson not found: {id}")]
    LessonNotFound { id: i64 },

    #[error("Failed to start lesson: {message}")]
    LessonStartFailed { message: String },

    // Media service errors
    #[error("Failed to issue access token: {message}")]
    TokenIssue { message: String },

    // Rate limiting
    #[error("Rate limit exceeded")]
    RateLimited,

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::InvalidRequest,
            AppError::InvalidJson { .. } => ErrorCode::InvalidJson,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::NoActiveLesson { .. } => ErrorCode::NoActiveLesson,
            AppError::LessonNotFound { .. } => ErrorCode::LessonNotFound,
            AppError::LessonStartFailed { .. } => ErrorCode::LessonStartFailed,
            AppError::TokenIssue { .. } => ErrorCode::LivekitTokenError,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::InvalidJson { .. } |
            AppError::NoActiveLesson { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::LessonNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::LessonStartFailed { .. } |
            AppError::TokenIssue { .. } |
            AppError::Database(_) |
            AppError::DatabaseConnection { .. } |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to hand back to callers.
    ///
    /// Server errors never carry storage or signing detail; that goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NoActiveLesson { .. } => "lesson not started yet".to_string(),
            AppError::LessonStartFailed { .. } => "could not start lesson".to_string(),
            AppError::TokenIssue { .. } => "could not issue media access token".to_string(),
            _ if self.is_server_error() => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = code.as_str(),
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = code.as_str(),
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.public_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseConnection {
            message: format!("Migration failed: {}", err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let field = errs.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: errs.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_lesson_is_client_error() {
        let err = AppError::NoActiveLesson { room: "science202".into() };
        assert_eq!(err.code(), ErrorCode::NoActiveLesson);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
        assert_eq!(err.public_message(), "lesson not started yet");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation("room", "room and name are required");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = AppError::Database(sea_orm::DbErr::Custom("relation \"lessons\" does not exist".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");

        let err = AppError::TokenIssue { message: "bad secret".into() };
        assert_eq!(err.code().as_str(), "LIVEKIT_TOKEN_ERROR");
        assert!(!err.public_message().contains("bad secret"));
    }

    #[test]
    fn test_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::NoActiveLesson).unwrap();
        assert_eq!(json, "\"NO_ACTIVE_LESSON\"");
        let json = serde_json::to_string(&ErrorCode::LivekitTokenError).unwrap();
        assert_eq!(json, format!("\"{}\"", ErrorCode::LivekitTokenError.as_str()));
    }
}
