//! Unified error handling for Nexus Sites

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::crypto::EncryptionError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Boot-time configuration failures. Any of these prevents the registry from loading.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("site `{site}` requires extra parameter `{param}` but no backing record provides it")]
    MissingRequiredParam { site: String, param: String },

    #[error("site `{site}` declares route registrar `{registrar}` which is not registered")]
    UnknownRegistrar { site: String, registrar: String },

    #[error("domain `{domain}` is claimed by both `{first}` and `{second}`")]
    DuplicateDomain {
        domain: String,
        first: String,
        second: String,
    },

    #[error("site repository unavailable: {0}")]
    Repository(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Misuse of the request-scoped site binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("registry not yet bound to a request")]
    Unbound,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] EncryptionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Crypto(e) => (StatusCode::BAD_REQUEST, "crypto_error", e.to_string()),
            AppError::Configuration(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "Site configuration is invalid".to_string(),
                )
            }
            AppError::State(e) => {
                tracing::error!("Site binding misuse: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "state_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "session_store_error",
                    "A session store error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for ConfigurationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigurationError::Invalid(errors.to_string())
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        ConfigurationError::Invalid(error.to_string())
    }
}
