use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

use crate::bridge::Leg;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Bot API error: {0}")]
    BotApi(#[from] BotApiError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::BotApi(BotApiError::from(err))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": message
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::BotApi(BotApiError::Unauthorized) => StatusCode::BAD_GATEWAY,
            AppError::BotApi(BotApiError::RequestFailed(_)) => StatusCode::BAD_GATEWAY,
            AppError::BotApi(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures contained within a single bridge session.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Upstream connect failed: {0}")]
    UpstreamConnectFailed(String),

    #[error("Forward to {leg} leg failed: {reason}")]
    ForwardFailed { leg: Leg, reason: String },

    #[error("Handshake failed: {0}")]
    Handshake(String),
}

#[derive(Error, Debug)]
pub enum BotApiError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API url: {0}")]
    InvalidUrl(String),

    #[error("All credential schemes were rejected")]
    Unauthorized,

    #[error("No credential schemes configured")]
    NoCredentialSchemes,
}

impl From<reqwest::Error> for BotApiError {
    fn from(err: reqwest::Error) -> Self {
        BotApiError::RequestFailed(err.to_string())
    }
}

impl From<url::ParseError> for BotApiError {
    fn from(err: url::ParseError) -> Self {
        BotApiError::InvalidUrl(err.to_string())
    }
}
