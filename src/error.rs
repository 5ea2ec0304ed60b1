use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use std::fmt;
use std::time::Duration;

use crate::api::response;
use crate::formats::Format;

/// A request that is malformed or internally inconsistent. Always names the
/// offending field so clients can point at it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The collaborator could not produce a page at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrawlError {
    #[error("target could not be fetched: {0}")]
    Unreachable(String),

    #[error("crawler reported failure: {0}")]
    Rejected(String),

    #[error("crawler returned an unreadable result: {0}")]
    InvalidResponse(String),

    #[error("crawl timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
}

/// The page was reached but some requested formats came back empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialExtraction {
    pub failed: Vec<Format>,
}

impl fmt::Display for PartialExtraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.failed.iter().map(|format| format.as_str()).collect();
        write!(f, "partial: {} failed", tags.join(", "))
    }
}

impl std::error::Error for PartialExtraction {}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Crawl(CrawlError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Crawl(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            AppError::Validation(err) => {
                response::error(status, err.to_string(), Some(err.field)).into_response()
            }
            // Crawl detail stays in the logs; clients get a stable message.
            AppError::Crawl(CrawlError::Timeout(limit)) => response::error(
                status,
                format!("Crawl timed out after {}s", limit.as_secs_f64()),
                None,
            )
            .into_response(),
            AppError::Crawl(_) => {
                response::error(status, "Failed to crawl the requested URL".to_string(), None)
                    .into_response()
            }
            AppError::ConfigError(msg) => response::error(status, msg, None).into_response(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
