use serde::Serialize;
use axum::Json;
use axum::http::StatusCode;

use crate::api::models::ScrapeResponse;

/// Body of every non-200 answer.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Partial results are still a success at the HTTP level.
pub fn success(body: ScrapeResponse) -> (StatusCode, Json<ScrapeResponse>) {
    (StatusCode::OK, Json(body))
}

pub fn error(
    status: StatusCode,
    message: String,
    field: Option<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message,
            field,
        }),
    )
}
