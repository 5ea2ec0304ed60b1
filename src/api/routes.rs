use axum::{
    routing::{get, post},
    Router,
    extract::{Json, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use std::time::Instant;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::models::{MarkdownRequest, ScrapeRequest, ScrapeResponse};
use crate::api::response;
use crate::assembler::assemble;
use crate::crawler;
use crate::error::{Result, ValidationError};
use crate::options::resolve;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/v1/scrape", post(scrape_handler))
        .route("/v1/getmarkdown", post(markdown_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "SimpleCrawl API is running!" }))
}

async fn scrape_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScrapeResponse>)> {
    let Json(req) = payload.map_err(rejection_to_validation)?;
    process_scrape_request(&state, req).await.map(response::success)
}

async fn markdown_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<MarkdownRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScrapeResponse>)> {
    let Json(req) = payload.map_err(rejection_to_validation)?;
    process_scrape_request(&state, req.into()).await.map(response::success)
}

/// Resolve, crawl once, assemble. Validation failures never reach the crawler
/// and a total crawl failure skips assembly.
pub async fn process_scrape_request(state: &AppState, req: ScrapeRequest) -> Result<ScrapeResponse> {
    info!(url = %req.url, formats = ?req.formats, "Processing scrape request");
    let start_time = Instant::now();

    let options = resolve(req).inspect_err(|err| {
        warn!(field = %err.field, error = %err.message, "Rejected scrape request");
    })?;

    let output = crawler::invoke(state.crawler.as_ref(), &options, state.config.crawl_timeout).await?;
    let scraped = assemble(output, &options.formats);

    info!(
        url = %options.url,
        partial = scraped.error.is_some(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Scrape completed"
    );
    Ok(scraped)
}

/// Shape errors from the JSON extractor become field-level validation errors.
fn rejection_to_validation(rejection: JsonRejection) -> ValidationError {
    let text = rejection.body_text();
    warn!(error = %text, "Malformed scrape request body");
    let detail = text
        .split_once("target type: ")
        .map(|(_, detail)| detail)
        .unwrap_or(text.as_str());
    ValidationError::new(rejection_field(detail), detail.to_string())
}

/// Best-effort field name from a serde message such as
/// ``formats[0]: invalid type ...`` or ``missing field `url` ...``.
fn rejection_field(detail: &str) -> String {
    if let Some((path, _)) = detail.split_once(": ") {
        if !path.is_empty() && !path.contains(' ') {
            return path.to_string();
        }
    }
    detail
        .split("missing field `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
        .unwrap_or("body")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_field_from_missing_field() {
        assert_eq!(rejection_field("missing field `url` at line 1 column 24"), "url");
    }

    #[test]
    fn test_rejection_field_from_path() {
        assert_eq!(
            rejection_field("formats[0]: invalid type: integer `3`, expected a string at line 1 column 40"),
            "formats[0]"
        );
        assert_eq!(
            rejection_field("actions[1]: missing field `selector` at line 1 column 80"),
            "actions[1]"
        );
    }

    #[test]
    fn test_rejection_field_fallback() {
        assert_eq!(rejection_field("invalid type: sequence, expected a map"), "body");
        assert_eq!(rejection_field("EOF while parsing"), "body");
    }
}
