//! Projects a crawl result onto the response schema.

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::api::models::ScrapeResponse;
use crate::crawler::CrawlOutput;
use crate::error::PartialExtraction;
use crate::formats::Format;

const NOT_PRODUCED: &str = "not produced by the crawler";

/// Builds the response for a crawl that reached the page. Every requested
/// format gets a key; missing payloads become `null` with a partial note.
/// Formats that were not requested never appear.
pub fn assemble(mut output: CrawlOutput, formats: &BTreeSet<Format>) -> ScrapeResponse {
    let mut data = BTreeMap::new();
    let mut format_errors = BTreeMap::new();
    let mut failed = Vec::new();

    for &format in formats {
        match take_payload(format, &mut output) {
            Some(value) => {
                data.insert(format, value);
            }
            None => {
                let reason = output
                    .format_errors
                    .remove(&format)
                    .unwrap_or_else(|| NOT_PRODUCED.to_string());
                warn!(format = %format, reason = %reason, "format unavailable");
                data.insert(format, Value::Null);
                format_errors.insert(format, reason);
                failed.push(format);
            }
        }
    }

    let mut metadata = output.metadata;
    metadata.scraped_at.get_or_insert_with(Utc::now);

    let error = if failed.is_empty() {
        None
    } else {
        Some(PartialExtraction { failed }.to_string())
    };

    ScrapeResponse {
        success: true,
        data,
        metadata: Some(metadata),
        actions: output.actions,
        format_errors,
        error,
    }
}

/// One extraction rule per format.
fn take_payload(format: Format, output: &mut CrawlOutput) -> Option<Value> {
    match format {
        Format::Markdown => output.markdown.take().map(Value::String),
        Format::Html => output.html.take().map(Value::String),
        Format::RawHtml => output.raw_html.take().map(Value::String),
        Format::Links => output.links.take().map(Value::from),
        Format::Json => output.json.take().filter(|value| !value.is_null()),
        Format::Screenshot => output.screenshot.take().filter(|s| !s.is_empty()).map(Value::String),
        Format::FullPageScreenshot => output
            .full_page_screenshot
            .take()
            .filter(|s| !s.is_empty())
            .map(Value::String),
    }
}
