use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::crawler::{ActionOutput, PageMetadata};
use crate::formats::Format;
use crate::options::{JsonOptions, Location, PageAction};

/// Body of `POST /v1/scrape`, shape-checked only. Format tags stay strings
/// until the resolver validates them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    pub formats: Vec<String>,
    #[serde(default)]
    pub json_options: Option<JsonOptions>,
    #[serde(default)]
    pub actions: Option<Vec<PageAction>>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Body of `POST /v1/getmarkdown`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownRequest {
    pub url: String,
}

impl From<MarkdownRequest> for ScrapeRequest {
    fn from(req: MarkdownRequest) -> Self {
        ScrapeRequest {
            url: req.url,
            formats: vec![Format::Markdown.as_str().to_string()],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResponse {
    pub success: bool,
    pub data: BTreeMap<Format, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ActionOutput>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub format_errors: BTreeMap<Format, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
