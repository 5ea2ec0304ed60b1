//! Request options and the resolver that turns a raw [`ScrapeRequest`] into
//! a validated [`ScrapeOptions`] bundle for the crawler.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::api::models::ScrapeRequest;
use crate::error::ValidationError;
use crate::formats::{Format, supported_tags};

/// Longest single `wait` action accepted.
pub const MAX_WAIT_MS: u64 = 60_000;

/// How to extract structured data for the `json` format. At least one of the
/// two must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// A page interaction run before the final capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageAction {
    Wait {
        #[serde(default = "default_wait_ms")]
        milliseconds: u64,
    },
    Click {
        selector: String,
    },
    #[serde(alias = "type")]
    Write {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    Press {
        key: String,
    },
    Screenshot {
        #[serde(default, rename = "fullPage")]
        full_page: bool,
    },
    Scrape,
}

fn default_wait_ms() -> u64 {
    1_000
}

impl PageAction {
    pub fn kind(&self) -> &'static str {
        match self {
            PageAction::Wait { .. } => "wait",
            PageAction::Click { .. } => "click",
            PageAction::Write { .. } => "write",
            PageAction::Press { .. } => "press",
            PageAction::Screenshot { .. } => "screenshot",
            PageAction::Scrape => "scrape",
        }
    }
}

/// Geolocation the crawl should simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_country() -> String {
    "US".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en-US".to_string()]
}

impl Default for Location {
    fn default() -> Self {
        Self {
            country: default_country(),
            languages: default_languages(),
        }
    }
}

/// Which screenshots the crawler has to capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub viewport: bool,
    pub full_page: bool,
}

/// A validated scrape, ready to hand to a crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOptions {
    pub url: Url,
    pub formats: BTreeSet<Format>,
    pub json_options: Option<JsonOptions>,
    pub actions: Vec<PageAction>,
    pub location: Option<Location>,
    pub capture: Capture,
}

impl ScrapeOptions {
    pub fn wants(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }
}

/// Validates a request and derives the options bundle. Pure; the first
/// offending field wins.
pub fn resolve(request: ScrapeRequest) -> Result<ScrapeOptions, ValidationError> {
    let url = resolve_url(&request.url)?;
    let formats = resolve_formats(&request.formats)?;
    let json_options = resolve_json_options(&formats, request.json_options)?;
    let actions = request.actions.unwrap_or_default();
    validate_actions(&actions)?;
    let location = request.location.map(resolve_location).transpose()?;

    let capture = Capture {
        viewport: formats.contains(&Format::Screenshot),
        full_page: formats.contains(&Format::FullPageScreenshot),
    };

    Ok(ScrapeOptions {
        url,
        formats,
        json_options,
        actions,
        location,
        capture,
    })
}

fn resolve_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ValidationError::new("url", format!("invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(ValidationError::new(
            "url",
            format!("expected an http or https URL, got `{}`", scheme),
        )),
    }
}

fn resolve_formats(tags: &[String]) -> Result<BTreeSet<Format>, ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::new(
            "formats",
            "at least one format is required",
        ));
    }

    tags.iter()
        .map(|tag| {
            tag.parse::<Format>().map_err(|e| {
                ValidationError::new(
                    "formats",
                    format!("{}; expected one of {}", e, supported_tags()),
                )
            })
        })
        .collect()
}

fn resolve_json_options(
    formats: &BTreeSet<Format>,
    json_options: Option<JsonOptions>,
) -> Result<Option<JsonOptions>, ValidationError> {
    match (formats.contains(&Format::Json), json_options) {
        (true, None) => Err(ValidationError::new(
            "json_options",
            "required when the `json` format is requested",
        )),
        (false, Some(_)) => Err(ValidationError::new(
            "json_options",
            "only allowed when the `json` format is requested",
        )),
        (true, Some(options)) => {
            let has_schema = options.schema.as_ref().is_some_and(|schema| !schema.is_null());
            let has_prompt = options
                .prompt
                .as_deref()
                .is_some_and(|prompt| !prompt.trim().is_empty());
            if !has_schema && !has_prompt {
                return Err(ValidationError::new(
                    "json_options",
                    "must contain a `schema` or a non-empty `prompt`",
                ));
            }
            Ok(Some(options))
        }
        (false, None) => Ok(None),
    }
}

fn validate_actions(actions: &[PageAction]) -> Result<(), ValidationError> {
    for (index, action) in actions.iter().enumerate() {
        let field = || format!("actions[{}]", index);
        match action {
            PageAction::Wait { milliseconds } if *milliseconds > MAX_WAIT_MS => {
                return Err(ValidationError::new(
                    field(),
                    format!("wait must not exceed {} milliseconds", MAX_WAIT_MS),
                ));
            }
            PageAction::Click { selector } if selector.trim().is_empty() => {
                return Err(ValidationError::new(field(), "click needs a selector"));
            }
            PageAction::Write { text, selector } => {
                if text.is_empty() {
                    return Err(ValidationError::new(field(), "write needs text"));
                }
                if selector.as_deref().is_some_and(|s| s.trim().is_empty()) {
                    return Err(ValidationError::new(field(), "selector must not be empty"));
                }
            }
            PageAction::Press { key } if key.trim().is_empty() => {
                return Err(ValidationError::new(field(), "press needs a key"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn resolve_location(location: Location) -> Result<Location, ValidationError> {
    let country = location.country.trim();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            "location.country",
            "expected an ISO 3166-1 alpha-2 country code",
        ));
    }
    if location.languages.iter().any(|tag| tag.trim().is_empty()) {
        return Err(ValidationError::new(
            "location.languages",
            "language tags must not be empty",
        ));
    }

    Ok(Location {
        country: country.to_ascii_uppercase(),
        languages: location
            .languages
            .iter()
            .map(|tag| tag.trim().to_string())
            .collect(),
    })
}
