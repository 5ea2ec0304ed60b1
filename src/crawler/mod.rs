//! The collaborator boundary. A [`Crawler`] turns one validated scrape into
//! one structured result; [`invoke`] is the only place that calls it.

pub mod fetch;
pub mod remote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CrawlError, Result};
use crate::formats::Format;
use crate::llm::LlmExtractor;
use crate::options::ScrapeOptions;

pub use fetch::FetchCrawler;
pub use remote::RemoteCrawler;

#[async_trait]
pub trait Crawler: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Crawls `options.url` once. `timeout` is the budget for the whole call.
    async fn crawl(
        &self,
        options: &ScrapeOptions,
        timeout: Duration,
    ) -> std::result::Result<CrawlOutput, CrawlError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robots: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub og_locale_alternate: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_site_name: Option<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionScrape {
    pub url: String,
    pub html: String,
}

/// What the page actions produced along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutput {
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub scrapes: Vec<ActionScrape>,
    /// Actions the backend could not perform, with the reason.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Raw result of a crawl. A payload is `None` when it was not requested or
/// could not be produced; `format_errors` says why for the latter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOutput {
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub raw_html: Option<String>,
    pub links: Option<Vec<String>>,
    pub json: Option<Value>,
    pub screenshot: Option<String>,
    pub full_page_screenshot: Option<String>,
    #[serde(default, deserialize_with = "known_format_errors")]
    pub format_errors: BTreeMap<Format, String>,
    #[serde(default)]
    pub metadata: PageMetadata,
    #[serde(default)]
    pub actions: Option<ActionOutput>,
}

/// Reads `formatErrors` from a collaborator, dropping tags this service does
/// not know instead of rejecting the whole result.
fn known_format_errors<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<Format, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(tag, reason)| match tag.parse::<Format>() {
            Ok(format) => Some((format, reason)),
            Err(_) => {
                warn!(format = %tag, reason = %reason, "ignoring error for unknown format");
                None
            }
        })
        .collect())
}

impl CrawlOutput {
    pub fn fail(&mut self, format: Format, reason: impl Into<String>) {
        self.format_errors.insert(format, reason.into());
    }
}

/// Runs exactly one crawl, bounded by `timeout`. No retries.
pub async fn invoke(
    crawler: &dyn Crawler,
    options: &ScrapeOptions,
    timeout: Duration,
) -> std::result::Result<CrawlOutput, CrawlError> {
    info!(
        crawler = crawler.name(),
        url = %options.url,
        formats = ?options.formats,
        actions = options.actions.len(),
        "starting crawl"
    );
    let started = Instant::now();

    match tokio::time::timeout(timeout, crawler.crawl(options, timeout)).await {
        Ok(Ok(output)) => {
            info!(
                url = %options.url,
                elapsed_ms = started.elapsed().as_millis() as u64,
                failed_formats = output.format_errors.len(),
                "crawl finished"
            );
            Ok(output)
        }
        Ok(Err(err)) => {
            warn!(url = %options.url, error = %err, "crawl failed");
            Err(err)
        }
        Err(_) => {
            warn!(url = %options.url, timeout = ?timeout, "crawl timed out");
            Err(CrawlError::Timeout(timeout))
        }
    }
}

/// Shared HTTP client for collaborators. Per-request timeouts are set on each
/// call, so only the connect timeout lives here.
pub fn build_client() -> Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(concat!("simplecrawl/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()?;
    Ok(client)
}

/// Picks the backend: the remote crawl service when `CRAWLER_URL` is set,
/// otherwise the built-in fetcher.
pub fn from_config(config: &Config) -> Result<Arc<dyn Crawler>> {
    let client = build_client()?;

    if let Some(base_url) = &config.crawler_url {
        let crawler = RemoteCrawler::new(client, base_url, config.crawler_api_key.clone())?;
        return Ok(Arc::new(crawler));
    }

    let extractor = config
        .openrouter_api_key
        .as_ref()
        .map(|key| LlmExtractor::new(client.clone(), key.clone(), config.openrouter_model.clone()));
    Ok(Arc::new(FetchCrawler::new(client, extractor)))
}
