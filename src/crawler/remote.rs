use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::{CrawlOutput, Crawler};
use crate::error::{AppError, CrawlError};
use crate::formats::Format;
use crate::options::{Capture, JsonOptions, Location, PageAction, ScrapeOptions};

/// Forwards each scrape to an external crawl service at
/// `POST {base}/v1/crawl`.
pub struct RemoteCrawler {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RemoteCrawlRequest<'a> {
    url: &'a str,
    formats: &'a BTreeSet<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_options: Option<&'a JsonOptions>,
    actions: &'a [PageAction],
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a Location>,
    screenshot: Capture,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct RemoteCrawlResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    result: CrawlOutput,
}

impl RemoteCrawler {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: Option<String>,
    ) -> Result<Self, AppError> {
        let endpoint = Url::parse(&format!("{}/v1/crawl", base_url.trim_end_matches('/')))
            .map_err(|e| AppError::ConfigError(format!("Invalid CRAWLER_URL: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Crawler for RemoteCrawler {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn crawl(
        &self,
        options: &ScrapeOptions,
        timeout: Duration,
    ) -> Result<CrawlOutput, CrawlError> {
        let body = RemoteCrawlRequest {
            url: options.url.as_str(),
            formats: &options.formats,
            json_options: options.json_options.as_ref(),
            actions: &options.actions,
            location: options.location.as_ref(),
            screenshot: options.capture,
            timeout_ms: timeout.as_millis() as u64,
        };

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout(timeout)
            } else {
                CrawlError::Unreachable(format!("crawl service: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Rejected(format!(
                "crawl service answered {}",
                status
            )));
        }

        let reply: RemoteCrawlResponse = response
            .json()
            .await
            .map_err(|e| CrawlError::InvalidResponse(e.to_string()))?;

        if !reply.success {
            return Err(CrawlError::Rejected(
                reply.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        Ok(reply.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = Client::new();
        let crawler = RemoteCrawler::new(client.clone(), "http://crawler:11235/", None).unwrap();
        assert_eq!(crawler.endpoint().as_str(), "http://crawler:11235/v1/crawl");

        let crawler = RemoteCrawler::new(client.clone(), "https://host/prefix", None).unwrap();
        assert_eq!(crawler.endpoint().as_str(), "https://host/prefix/v1/crawl");

        assert!(RemoteCrawler::new(client, "not a url", None).is_err());
    }

    #[test]
    fn test_reply_with_failure_flag() {
        let reply: RemoteCrawlResponse =
            serde_json::from_str(r#"{"success": false, "error": "blocked by robots.txt"}"#)
                .unwrap();
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("blocked by robots.txt"));
        assert_eq!(reply.result, CrawlOutput::default());
    }

    #[test]
    fn test_reply_with_unknown_format_error_stays_partial() {
        let reply: RemoteCrawlResponse = serde_json::from_str(
            r#"{
                "success": true,
                "markdown": "crawled",
                "formatErrors": {"pdf": "not supported", "screenshot@fullPage": "capture crashed"}
            }"#,
        )
        .unwrap();
        assert!(reply.success);
        assert_eq!(reply.result.markdown.as_deref(), Some("crawled"));
        assert_eq!(
            reply.result.format_errors.get(&Format::FullPageScreenshot).map(String::as_str),
            Some("capture crashed")
        );
        assert_eq!(reply.result.format_errors.len(), 1);
    }
}
