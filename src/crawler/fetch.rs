use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ActionOutput, ActionScrape, CrawlOutput, Crawler, PageMetadata};
use crate::error::CrawlError;
use crate::formats::Format;
use crate::llm::LlmExtractor;
use crate::options::{Location, PageAction, ScrapeOptions};

const NO_BROWSER: &str = "requires a browser-backed crawler";

// Create static selectors to avoid recompiling them each time
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("title").expect("Failed to parse title selector")
});

static HTML_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("html").expect("Failed to parse html selector")
});

static META_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[content]").expect("Failed to parse meta selector")
});

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to parse link selector")
});

/// Built-in collaborator: a plain HTTP fetch with local extraction. It has no
/// browser, so screenshots and interactive actions are reported, not faked.
pub struct FetchCrawler {
    client: Client,
    extractor: Option<LlmExtractor>,
}

/// A fetched page after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl FetchCrawler {
    pub fn new(client: Client, extractor: Option<LlmExtractor>) -> Self {
        Self { client, extractor }
    }

    async fn fetch(
        &self,
        url: &Url,
        location: Option<&Location>,
        timeout: Duration,
    ) -> Result<FetchedPage, CrawlError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        if let Some(location) = location.filter(|location| !location.languages.is_empty()) {
            request = request.header(ACCEPT_LANGUAGE, accept_language(&location.languages));
        }

        let response = request.send().await.map_err(|e| fetch_error(e, timeout))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(CrawlError::Rejected(format!("{} answered {}", url, status)));
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| fetch_error(e, timeout))?;
        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }

    async fn run_actions(
        &self,
        options: &ScrapeOptions,
        timeout: Duration,
    ) -> ActionOutput {
        let mut output = ActionOutput::default();
        for action in &options.actions {
            match action {
                PageAction::Wait { milliseconds } => {
                    tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
                }
                PageAction::Scrape => {
                    let scrape = match self
                        .fetch(&options.url, options.location.as_ref(), timeout)
                        .await
                    {
                        Ok(page) => ActionScrape {
                            url: page.url.to_string(),
                            html: page.body,
                        },
                        Err(e) => {
                            warn!(url = %options.url, error = %e, "scrape action failed");
                            ActionScrape {
                                url: options.url.to_string(),
                                html: format!("Error: {}", e),
                            }
                        }
                    };
                    output.scrapes.push(scrape);
                }
                other => {
                    debug!(action = other.kind(), "skipping action");
                    output.skipped.push(format!("{}: {}", other.kind(), NO_BROWSER));
                }
            }
        }
        output
    }
}

#[async_trait]
impl Crawler for FetchCrawler {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn crawl(
        &self,
        options: &ScrapeOptions,
        timeout: Duration,
    ) -> Result<CrawlOutput, CrawlError> {
        let actions = if options.actions.is_empty() {
            None
        } else {
            Some(self.run_actions(options, timeout).await)
        };

        if let Some(location) = &options.location {
            debug!(country = %location.country, "country simulation is not available without a browser");
        }

        let page = self
            .fetch(&options.url, options.location.as_ref(), timeout)
            .await?;
        let (mut output, content) = extract_page(&page, options);
        output.actions = actions;

        if options.wants(Format::Json) {
            match (&self.extractor, &options.json_options) {
                (Some(extractor), Some(json_options)) => {
                    match extractor.extract(&content, json_options, &page.url).await {
                        Ok(value) => output.json = Some(value),
                        Err(e) => {
                            warn!(url = %page.url, error = %e, "json extraction failed");
                            output.fail(Format::Json, e.to_string());
                        }
                    }
                }
                (None, _) => output.fail(Format::Json, "json extraction is not configured"),
                (_, None) => output.fail(Format::Json, "json_options missing"),
            }
        }

        Ok(output)
    }
}

fn fetch_error(err: reqwest::Error, timeout: Duration) -> CrawlError {
    if err.is_timeout() {
        CrawlError::Timeout(timeout)
    } else {
        CrawlError::Unreachable(err.to_string())
    }
}

/// `en-US, fr;q=0.9, ...` in preference order.
pub fn accept_language(languages: &[String]) -> String {
    languages
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            if i == 0 {
                tag.clone()
            } else {
                let q = (10usize.saturating_sub(i)).max(1);
                format!("{};q=0.{}", tag, q)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Derives every text format from a fetched page. Screenshots are marked as
/// failed. Also returns the markdown used as JSON extraction input.
///
/// Kept synchronous: `Html` is not `Send` and must not live across an await.
pub fn extract_page(page: &FetchedPage, options: &ScrapeOptions) -> (CrawlOutput, String) {
    let document = Html::parse_document(&page.body);
    let body = extract_body(&document).unwrap_or_default();
    let markdown = html2md::parse_html(&body).trim().to_string();

    let mut output = CrawlOutput {
        metadata: extract_metadata(&document, page),
        ..Default::default()
    };

    for format in &options.formats {
        if format.is_screenshot() {
            output.fail(*format, format!("screenshots {}", NO_BROWSER));
            continue;
        }
        match format {
            Format::Markdown => output.markdown = Some(markdown.clone()),
            Format::Html => output.html = Some(format_html(&body)),
            Format::RawHtml => output.raw_html = Some(page.body.clone()),
            Format::Links => output.links = Some(extract_links(&document, &page.url)),
            Format::Json | Format::Screenshot | Format::FullPageScreenshot => {}
        }
    }

    (output, markdown)
}

pub fn extract_body(document: &Html) -> Option<String> {
    document.select(&BODY_SELECTOR)
        .next()
        .map(|element| element.inner_html())
}

pub fn format_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut last_was_whitespace = true;

    for line in html.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            if !last_was_whitespace {
                result.push('\n');
            }
            result.push_str(trimmed);
            last_was_whitespace = false;
        }
    }

    result
}

/// Absolute http(s) links in document order, fragments dropped, no repeats.
pub fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(&LINK_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

pub fn extract_metadata(document: &Html, page: &FetchedPage) -> PageMetadata {
    let mut metadata = PageMetadata {
        source_url: page.url.to_string(),
        status_code: page.status,
        ..Default::default()
    };

    metadata.title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty());

    metadata.language = document
        .select(&HTML_SELECTOR)
        .next()
        .and_then(|html| html.value().attr("lang"))
        .map(str::to_string);

    for meta in document.select(&META_SELECTOR) {
        let element = meta.value();
        let Some(content) = element.attr("content").map(str::trim) else {
            continue;
        };
        let Some(key) = element.attr("name").or_else(|| element.attr("property")) else {
            continue;
        };

        let value = Some(content.to_string());
        match key.to_ascii_lowercase().as_str() {
            "description" => metadata.description = value,
            "robots" => metadata.robots = value,
            "keywords" => {
                metadata.keywords = content
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "og:title" => metadata.og_title = value,
            "og:description" => metadata.og_description = value,
            "og:url" => metadata.og_url = value,
            "og:image" => metadata.og_image = value,
            "og:site_name" => metadata.og_site_name = value,
            "og:locale:alternate" => metadata.og_locale_alternate.push(content.to_string()),
            _ => {}
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ScrapeRequest;
    use crate::options::resolve;

    const PAGE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <title> Example Domain </title>
    <meta name="description" content="An example page">
    <meta name="keywords" content="example, domain, ">
    <meta name="robots" content="index, follow">
    <meta property="og:title" content="Example OG">
    <meta property="og:locale:alternate" content="fr_FR">
    <meta property="og:locale:alternate" content="de_DE">
  </head>
  <body>
    <h1>Example Domain</h1>

    <p>This domain is for use in <a href="/docs#intro">examples</a>.</p>
    <a href="https://www.iana.org/domains/example">More</a>
    <a href="/docs">Docs again</a>
    <a href="mailto:someone@example.com">Mail</a>
  </body>
</html>"#;

    fn page() -> FetchedPage {
        FetchedPage {
            url: Url::parse("https://example.com/start").unwrap(),
            status: 200,
            body: PAGE.to_string(),
        }
    }

    fn options(formats: &[&str]) -> ScrapeOptions {
        resolve(ScrapeRequest {
            url: "https://example.com/start".to_string(),
            formats: formats.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_extract_links_resolves_and_dedupes() {
        let document = Html::parse_document(PAGE);
        let links = extract_links(&document, &page().url);
        assert_eq!(
            links,
            vec![
                "https://example.com/docs".to_string(),
                "https://www.iana.org/domains/example".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_metadata() {
        let document = Html::parse_document(PAGE);
        let metadata = extract_metadata(&document, &page());
        assert_eq!(metadata.title.as_deref(), Some("Example Domain"));
        assert_eq!(metadata.language.as_deref(), Some("en"));
        assert_eq!(metadata.description.as_deref(), Some("An example page"));
        assert_eq!(metadata.keywords, vec!["example", "domain"]);
        assert_eq!(metadata.robots.as_deref(), Some("index, follow"));
        assert_eq!(metadata.og_title.as_deref(), Some("Example OG"));
        assert_eq!(metadata.og_locale_alternate, vec!["fr_FR", "de_DE"]);
        assert_eq!(metadata.source_url, "https://example.com/start");
        assert_eq!(metadata.status_code, 200);
    }

    #[test]
    fn test_format_html_drops_blank_lines() {
        let formatted = format_html("  <h1>Hi</h1>\n\n   \n  <p>there</p>  \n");
        assert_eq!(formatted, "<h1>Hi</h1>\n<p>there</p>");
    }

    #[test]
    fn test_extract_page_fills_only_requested_formats() {
        let (output, content) = extract_page(&page(), &options(&["markdown", "links"]));
        let markdown = output.markdown.unwrap();
        assert!(markdown.contains("Example Domain"));
        assert_eq!(content, markdown);
        assert_eq!(output.links.unwrap().len(), 2);
        assert!(output.html.is_none());
        assert!(output.raw_html.is_none());
        assert!(output.format_errors.is_empty());
    }

    #[test]
    fn test_extract_page_marks_screenshots_failed() {
        let (output, _) = extract_page(&page(), &options(&["rawHtml", "screenshot@fullPage"]));
        assert_eq!(output.raw_html.as_deref(), Some(PAGE));
        assert!(output.full_page_screenshot.is_none());
        assert!(output.format_errors.contains_key(&Format::FullPageScreenshot));
        assert!(!output.format_errors.contains_key(&Format::Screenshot));
    }

    #[test]
    fn test_accept_language_weights() {
        let header = accept_language(&["en-US".to_string(), "fr".to_string(), "de".to_string()]);
        assert_eq!(header, "en-US, fr;q=0.9, de;q=0.8");
    }
}
