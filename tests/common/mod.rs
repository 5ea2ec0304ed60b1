#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

use simplecrawl::api::routes::create_router;
use simplecrawl::config::Config;
use simplecrawl::crawler::{CrawlOutput, Crawler};
use simplecrawl::error::CrawlError;
use simplecrawl::options::ScrapeOptions;
use simplecrawl::AppState;

/// Deterministic collaborator that counts its calls.
pub struct StubCrawler {
    result: Result<CrawlOutput, CrawlError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubCrawler {
    pub fn returning(output: CrawlOutput) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(output),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(err: CrawlError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(err),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn stalling(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(CrawlOutput::default()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Crawler for StubCrawler {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn crawl(
        &self,
        _options: &ScrapeOptions,
        _timeout: Duration,
    ) -> Result<CrawlOutput, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

pub fn state_with(crawler: Arc<dyn Crawler>, config: Config) -> AppState {
    AppState::new(config, crawler)
}

pub async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn post_json(state: &AppState, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(state, request).await
}

/// Serves `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A local address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
