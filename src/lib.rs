pub mod api;
pub mod assembler;
pub mod config;
pub mod crawler;
pub mod error;
pub mod formats;
pub mod llm;
pub mod options;

use std::sync::Arc;
use config::Config;
use crawler::Crawler;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub crawler: Arc<dyn Crawler>,
}

impl AppState {
    pub fn new(config: Config, crawler: Arc<dyn Crawler>) -> Self {
        Self {
            config: Arc::new(config),
            crawler,
        }
    }
}
