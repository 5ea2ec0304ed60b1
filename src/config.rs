use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324";

#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub crawl_timeout: Duration,
    /// Base URL of an external crawl service. Unset means the built-in fetcher.
    pub crawler_url: Option<String>,
    pub crawler_api_key: Option<String>,
    /// Enables `json` extraction for the built-in fetcher.
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            crawl_timeout: Duration::from_secs(30),
            crawler_url: None,
            crawler_api_key: None,
            openrouter_api_key: None,
            openrouter_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = get("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let timeout_secs = match get("CRAWL_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| AppError::ConfigError(format!("Invalid CRAWL_TIMEOUT_SECS: {}", raw)))?,
            None => 30,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            crawl_timeout: Duration::from_secs(timeout_secs),
            crawler_url: get("CRAWLER_URL"),
            crawler_api_key: get("CRAWLER_API_KEY"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            openrouter_model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}
