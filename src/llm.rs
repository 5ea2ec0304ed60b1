use serde::Serialize;
use serde_json::Value;
use reqwest::{Client, Url};

use crate::options::JsonOptions;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API answered {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid response format from LLM")]
    InvalidResponse,

    #[error("LLM reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

/// Structured extraction through the OpenRouter chat-completions API.
#[derive(Clone)]
pub struct LlmExtractor {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl LlmExtractor {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            endpoint: OPENROUTER_URL.to_string(),
        }
    }

    /// Points the extractor at another OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn extract(
        &self,
        content: &str,
        options: &JsonOptions,
        site_url: &Url,
    ) -> Result<Value, ExtractionError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "user".into(),
                    content: build_prompt(content, options),
                }
            ],
        };

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", site_url.as_str())
            .header("X-Title", "SimpleCrawl")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ExtractionError::Status(res.status()));
        }

        let json: Value = res.json().await?;
        let reply = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ExtractionError::InvalidResponse)?;

        parse_reply(reply)
    }
}

pub fn build_prompt(content: &str, options: &JsonOptions) -> String {
    let mut result = String::with_capacity(content.len() + 400);
    result.push_str("Extract structured data from the following webpage content. Reply with a single JSON value and nothing else.\n\n");

    if let Some(schema) = &options.schema {
        result.push_str("The JSON must follow this schema:\n");
        result.push_str(&schema.to_string());
        result.push_str("\n\n");
    }
    if let Some(prompt) = options.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        result.push_str("Instructions: ");
        result.push_str(prompt.trim());
        result.push_str("\n\n");
    }

    result.push_str("Content:\n");
    result.push_str(content);
    result
}

/// Parses the model reply, tolerating a surrounding Markdown code fence.
pub fn parse_reply(reply: &str) -> Result<Value, ExtractionError> {
    let text = reply.trim();
    let text = match text.strip_prefix("```") {
        Some(fenced) => {
            let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
            fenced.strip_suffix("```").unwrap_or(fenced).trim()
        }
        None => text,
    };
    Ok(serde_json::from_str(text)?)
}
