use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ClientResult;

/// Any chat-style LLM with a single-turn text-in/text-out interface
/// suffices; failure modes surface as `ClientError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> ClientResult<String>;
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> ClientResult<String> {
        let url = format!("{}/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&CompletionRequest {
                model: &self.model,
                prompt,
            })
            .send()
            .await?
            .error_for_status()?;
        let body: CompletionResponse = response.json().await?;
        Ok(body.text)
    }
}
