use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::debug;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::errors::{FlaviaError, ProviderError, ProviderErrorKind};
use crate::prompt::Prompt;

pub mod openai;
pub mod anthropic;
pub mod ollama;

/// One completion endpoint. Returns the model's raw text, uninterpreted.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

pub type DynProvider = Box<dyn Provider + Send + Sync>;

/// Sampling knobs shared by every adapter.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, FlaviaError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FlaviaError::Configuration(format!("building HTTP client: {e}")))
}

/// Sends the request and returns the body of a 2xx answer.
pub(crate) async fn send(provider: &str, req: RequestBuilder) -> Result<String, ProviderError> {
    let resp = req.send().await.map_err(|e| ProviderError::from_reqwest(provider, &e))?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| ProviderError::from_reqwest(provider, &e))?;
    debug!(provider, status = status.as_u16(), bytes = text.len(), "provider answered");
    if !status.is_success() {
        return Err(ProviderError::from_status(provider, status.as_u16(), &text));
    }
    Ok(text)
}

pub(crate) fn undecodable(provider: &str, err: impl std::fmt::Display, body: &str) -> ProviderError {
    let mut snippet: String = body.chars().take(200).collect();
    if snippet.len() < body.len() {
        snippet.push('…');
    }
    ProviderError::new(
        provider,
        ProviderErrorKind::Unknown,
        format!("unexpected response body ({err}): {snippet}"),
    )
}

pub fn make_provider(cfg: &Config) -> Result<DynProvider, FlaviaError> {
    let settings = |default_base: &str| Settings {
        model: cfg.model.clone(),
        api_base: cfg.api_base.clone().unwrap_or_else(|| default_base.to_string()),
        timeout: cfg.timeout(),
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
    };
    let key = cfg.api_key()?;
    match cfg.provider {
        ProviderKind::OpenAI => Ok(Box::new(openai::OpenAIProvider::new(
            settings(openai::DEFAULT_BASE),
            key.unwrap_or_default(),
        )?)),
        ProviderKind::Anthropic => Ok(Box::new(anthropic::Anthropic::new(
            settings(anthropic::DEFAULT_BASE),
            key.unwrap_or_default(),
        )?)),
        ProviderKind::Ollama => Ok(Box::new(ollama::Ollama::new(settings(&cfg.ollama_url))?)),
    }
}
