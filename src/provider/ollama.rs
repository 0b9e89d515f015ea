use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{FlaviaError, ProviderError, ProviderErrorKind};
use crate::prompt::Prompt;
use super::{Provider, Settings};

const NAME: &str = "ollama";

/// Local Ollama server; no key.
pub struct Ollama {
    settings: Settings,
    client: Client,
}

impl Ollama {
    pub fn new(settings: Settings) -> Result<Self, FlaviaError> {
        let client = super::http_client(settings.timeout)?;
        Ok(Self { settings, client })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.settings.api_base.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                Msg { role: "system", content: &prompt.system },
                Msg { role: "user", content: &prompt.user },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        };

        let text = super::send(NAME, self.client.post(&url).json(&body)).await?;

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| super::undecodable(NAME, e, &text))?;
        if parsed.message.content.trim().is_empty() {
            return Err(ProviderError::new(NAME, ProviderErrorKind::Unknown, "empty message"));
        }
        Ok(parsed.message.content)
    }
}
