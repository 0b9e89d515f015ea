use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{FlaviaError, ProviderError, ProviderErrorKind};
use crate::prompt::Prompt;
use super::{Provider, Settings};

pub const DEFAULT_BASE: &str = "https://api.openai.com";
const NAME: &str = "openai";

/// Chat completions with the system and user parts as two messages.
pub struct OpenAIProvider {
    settings: Settings,
    api_key: String,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(settings: Settings, api_key: String) -> Result<Self, FlaviaError> {
        let client = super::http_client(settings.timeout)?;
        Ok(Self { settings, api_key, client })
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.settings.api_base.trim_end_matches('/'));
        let body = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "response_format": { "type": "json_object" }
        });

        let req = self.client.post(&url).bearer_auth(&self.api_key).json(&body);
        let text = super::send(NAME, req).await?;

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| super::undecodable(NAME, e, &text))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::new(NAME, ProviderErrorKind::Unknown, "empty completion"))
    }
}
