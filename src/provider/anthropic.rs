use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{FlaviaError, ProviderError, ProviderErrorKind};
use crate::prompt::Prompt;
use super::{Provider, Settings};

pub const DEFAULT_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const NAME: &str = "anthropic";

pub struct Anthropic {
    settings: Settings,
    api_key: String,
    client: Client,
}

impl Anthropic {
    pub fn new(settings: Settings, api_key: String) -> Result<Self, FlaviaError> {
        let client = super::http_client(settings.timeout)?;
        Ok(Self { settings, api_key, client })
    }
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Msg<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MsgResponse {
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    text: String,
    #[serde(default)]
    r#type: String,
}

#[async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.settings.api_base.trim_end_matches('/'));
        let body = MsgRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![Msg { role: "user", content: &prompt.user }],
            system: Some(prompt.system.as_str()).filter(|s| !s.is_empty()),
        };

        let req = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let text = super::send(NAME, req).await?;

        let parsed: MsgResponse =
            serde_json::from_str(&text).map_err(|e| super::undecodable(NAME, e, &text))?;
        let content: String = parsed
            .content
            .into_iter()
            .filter(|b| b.r#type == "text" || b.r#type.is_empty())
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(ProviderError::new(NAME, ProviderErrorKind::Unknown, "empty content"));
        }
        Ok(content)
    }
}
