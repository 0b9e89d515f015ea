use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Args, ProviderKind};
use crate::errors::FlaviaError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    pub provider: ProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint base.
    pub api_base: Option<String>,
    pub ollama_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
    pub max_days: u32,
    /// Context block budget, in characters.
    pub context_budget: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub save_request: bool,
    pub save_response: bool,
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "personal_data".into(),
            provider: ProviderKind::Anthropic,
            model: "claude-3-5-sonnet-20241022".into(),
            api_base: None,
            ollama_url: "http://localhost:11434".into(),
            timeout_secs: 120,
            max_retries: 3,
            backoff_base_ms: 1_000,
            max_backoff_ms: 30_000,
            max_days: 14,
            context_budget: 6_000,
            max_tokens: 4_000,
            temperature: 0.7,
            save_request: false,
            save_response: false,
            progress: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, FlaviaError> {
        toml::from_str(s).map_err(|e| FlaviaError::Configuration(format!("invalid config: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, FlaviaError> {
        let s = fs_err::read_to_string(path)
            .map_err(|e| FlaviaError::Configuration(e.to_string()))?;
        Self::from_toml_str(&s)
    }

    /// Defaults, then the optional config file, then command-line flags.
    pub fn resolve(args: &Args) -> Result<Self, FlaviaError> {
        let mut cfg = match &args.config {
            Some(p) => Self::load(Path::new(p))?,
            None => Self::default(),
        };
        if let Some(d) = &args.data_dir {
            cfg.data_dir = d.clone();
        }
        if let Some(p) = args.provider {
            if p != cfg.provider && args.model.is_none() {
                cfg.model = default_model(p).to_string();
            }
            cfg.provider = p;
        }
        if let Some(m) = &args.model {
            cfg.model = m.clone();
        }
        if let Some(t) = args.timeout_secs {
            cfg.timeout_secs = t;
        }
        if let Some(r) = args.max_retries {
            cfg.max_retries = r;
        }
        cfg.save_request |= args.save_request;
        cfg.save_response |= args.save_response;
        if args.no_progress {
            cfg.progress = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), FlaviaError> {
        if self.max_days == 0 {
            return Err(FlaviaError::Configuration("max_days must be at least 1".into()));
        }
        if self.context_budget == 0 {
            return Err(FlaviaError::Configuration("context_budget must be positive".into()));
        }
        if self.timeout_secs == 0 {
            return Err(FlaviaError::Configuration("timeout_secs must be positive".into()));
        }
        if self.model.trim().is_empty() {
            return Err(FlaviaError::Configuration("model must not be empty".into()));
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key_var(&self) -> Option<&'static str> {
        match self.provider {
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    /// API key for the selected provider. Missing keys fail here, at startup.
    pub fn api_key(&self) -> Result<Option<String>, FlaviaError> {
        let Some(var) = self.api_key_var() else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(k) if !k.trim().is_empty() => Ok(Some(k)),
            _ => Err(FlaviaError::Configuration(format!("{var} env var is not set"))),
        }
    }
}

pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAI => "gpt-4.1-mini",
        ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
        ProviderKind::Ollama => "llama3.1",
    }
}
