use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What went wrong talking to the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Auth,
    RateLimited,
    Timeout,
    Network,
    BadRequest,
    Unknown,
}

impl ProviderErrorKind {
    /// Only these are worth another attempt.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Network)
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auth => "authentication failed",
            Self::RateLimited => "rate limited",
            Self::Timeout => "timed out",
            Self::Network => "network error",
            Self::BadRequest => "request rejected",
            Self::Unknown => "unknown provider error",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone)]
#[error("{provider}: {kind}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
    pub status: Option<u16>,
    /// Attempts made before giving up; filled in by the model client.
    pub attempts: u32,
}

impl ProviderError {
    pub fn new(provider: &str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind,
            message: message.into(),
            status: None,
            attempts: 0,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Map an HTTP status the provider answered with.
    pub fn from_status(provider: &str, status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            429 => ProviderErrorKind::RateLimited,
            408 | 504 => ProviderErrorKind::Timeout,
            400..=499 => ProviderErrorKind::BadRequest,
            _ => ProviderErrorKind::Unknown,
        };
        let mut message = body.trim().to_string();
        if message.len() > 500 {
            let mut cut = 500;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Self::new(provider, kind, message).with_status(status)
    }

    pub fn from_reqwest(provider: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ProviderErrorKind::Network
        } else if err.is_decode() {
            ProviderErrorKind::Unknown
        } else {
            ProviderErrorKind::Network
        };
        let mut e = Self::new(provider, kind, err.to_string());
        e.status = err.status().map(|s| s.as_u16());
        e
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("writing {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("encoding {path}: {source}")]
    Encode { path: PathBuf, source: serde_json::Error },
    #[error("{path} is not valid JSON, refusing to overwrite it: {source}")]
    Malformed { path: PathBuf, source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum FlaviaError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("could not parse model output: {reason}")]
    Parse { reason: String, raw: String },
    #[error("model output failed validation: {}", reasons.join("; "))]
    Validation { reasons: Vec<String>, raw: Option<String> },
    #[error("personal data error: {0}")]
    Store(#[from] StoreError),
}

impl FlaviaError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reasons: vec![reason.into()], raw: None }
    }

    /// Pipeline stage that failed, for one unambiguous user-facing message.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InvalidRequest(_) => "request",
            Self::Provider(_) => "model call",
            Self::Parse { .. } => "parsing",
            Self::Validation { .. } => "validation",
            Self::Store(_) => "personal data",
        }
    }

    /// Raw model text kept for diagnostics, if this error carries any.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            Self::Validation { raw: Some(raw), .. } => Some(raw),
            _ => None,
        }
    }

    pub fn with_raw(self, text: &str) -> Self {
        match self {
            Self::Validation { reasons, raw: None } => {
                Self::Validation { reasons, raw: Some(text.to_string()) }
            }
            other => other,
        }
    }
}

pub type Result<T, E = FlaviaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(ProviderError::from_status("p", 401, "").kind, ProviderErrorKind::Auth);
        assert_eq!(ProviderError::from_status("p", 403, "").kind, ProviderErrorKind::Auth);
        assert_eq!(ProviderError::from_status("p", 429, "").kind, ProviderErrorKind::RateLimited);
        assert_eq!(ProviderError::from_status("p", 504, "").kind, ProviderErrorKind::Timeout);
        assert_eq!(ProviderError::from_status("p", 422, "").kind, ProviderErrorKind::BadRequest);
        assert_eq!(ProviderError::from_status("p", 503, "").kind, ProviderErrorKind::Unknown);
    }

    #[test]
    fn only_rate_limit_timeout_and_network_are_transient() {
        assert!(ProviderErrorKind::RateLimited.is_transient());
        assert!(ProviderErrorKind::Timeout.is_transient());
        assert!(ProviderErrorKind::Network.is_transient());
        assert!(!ProviderErrorKind::Auth.is_transient());
        assert!(!ProviderErrorKind::BadRequest.is_transient());
        assert!(!ProviderErrorKind::Unknown.is_transient());
    }

    #[test]
    fn stage_names_are_distinct_for_call_and_parse() {
        let call = FlaviaError::Provider(ProviderError::new("p", ProviderErrorKind::Timeout, "slow"));
        let parse = FlaviaError::Parse { reason: "no json".into(), raw: "hello".into() };
        assert_eq!(call.stage(), "model call");
        assert_eq!(parse.stage(), "parsing");
        assert_eq!(parse.raw_text(), Some("hello"));
    }
}
