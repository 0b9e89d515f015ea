//! Model client: one provider call wrapped in a timeout, with bounded
//! exponential-backoff retries for transient failures.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{ProviderError, ProviderErrorKind};
use crate::prompt::Prompt;
use crate::provider::DynProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timeout: cfg.timeout(),
            max_retries: cfg.max_retries,
            backoff_base: Duration::from_millis(cfg.backoff_base_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }

    /// Delay before retry number `n` (0-based): `min(base * 2^n, max)`.
    pub fn backoff(&self, n: u32) -> Duration {
        let factor = 1u32.checked_shl(n).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.max_backoff)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct ModelClient {
    provider: DynProvider,
    policy: RetryPolicy,
}

impl ModelClient {
    pub fn new(provider: DynProvider, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Raw provider text for `prompt`. The final error carries its kind and
    /// the number of attempts made.
    pub async fn call_model(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let name = self.provider.name();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(provider = name, attempt, max_attempts, prompt_chars = prompt.len(), "calling model");

            let outcome = match tokio::time::timeout(self.policy.timeout, self.provider.complete(prompt)).await {
                Ok(r) => r,
                Err(_) => Err(ProviderError::new(
                    name,
                    ProviderErrorKind::Timeout,
                    format!("no answer within {}s", self.policy.timeout.as_secs_f32()),
                )),
            };

            match outcome {
                Ok(text) => {
                    info!(provider = name, attempt, chars = text.len(), "model answered");
                    return Ok(text);
                }
                Err(mut err) => {
                    if !err.kind.is_transient() || attempt >= max_attempts {
                        err.attempts = attempt;
                        warn!(provider = name, attempt, kind = %err.kind, "model call failed");
                        return Err(err);
                    }
                    let delay = self.policy.backoff(attempt - 1);
                    warn!(
                        provider = name,
                        attempt,
                        kind = %err.kind,
                        backoff_ms = delay.as_millis() as u64,
                        "transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
