use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flavia::client::{ModelClient, RetryPolicy};
use flavia::errors::{ProviderError, ProviderErrorKind};
use flavia::prompt::Prompt;
use flavia::provider::Provider;

/// Fails with `kind` for the first `failures` calls, then answers "ok".
/// `Timeout` is simulated by never answering.
struct Flaky {
    calls: Arc<AtomicU32>,
    kind: ProviderErrorKind,
    failures: u32,
}

#[async_trait]
impl Provider for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn complete(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.failures {
            return Ok("ok".into());
        }
        if self.kind == ProviderErrorKind::Timeout {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        Err(ProviderError::new("flaky", self.kind, "simulated"))
    }
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(5),
        max_retries,
        backoff_base: Duration::from_millis(100),
        max_backoff: Duration::from_secs(2),
    }
}

fn client(kind: ProviderErrorKind, failures: u32, max_retries: u32) -> (ModelClient, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let provider = Flaky { calls: calls.clone(), kind, failures };
    (ModelClient::new(Box::new(provider), policy(max_retries)), calls)
}

fn prompt() -> Prompt {
    Prompt { system: "s".into(), user: "u".into() }
}

#[tokio::test(start_paused = true)]
async fn timeout_is_retried_exactly_max_retries_times() {
    let (client, calls) = client(ProviderErrorKind::Timeout, u32::MAX, 3);
    let err = client.call_model(&prompt()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Timeout);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(err.attempts, 4);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_is_not_retried() {
    let (client, calls) = client(ProviderErrorKind::Auth, u32::MAX, 3);
    let err = client.call_model(&prompt()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Auth);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_recovers_after_backoff() {
    let (client, calls) = client(ProviderErrorKind::RateLimited, 2, 3);
    let started = tokio::time::Instant::now();
    let text = client.call_model(&prompt()).await.unwrap();
    assert_eq!(text, "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 100ms then 200ms of backoff.
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_one_attempt() {
    let (client, calls) = client(ProviderErrorKind::Network, u32::MAX, 0);
    let err = client.call_model(&prompt()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_errors_fail_fast() {
    let (client, calls) = client(ProviderErrorKind::Unknown, u32::MAX, 3);
    client.call_model(&prompt()).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
