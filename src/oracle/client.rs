//! Oracle boundary and retrying client wrapper.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::oracle::retry::RetryPolicy;

/// Errors from a single oracle call.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Network-level failure reaching the oracle.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The oracle responded with a non-success HTTP status.
    #[error("oracle returned status {0}")]
    Status(u16),

    /// The oracle returned no usable completion text.
    #[error("oracle returned an empty response")]
    Empty,

    /// The response envelope did not carry a completion.
    #[error("oracle response missing completion text")]
    MalformedEnvelope,
}

impl OracleError {
    /// Whether the retry policy applies to this error. Transport failures,
    /// rate limits, server errors, and empty/invalid results are transient;
    /// client errors (bad request, auth) are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Empty | Self::MalformedEnvelope => true,
            Self::Status(code) => *code == 429 || *code >= 500,
        }
    }
}

/// Result type for oracle calls.
pub type OracleResult<T> = Result<T, OracleError>;

/// The external generative-text oracle.
///
/// Implementations must be safe to invoke concurrently from multiple
/// workers: configuration is immutable and no per-call state is held.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Produce completion text for the given prompt and system prompt.
    async fn complete(&self, prompt: &str, system_prompt: &str) -> OracleResult<String>;
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for std::sync::Arc<T> {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> OracleResult<String> {
        (**self).complete(prompt, system_prompt).await
    }
}

/// Retrying wrapper around a single oracle call.
///
/// Transient failures and empty responses are retried with exponential
/// backoff per the policy; non-transient failures surface immediately.
/// Structural parse failures happen downstream of this client and are never
/// retried.
#[derive(Debug, Clone)]
pub struct OracleClient<O> {
    inner: O,
    policy: RetryPolicy,
}

impl<O: Oracle> OracleClient<O> {
    /// Wrap an oracle with the given retry policy.
    pub fn new(inner: O, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The configured retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call the oracle, retrying transient failures up to the policy limit.
    pub async fn complete(&self, prompt: &str, system_prompt: &str) -> OracleResult<String> {
        let mut attempt = 1u32;
        loop {
            let error = match self.inner.complete(prompt, system_prompt).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => OracleError::Empty,
                Err(err) => err,
            };

            if !error.is_transient() || attempt >= self.policy.max_attempts {
                return Err(error);
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "oracle call failed, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Oracle that fails a fixed number of times before succeeding.
    struct FlakyOracle {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyOracle {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Oracle for FlakyOracle {
        async fn complete(&self, _prompt: &str, _system_prompt: &str) -> OracleResult<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(OracleError::Transport("connection reset".to_string()))
            } else {
                Ok("{\"ok\": true}".to_string())
            }
        }
    }

    /// Oracle that always returns whitespace.
    struct BlankOracle;

    #[async_trait]
    impl Oracle for BlankOracle {
        async fn complete(&self, _prompt: &str, _system_prompt: &str) -> OracleResult<String> {
            Ok("   \n".to_string())
        }
    }

    /// Oracle that always rejects with a client error.
    struct UnauthorizedOracle {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Oracle for UnauthorizedOracle {
        async fn complete(&self, _prompt: &str, _system_prompt: &str) -> OracleResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::Status(401))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let client = OracleClient::new(FlakyOracle::new(2), fast_policy());
        let text = client.complete("p", "s").await.unwrap();
        assert_eq!(text, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let oracle = FlakyOracle::new(10);
        let client = OracleClient::new(oracle, fast_policy());
        let err = client.complete("p", "s").await.unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_blank_response_treated_as_empty() {
        let client = OracleClient::new(BlankOracle, fast_policy());
        let err = client.complete("p", "s").await.unwrap_err();
        assert!(matches!(err, OracleError::Empty));
    }

    #[tokio::test]
    async fn test_non_transient_error_not_retried() {
        let oracle = UnauthorizedOracle {
            calls: AtomicU32::new(0),
        };
        let client = OracleClient::new(oracle, fast_policy());
        let err = client.complete("p", "s").await.unwrap_err();
        assert!(matches!(err, OracleError::Status(401)));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_applied() {
        let start = tokio::time::Instant::now();
        let client = OracleClient::new(FlakyOracle::new(2), RetryPolicy::default());
        client.complete("p", "s").await.unwrap();
        // Two retries: 2s then 4s of backoff under the default policy.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[test]
    fn test_transience_classification() {
        assert!(OracleError::Transport("x".into()).is_transient());
        assert!(OracleError::Empty.is_transient());
        assert!(OracleError::Status(429).is_transient());
        assert!(OracleError::Status(503).is_transient());
        assert!(!OracleError::Status(400).is_transient());
        assert!(!OracleError::Status(401).is_transient());
    }
}
