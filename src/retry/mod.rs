//! Retry executor with exponential backoff
//!
//! Every network operation in the crawler runs through [`execute`]:
//! - Transport failures are retried with jittered exponential backoff
//! - Any other failure stops immediately
//! - Once the budget is spent the last error is wrapped in `RetryExhausted`
//! - A cancelled token aborts both the pending wait and further attempts

mod backoff;

pub use backoff::{base_delay_for, compute_delay, is_retryable, JITTER_FRACTION};

use crate::config::RetryConfig;
use crate::HarvestError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry budget and backoff bounds for one kind of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }
}

/// Per-invocation retry bookkeeping
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Retries performed so far (0 during the first attempt)
    pub attempt: u32,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_retries,
            base_delay: policy.base_delay,
            max_delay: policy.max_delay,
        }
    }

    /// Returns true once no retries remain
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&self) -> Duration {
        compute_delay(self.attempt, self.base_delay, self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the budget is spent
///
/// # Arguments
///
/// * `operation` - Zero-argument closure producing a fresh future per attempt
/// * `policy` - Retry budget and backoff bounds
/// * `label` - Human-readable operation name used in logs and errors
/// * `cancel` - Cooperative cancellation signal
///
/// # Returns
///
/// * `Ok(T)` - The first successful result
/// * `Err(HarvestError::RetryExhausted)` - Wrapping the last failure, either
///   because it was not retryable or because `max_retries` retries were used
/// * `Err(HarvestError::Cancelled)` - The token fired before a retry
pub async fn execute<T, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    label: &str,
    cancel: &CancellationToken,
) -> Result<T, HarvestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HarvestError>>,
{
    let mut state = RetryState::new(policy);

    loop {
        tracing::debug!("{} attempt {}", label, state.attempt + 1);

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        tracing::warn!("{} attempt {} failed: {}", label, state.attempt + 1, error);

        if !is_retryable(&error) || state.is_exhausted() {
            tracing::error!(
                "Failed to complete {} after {} attempt(s)",
                label,
                state.attempt + 1
            );
            return Err(HarvestError::RetryExhausted {
                label: label.to_string(),
                attempts: state.attempt + 1,
                source: Box::new(error),
            });
        }

        if cancel.is_cancelled() {
            tracing::info!("{} cancelled before retry", label);
            return Err(HarvestError::Cancelled);
        }

        let delay = state.next_delay();
        state.attempt += 1;
        tracing::info!(
            "Retrying {} in {:?} (attempt {})",
            label,
            delay,
            state.attempt + 1
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("{} cancelled during backoff", label);
                return Err(HarvestError::Cancelled);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportKind;
    use std::time::Instant;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn transient() -> HarvestError {
        HarvestError::Transport {
            url: "https://quotes.toscrape.com/".to_string(),
            kind: TransportKind::Timeout,
            message: "timed out".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let mut calls = 0;
        let result = execute(
            || {
                calls += 1;
                async { Ok::<_, HarvestError>("page") }
            },
            &fast_policy(3),
            "Fetch",
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let mut calls = 0;
        let result = execute(
            || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(transient())
                    } else {
                        Ok(attempt)
                    }
                }
            },
            &fast_policy(3),
            "Fetch",
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_at_most_max_retries_plus_one_attempts() {
        for max_retries in 0..4 {
            let mut calls = 0;
            let result: Result<(), _> = execute(
                || {
                    calls += 1;
                    async { Err(transient()) }
                },
                &fast_policy(max_retries),
                "Fetch",
                &CancellationToken::new(),
            )
            .await;

            assert_eq!(calls, max_retries + 1);
            match result {
                Err(HarvestError::RetryExhausted {
                    attempts, source, ..
                }) => {
                    assert_eq!(attempts, max_retries + 1);
                    assert!(source.is_transport());
                }
                other => panic!("expected RetryExhausted, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt_without_delay() {
        let mut calls = 0;
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(10),
        };
        let start = Instant::now();

        let result: Result<(), _> = execute(
            || {
                calls += 1;
                async { Err(transient()) }
            },
            &policy,
            "Login",
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(calls, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(matches!(result, Err(HarvestError::RetryExhausted { .. })));
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_never_retried() {
        let mut calls = 0;
        let result: Result<(), _> = execute(
            || {
                calls += 1;
                async { Err(HarvestError::AuthenticationStructure("no form".to_string())) }
            },
            &fast_policy(5),
            "Login",
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(calls, 1);
        let err = result.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            HarvestError::AuthenticationStructure(_)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_retry() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;

        let result: Result<(), _> = execute(
            || {
                calls += 1;
                async { Err(transient()) }
            },
            &fast_policy(3),
            "Fetch",
            &cancel,
        )
        .await;

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(HarvestError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_long_backoff() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result: Result<(), _> =
            execute(|| async { Err(transient()) }, &policy, "Fetch", &cancel).await;

        assert!(matches!(result, Err(HarvestError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_retry_state_exhaustion() {
        let mut state = RetryState::new(&fast_policy(2));
        assert!(!state.is_exhausted());
        state.attempt = 2;
        assert!(state.is_exhausted());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }
}
