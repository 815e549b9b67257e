//! Backoff policy
//!
//! Pure delay computation and failure classification. Nothing here sleeps or
//! performs I/O.

use crate::HarvestError;
use rand::Rng;
use std::time::Duration;

/// Fraction of the computed delay used as the upper bound of the jitter term
pub const JITTER_FRACTION: f64 = 0.1;

/// Returns the pre-jitter delay `min(base * 2^attempt, max)`
///
/// The exponent saturates, so very large attempt numbers clamp to `max`
/// instead of overflowing.
pub fn base_delay_for(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base_delay.saturating_mul(factor).min(max_delay)
}

/// Computes the delay before the next retry
///
/// `delay = min(base * 2^attempt, max) + U[0, 0.1 * that]`, so the result
/// always lies within `[d, 1.1 * d]` where `d` is the clamped delay. Attempt 0
/// is the first retry.
///
/// # Examples
///
/// ```
/// use quote_harvester::retry::compute_delay;
/// use std::time::Duration;
///
/// let delay = compute_delay(2, Duration::from_secs(1), Duration::from_secs(10));
/// assert!(delay >= Duration::from_secs(4));
/// assert!(delay <= Duration::from_millis(4400));
/// ```
pub fn compute_delay(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    let delay = base_delay_for(attempt, base_delay, max_delay);
    let jitter = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
    delay + delay.mul_f64(jitter)
}

/// Classifies a failure as transient or not
///
/// Only transport failures (timeouts, connection errors, non-success HTTP
/// statuses) are worth retrying. Structural, ordering and programming errors
/// propagate immediately.
pub fn is_retryable(error: &HarvestError) -> bool {
    matches!(error, HarvestError::Transport { .. })
}
