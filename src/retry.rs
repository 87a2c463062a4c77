//! Retrying post-submission checks until the mirror catches up.
//!
//! Only [`TckError::is_transient`] failures are retried. Anything else,
//! including transport and protocol errors raised inside the check, goes
//! straight back to the caller on the first occurrence.

use crate::error::{Result, TckError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^n` after the n-th failure, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                base.saturating_mul(1u32 << failures.min(20)).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations of the check, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::fixed(10, Duration::from_secs(1))
    }
}

/// Runs `check` until it succeeds, fails for a non-transient reason, or has
/// been invoked `max_attempts` times. The last failure is returned unchanged.
pub async fn retry_on_error<T, F, Fut>(policy: &RetryPolicy, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match check().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff.delay(attempt - 1);
                debug!(
                    attempt,
                    max_attempts,
                    ?delay,
                    error = %err,
                    "check not yet satisfied, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Compares a replicated field, reporting a transient mismatch on difference.
pub fn expect_field<T>(field: &str, expected: &T, actual: &T) -> Result<()>
where
    T: PartialEq + std::fmt::Debug + ?Sized,
{
    if expected == actual {
        Ok(())
    } else {
        Err(TckError::Mismatch {
            field: field.to_string(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_expect_field_is_transient() {
        assert!(expect_field("memo", "a", "a").is_ok());
        let err = expect_field("memo", "a", "b").unwrap_err();
        assert!(err.is_transient());
    }
}
