//! Bounded retry with backoff for rate-limited endpoints.
//!
//! Only rate-limit failures are retried. Everything else, including a
//! package that is genuinely absent from the listing, aborts immediately.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use super::RegistryError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffShape {
    /// `base * 2^attempt`, capped, then randomised to roughly ±25%.
    Centered,
    /// `base * 2^(attempt - 1)`, capped, plus up to 25% extra.
    Trailing,
}

/// Retry budget and backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub shape: BackoffShape,
}

impl RetryPolicy {
    /// Registry listing lookups: 3 attempts, 1s base, 30s cap.
    pub fn registry() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            shape: BackoffShape::Centered,
        }
    }

    /// Artifact downloads: 3 attempts, 2s base.
    pub fn download() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            shape: BackoffShape::Trailing,
        }
    }

    /// Same attempt budget, no sleeping. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            shape: BackoffShape::Centered,
        }
    }

    /// Un-jittered delay before the given attempt (0-based, so attempt 0 has
    /// no delay).
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = match self.shape {
            BackoffShape::Centered => attempt,
            BackoffShape::Trailing => attempt - 1,
        };
        let factor = 1u32.checked_shl(exponent.min(16)).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Delay before the given attempt, with jitter applied.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let delay = self.nominal_delay(attempt);
        match self.shape {
            BackoffShape::Centered => {
                (delay + random_up_to(delay / 2)).saturating_sub(delay / 4)
            }
            BackoffShape::Trailing => delay + random_up_to(delay / 4),
        }
    }
}

/// Uniform random duration in `[0, bound)`; zero when the bound is zero.
fn random_up_to(bound: Duration) -> Duration {
    let nanos = bound.as_nanos().min(u64::MAX as u128) as u64;
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}

/// Runs `op` until it succeeds, fails with a non rate-limit error, or the
/// attempt budget is spent.
pub fn with_retry<T, F>(
    policy: &RetryPolicy,
    operation_name: &str,
    op: F,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Result<T, RegistryError>,
{
    with_retry_if(policy, operation_name, RegistryError::is_rate_limited, op)
}

/// Like [`with_retry`], but only errors accepted by `retryable` are retried.
pub fn with_retry_if<T, F>(
    policy: &RetryPolicy,
    operation_name: &str,
    retryable: fn(&RegistryError) -> bool,
    mut op: F,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Result<T, RegistryError>,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.delay_before(attempt);
            info!(
                "Rate limited, retrying {} in {:?} (attempt {}/{})",
                operation_name,
                delay,
                attempt + 1,
                policy.max_attempts
            );
            std::thread::sleep(delay);
        }

        match op() {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        "{} succeeded on attempt {}/{}",
                        operation_name,
                        attempt + 1,
                        policy.max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) if retryable(&e) => {
                warn!(
                    "{} rate limited (attempt {}/{}): {}",
                    operation_name,
                    attempt + 1,
                    policy.max_attempts,
                    e
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(RegistryError::RetriesExhausted {
        attempts: policy.max_attempts,
        source: Box::new(last_error.unwrap_or_else(|| RegistryError::RateLimited {
            url: operation_name.to_string(),
        })),
    })
}
