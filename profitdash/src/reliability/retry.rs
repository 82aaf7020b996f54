//! Exponential backoff retry logic for transient failures.
//!
//! Only [`ProfitdashError::StoreUnavailable`] is retried; every other error is
//! returned on the first occurrence.

use std::time::Duration;

use crate::error::{ProfitdashError, Result};

/// Maximum attempts used by the scheduled checks.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Configuration for retry behavior.
///
/// The delay between retries increases exponentially up to a maximum value.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use profitdash::reliability::RetryPolicy;
///
/// // Default policy: 3 attempts, 100ms initial delay, 5s max delay
/// let policy = RetryPolicy::default();
///
/// let patient = RetryPolicy {
///     max_attempts: 5,
///     initial_delay: Duration::from_millis(250),
///     max_delay: Duration::from_secs(10),
///     backoff_multiplier: 2.0,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (default: 3)
    pub max_attempts: u32,
    /// Initial delay between retries (default: 100ms)
    pub initial_delay: Duration,
    /// Maximum delay between retries (default: 5s)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom maximum attempts.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::reliability::RetryPolicy;
    ///
    /// let policy = RetryPolicy::with_max_attempts(5);
    /// assert_eq!(policy.max_attempts, 5);
    /// ```
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts, ..Self::default() }
    }

    /// Delay before retry number `attempt` (zero-based), capped at `max_delay`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
        let max_ms = self.max_delay.as_millis() as f64;
        if !delay_ms.is_finite() || delay_ms >= max_ms {
            return self.max_delay;
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "delay_ms is finite, non-negative and below max_delay"
        )]
        let delay = Duration::from_millis(delay_ms.max(0.0) as u64);
        delay
    }
}

/// Executes a store operation with exponential backoff retry.
///
/// Retries while the error is [retryable](is_retryable), up to
/// `max_attempts` attempts in total.
///
/// # Examples
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicU32, Ordering},
/// };
///
/// use profitdash::{
///     error::ProfitdashError,
///     reliability::{RetryPolicy, retry_with_backoff},
/// };
///
/// # async fn example() -> profitdash::error::Result<()> {
/// let attempt = Arc::new(AtomicU32::new(0));
///
/// let rows = retry_with_backoff(&RetryPolicy::default(), || {
///     let attempt = Arc::clone(&attempt);
///     async move {
///         if attempt.fetch_add(1, Ordering::Relaxed) == 0 {
///             Err(ProfitdashError::StoreUnavailable("connection reset".into()))
///         } else {
///             Ok(vec!["profile-1"])
///         }
///     }
/// })
/// .await?;
///
/// assert_eq!(rows.len(), 1);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once all attempts
/// are exhausted.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, "Store operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !is_retryable(&error) => return Err(error),
            Err(error) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Store operation failed, will retry"
                );

                last_error = Some(error);

                // Don't sleep after the last attempt
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.delay_for_attempt(attempt);
                    tracing::debug!(delay_ms = delay.as_millis(), "Sleeping before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ProfitdashError::StoreUnavailable("retry policy allows no attempts".into())
    }))
}

/// Determines if an error is retryable.
///
/// Only a temporarily unreachable store is worth retrying. Input, state and
/// access errors would fail again the same way.
///
/// # Examples
///
/// ```
/// use profitdash::{error::ProfitdashError, reliability::is_retryable};
///
/// assert!(is_retryable(&ProfitdashError::StoreUnavailable("timeout".into())));
/// assert!(!is_retryable(&ProfitdashError::Storage("constraint violated".into())));
/// ```
#[must_use]
pub const fn is_retryable(error: &ProfitdashError) -> bool {
    matches!(error, ProfitdashError::StoreUnavailable(_))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy { max_delay: Duration::from_secs(1), ..RetryPolicy::default() };
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_transient_failures() {
        let policy = RetryPolicy::default();
        let call_count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&call_count);
        let result = retry_with_backoff(&policy, || {
            let count = Arc::clone(&count_clone);
            async move {
                let mut c = count.lock().unwrap();
                *c += 1;
                let current = *c;
                drop(c);

                if current < 3 {
                    Err(ProfitdashError::StoreUnavailable("temporary failure".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*call_count.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::default();
        let call_count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&call_count);
        let result: Result<()> = retry_with_backoff(&policy, || {
            let count = Arc::clone(&count_clone);
            async move {
                *count.lock().unwrap() += 1;
                Err(ProfitdashError::StoreUnavailable("down".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(ProfitdashError::StoreUnavailable(_))));
        assert_eq!(*call_count.lock().unwrap(), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returned_immediately() {
        let policy = RetryPolicy::default();
        let call_count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&call_count);
        let result: Result<()> = retry_with_backoff(&policy, || {
            let count = Arc::clone(&count_clone);
            async move {
                *count.lock().unwrap() += 1;
                Err(ProfitdashError::Storage("corrupt row".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(ProfitdashError::Storage(_))));
        assert_eq!(*call_count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts() {
        let policy = RetryPolicy::with_max_attempts(0);
        let result: Result<()> = retry_with_backoff(&policy, || async { Ok(()) }).await;
        assert!(result.is_err());
    }
}
