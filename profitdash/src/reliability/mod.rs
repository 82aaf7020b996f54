//! Reliability patterns for store access.
//!
//! Provides retry logic with exponential backoff for transient storage
//! failures hit by the scheduled lifecycle checks.

mod retry;

pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, is_retryable, retry_with_backoff};
