//! Error types for profitdash.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! type is [`ProfitdashError`]. All variants carry a human-readable message that
//! can be shown to the end user; the HTTP layer maps each variant to a status
//! code and a stable machine code.
//!
//! # Error Categories
//!
//! - **Input errors** ([`ProfitdashError::Validation`], [`ProfitdashError::InvalidPlanCode`]):
//!   the request is malformed and must be fixed before retrying
//! - **State errors** ([`ProfitdashError::InvalidTransition`], [`ProfitdashError::Conflict`],
//!   [`ProfitdashError::ReadOnly`], [`ProfitdashError::LimitReached`]): the request is valid
//!   but the account state does not allow it
//! - **Access errors** ([`ProfitdashError::Unauthorized`], [`ProfitdashError::Forbidden`])
//! - **Infrastructure errors** ([`ProfitdashError::Storage`],
//!   [`ProfitdashError::StoreUnavailable`], [`ProfitdashError::Config`])
//!
//! # Examples
//!
//! ```
//! use profitdash::error::{ProfitdashError, Result};
//!
//! fn require_title(title: &str) -> Result<&str> {
//!     if title.trim().is_empty() {
//!         return Err(ProfitdashError::Validation("title cannot be empty".to_owned()));
//!     }
//!     Ok(title)
//! }
//!
//! assert!(require_title("Q3 launch").is_ok());
//! assert!(require_title("  ").is_err());
//! ```

use thiserror::Error;

/// Result type alias for profitdash operations.
pub type Result<T> = std::result::Result<T, ProfitdashError>;

/// Errors that can occur in profitdash.
///
/// # Error Recovery
///
/// - **Transient errors** ([`StoreUnavailable`](Self::StoreUnavailable)): retry with
///   exponential backoff, see [`crate::reliability::retry_with_backoff`]
/// - **Input errors**: fix the request and resend
/// - **Read-only lockouts** ([`ReadOnly`](Self::ReadOnly)): the account needs an active plan
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum ProfitdashError {
    /// Request input failed validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::error::ProfitdashError;
    ///
    /// let err = ProfitdashError::Validation("title must be 100 characters or less".to_owned());
    /// assert!(err.to_string().starts_with("Validation failed"));
    /// ```
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Plan code is malformed or not part of the plan catalog.
    #[error("Invalid plan code: {0}")]
    InvalidPlanCode(String),

    /// Requested lifecycle transition is not allowed from the current state.
    #[error("Invalid subscription transition: {0}")]
    InvalidTransition(String),

    /// Requested record does not exist (or belongs to another user).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with existing data, e.g. a second trial.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Account is in read-only mode; mutations are blocked.
    ///
    /// Carries the reason shown to the user (trial expired, subscription
    /// suspended, ...).
    #[error("Account is read-only: {0}")]
    ReadOnly(String),

    /// Plan usage limit reached.
    #[error("Plan limit reached: {0}")]
    LimitReached(String),

    /// Bearer token missing, malformed, badly signed, or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Configuration could not be parsed or failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Storage backend rejected an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage backend is temporarily unreachable.
    ///
    /// This is the only retryable variant.
    #[error("Storage backend unavailable: {0}")]
    StoreUnavailable(String),
}

impl ProfitdashError {
    /// Returns a stable machine-readable code for the error.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::error::ProfitdashError;
    ///
    /// assert_eq!(ProfitdashError::ReadOnly("trial expired".into()).code(), "READ_ONLY");
    /// ```
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidPlanCode(_) => "INVALID_PLAN",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ReadOnly(_) => "READ_ONLY",
            Self::LimitReached(_) => "LIMIT_REACHED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}
