//! Audit logging for security-relevant events.
//!
//! Provides structured audit events with user ID redaction and unique
//! correlation IDs. Events are emitted on the `audit` tracing target and the
//! admin-initiated ones are also persisted through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscription::LifecycleState;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Admin forced a subscription state.
    SubscriptionStateForced,
    /// Scheduled check moved a trial or subscription forward.
    LifecycleTransition,
    /// User deleted their account.
    AccountDeleted,
    /// Bearer token was rejected.
    AuthenticationFailed,
    /// Authenticated caller lacked the required role.
    AccessDenied,
}

/// Details for audit log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Account the action applied to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user: Option<String>,
    /// State before the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_state: Option<String>,
    /// State after the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_state: Option<String>,
    /// Operator-supplied reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use profitdash::security::audit::{AuditEvent, AuditEventType, audit_log};
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(AuditEventType::SubscriptionStateForced, "admin-1", Uuid::new_v4())
///     .with_target_user("user-42")
///     .with_transition(Some("active"), "suspended")
///     .with_reason("chargeback");
///
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Entry ID.
    pub id: Uuid,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub event_type: AuditEventType,
    /// Who performed the action (`system` for the scheduler).
    pub actor_id: String,
    /// Request correlation ID.
    pub request_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event stamped with the current time.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(event_type: AuditEventType, actor_id: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            actor_id: actor_id.into(),
            request_id,
            details: AuditDetails::default(),
        }
    }

    /// Overrides the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds the target account.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_target_user(mut self, user_id: impl Into<String>) -> Self {
        self.details.target_user = Some(user_id.into());
        self
    }

    /// Adds the previous and new states.
    #[must_use]
    pub fn with_transition(mut self, from: Option<&str>, to: &str) -> Self {
        self.details.from_state = from.map(str::to_owned);
        self.details.to_state = Some(to.to_owned());
        self
    }

    /// Adds a lifecycle transition.
    #[must_use]
    pub fn with_lifecycle(self, from: Option<LifecycleState>, to: LifecycleState) -> Self {
        self.with_transition(from.map(LifecycleState::as_str), to.as_str())
    }

    /// Adds the operator's reason.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.details.reason = Some(reason.into());
        self
    }

    /// Adds an error message.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(error.into());
        self
    }
}

/// Logs audit event to tracing with target "audit".
///
/// Audit logs use a dedicated target so they can be filtered and routed
/// separately, e.g. `RUST_LOG=audit=info`.
pub fn audit_log(event: &AuditEvent) {
    let details = &event.details;
    let target_user = details.target_user.as_deref().map(redact_user_id).unwrap_or_default();
    tracing::info!(
        target: "audit",
        audit_id = %event.id,
        timestamp = %event.timestamp,
        event_type = ?event.event_type,
        actor_id = %redact_user_id(&event.actor_id),
        request_id = %event.request_id,
        target_user = %target_user,
        from_state = details.from_state.as_deref().unwrap_or_default(),
        to_state = details.to_state.as_deref().unwrap_or_default(),
        reason = details.reason.as_deref().unwrap_or_default(),
        error = details.error.as_deref().unwrap_or_default(),
        "AUDIT"
    );
}

/// Redacts a user ID to show only last 4 characters.
///
/// # Examples
///
/// ```
/// use profitdash::security::audit::redact_user_id;
///
/// assert_eq!(redact_user_id("user-1234567890"), "user-******7890");
/// assert_eq!(redact_user_id("abc"), "abc");
/// ```
#[must_use]
pub fn redact_user_id(user_id: &str) -> String {
    let chars: Vec<char> = user_id.chars().collect();
    if chars.len() <= 4 {
        return user_id.to_owned();
    }

    // Keep a prefix like "user-" intact
    let prefix_len = chars.iter().position(|&c| c == '-').map_or(0, |pos| pos + 1);
    let prefix_len = prefix_len.min(chars.len() - 4);
    let prefix: String = chars[..prefix_len].iter().collect();
    let visible_end: String = chars[chars.len() - 4..].iter().collect();
    let redacted_middle = "*".repeat(chars.len() - prefix_len - 4);

    format!("{prefix}{redacted_middle}{visible_end}")
}

/// Convenience macro for audit logging.
///
/// # Examples
///
/// ```
/// use profitdash::{audit, security::audit::AuditEventType};
/// use uuid::Uuid;
///
/// audit!(AuditEventType::AuthenticationFailed, "anonymous", Uuid::new_v4());
///
/// audit!(
///     AuditEventType::AccessDenied,
///     "user-456",
///     Uuid::new_v4(),
///     with_error("admin role required")
/// );
/// ```
#[macro_export]
macro_rules! audit {
    ($event_type:expr, $actor_id:expr, $request_id:expr) => {
        $crate::security::audit::audit_log(
            &$crate::security::audit::AuditEvent::new($event_type, $actor_id, $request_id)
        )
    };
    ($event_type:expr, $actor_id:expr, $request_id:expr, $($method:ident($arg:expr)),+ $(,)?) => {
        $crate::security::audit::audit_log(
            &$crate::security::audit::AuditEvent::new($event_type, $actor_id, $request_id)
                $(.$method($arg))+
        )
    };
}
