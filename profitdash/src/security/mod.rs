//! Authentication and audit logging.
//!
//! # Bearer Tokens
//!
//! Requests are authenticated with Ed25519-signed JWTs issued by the auth
//! service. [`TokenVerifier`] checks signature and expiry and yields the
//! [`Caller`]:
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use ed25519_dalek::SigningKey;
//! use profitdash::{
//!     security::{AccessClaims, Role, TokenVerifier, issue_token},
//!     subscription::UserId,
//! };
//!
//! let key = SigningKey::from_bytes(&[3u8; 32]);
//! let claims = AccessClaims::new(&UserId::new("ops-1").unwrap(), Role::Admin, Utc::now(), Duration::minutes(5));
//! let token = issue_token(&claims, &key).unwrap();
//!
//! let caller = TokenVerifier::new(key.verifying_key()).verify(&token, Utc::now()).unwrap();
//! assert!(caller.require_admin().is_ok());
//! ```
//!
//! # Audit Logging
//!
//! Admin overrides, account deletions and rejected credentials are recorded
//! as structured events on the `audit` tracing target:
//!
//! ```rust
//! use profitdash::security::audit::{AuditEvent, AuditEventType, audit_log};
//! use uuid::Uuid;
//!
//! let event = AuditEvent::new(AuditEventType::AccountDeleted, "user-456", Uuid::new_v4())
//!     .with_target_user("user-456");
//!
//! audit_log(&event);
//! ```
//!
//! # Security Considerations
//!
//! - Only the public key is configured; tokens cannot be minted by this service
//!   in production
//! - User IDs are redacted in audit output
//! - Request correlation IDs enable tracking across operations

pub mod audit;
pub mod token;

pub use audit::{AuditDetails, AuditEvent, AuditEventType, audit_log, redact_user_id};
pub use token::{AccessClaims, Caller, Role, TokenVerifier, issue_token};
