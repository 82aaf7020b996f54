//! Bearer token issuing and verification.
//!
//! Access tokens are compact JWTs signed with Ed25519 (`alg: EdDSA`):
//! `base64url(header).base64url(claims).base64url(signature)`. The auth
//! service holds the signing key; this service only needs the public key.
//!
//! # Examples
//!
//! ```
//! use chrono::{Duration, Utc};
//! use ed25519_dalek::SigningKey;
//! use profitdash::{
//!     security::token::{AccessClaims, Role, TokenVerifier, issue_token},
//!     subscription::UserId,
//! };
//!
//! # fn example() -> profitdash::error::Result<()> {
//! let signing_key = SigningKey::from_bytes(&[7u8; 32]);
//! let verifier = TokenVerifier::new(signing_key.verifying_key());
//!
//! let now = Utc::now();
//! let claims = AccessClaims::new(&UserId::new("user-1")?, Role::User, now, Duration::hours(1));
//! let token = issue_token(&claims, &signing_key)?;
//!
//! let caller = verifier.verify(&token, now)?;
//! assert_eq!(caller.user_id.as_str(), "user-1");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{
    config::decode_key_hex,
    error::{ProfitdashError, Result},
    subscription::UserId,
};

/// Tolerated clock skew for `iat`, in seconds.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Role carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account owner.
    #[default]
    User,
    /// Operator allowed to force subscription states and run checks.
    Admin,
}

/// JWT claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - user ID.
    pub sub: String,
    /// Role.
    #[serde(default)]
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Email address, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AccessClaims {
    /// Creates claims valid for `ttl` from `issued_at`.
    #[must_use]
    pub fn new(user_id: &UserId, role: Role, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            email: None,
        }
    }

    /// Adds the email claim.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// User ID from `sub`.
    pub user_id: UserId,
    /// Role.
    pub role: Role,
    /// Email, if present.
    pub email: Option<String>,
}

impl Caller {
    /// Requires the admin role.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Forbidden`] for non-admin callers.
    pub fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ProfitdashError::Forbidden("admin role required".into()))
        }
    }
}

/// Signs claims into a compact JWT.
///
/// # Errors
///
/// Returns [`ProfitdashError::Unauthorized`] if the claims cannot be encoded.
pub fn issue_token(claims: &AccessClaims, signing_key: &SigningKey) -> Result<String> {
    let header = serde_json::json!({ "alg": "EdDSA", "typ": "JWT" });
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| ProfitdashError::Unauthorized(format!("token header encoding failed: {e}")))?;
    let payload_json = serde_json::to_vec(claims)
        .map_err(|e| ProfitdashError::Unauthorized(format!("token payload encoding failed: {e}")))?;

    let signing_input =
        format!("{}.{}", URL_SAFE_NO_PAD.encode(header_json), URL_SAFE_NO_PAD.encode(payload_json));
    let signature = signing_key.sign(signing_input.as_bytes());

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Verifies access tokens against the auth service's public key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    /// Creates a verifier for a public key.
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Creates a verifier from a hex-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Config`] if the key is not a valid Ed25519 point.
    pub fn from_hex(key: &str) -> Result<Self> {
        let bytes = decode_key_hex(key)?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| ProfitdashError::Config(format!("invalid Ed25519 public key: {e}")))?;
        Ok(Self::new(key))
    }

    /// Verifies a token at `now` and returns the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Unauthorized`] if the token is malformed, not
    /// signed by the expected key, expired, issued in the future, or carries an
    /// invalid subject.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Caller> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(unauthorized("token must have three parts"));
        };

        let header: Header = decode_json(header_b64)?;
        if header.alg != "EdDSA" {
            return Err(unauthorized("unsupported token algorithm"));
        }

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| unauthorized("signature is not base64url"))?;
        let signature_bytes: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| unauthorized("signature must be 64 bytes"))?;
        let signature = Signature::from_bytes(&signature_bytes);

        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        self.key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| unauthorized("invalid token signature"))?;

        let claims: AccessClaims = decode_json(payload_b64)?;
        let now_ts = now.timestamp();
        if claims.exp <= now_ts {
            return Err(unauthorized("token expired"));
        }
        if claims.iat > now_ts + MAX_CLOCK_SKEW_SECS {
            return Err(unauthorized("token issued in the future"));
        }
        let user_id =
            UserId::new(claims.sub).map_err(|_| unauthorized("token subject is not a valid user id"))?;

        Ok(Caller { user_id, role: claims.role, email: claims.email })
    }
}

fn unauthorized(message: &str) -> ProfitdashError {
    ProfitdashError::Unauthorized(message.to_owned())
}

fn decode_json<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD.decode(part).map_err(|_| unauthorized("token part is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| unauthorized("token part is not valid JSON"))
}
