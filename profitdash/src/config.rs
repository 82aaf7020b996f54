//! Service configuration.
//!
//! Configuration is read from a TOML file whose path comes from the
//! `PROFITDASH_CONFIG` environment variable (default `profitdash.toml`). A
//! missing file yields the defaults. Every loaded configuration is validated
//! before use.
//!
//! # Examples
//!
//! ```
//! use profitdash::config::ServiceConfig;
//!
//! let config = ServiceConfig::from_toml_str(
//!     r#"
//!     [lifecycle]
//!     trial_days = 7
//!
//!     [plans.agency]
//!     name = "Agency"
//!     stores = 25
//!     paid = true
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.lifecycle.trial_days, 7);
//! assert!(config.plan_catalog().unwrap().iter().any(|p| p.code.as_str() == "agency"));
//! ```

use std::{collections::BTreeMap, net::SocketAddr, path::Path};

use serde::Deserialize;

use crate::{
    error::{ProfitdashError, Result},
    subscription::{PlanCatalog, PlanCode, PlanDefinition, PlanLimits},
};

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV_VAR: &str = "PROFITDASH_CONFIG";

/// Configuration file used when [`CONFIG_ENV_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "profitdash.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Bearer token settings.
    pub auth: AuthConfig,
    /// Trial and subscription timers.
    pub lifecycle: LifecycleConfig,
    /// Background check intervals.
    pub scheduler: SchedulerConfig,
    /// Plan overrides keyed by plan code.
    ///
    /// A section replaces the built-in definition of the same code, or adds a
    /// new plan. Omitted limits mean unlimited.
    pub plans: BTreeMap<String, PlanConfig>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// CORS allowed origins; `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".to_owned(), allowed_origins: vec!["*".to_owned()] }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Hex-encoded Ed25519 public key of the auth service.
    ///
    /// When unset, every authenticated endpoint answers 401.
    pub verifying_key: Option<String>,
}

/// Trial and subscription timers, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Trial length.
    pub trial_days: u32,
    /// Read-only grace period after a paid period ends.
    pub grace_period_days: u32,
    /// Delay between suspension and archival.
    pub archive_after_days: u32,
    /// Period granted by an admin activation without an explicit end.
    pub default_period_days: u32,
    /// Countdown warning threshold.
    pub warning_threshold_days: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            trial_days: 14,
            grace_period_days: 7,
            archive_after_days: 30,
            default_period_days: 30,
            warning_threshold_days: 3,
        }
    }
}

impl LifecycleConfig {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("trial_days", self.trial_days),
            ("grace_period_days", self.grace_period_days),
            ("archive_after_days", self.archive_after_days),
            ("default_period_days", self.default_period_days),
        ];
        for (name, days) in fields {
            if days == 0 || days > 3650 {
                return Err(ProfitdashError::Config(format!(
                    "lifecycle.{name} must be between 1 and 3650, got {days}"
                )));
            }
        }
        if self.warning_threshold_days > self.trial_days {
            return Err(ProfitdashError::Config(format!(
                "lifecycle.warning_threshold_days ({}) cannot exceed trial_days ({})",
                self.warning_threshold_days, self.trial_days
            )));
        }
        Ok(())
    }
}

/// Background check intervals, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Interval of the trial expiry check.
    pub trial_check_secs: u64,
    /// Interval of the full lifecycle sweep.
    pub sweep_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { trial_check_secs: 300, sweep_secs: 3600 }
    }
}

/// A plan section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    /// Display name; defaults to the plan code.
    pub name: Option<String>,
    /// Store limit.
    pub stores: Option<u32>,
    /// Campaign limit.
    pub campaigns: Option<u32>,
    /// Whether the plan is paid.
    pub paid: bool,
}

impl ServiceConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Config`] if the document does not parse or fails
    /// [`validate`](Self::validate).
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| ProfitdashError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file at `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Config`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(ProfitdashError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Loads the file named by `PROFITDASH_CONFIG`, or `profitdash.toml`.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::load(Path::new(&path))
    }

    /// Validates the configuration.
    ///
    /// Checks that:
    /// - the bind address is a socket address
    /// - every allowed origin is `*` or an `http(s)://` origin
    /// - the verifying key, when set, is 32 hex-encoded bytes
    /// - lifecycle timers and scheduler intervals are positive
    /// - the plan catalog builds
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Config`] describing the first failing check.
    pub fn validate(&self) -> Result<()> {
        self.server.bind.parse::<SocketAddr>().map_err(|e| {
            ProfitdashError::Config(format!("server.bind '{}' is invalid: {e}", self.server.bind))
        })?;

        if self.server.allowed_origins.is_empty() {
            return Err(ProfitdashError::Config("server.allowed_origins cannot be empty".into()));
        }
        for origin in &self.server.allowed_origins {
            if origin != "*" && !origin.starts_with("https://") && !origin.starts_with("http://") {
                return Err(ProfitdashError::Config(format!(
                    "allowed origin must be '*' or start with http(s)://: {origin}"
                )));
            }
        }

        if let Some(key) = &self.auth.verifying_key {
            decode_key_hex(key)?;
        }

        self.lifecycle.validate()?;

        if self.scheduler.trial_check_secs == 0 || self.scheduler.sweep_secs == 0 {
            return Err(ProfitdashError::Config("scheduler intervals must be positive".into()));
        }

        self.plan_catalog()?;
        Ok(())
    }

    /// Builds the plan catalog: built-in plans with the configured overrides applied.
    ///
    /// # Errors
    ///
    /// Returns error if a plan code is malformed or the catalog is incomplete.
    pub fn plan_catalog(&self) -> Result<PlanCatalog> {
        let mut plans: BTreeMap<PlanCode, PlanDefinition> =
            PlanCatalog::default().iter().map(|p| (p.code.clone(), p.clone())).collect();

        for (code, section) in &self.plans {
            let code = PlanCode::new(code.as_str())
                .map_err(|e| ProfitdashError::Config(format!("plans.{code}: {e}")))?;
            let name = section.name.clone().unwrap_or_else(|| {
                plans.get(&code).map_or_else(|| code.to_string(), |p| p.name.clone())
            });
            let definition = PlanDefinition {
                code: code.clone(),
                name,
                limits: PlanLimits { stores: section.stores, campaigns: section.campaigns },
                paid: section.paid,
            };
            plans.insert(code, definition);
        }

        PlanCatalog::new(plans.into_values())
    }
}

/// Decodes a hex-encoded 32-byte Ed25519 public key.
///
/// # Errors
///
/// Returns [`ProfitdashError::Config`] if the input is not 64 hex characters.
pub fn decode_key_hex(key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(key.trim())
        .map_err(|e| ProfitdashError::Config(format!("auth.verifying_key is not hex: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ProfitdashError::Config(format!(
            "auth.verifying_key must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}
