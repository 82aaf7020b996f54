//! Observability infrastructure for the profitdash server.
//!
//! Provides structured logging and the health report served at `/health`.

use std::io;

use profitdash::store::AccountStore;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::state::AppState;

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format for development.
    Pretty,
    /// JSON format for production log aggregation.
    Json,
}

impl LogFormat {
    /// Parses a `LOG_FORMAT` value: `json` selects JSON, anything else pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }

    /// Determines log format from the `LOG_FORMAT` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }
}

/// Initializes structured logging.
///
/// Configures tracing-subscriber with:
/// - Configurable output format (pretty for dev, JSON for production)
/// - Environment-based log level filtering (`RUST_LOG`, default `info`)
/// - Span close events for request timing
///
/// Audit events use the `audit` target and can be routed with e.g.
/// `RUST_LOG=info,audit=info`.
pub fn init_observability(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
    }
}

/// Health check status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// All checks pass.
    Healthy,
    /// Serving, with warnings.
    Degraded,
    /// A required dependency is down.
    Unhealthy,
}

impl HealthStatus {
    /// Returns string representation for JSON serialization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Health check status for individual checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckStatus {
    /// Check passed.
    Pass,
    /// Check failed.
    Fail,
    /// Degraded but operational.
    Warn,
}

impl HealthCheckStatus {
    /// Returns string representation for JSON serialization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warn => "warn",
        }
    }
}

/// Individual health check result.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Check name.
    pub name: String,
    /// Check status.
    pub status: HealthCheckStatus,
    /// Optional message with details.
    pub message: Option<String>,
}

impl HealthCheck {
    /// Creates a passing check.
    #[must_use]
    pub fn pass<N: Into<String>>(name: N) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Pass, message: None }
    }

    /// Creates a warning check.
    #[must_use]
    pub fn warn<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Warn, message: Some(message.into()) }
    }

    /// Creates a failing check.
    #[must_use]
    pub fn fail<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Fail, message: Some(message.into()) }
    }
}

/// Overall health report.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Server version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Runs the checks against live server state.
    ///
    /// - `store`: the storage backend answers a ping
    /// - `auth`: a verifying key is configured (warning otherwise, since all
    ///   authenticated routes answer 401)
    pub async fn collect(state: &AppState) -> Self {
        let mut checks = Vec::with_capacity(2);
        checks.push(match state.service.store().ping().await {
            Ok(()) => HealthCheck::pass("store"),
            Err(e) => HealthCheck::fail("store", e.to_string()),
        });
        checks.push(if state.verifier.is_some() {
            HealthCheck::pass("auth")
        } else {
            HealthCheck::warn("auth", "no verifying key configured")
        });

        Self {
            status: Self::compute_status(&checks),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            uptime_secs: state.started_at.elapsed().as_secs(),
            checks,
        }
    }

    /// Serializes the report.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "version": self.version,
            "uptime_secs": self.uptime_secs,
            "checks": self.checks.iter().map(|c| {
                let mut obj = serde_json::json!({
                    "name": c.name,
                    "status": c.status.as_str(),
                });
                if let Some(msg) = &c.message {
                    obj["message"] = serde_json::Value::String(msg.clone());
                }
                obj
            }).collect::<Vec<_>>(),
        })
    }

    /// Determines overall health status from individual checks.
    #[must_use]
    pub fn compute_status(checks: &[HealthCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthCheckStatus::Fail) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthCheckStatus::Warn) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_health_status_compute() {
        assert_eq!(HealthReport::compute_status(&[]), HealthStatus::Healthy);
        let checks = vec![HealthCheck::pass("store"), HealthCheck::warn("auth", "no key")];
        assert_eq!(HealthReport::compute_status(&checks), HealthStatus::Degraded);
        let checks = vec![HealthCheck::fail("store", "down"), HealthCheck::warn("auth", "no key")];
        assert_eq!(HealthReport::compute_status(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_report_to_json() {
        let report = HealthReport {
            status: HealthStatus::Unhealthy,
            version: "0.1.0".to_owned(),
            uptime_secs: 60,
            checks: vec![HealthCheck::fail("store", "injected outage"), HealthCheck::pass("auth")],
        };

        let json = report.to_json();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["uptime_secs"], 60);
        assert_eq!(json["checks"][0]["message"], "injected outage");
        assert!(json["checks"][1].get("message").is_none());
    }
}
