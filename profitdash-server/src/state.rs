//! Shared handler state.

use std::{sync::Arc, time::Instant};

use profitdash::{AccountService, security::TokenVerifier, store::MemoryStore};

/// Account service backed by the in-memory store.
pub type Service = AccountService<MemoryStore>;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Account operations.
    pub service: Arc<Service>,
    /// Token verifier; `None` when no verifying key is configured, in which
    /// case every authenticated route answers 401.
    pub verifier: Option<Arc<TokenVerifier>>,
    /// Server start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Creates handler state.
    #[must_use]
    pub fn new(service: Arc<Service>, verifier: Option<TokenVerifier>) -> Self {
        Self { service, verifier: verifier.map(Arc::new), started_at: Instant::now() }
    }
}
