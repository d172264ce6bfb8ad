//! Logging setup and lightweight engine counters.

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG` support, defaulting to
/// `reftree=info`. Safe to call more than once (later calls are no-ops),
/// so tests can call it freely.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reftree=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Counters accumulated over a process's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    pub members_registered: u64,
    pub purchases_recorded: u64,
    pub commissions_paid: u64,
    pub commission_cents_total: i64,
    pub walks_run: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
