use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` level. Safe to call more than once; later calls fail.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("set tracing subscriber: {e}"))
}
