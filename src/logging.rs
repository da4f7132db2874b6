//! Tracing setup for applications embedding the client

use anyhow::{Result, anyhow};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "stash_client=info";

/// Install a global subscriber with an `EnvFilter` and fmt or JSON output.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}
