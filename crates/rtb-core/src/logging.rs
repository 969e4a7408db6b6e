use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{Error, Result};

/// Initialize logging/tracing for the bot.
///
/// Call once at process start. Components do not log through a global handle;
/// each receives its own span from [`component`] at construction time.
pub fn init(service_name: &str) -> Result<()> {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,rtb=info,rtb_core=info,rtb_postgres=info,rtb_telegram=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}

/// Span handed to a long-lived component; its events are recorded under it.
pub fn component(name: &'static str) -> Span {
    tracing::info_span!("component", name)
}
