// src/logging.rs
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "skill_trend_collector=info,trend_rollup=info,analysis_report=info,warn";

/// Compact console logs. `RUST_LOG` overrides the default filter.
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // another subscriber may already be installed (tests)
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init();
    });
}
