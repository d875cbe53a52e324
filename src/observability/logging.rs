//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalize a configured level, falling back to `info` for unknown values.
pub fn normalize_level(level: &str) -> &'static str {
    let lowered = level.trim().to_ascii_lowercase();
    LEVELS
        .iter()
        .copied()
        .find(|l| *l == lowered)
        .unwrap_or("info")
}

/// Default filter directive for the given level.
pub fn default_directive(level: &str) -> String {
    format!("homeguard={},tower_http=info", normalize_level(level))
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
