//! Logging utilities for quill-bundler
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: quill emits tracing events - install your own
//! subscriber. For application developers: use these convenience functions.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize logging with the given default filter directive (e.g.
/// `"info"` or `"quill_bundler=debug"`).
///
/// Installs a global subscriber; only the first call per process takes
/// effect. `RUST_LOG` still overrides the default.
pub fn init_logging(default_directive: &str) {
    let directive = default_directive
        .parse()
        .unwrap_or_else(|_| "info".parse().expect("static directive parses"));
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(directive)
            .from_env_lossy();
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}

/// Initialize logging from the `RUST_LOG` environment variable, falling
/// back to `info` when unset or invalid.
pub fn init_logging_from_env() {
    init_logging("info");
}
