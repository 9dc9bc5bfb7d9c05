use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Install the global subscriber. Log lines go to stderr so that reports
/// on stdout stay clean. `RUST_LOG` overrides the level.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        let default = if verbose {
            "happy_new_year=debug"
        } else {
            "happy_new_year=info"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}
