// Tracing subscriber setup for the server binary.
//
// `RUST_LOG` wins when set; otherwise both crates of this workspace log at
// the configured level. Library code never installs a subscriber; only
// `main.rs` calls `init_logging`, once.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .init();
}

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(level: &str) -> String {
    format!(
        "{}={level},particle_sync_protocol={level}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_both_crates() {
        assert_eq!(
            default_directives("debug"),
            "particle_sync_server=debug,particle_sync_protocol=debug"
        );
    }
}
