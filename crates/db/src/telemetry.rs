use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "tarantula_db=debug,sqlx=warn";

/// Install a global `tracing` subscriber writing to stdout.
///
/// Honours `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Returns `false`
/// if a subscriber was already installed, so repeated calls from tests are
/// harmless.
pub fn init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
