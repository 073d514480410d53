//! Logging bootstrap
//!
//! Builds the stderr subscriber as an explicit [`Dispatch`] handle. The binary
//! installs it globally for its own messages and passes a clone to the import
//! engine, which runs under that dispatch instead of whatever happens to be the
//! process default.

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Build a leveled stderr logger
///
/// `RUST_LOG` takes precedence over `level` when it is set and valid.
pub fn build_dispatch(level: &str) -> Dispatch {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    Dispatch::new(subscriber)
}

/// Build the logger and make it the process default
///
/// A second call keeps the first global subscriber; the returned handle is still
/// usable for scoped dispatch.
pub fn init(level: &str) -> Dispatch {
    let dispatch = build_dispatch(level);
    if tracing::dispatcher::set_global_default(dispatch.clone()).is_err() {
        tracing::debug!("Global logger already installed");
    }
    dispatch
}
