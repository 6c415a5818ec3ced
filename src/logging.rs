//! Console logging setup.
//!
//! The library itself only emits [`tracing`] events. Binaries and tests that
//! want to see them can install a subscriber with [`init_logging`], which
//! honours `RUST_LOG` and falls back to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if try_init_logging(filter).is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// Installs a global fmt subscriber with an explicit filter.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn try_init_logging(
    filter: impl Into<EnvFilter>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter.into())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        init_logging();
        assert!(try_init_logging("debug").is_err());
        // Still safe to call again.
        init_logging();
    }
}
