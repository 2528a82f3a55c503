//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `vendorflow_engine=debug`.
pub(crate) const LOG_ENV: &str = "VENDORFLOW_LOG";

fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info,tower_http=warn",
        (false, 1) => "debug,tower_http=debug",
        (false, _) => "trace",
    }
}

/// Install the global fmt subscriber on stderr.
///
/// The filter comes from `VENDORFLOW_LOG`, then `RUST_LOG`, then the
/// verbosity flags.
pub(crate) fn init(verbose: u8, quiet: bool) {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose, quiet)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
    if installed.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(default_directive(3, true), "warn");
        assert_eq!(default_directive(0, false), "info,tower_http=warn");
        assert_eq!(default_directive(5, false), "trace");
    }
}
