//! `vendorflow serve` arguments and their environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use vendorflow_engine::EngineConfig;

pub(crate) const DEFAULT_PORT: u16 = 5001;
pub(crate) const DEFAULT_UPLOADS_DIR: &str = "uploads";

pub(crate) const ENV_STEP_DELAY_MS: &str = "VENDORFLOW_STEP_DELAY_MS";
pub(crate) const ENV_RESEARCH_DELAY_MS: &str = "VENDORFLOW_RESEARCH_DELAY_MS";
pub(crate) const ENV_UPLOADS_DIR: &str = "VENDORFLOW_UPLOADS_DIR";

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub(crate) port: u16,
    /// Directory uploaded files are written to and served from
    #[arg(long)]
    pub(crate) uploads_dir: Option<PathBuf>,
    /// Pause after each material in a processing run, in milliseconds
    #[arg(long)]
    pub(crate) step_delay_ms: Option<u64>,
    /// Pause before a research request responds, in milliseconds
    #[arg(long)]
    pub(crate) research_delay_ms: Option<u64>,
    /// Path to TLS certificate PEM file (requires --tls-key)
    #[arg(long)]
    pub(crate) tls_cert: Option<PathBuf>,
    /// Path to TLS private key PEM file (requires --tls-cert)
    #[arg(long)]
    pub(crate) tls_key: Option<PathBuf>,
}

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServeConfig {
    pub(crate) port: u16,
    pub(crate) uploads_dir: PathBuf,
    pub(crate) engine: EngineConfig,
    pub(crate) tls: Option<(PathBuf, PathBuf)>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub(crate) enum ConfigError {
    #[error("--tls-cert and --tls-key must both be provided")]
    PartialTls,
}

impl ServeConfig {
    /// Resolve from process environment. Flags win over environment.
    pub(crate) fn from_args(args: ServeArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    pub(crate) fn resolve(
        args: ServeArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let tls = match (args.tls_cert, args.tls_key) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        let defaults = EngineConfig::default();
        let millis = |flag: Option<u64>, key: &str, default: Duration| -> Duration {
            flag.or_else(|| env_millis(&env, key))
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Ok(Self {
            port: args.port,
            uploads_dir: args
                .uploads_dir
                .or_else(|| env(ENV_UPLOADS_DIR).filter(|v| !v.is_empty()).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR)),
            engine: EngineConfig {
                step_delay: millis(args.step_delay_ms, ENV_STEP_DELAY_MS, defaults.step_delay),
                research_delay: millis(
                    args.research_delay_ms,
                    ENV_RESEARCH_DELAY_MS,
                    defaults.research_delay,
                ),
                ..defaults
            },
            tls,
        })
    }
}

fn env_millis(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = env(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric delay");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args() -> ServeArgs {
        ServeArgs {
            port: DEFAULT_PORT,
            uploads_dir: None,
            step_delay_ms: None,
            research_delay_ms: None,
            tls_cert: None,
            tls_key: None,
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_timings() {
        let config = ServeConfig::resolve(args(), env(&[])).unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.engine.step_delay, Duration::from_secs(2));
        assert_eq!(config.engine.research_delay, Duration::from_millis(1500));
        assert_eq!(config.engine.shortlist_size, 5);
        assert!(config.tls.is_none());
    }

    #[test]
    fn env_overrides_defaults_and_flags_override_env() {
        let env = env(&[
            (ENV_STEP_DELAY_MS, "10"),
            (ENV_RESEARCH_DELAY_MS, "not a number"),
            (ENV_UPLOADS_DIR, "/srv/uploads"),
        ]);
        let mut a = args();
        let config = ServeConfig::resolve(a.clone(), &env).unwrap();
        assert_eq!(config.engine.step_delay, Duration::from_millis(10));
        assert_eq!(config.engine.research_delay, Duration::from_millis(1500));
        assert_eq!(config.uploads_dir, PathBuf::from("/srv/uploads"));

        a.step_delay_ms = Some(0);
        a.uploads_dir = Some(PathBuf::from("local"));
        let config = ServeConfig::resolve(a, &env).unwrap();
        assert_eq!(config.engine.step_delay, Duration::ZERO);
        assert_eq!(config.uploads_dir, PathBuf::from("local"));
    }

    #[test]
    fn half_a_tls_pair_is_rejected() {
        let mut a = args();
        a.tls_cert = Some(PathBuf::from("cert.pem"));
        assert_eq!(
            ServeConfig::resolve(a, env(&[])),
            Err(ConfigError::PartialTls)
        );
    }
}
