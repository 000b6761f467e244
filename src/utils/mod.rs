use std::{env, path::PathBuf};

use revrec_config::Config;
use tracing_subscriber::{fmt, EnvFilter};

const HOME_ENV: &str = "REVREC_HOME";

/// Installs the global `fmt` subscriber. `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("revrec=info"));

    // Another subscriber may already be installed by an embedding application.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Returns the application-specific data directory, defaulting to `~/.revrec`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_ENV) {
        return PathBuf::from(custom);
    }
    Config::default_base_dir()
}
