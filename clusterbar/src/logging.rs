use std::env;
use std::io;

use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "CLUSTERBAR_LOG";

/// Installs the stderr subscriber; `CLUSTERBAR_LOG` takes precedence over `--debug`
pub fn init(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(debug))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_filter(debug: bool) -> EnvFilter {
    match env::var(LOG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => EnvFilter::new(value),
        _ if debug => EnvFilter::new("debug"),
        _ => EnvFilter::new("warn"),
    }
}
