//! Environment configuration for the dashboard.

use std::{env, time::Duration};

use color_eyre::{eyre::WrapErr, Result};
use hedged_requests::{DispatchConfig, Dispatcher, ReplicaEndpoint};

const DEFAULT_REPLICA_URLS: &str =
    "http://localhost:8090/ishealthy,http://localhost:8091/ishealthy,http://localhost:8092/ishealthy";

/// Parses a comma separated list of replica URLs, skipping blanks.
pub fn replicas_from_list(list: &str) -> Vec<ReplicaEndpoint> {
    list.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(ReplicaEndpoint::from_url)
        .collect()
}

fn millis_from_env(env_key: &str, default_ms: u64) -> Result<Duration> {
    match env::var(env_key) {
        Ok(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .wrap_err_with(|| format!("{env_key} must be a number of milliseconds"))?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

/// Builds a dispatcher from environment variables.
///
/// Looks for the following environment variables:
/// - `HEDGE_REPLICA_URLS` (comma separated, defaults to three local replicas)
/// - `HEDGE_STAGGER_MS` (defaults to 16)
/// - `HEDGE_TIMEOUT_MS` (defaults to 2000)
///
/// Returns an error if no replicas are configured.
pub fn build_dispatcher_from_env() -> Result<Dispatcher> {
    let urls = env::var("HEDGE_REPLICA_URLS").unwrap_or_else(|_| DEFAULT_REPLICA_URLS.to_string());
    let replicas = replicas_from_list(&urls);

    if replicas.is_empty() {
        color_eyre::eyre::bail!(
            "No replicas configured.\n\
             Set HEDGE_REPLICA_URLS to a comma separated list of replica URLs"
        );
    }

    let stagger = millis_from_env("HEDGE_STAGGER_MS", 16)?;
    let timeout = millis_from_env("HEDGE_TIMEOUT_MS", 2000)?;

    let cfg = DispatchConfig::from_p99(replicas, stagger).with_overall_timeout(timeout);
    Ok(Dispatcher::new(cfg))
}
