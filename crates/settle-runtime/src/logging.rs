#![forbid(unsafe_code)]

//! `tracing` subscriber setup for binaries and examples.

use tracing_subscriber::EnvFilter;

use crate::config::ENV_LOG;
use crate::error::{Result, RunLoopError};

/// Build the filter: `RUST_LOG` when set, otherwise `fallback`.
///
/// An invalid `RUST_LOG` is an error rather than a silent fallback.
pub fn build_filter(fallback: &str) -> Result<EnvFilter> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(rust_log.as_deref(), fallback)
}

fn filter_from(rust_log: Option<&str>, fallback: &str) -> Result<EnvFilter> {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|_| RunLoopError::config(EnvFilter::DEFAULT_ENV, directives)),
        _ => EnvFilter::try_new(fallback).map_err(|_| RunLoopError::config(ENV_LOG, fallback)),
    }
}

/// Install a global `fmt` subscriber writing to stderr.
///
/// Returns `Ok(false)` when a global subscriber is already installed.
pub fn init_tracing(fallback: &str) -> Result<bool> {
    let filter = build_filter(fallback)?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok())
}
