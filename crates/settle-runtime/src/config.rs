#![forbid(unsafe_code)]

//! Run-loop configuration.
//!
//! Precedence is defaults, then environment, then whatever the caller sets
//! explicitly with the `with_*` builders (CLI flags, for the conformance
//! runner).
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `SETTLE_MAX_TASKS_PER_DRAIN` | Task budget per drain. `0` or `none` means unlimited. |
//! | `SETTLE_LOG` | Fallback `tracing` filter directive when `RUST_LOG` is unset. |

use std::env;

use crate::error::{Result, RunLoopError};

pub const ENV_MAX_TASKS_PER_DRAIN: &str = "SETTLE_MAX_TASKS_PER_DRAIN";
pub const ENV_LOG: &str = "SETTLE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunLoopConfig {
    /// Maximum number of tasks one drain may run before giving up with
    /// [`RunLoopError::TaskBudgetExceeded`]. `None` drains until stalled.
    pub max_tasks_per_drain: Option<usize>,
    /// `tracing` filter directive used by [`init_tracing`](crate::init_tracing).
    pub log_filter: String,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_drain: None,
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl RunLoopConfig {
    #[must_use]
    pub fn with_max_tasks_per_drain(mut self, limit: Option<usize>) -> Self {
        self.max_tasks_per_drain = limit.filter(|&n| n > 0);
        self
    }

    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(val) = lookup(ENV_MAX_TASKS_PER_DRAIN) {
            config.max_tasks_per_drain = parse_task_budget(ENV_MAX_TASKS_PER_DRAIN, &val)?;
        }
        if let Some(val) = lookup(ENV_LOG)
            && !val.trim().is_empty()
        {
            config.log_filter = val.trim().to_owned();
        }
        Ok(config)
    }
}

/// Parse a task budget. `0`, `none`, and the empty string mean unlimited.
pub fn parse_task_budget(key: &str, value: &str) -> Result<Option<usize>> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match trimmed.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(RunLoopError::config(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = RunLoopConfig::default();
        assert_eq!(config.max_tasks_per_drain, None);
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = RunLoopConfig::from_lookup(lookup(&[
            (ENV_MAX_TASKS_PER_DRAIN, "500"),
            (ENV_LOG, "settle_core=trace"),
        ]))
        .expect("valid env");
        assert_eq!(config.max_tasks_per_drain, Some(500));
        assert_eq!(config.log_filter, "settle_core=trace");
    }

    #[test]
    fn zero_and_none_mean_unlimited() {
        for raw in ["0", "none", "NONE", " "] {
            let config =
                RunLoopConfig::from_lookup(lookup(&[(ENV_MAX_TASKS_PER_DRAIN, raw)])).expect(raw);
            assert_eq!(config.max_tasks_per_drain, None, "raw={raw:?}");
        }
    }

    #[test]
    fn garbage_budget_is_an_error() {
        let err = RunLoopConfig::from_lookup(lookup(&[(ENV_MAX_TASKS_PER_DRAIN, "lots")]))
            .expect_err("unparsable");
        assert_eq!(err, RunLoopError::config(ENV_MAX_TASKS_PER_DRAIN, "lots"));
    }

    #[test]
    fn blank_log_filter_keeps_default() {
        let config = RunLoopConfig::from_lookup(lookup(&[(ENV_LOG, "  ")])).expect("valid");
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn builders_override_env() {
        let config = RunLoopConfig::from_lookup(lookup(&[(ENV_MAX_TASKS_PER_DRAIN, "10")]))
            .expect("valid")
            .with_max_tasks_per_drain(Some(3))
            .with_log_filter("debug");
        assert_eq!(config.max_tasks_per_drain, Some(3));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(
            config.with_max_tasks_per_drain(Some(0)).max_tasks_per_drain,
            None
        );
    }
}
