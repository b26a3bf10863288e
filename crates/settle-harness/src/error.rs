#![forbid(unsafe_code)]

use settle_runtime::RunLoopError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run loop error: {0}")]
    RunLoop(#[from] RunLoopError),

    #[error("unknown scenario: {name} (see `settle-conformance list`)")]
    UnknownScenario { name: String },

    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },
}

impl HarnessError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownScenario { .. } | Self::RunLoop(RunLoopError::Config { .. }) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        let unknown = HarnessError::UnknownScenario {
            name: "nope".into(),
        };
        assert_eq!(unknown.exit_code(), 2);
        let config = HarnessError::from(RunLoopError::config("SETTLE_LOG", "=["));
        assert_eq!(config.exit_code(), 2);
    }

    #[test]
    fn failures_exit_with_one() {
        let failed = HarnessError::ScenariosFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(failed.exit_code(), 1);
        assert_eq!(failed.to_string(), "1 of 3 scenarios failed");
    }
}
