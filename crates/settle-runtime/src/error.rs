#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunLoopError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunLoopError {
    /// A drain ran `limit` tasks and the queue was still non-empty. The
    /// remaining tasks stay queued.
    #[error("task budget of {limit} exceeded in a single drain")]
    TaskBudgetExceeded { limit: usize },

    #[error("invalid configuration value for {key}: {value:?}")]
    Config { key: String, value: String },
}

impl RunLoopError {
    #[must_use]
    pub fn config(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            value: value.into(),
        }
    }
}
