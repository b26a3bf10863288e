#![forbid(unsafe_code)]

//! Rejection reasons manufactured by the core.
//!
//! The core only ever invents one reason of its own: [`ChainingCycle`], when a
//! computation would adopt its own outcome. Any reason type `E` that
//! implements `From<ChainingCycle>` can be used with [`Computation`]; the
//! default is [`Reason`], and plain `String` works too.
//!
//! [`Computation`]: crate::Computation

use thiserror::Error;

/// A computation was asked to resolve with itself, directly or through a
/// chain of adoptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("chaining cycle detected for computation #{id}")]
pub struct ChainingCycle {
    /// Id of the computation that was rejected.
    pub id: u64,
}

/// Default rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reason {
    #[error(transparent)]
    ChainingCycle(#[from] ChainingCycle),

    #[error("{0}")]
    Message(String),
}

impl Reason {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn is_chaining_cycle(&self) -> bool {
        matches!(self, Self::ChainingCycle(_))
    }
}

impl From<&str> for Reason {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

impl From<String> for Reason {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<ChainingCycle> for String {
    fn from(cycle: ChainingCycle) -> Self {
        cycle.to_string()
    }
}
