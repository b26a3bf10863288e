#![forbid(unsafe_code)]

//! Observable settlement state.

use std::fmt;

/// Where a computation is in its lifecycle.
///
/// `Pending` moves to exactly one of the terminal states and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Pending,
    Fulfilled,
    Rejected,
}

impl Status {
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of one member of [`all_settled`](crate::all_settled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settled<T, E> {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Fulfilled(_) => Status::Fulfilled,
            Self::Rejected(_) => Status::Rejected,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(reason) => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(value) => Self::Fulfilled(value),
            Err(reason) => Self::Rejected(reason),
        }
    }
}
