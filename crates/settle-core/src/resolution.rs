#![forbid(unsafe_code)]

//! The value-resolution procedure and the thenable interop contract.
//!
//! A continuation does not return a bare value; it returns a [`Resolution`],
//! which is one of:
//!
//! - [`Resolution::Value`]: fulfil the dependent with it.
//! - [`Resolution::Computation`]: adopt that computation's eventual outcome.
//! - [`Resolution::Thenable`]: a foreign object with a `then` capability.
//!
//! # Procedure
//!
//! Given the dependent `next` and a resolution `x`:
//!
//! 1. `x` is `next`, or `x` is (transitively) adopting `next`: reject `next`
//!    with [`ChainingCycle`].
//! 2. `x` is a [`Computation`]: register on `x` so that `next` settles the
//!    way `x` settles.
//! 3. `x` is a thenable: retrieve its `then` method exactly once and call it
//!    with a fresh [`Resolvers`] for `next`. The resolvers are a one-shot
//!    latch: only the first of resolve, reject, or an error from the
//!    retrieval or call has any effect.
//! 4. Otherwise fulfil `next` with the value.
//!
//! # Thenable capability
//!
//! "Has a callable `then`" is the [`Thenable`] trait. Retrieval is fallible
//! ([`Thenable::then_method`] returns `Result`) so that foreign objects whose
//! accessor fails reject instead of panicking.

use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::computation::{Computation, Resolvers};
use crate::error::ChainingCycle;

/// A retrieved `then` method, ready to be invoked once.
pub type ThenMethod<T, E> = Box<dyn FnOnce(Resolvers<T, E>) -> Result<(), E>>;

/// Foreign objects that can drive a computation's settlement.
pub trait Thenable<T, E> {
    /// Retrieve the `then` method.
    ///
    /// Called exactly once per resolution. An `Err` rejects the dependent.
    fn then_method(&self) -> Result<ThenMethod<T, E>, E>;
}

/// Adapts a closure into a [`Thenable`].
///
/// The closure receives the [`Resolvers`] each time the thenable is resolved.
///
/// ```
/// use settle_core::{Computation, Reason, Resolution, TaskQueue, ThenFn};
///
/// let queue = TaskQueue::new();
/// let foreign = ThenFn(|r: settle_core::Resolvers<u32, Reason>| {
///     r.fulfill(9);
///     Ok(())
/// });
/// let c = Computation::resolved(&queue.handle(), Resolution::thenable(foreign));
/// queue.run_until_stalled();
/// assert_eq!(c.value(), Some(9));
/// ```
#[derive(Clone)]
pub struct ThenFn<F>(pub F);

impl<T, E, F> Thenable<T, E> for ThenFn<F>
where
    F: Fn(Resolvers<T, E>) -> Result<(), E> + Clone + 'static,
{
    fn then_method(&self) -> Result<ThenMethod<T, E>, E> {
        let then = self.0.clone();
        Ok(Box::new(move |resolvers| then(resolvers)))
    }
}

/// What a continuation (or a resolver's `resolve`) hands back.
pub enum Resolution<T, E> {
    Value(T),
    Computation(Computation<T, E>),
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Self::Thenable(Rc::new(thenable))
    }
}

impl<T, E> From<Computation<T, E>> for Resolution<T, E> {
    fn from(computation: Computation<T, E>) -> Self {
        Self::Computation(computation)
    }
}

impl<T, E> From<Rc<dyn Thenable<T, E>>> for Resolution<T, E> {
    fn from(thenable: Rc<dyn Thenable<T, E>>) -> Self {
        Self::Thenable(thenable)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computation(computation) => f
                .debug_tuple("Computation")
                .field(&computation.id())
                .finish(),
            Self::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// Drive `next` toward the outcome described by `x`.
///
/// Callers must already hold the right to resolve `next` (its resolver latch,
/// or sole ownership as a chained dependent).
pub(crate) fn resolve_into<T, E>(next: &Computation<T, E>, x: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
{
    match x {
        Resolution::Value(value) => {
            next.settle(Ok(value));
        }
        Resolution::Computation(source) => {
            if source.ptr_eq(next) || source.is_adopting(next) {
                warn!(
                    computation_id = next.id(),
                    source_id = source.id(),
                    "chaining cycle detected"
                );
                next.settle(Err(E::from(ChainingCycle { id: next.id() })));
                return;
            }
            trace!(
                computation_id = next.id(),
                source_id = source.id(),
                "adopting computation"
            );
            next.set_adopting(&source);
            let on_fulfilled = next.clone();
            let on_rejected = next.clone();
            source.react(
                move |value| {
                    on_fulfilled.settle(Ok(value));
                },
                move |reason| {
                    on_rejected.settle(Err(reason));
                },
            );
        }
        Resolution::Thenable(thenable) => {
            trace!(computation_id = next.id(), "resolving foreign thenable");
            let resolvers = Resolvers::new(next.clone());
            let outcome = thenable
                .then_method()
                .and_then(|then| then(resolvers.clone()));
            if let Err(reason) = outcome
                && !resolvers.reject(reason)
            {
                trace!(
                    computation_id = next.id(),
                    "thenable error after resolution ignored"
                );
            }
        }
    }
}
