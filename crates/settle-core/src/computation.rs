#![forbid(unsafe_code)]

//! Deferred computations with Promise/A+ settlement and chaining.
//!
//! # Design
//!
//! [`Computation<T, E>`] wraps its state in shared, reference-counted
//! storage. A pending computation holds an ordered list of reactions; the
//! first settlement swaps the list out, stores the outcome, and hands each
//! reaction to the computation's [`Scheduler`](crate::Scheduler). Nothing
//! user-supplied runs while the state is borrowed.
//!
//! # Invariants
//!
//! 1. Status moves `Pending → Fulfilled` or `Pending → Rejected` exactly
//!    once. Later settlement attempts are no-ops.
//! 2. Every reaction registered while pending runs exactly once if the
//!    computation settles, and never otherwise.
//! 3. Reactions run in registration order.
//! 4. No reaction runs inside the call that registered it or the call that
//!    settled the computation.
//! 5. A computation is never fulfilled with a computation; adoption
//!    flattens.
//!
//! # Failure Modes
//!
//! - **Resolver returns `Err`**: the computation rejects with it unless its
//!   resolvers were already used, in which case the error is dropped.
//! - **Continuation returns `Err`**: the dependent rejects with it. The error
//!   never reaches the caller of `chain`.
//! - **Continuation panics**: the panic unwinds out of the scheduler's drain
//!   loop. The dependent stays pending.
//! - **Unhandled rejection**: a rejected computation with no rejection
//!   continuation keeps its reason; nothing is reported.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::error::{ChainingCycle, Reason};
use crate::resolution::{self, Resolution, ThenMethod, Thenable};
use crate::scheduler::SchedulerHandle;
use crate::state::Status;

static NEXT_COMPUTATION_ID: AtomicU64 = AtomicU64::new(1);

fn next_computation_id() -> u64 {
    NEXT_COMPUTATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Fulfillment continuation accepted by [`Computation::chain`].
pub type OnFulfilled<T, U, E> = Box<dyn FnOnce(T) -> Result<Resolution<U, E>, E>>;

/// Rejection continuation accepted by [`Computation::chain`].
pub type OnRejected<U, E> = Box<dyn FnOnce(E) -> Result<Resolution<U, E>, E>>;

/// One registered continuation record. Only the half matching the outcome
/// runs; the other is dropped.
struct Reaction<T, E> {
    on_fulfilled: Box<dyn FnOnce(T)>,
    on_rejected: Box<dyn FnOnce(E)>,
}

enum State<T, E> {
    Pending(Vec<Reaction<T, E>>),
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            Self::Pending(_) => Status::Pending,
            Self::Fulfilled(_) => Status::Fulfilled,
            Self::Rejected(_) => Status::Rejected,
        }
    }
}

/// Shared interior for [`Computation<T, E>`].
struct Inner<T, E> {
    id: u64,
    state: State<T, E>,
    /// The computation this one is currently adopting. Cleared on settlement.
    following: Option<Weak<RefCell<Inner<T, E>>>>,
    /// Hands unrun reactions to the release queue on drop.
    release: fn(Vec<Reaction<T, E>>),
}

impl<T, E> Drop for Inner<T, E> {
    fn drop(&mut self) {
        if let State::Pending(reactions) = &mut self.state {
            (self.release)(std::mem::take(reactions));
        }
    }
}

// ---------------------------------------------------------------------------
// Release queue
// ---------------------------------------------------------------------------

/// Reactions of dropped pending computations, freed one batch at a time.
///
/// A reaction owns its dependent computation, which owns the next reactions,
/// so the default drop glue of an abandoned chain recurses once per link.
/// Nested drops push onto this queue and return; the outermost drop drains
/// it, keeping stack depth constant in the chain length.
struct ReleaseQueue {
    batches: RefCell<Vec<Box<dyn Any>>>,
    draining: Cell<bool>,
}

thread_local! {
    static RELEASE_QUEUE: ReleaseQueue = const {
        ReleaseQueue {
            batches: RefCell::new(Vec::new()),
            draining: Cell::new(false),
        }
    };
}

struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

fn release_reactions<T: 'static, E: 'static>(reactions: Vec<Reaction<T, E>>) {
    if reactions.is_empty() {
        return;
    }
    // During thread teardown the queue may be gone; the batch then drops inline.
    let _ = RELEASE_QUEUE.try_with(move |queue| {
        queue.batches.borrow_mut().push(Box::new(reactions));
        if queue.draining.replace(true) {
            return;
        }
        let _guard = DrainGuard(&queue.draining);
        loop {
            let batch = queue.batches.borrow_mut().pop();
            match batch {
                Some(batch) => drop(batch),
                None => break,
            }
        }
    });
}

/// A deferred value that settles once, to a value `T` or a reason `E`.
///
/// Cloning a `Computation` creates a new handle to the **same** state.
pub struct Computation<T, E = Reason> {
    inner: Rc<RefCell<Inner<T, E>>>,
    scheduler: SchedulerHandle,
}

impl<T, E> Clone for Computation<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Computation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut s = f.debug_struct("Computation");
        s.field("id", &inner.id);
        match &inner.state {
            State::Pending(reactions) => s
                .field("status", &Status::Pending)
                .field("reactions", &reactions.len()),
            State::Fulfilled(value) => s.field("status", &Status::Fulfilled).field("value", value),
            State::Rejected(reason) => s.field("status", &Status::Rejected).field("reason", reason),
        };
        s.finish()
    }
}

impl<T, E> Computation<T, E> {
    /// Process-unique id, used in diagnostics and [`ChainingCycle`].
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.borrow().state.status()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.status() == Status::Fulfilled
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status() == Status::Rejected
    }

    /// Whether both handles refer to the same computation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The scheduler continuations are dispatched through.
    #[must_use]
    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}

impl<T, E> Computation<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
{
    fn pending(scheduler: &SchedulerHandle) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                id: next_computation_id(),
                state: State::Pending(Vec::new()),
                following: None,
                release: release_reactions::<T, E>,
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// Create a computation and run `resolver` synchronously.
    ///
    /// The resolver receives the [`Resolvers`] for the new computation. An
    /// `Err` return rejects the computation unless the resolvers were already
    /// used.
    pub fn new<F>(scheduler: &SchedulerHandle, resolver: F) -> Self
    where
        F: FnOnce(Resolvers<T, E>) -> Result<(), E>,
    {
        let computation = Self::pending(scheduler);
        let resolvers = Resolvers::new(computation.clone());
        if let Err(reason) = resolver(resolvers.clone())
            && !resolvers.reject(reason)
        {
            debug!(
                computation_id = computation.id(),
                "resolver error after resolution ignored"
            );
        }
        computation
    }

    /// An already fulfilled computation.
    pub fn fulfilled(scheduler: &SchedulerHandle, value: T) -> Self {
        let computation = Self::pending(scheduler);
        computation.settle(Ok(value));
        computation
    }

    /// An already rejected computation.
    pub fn rejected(scheduler: &SchedulerHandle, reason: E) -> Self {
        let computation = Self::pending(scheduler);
        computation.settle(Err(reason));
        computation
    }

    /// Lift any [`Resolution`] into a computation.
    ///
    /// A computation is returned as-is; values and thenables go through the
    /// value-resolution procedure.
    pub fn resolved(scheduler: &SchedulerHandle, resolution: Resolution<T, E>) -> Self {
        match resolution {
            Resolution::Computation(computation) => computation,
            other => {
                let computation = Self::pending(scheduler);
                Resolvers::new(computation.clone()).resolve(other);
                computation
            }
        }
    }

    /// The fulfillment value, if fulfilled.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match &self.inner.borrow().state {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    #[must_use]
    pub fn reason(&self) -> Option<E> {
        match &self.inner.borrow().state {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The outcome, if settled.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match &self.inner.borrow().state {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Register continuations and return the dependent computation.
    ///
    /// A missing `on_fulfilled` passes the value through (`T: Into<U>`); a
    /// missing `on_rejected` passes the reason through, so rejections tunnel
    /// down the chain until a handler is found.
    ///
    /// Neither continuation runs before this returns.
    ///
    /// The pass-through default is why `chain` carries `T: Into<U>` even when
    /// `on_fulfilled` is given. To change the value type freely, use
    /// [`then`](Self::then) or [`then_or_else`](Self::then_or_else):
    ///
    /// ```
    /// use settle_core::{Computation, Reason, Resolution, TaskQueue};
    ///
    /// let queue = TaskQueue::new();
    /// let widened = Computation::<u8, Reason>::fulfilled(&queue.handle(), 7)
    ///     .chain::<u32>(
    ///         Some(Box::new(|v: u8| Ok(Resolution::Value(u32::from(v) * 1000)))),
    ///         None,
    ///     );
    /// let label = Computation::<i32, Reason>::rejected(&queue.handle(), Reason::from("no"))
    ///     .then_or_else(
    ///         |v: i32| Ok(Resolution::Value(v.to_string())),
    ///         |r| Ok(Resolution::Value(format!("failed: {r}"))),
    ///     );
    /// queue.run_until_stalled();
    /// assert_eq!(widened.value(), Some(7000));
    /// assert_eq!(label.value().as_deref(), Some("failed: no"));
    /// ```
    pub fn chain<U>(
        &self,
        on_fulfilled: Option<OnFulfilled<T, U, E>>,
        on_rejected: Option<OnRejected<U, E>>,
    ) -> Computation<U, E>
    where
        T: Into<U>,
        U: Clone + 'static,
    {
        let on_fulfilled: OnFulfilled<T, U, E> = match on_fulfilled {
            Some(handler) => handler,
            None => Box::new(|value: T| Ok(Resolution::Value(value.into()))),
        };
        let on_rejected: OnRejected<U, E> = match on_rejected {
            Some(handler) => handler,
            None => Box::new(Err),
        };
        self.chain_boxed(on_fulfilled, on_rejected)
    }

    fn chain_boxed<U>(
        &self,
        on_fulfilled: OnFulfilled<T, U, E>,
        on_rejected: OnRejected<U, E>,
    ) -> Computation<U, E>
    where
        U: Clone + 'static,
    {
        let next = Computation::<U, E>::pending(&self.scheduler);
        trace!(
            computation_id = self.id(),
            next_id = next.id(),
            "continuation registered"
        );
        let fulfill_next = next.clone();
        let reject_next = next.clone();
        self.react(
            move |value| settle_dependent(&fulfill_next, on_fulfilled(value)),
            move |reason| settle_dependent(&reject_next, on_rejected(reason)),
        );
        next
    }

    /// Fulfillment continuation only; the output type may change.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Computation<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.chain_boxed(Box::new(on_fulfilled), Box::new(Err))
    }

    /// Both continuations.
    pub fn then_or_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Computation<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
        R: FnOnce(E) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.chain_boxed(Box::new(on_fulfilled), Box::new(on_rejected))
    }

    /// Rejection continuation only. Equivalent to `chain(None, Some(r))`.
    pub fn catch<R>(&self, on_rejected: R) -> Self
    where
        R: FnOnce(E) -> Result<Resolution<T, E>, E> + 'static,
    {
        self.chain_boxed(
            Box::new(|value| Ok(Resolution::Value(value))),
            Box::new(on_rejected),
        )
    }

    /// Transform the fulfillment value.
    pub fn map<U, F>(&self, f: F) -> Computation<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Ok(Resolution::Value(f(value))))
    }

    /// Transform the rejection reason; the dependent stays rejected.
    pub fn map_err<F>(&self, f: F) -> Self
    where
        F: FnOnce(E) -> E + 'static,
    {
        self.chain_boxed(
            Box::new(|value| Ok(Resolution::Value(value))),
            Box::new(move |reason| Err(f(reason))),
        )
    }

    /// Continue with another computation, adopting its outcome.
    pub fn and_then<U, F>(&self, f: F) -> Computation<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Computation<U, E> + 'static,
    {
        self.then(move |value| Ok(Resolution::Computation(f(value))))
    }

    /// Observe the fulfillment value and pass it through.
    pub fn inspect<F>(&self, f: F) -> Self
    where
        F: FnOnce(&T) + 'static,
    {
        self.then(move |value| {
            f(&value);
            Ok(Resolution::Value(value))
        })
    }

    /// Run `f` on either outcome and pass the outcome through unchanged.
    ///
    /// An `Err` from `f` replaces the outcome with that rejection.
    pub fn finally<F>(&self, f: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let hook = Rc::new(Cell::new(Some(f)));
        let on_reject_hook = Rc::clone(&hook);
        self.chain_boxed(
            Box::new(move |value| {
                if let Some(f) = hook.take() {
                    f()?;
                }
                Ok(Resolution::Value(value))
            }),
            Box::new(move |reason| {
                if let Some(f) = on_reject_hook.take() {
                    f()?;
                }
                Err(reason)
            }),
        )
    }

    /// Register an internal reaction. Runs through the scheduler even when
    /// already settled.
    pub(crate) fn react(
        &self,
        on_fulfilled: impl FnOnce(T) + 'static,
        on_rejected: impl FnOnce(E) + 'static,
    ) {
        let reaction = Reaction {
            on_fulfilled: Box::new(on_fulfilled),
            on_rejected: Box::new(on_rejected),
        };
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            match &mut inner.state {
                State::Pending(reactions) => {
                    reactions.push(reaction);
                    return;
                }
                State::Fulfilled(value) => Ok(value.clone()),
                State::Rejected(reason) => Err(reason.clone()),
            }
        };
        self.dispatch(reaction, outcome);
    }

    fn dispatch(&self, reaction: Reaction<T, E>, outcome: Result<T, E>) {
        let Reaction {
            on_fulfilled,
            on_rejected,
        } = reaction;
        match outcome {
            Ok(value) => self.scheduler.schedule_soon(move || on_fulfilled(value)),
            Err(reason) => self.scheduler.schedule_soon(move || on_rejected(reason)),
        }
    }

    /// Transition out of `Pending`. Returns `false` if already settled.
    pub(crate) fn settle(&self, outcome: Result<T, E>) -> bool {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending(_)) {
                debug!(
                    computation_id = inner.id,
                    status = %inner.state.status(),
                    "settlement ignored, already settled"
                );
                return false;
            }
            let settled = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            inner.following = None;
            match std::mem::replace(&mut inner.state, settled) {
                State::Pending(reactions) => reactions,
                State::Fulfilled(_) | State::Rejected(_) => Vec::new(),
            }
        };
        debug!(
            computation_id = self.id(),
            status = %self.status(),
            reactions = reactions.len(),
            "computation settled"
        );
        for reaction in reactions {
            self.dispatch(reaction, outcome.clone());
        }
        true
    }

    pub(crate) fn set_adopting(&self, source: &Self) {
        self.inner.borrow_mut().following = Some(Rc::downgrade(&source.inner));
    }

    /// Whether `self` is adopting `target`, directly or through a chain of
    /// adoptions.
    pub(crate) fn is_adopting(&self, target: &Self) -> bool {
        let mut cursor = self.inner.borrow().following.as_ref().and_then(Weak::upgrade);
        while let Some(current) = cursor {
            if Rc::ptr_eq(&current, &target.inner) {
                return true;
            }
            let next = current.borrow().following.as_ref().and_then(Weak::upgrade);
            cursor = next;
        }
        false
    }
}

fn settle_dependent<U, E>(next: &Computation<U, E>, output: Result<Resolution<U, E>, E>)
where
    U: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
{
    match output {
        Ok(resolution) => resolution::resolve_into(next, resolution),
        Err(reason) => {
            next.settle(Err(reason));
        }
    }
}

/// A computation is itself a thenable, so it can be handed to code that
/// only speaks the [`Thenable`] contract.
impl<T, E> Thenable<T, E> for Computation<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
{
    fn then_method(&self) -> Result<ThenMethod<T, E>, E> {
        let source = self.clone();
        Ok(Box::new(move |resolvers: Resolvers<T, E>| {
            let on_rejected = resolvers.clone();
            source.react(
                move |value| {
                    resolvers.fulfill(value);
                },
                move |reason| {
                    on_rejected.reject(reason);
                },
            );
            Ok(())
        }))
    }
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

/// The settlement functions handed to a resolver or a thenable.
///
/// All clones share one latch: the first call to [`fulfill`](Self::fulfill),
/// [`resolve`](Self::resolve), or [`reject`](Self::reject) wins and every later
/// call is a silent no-op returning `false`.
pub struct Resolvers<T, E = Reason> {
    target: Computation<T, E>,
    already_resolved: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolvers<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            already_resolved: Rc::clone(&self.already_resolved),
        }
    }
}

impl<T, E> fmt::Debug for Resolvers<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvers")
            .field("target", &self.target.id())
            .field("already_resolved", &self.already_resolved.get())
            .finish()
    }
}

impl<T, E> Resolvers<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
{
    pub(crate) fn new(target: Computation<T, E>) -> Self {
        Self {
            target,
            already_resolved: Rc::new(Cell::new(false)),
        }
    }

    fn claim(&self) -> bool {
        if self.already_resolved.replace(true) {
            debug!(
                computation_id = self.target.id(),
                "resolver call ignored, already resolved"
            );
            return false;
        }
        true
    }

    /// Fulfil with a plain value.
    pub fn fulfill(&self, value: T) -> bool {
        if !self.claim() {
            return false;
        }
        self.target.settle(Ok(value));
        true
    }

    /// Resolve through the value-resolution procedure: values fulfil,
    /// computations and thenables are adopted.
    pub fn resolve(&self, resolution: Resolution<T, E>) -> bool {
        if !self.claim() {
            return false;
        }
        resolution::resolve_into(&self.target, resolution);
        true
    }

    /// Reject with `reason`, passed through as-is.
    pub fn reject(&self, reason: E) -> bool {
        if !self.claim() {
            return false;
        }
        self.target.settle(Err(reason));
        true
    }

    /// Whether any settlement function has been called.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.already_resolved.get()
    }

    /// The computation these resolvers settle.
    #[must_use]
    pub fn computation(&self) -> Computation<T, E> {
        self.target.clone()
    }
}

// ---------------------------------------------------------------------------
// Deferred
// ---------------------------------------------------------------------------

/// A computation paired with its resolvers, for producers that settle
/// outside a resolver closure.
pub struct Deferred<T, E = Reason> {
    computation: Computation<T, E>,
    resolvers: Resolvers<T, E>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            computation: self.computation.clone(),
            resolvers: self.resolvers.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("computation", &self.computation.id())
            .field("status", &self.computation.status())
            .finish()
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
{
    pub fn new(scheduler: &SchedulerHandle) -> Self {
        let computation = Computation::pending(scheduler);
        let resolvers = Resolvers::new(computation.clone());
        Self {
            computation,
            resolvers,
        }
    }

    #[must_use]
    pub fn computation(&self) -> Computation<T, E> {
        self.computation.clone()
    }

    #[must_use]
    pub fn resolvers(&self) -> Resolvers<T, E> {
        self.resolvers.clone()
    }

    pub fn fulfill(&self, value: T) -> bool {
        self.resolvers.fulfill(value)
    }

    pub fn resolve(&self, resolution: Resolution<T, E>) -> bool {
        self.resolvers.resolve(resolution)
    }

    pub fn reject(&self, reason: E) -> bool {
        self.resolvers.reject(reason)
    }

    pub fn into_parts(self) -> (Computation<T, E>, Resolvers<T, E>) {
        (self.computation, self.resolvers)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskQueue;

    fn queue() -> (TaskQueue, SchedulerHandle) {
        let queue = TaskQueue::new();
        let handle = queue.handle();
        (queue, handle)
    }

    fn recorder<T: 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(T) + Clone + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |item| sink.borrow_mut().push(item))
    }

    #[test]
    fn resolver_runs_synchronously() {
        let (_queue, s) = queue();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let c = Computation::<i32, Reason>::new(&s, move |_| {
            flag.set(true);
            Ok(())
        });
        assert!(ran.get());
        assert!(c.is_pending());
    }

    #[test]
    fn settles_immediately_but_notifies_later() {
        let (queue, s) = queue();
        let (log, record) = recorder();
        let c = Computation::<i32, Reason>::new(&s, |r| {
            r.fulfill(1);
            Ok(())
        });
        assert!(c.is_fulfilled());
        c.map(move |v| record(v));
        assert!(log.borrow().is_empty());
        assert_eq!(queue.len(), 1);
        queue.run_until_stalled();
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn scenario_increment_chain() {
        let (queue, s) = queue();
        let (log, record) = recorder();
        Computation::<i32, Reason>::new(&s, |r| {
            r.fulfill(5);
            Ok(())
        })
        .then(|v| Ok(Resolution::Value(v + 1)))
        .map(move |v| record(v));
        queue.run_until_stalled();
        assert_eq!(*log.borrow(), vec![6]);
    }

    #[test]
    fn scenario_rejection_recovered_by_handler() {
        let (queue, s) = queue();
        let (log, record) = recorder();
        Computation::<usize, String>::new(&s, |r| {
            r.reject("boom".to_owned());
            Ok(())
        })
        .chain(None, Some(Box::new(|reason: String| Ok(Resolution::Value(reason.len())))))
        .map(move |v| record(v));
        queue.run_until_stalled();
        assert_eq!(*log.borrow(), vec![4]);
    }

    #[test]
    fn scenario_adopts_pending_computation() {
        let (queue, s) = queue();
        let c1 = Computation::<&'static str, Reason>::fulfilled(&s, "ignored");
        let c2 = Deferred::<&'static str, Reason>::new(&s);
        let adopted = c2.computation();
        let next = c1.then(move |_| Ok(Resolution::Computation(adopted)));

        queue.run_until_stalled();
        assert!(next.is_pending());

        c2.fulfill("x");
        queue.run_until_stalled();
        assert_eq!(next.value(), Some("x"));
    }

    #[test]
    fn scenario_second_fulfill_is_silent_noop() {
        let (_queue, s) = queue();
        let c = Computation::<i32, Reason>::new(&s, |r| {
            assert!(r.fulfill(42));
            assert!(!r.fulfill(43));
            Ok(())
        });
        assert_eq!(c.value(), Some(42));
    }

    #[test]
    fn resolver_error_rejects() {
        let (_queue, s) = queue();
        let c = Computation::<i32, Reason>::new(&s, |_| Err(Reason::from("thrown")));
        assert_eq!(c.reason(), Some(Reason::from("thrown")));
    }

    #[test]
    fn resolver_error_after_fulfill_is_ignored() {
        let (_queue, s) = queue();
        let c = Computation::<i32, Reason>::new(&s, |r| {
            r.fulfill(1);
            Err(Reason::from("thrown"))
        });
        assert_eq!(c.outcome(), Some(Ok(1)));
    }

    #[test]
    fn reject_after_resolving_with_pending_is_ignored() {
        let (queue, s) = queue();
        let source = Deferred::<i32, Reason>::new(&s);
        let adopted = source.computation();
        let c = Computation::<i32, Reason>::new(&s, move |r| {
            r.resolve(Resolution::Computation(adopted));
            assert!(!r.reject(Reason::from("too late")));
            Ok(())
        });
        assert!(c.is_pending());
        source.fulfill(8);
        queue.run_until_stalled();
        assert_eq!(c.value(), Some(8));
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let (queue, s) = queue();
        let deferred = Deferred::<i32, Reason>::new(&s);
        let c = deferred.computation();
        let (log, record) = recorder();
        for name in ["h1", "h2", "h3"] {
            let record = record.clone();
            c.map(move |_| record(name));
        }
        deferred.fulfill(0);
        queue.run_until_stalled();
        assert_eq!(*log.borrow(), vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn chain_returns_before_continuation_runs() {
        let (queue, s) = queue();
        let (log, record) = recorder();
        let c = Computation::<i32, Reason>::fulfilled(&s, 1);
        let on_fulfilled = record.clone();
        let _next = c.map(move |_| on_fulfilled("continuation"));
        record("after chain");
        queue.run_until_stalled();
        assert_eq!(*log.borrow(), vec!["after chain", "continuation"]);
    }

    #[test]
    fn rejection_tunnels_through_fulfillment_handlers() {
        let (queue, s) = queue();
        let deferred = Deferred::<i32, Reason>::new(&s);
        let called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&called);
        let next = deferred.computation().map(move |v| {
            flag.set(true);
            v
        });
        let tail = next.map(|v| v * 2);
        deferred.reject(Reason::from("R"));
        queue.run_until_stalled();
        assert!(!called.get());
        assert_eq!(next.reason(), Some(Reason::from("R")));
        assert_eq!(tail.reason(), Some(Reason::from("R")));
    }

    #[test]
    fn missing_fulfillment_handler_passes_value_through() {
        let (queue, s) = queue();
        let c = Computation::<u8, Reason>::fulfilled(&s, 7);
        let widened: Computation<u32, Reason> = c.chain(None, None);
        queue.run_until_stalled();
        assert_eq!(widened.value(), Some(7u32));
    }

    #[test]
    fn handler_error_rejects_dependent() {
        let (queue, s) = queue();
        let c = Computation::<i32, Reason>::fulfilled(&s, 1);
        let next: Computation<i32, Reason> = c.then(|_| Err(Reason::from("handler failed")));
        queue.run_until_stalled();
        assert_eq!(next.reason(), Some(Reason::from("handler failed")));
    }

    #[test]
    fn returning_self_is_a_cycle() {
        let (queue, s) = queue();
        let c = Computation::<i32, Reason>::fulfilled(&s, 1);
        let slot: Rc<RefCell<Option<Computation<i32, Reason>>>> = Rc::new(RefCell::new(None));
        let reader = Rc::clone(&slot);
        let next = c.then(move |_| match reader.borrow().clone() {
            Some(me) => Ok(Resolution::Computation(me)),
            None => Err(Reason::from("slot empty")),
        });
        *slot.borrow_mut() = Some(next.clone());
        queue.run_until_stalled();
        let reason = next.reason().expect("rejected");
        assert!(reason.is_chaining_cycle());
        assert_eq!(reason, Reason::from(ChainingCycle { id: next.id() }));
    }

    #[test]
    fn mutual_adoption_is_a_cycle() {
        let (queue, s) = queue();
        let a = Deferred::<i32, Reason>::new(&s);
        let b = Deferred::<i32, Reason>::new(&s);
        a.resolve(Resolution::Computation(b.computation()));
        b.resolve(Resolution::Computation(a.computation()));
        queue.run_until_stalled();
        assert!(b.computation().reason().is_some_and(|r| r.is_chaining_cycle()));
        assert!(a.computation().reason().is_some_and(|r| r.is_chaining_cycle()));
    }

    #[test]
    fn resolved_returns_same_computation() {
        let (_queue, s) = queue();
        let c = Computation::<i32, Reason>::fulfilled(&s, 1);
        let again = Computation::resolved(&s, Resolution::Computation(c.clone()));
        assert!(again.ptr_eq(&c));
    }

    #[test]
    fn adopts_rejection() {
        let (queue, s) = queue();
        let inner = Computation::<i32, Reason>::rejected(&s, Reason::from("inner"));
        let outer = Computation::<i32, Reason>::fulfilled(&s, 0).and_then(move |_| inner);
        queue.run_until_stalled();
        assert_eq!(outer.reason(), Some(Reason::from("inner")));
    }

    #[test]
    fn catch_recovers_and_passes_values() {
        let (queue, s) = queue();
        let recovered = Computation::<i32, Reason>::rejected(&s, Reason::from("x"))
            .catch(|_| Ok(Resolution::Value(0)));
        let untouched =
            Computation::<i32, Reason>::fulfilled(&s, 5).catch(|_| Ok(Resolution::Value(0)));
        queue.run_until_stalled();
        assert_eq!(recovered.value(), Some(0));
        assert_eq!(untouched.value(), Some(5));
    }

    #[test]
    fn map_err_keeps_rejection() {
        let (queue, s) = queue();
        let c = Computation::<i32, Reason>::rejected(&s, Reason::from("low"))
            .map_err(|r| Reason::message(format!("wrapped: {r}")));
        queue.run_until_stalled();
        assert_eq!(c.reason(), Some(Reason::from("wrapped: low")));
    }

    #[test]
    fn finally_runs_once_and_passes_through() {
        let (queue, s) = queue();
        let runs = Rc::new(Cell::new(0));
        let (r1, r2) = (Rc::clone(&runs), Rc::clone(&runs));
        let ok = Computation::<i32, Reason>::fulfilled(&s, 3).finally(move || {
            r1.set(r1.get() + 1);
            Ok(())
        });
        let err = Computation::<i32, Reason>::rejected(&s, Reason::from("e")).finally(move || {
            r2.set(r2.get() + 1);
            Ok(())
        });
        queue.run_until_stalled();
        assert_eq!(runs.get(), 2);
        assert_eq!(ok.value(), Some(3));
        assert_eq!(err.reason(), Some(Reason::from("e")));
    }

    #[test]
    fn finally_error_overrides_outcome() {
        let (queue, s) = queue();
        let c = Computation::<i32, Reason>::fulfilled(&s, 3)
            .finally(|| Err(Reason::from("cleanup failed")));
        queue.run_until_stalled();
        assert_eq!(c.reason(), Some(Reason::from("cleanup failed")));
    }

    #[test]
    fn inspect_sees_value() {
        let (queue, s) = queue();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let c = Computation::<i32, Reason>::fulfilled(&s, 11).inspect(move |v| sink.set(*v));
        queue.run_until_stalled();
        assert_eq!(seen.get(), 11);
        assert_eq!(c.value(), Some(11));
    }

    #[test]
    fn computation_as_thenable() {
        let (queue, s) = queue();
        let source = Deferred::<i32, Reason>::new(&s);
        let as_thenable: Rc<dyn Thenable<i32, Reason>> = Rc::new(source.computation());
        let c = Computation::resolved(&s, Resolution::Thenable(as_thenable));
        source.fulfill(4);
        queue.run_until_stalled();
        assert_eq!(c.value(), Some(4));
    }

    #[test]
    fn children_inherit_scheduler() {
        let (_queue, s) = queue();
        let c = Computation::<i32, Reason>::fulfilled(&s, 1);
        let child = c.map(|v| v);
        assert!(child.scheduler().ptr_eq(&s));
    }

    #[test]
    fn ids_are_unique() {
        let (_queue, s) = queue();
        let a = Computation::<i32, Reason>::fulfilled(&s, 1);
        let b = Computation::<i32, Reason>::fulfilled(&s, 1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn debug_format() {
        let (_queue, s) = queue();
        let c = Computation::<i32, Reason>::fulfilled(&s, 42);
        let dbg = format!("{c:?}");
        assert!(dbg.contains("Computation"));
        assert!(dbg.contains("Fulfilled"));
        assert!(dbg.contains("42"));

        let d = Deferred::<i32, Reason>::new(&s);
        assert!(format!("{d:?}").contains("Pending"));
        assert!(format!("{:?}", d.resolvers()).contains("already_resolved: false"));
    }
}
