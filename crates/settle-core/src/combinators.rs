#![forbid(unsafe_code)]

//! Aggregating many resolutions into one computation.
//!
//! Every item is first lifted with [`Computation::resolved`], so plain
//! values, computations, and thenables can be mixed freely. Outputs keep
//! input order regardless of the order items settle in.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::computation::{Computation, Deferred};
use crate::error::ChainingCycle;
use crate::resolution::Resolution;
use crate::scheduler::SchedulerHandle;
use crate::state::Settled;

fn lift<T, E, I>(scheduler: &SchedulerHandle, items: I) -> Vec<Computation<T, E>>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    items
        .into_iter()
        .map(|item| Computation::resolved(scheduler, item))
        .collect()
}

/// Output slots filled out of order and released once all are present.
struct Gather<V> {
    slots: RefCell<Vec<Option<V>>>,
    remaining: Cell<usize>,
}

impl<V> Gather<V> {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new((0..len).map(|_| None).collect()),
            remaining: Cell::new(len),
        })
    }

    /// Store `value` at `index`. Returns the full output once the last slot
    /// is filled.
    fn fill(&self, index: usize, value: V) -> Option<Vec<V>> {
        let mut slots = self.slots.borrow_mut();
        if let Some(slot) = slots.get_mut(index)
            && slot.is_none()
        {
            *slot = Some(value);
            self.remaining.set(self.remaining.get() - 1);
        }
        if self.remaining.get() > 0 {
            return None;
        }
        Some(slots.drain(..).flatten().collect())
    }
}

/// Fulfil with every value in input order, or reject with the first
/// rejection.
///
/// ```
/// use settle_core::{all, Computation, Reason, Resolution, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let s = queue.handle();
/// let later = Computation::<i32, Reason>::fulfilled(&s, 1).map(|v| v + 1);
/// let both = all(&s, [Resolution::Computation(later), Resolution::Value(1)]);
/// queue.run_until_stalled();
/// assert_eq!(both.value(), Some(vec![2, 1]));
/// ```
pub fn all<T, E, I>(scheduler: &SchedulerHandle, items: I) -> Computation<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let members = lift(scheduler, items);
    let deferred = Deferred::<Vec<T>, E>::new(scheduler);
    if members.is_empty() {
        deferred.fulfill(Vec::new());
        return deferred.computation();
    }
    trace!(
        computation_id = deferred.computation().id(),
        members = members.len(),
        "all: waiting on members"
    );
    let gather = Gather::new(members.len());
    for (index, member) in members.into_iter().enumerate() {
        let on_fulfilled = deferred.clone();
        let on_rejected = deferred.clone();
        let gather = Rc::clone(&gather);
        member.react(
            move |value| {
                if let Some(values) = gather.fill(index, value) {
                    on_fulfilled.fulfill(values);
                }
            },
            move |reason| {
                on_rejected.reject(reason);
            },
        );
    }
    deferred.computation()
}

/// Settle like whichever item settles first. Empty input never settles.
pub fn race<T, E, I>(scheduler: &SchedulerHandle, items: I) -> Computation<T, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let deferred = Deferred::<T, E>::new(scheduler);
    for member in lift(scheduler, items) {
        let on_fulfilled = deferred.clone();
        let on_rejected = deferred.clone();
        member.react(
            move |value| {
                on_fulfilled.fulfill(value);
            },
            move |reason| {
                on_rejected.reject(reason);
            },
        );
    }
    deferred.computation()
}

/// Fulfil with every item's outcome in input order. Never rejects.
pub fn all_settled<T, E, I>(
    scheduler: &SchedulerHandle,
    items: I,
) -> Computation<Vec<Settled<T, E>>, E>
where
    T: Clone + 'static,
    E: Clone + From<ChainingCycle> + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let members = lift(scheduler, items);
    let deferred = Deferred::<Vec<Settled<T, E>>, E>::new(scheduler);
    if members.is_empty() {
        deferred.fulfill(Vec::new());
        return deferred.computation();
    }
    let gather = Gather::new(members.len());
    for (index, member) in members.into_iter().enumerate() {
        let on_fulfilled = deferred.clone();
        let on_rejected = deferred.clone();
        let fulfilled_gather = Rc::clone(&gather);
        let rejected_gather = Rc::clone(&gather);
        member.react(
            move |value| {
                if let Some(outcomes) = fulfilled_gather.fill(index, Settled::Fulfilled(value)) {
                    on_fulfilled.fulfill(outcomes);
                }
            },
            move |reason| {
                if let Some(outcomes) = rejected_gather.fill(index, Settled::Rejected(reason)) {
                    on_rejected.fulfill(outcomes);
                }
            },
        );
    }
    deferred.computation()
}
