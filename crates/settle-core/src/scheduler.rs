#![forbid(unsafe_code)]

//! The deferred-execution seam.
//!
//! Computations never run continuations inline. They hand a [`Task`] to a
//! [`Scheduler`], which must run it after the current synchronous code has
//! finished, in FIFO order relative to every other task it was given.
//!
//! # Invariants
//!
//! 1. `schedule_soon` never runs the task before returning.
//! 2. Tasks run in the order they were scheduled, including tasks scheduled
//!    by other tasks while the queue is being drained.
//!
//! [`TaskQueue`] is the minimal conforming implementation: a shared
//! `VecDeque` that the host drains explicitly.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Host primitive that runs tasks soon, but never now.
pub trait Scheduler {
    /// Enqueue `task` to run after the current synchronous execution.
    fn schedule_soon(&self, task: Task);
}

/// Cheaply cloneable, shared reference to a [`Scheduler`].
///
/// Every computation carries one; dependents inherit their parent's.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Rc<dyn Scheduler>,
}

impl SchedulerHandle {
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Self {
            inner: Rc::new(scheduler),
        }
    }

    pub fn from_rc(scheduler: Rc<dyn Scheduler>) -> Self {
        Self { inner: scheduler }
    }

    pub fn schedule_soon(&self, task: impl FnOnce() + 'static) {
        self.inner.schedule_soon(Box::new(task));
    }

    /// Whether both handles were cloned from the same handle.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("ptr", &Rc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// FIFO task queue drained by the host.
///
/// Cloning a `TaskQueue` creates a new handle to the **same** queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler handle that enqueues onto this queue.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(self.clone())
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Remove the oldest task without running it.
    ///
    /// The queue is not borrowed once this returns, so the caller may run
    /// the task and let it schedule more work.
    #[must_use]
    pub fn pop_front(&self) -> Option<Task> {
        self.tasks.borrow_mut().pop_front()
    }

    /// Run the oldest task, if any. Returns whether a task ran.
    pub fn run_one(&self) -> bool {
        match self.pop_front() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks scheduled along
    /// the way. Returns the number of tasks run.
    pub fn run_until_stalled(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for TaskQueue {
    fn schedule_soon(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}
