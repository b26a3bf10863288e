#![forbid(unsafe_code)]

//! Core: deferred computations, chaining, and the value-resolution procedure.
//!
//! A [`Computation`] is a single-threaded deferred value with Promise/A+
//! semantics:
//!
//! - [`Computation::new`] runs a resolver synchronously and hands it a
//!   [`Resolvers`] pair.
//! - [`Computation::chain`] (and the `then`/`catch`/`map` family) registers
//!   continuations and returns a new dependent computation.
//! - Continuation output is a [`Resolution`]: a plain value, another
//!   computation (adopted, never nested), or a foreign [`Thenable`].
//!
//! Every continuation is dispatched through a [`Scheduler`], never inline.
//! The crate ships [`TaskQueue`], a plain FIFO scheduler; richer run loops
//! live in `settle-runtime`.
//!
//! # Example
//!
//! ```
//! use settle_core::{Computation, Reason, Resolution, TaskQueue};
//!
//! let queue = TaskQueue::new();
//! let handle = queue.handle();
//!
//! let six = Computation::<i32, Reason>::new(&handle, |r| {
//!     r.fulfill(5);
//!     Ok(())
//! })
//! .map(|v| v + 1);
//!
//! assert!(six.is_pending());
//! queue.run_until_stalled();
//! assert_eq!(six.value(), Some(6));
//! ```

pub mod combinators;
pub mod computation;
pub mod error;
pub mod resolution;
pub mod scheduler;
pub mod state;

pub use combinators::{all, all_settled, race};
pub use computation::{Computation, Deferred, OnFulfilled, OnRejected, Resolvers};
pub use error::{ChainingCycle, Reason};
pub use resolution::{Resolution, ThenFn, ThenMethod, Thenable};
pub use scheduler::{Scheduler, SchedulerHandle, Task, TaskQueue};
pub use state::{Settled, Status};
