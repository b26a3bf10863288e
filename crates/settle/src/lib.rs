#![forbid(unsafe_code)]

//! settle public facade crate.
//!
//! Re-exports the core computation types and, with the default `runtime`
//! feature, the reference run loop.

pub use settle_core::{
    ChainingCycle, Computation, Deferred, Reason, Resolution, Resolvers, Scheduler,
    SchedulerHandle, Settled, Status, Task, TaskQueue, ThenFn, ThenMethod, Thenable, all,
    all_settled, race,
};

#[cfg(feature = "runtime")]
pub use settle_runtime::{RunLoop, RunLoopConfig, RunLoopError, RunStats, init_tracing};

pub mod prelude {
    pub use settle_core as core;
    #[cfg(feature = "runtime")]
    pub use settle_runtime as runtime;

    pub use settle_core::{Computation, Deferred, Reason, Resolution, Resolvers, Thenable};
    #[cfg(feature = "runtime")]
    pub use settle_runtime::RunLoop;
}
