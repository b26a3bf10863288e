#![forbid(unsafe_code)]

//! Host side of settle: a reference run loop that implements
//! `schedule_soon`, its configuration, and `tracing` setup.
//!
//! ```
//! use settle_core::{Computation, Reason};
//! use settle_runtime::{RunLoop, RunLoopConfig};
//!
//! let run_loop = RunLoop::with_config(RunLoopConfig::default().with_max_tasks_per_drain(Some(64)));
//! let c = Computation::<&str, Reason>::rejected(&run_loop.handle(), Reason::from("boom"))
//!     .map_err(|r| Reason::message(format!("wrapped: {r}")));
//! run_loop.run_until_stalled().expect("within budget");
//! assert_eq!(c.reason(), Some(Reason::from("wrapped: boom")));
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod run_loop;

pub use config::RunLoopConfig;
pub use error::RunLoopError;
pub use logging::init_tracing;
pub use run_loop::{RunLoop, RunStats};
