#![forbid(unsafe_code)]

//! Reference `schedule_soon` collaborator.
//!
//! [`RunLoop`] owns a [`TaskQueue`] and drains it on request. Tasks scheduled
//! while a drain is in progress join the back of the same queue and run in
//! the same drain, so one [`RunLoop::run_until_stalled`] call settles an
//! entire causal chain.
//!
//! # Budget
//!
//! A chain that keeps rescheduling itself never stalls. With
//! `max_tasks_per_drain` set, a drain stops after that many tasks and returns
//! [`RunLoopError::TaskBudgetExceeded`]; the tasks that did not run stay
//! queued for the next drain.
//!
//! # Tracing
//!
//! Each drain runs inside a `run_loop.drain` debug span that records
//! `tasks_run` and `drain_us` when it finishes.

use std::cell::Cell;

use settle_core::{SchedulerHandle, TaskQueue};
use tracing::{debug_span, field, warn};
use web_time::Instant;

use crate::config::RunLoopConfig;
use crate::error::{Result, RunLoopError};

/// Counters for one drain, or accumulated over the life of a [`RunLoop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStats {
    pub drains: u64,
    pub tasks_run: u64,
    pub budget_exhaustions: u64,
    pub busy_us: u64,
}

impl RunStats {
    fn absorb(&mut self, drain: &Self) {
        self.drains += drain.drains;
        self.tasks_run += drain.tasks_run;
        self.budget_exhaustions += drain.budget_exhaustions;
        self.busy_us += drain.busy_us;
    }
}

/// Single-threaded FIFO run loop.
///
/// ```
/// use settle_core::{Computation, Reason};
/// use settle_runtime::RunLoop;
///
/// let run_loop = RunLoop::new();
/// let c = Computation::<i32, Reason>::fulfilled(&run_loop.handle(), 20).map(|v| v + 1);
/// let stats = run_loop.run_until_stalled().expect("no budget");
/// assert_eq!(stats.tasks_run, 1);
/// assert_eq!(c.value(), Some(21));
/// ```
#[derive(Debug, Default)]
pub struct RunLoop {
    queue: TaskQueue,
    config: RunLoopConfig,
    totals: Cell<RunStats>,
}

impl RunLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: RunLoopConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunLoopConfig {
        &self.config
    }

    /// Scheduler handle for computations driven by this loop.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        self.queue.handle()
    }

    /// Tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Totals over every drain so far.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.totals.get()
    }

    /// Run exactly one task, if any. Not counted as a drain.
    pub fn run_one(&self) -> bool {
        let ran = self.queue.run_one();
        if ran {
            let mut totals = self.totals.get();
            totals.tasks_run += 1;
            self.totals.set(totals);
        }
        ran
    }

    /// Run tasks until the queue is empty or the task budget is spent.
    pub fn run_until_stalled(&self) -> Result<RunStats> {
        let span = debug_span!(
            "run_loop.drain",
            pending = self.queue.len(),
            tasks_run = field::Empty,
            drain_us = field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();
        let limit = self.config.max_tasks_per_drain;

        let mut drain = RunStats {
            drains: 1,
            ..RunStats::default()
        };
        let mut outcome = Ok(());
        loop {
            if let Some(limit) = limit
                && drain.tasks_run >= limit as u64
                && !self.queue.is_empty()
            {
                warn!(
                    limit,
                    remaining = self.queue.len(),
                    "run loop task budget exhausted"
                );
                drain.budget_exhaustions = 1;
                outcome = Err(RunLoopError::TaskBudgetExceeded { limit });
                break;
            }
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            task();
            drain.tasks_run += 1;
        }

        drain.busy_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        span.record("tasks_run", drain.tasks_run);
        span.record("drain_us", drain.busy_us);

        let mut totals = self.totals.get();
        totals.absorb(&drain);
        self.totals.set(totals);

        outcome.map(|()| drain)
    }
}
