#![forbid(unsafe_code)]

//! Conformance scenarios for settle computations and the
//! `settle-conformance` runner.

pub mod cli;
pub mod error;
pub mod report;
pub mod scenario;

pub use cli::{run, run_from_env};
pub use error::{HarnessError, Result};
pub use report::{ConformanceReport, ScenarioReport, run_scenario, run_scenarios};
pub use scenario::{CATALOG, Scenario, find};
