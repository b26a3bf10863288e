#![forbid(unsafe_code)]

use std::fmt::Write as _;

use serde::Serialize;
use settle_runtime::{RunLoop, RunLoopConfig, RunStats};
use tracing::{info, warn};

use crate::error::Result;
use crate::scenario::Scenario;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub summary: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConformanceReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub max_tasks_per_drain: Option<usize>,
    pub scenarios: Vec<ScenarioReport>,
}

/// Run one scenario on a fresh loop built from `config`.
#[must_use]
pub fn run_scenario(scenario: &Scenario, config: &RunLoopConfig) -> ScenarioReport {
    let run_loop = RunLoop::with_config(config.clone());
    let outcome = (scenario.run)(&run_loop);
    let passed = outcome.is_ok();
    if let Err(detail) = &outcome {
        warn!(scenario = scenario.name, %detail, "scenario failed");
    } else {
        info!(scenario = scenario.name, "scenario passed");
    }
    ScenarioReport {
        name: scenario.name.to_owned(),
        summary: scenario.summary.to_owned(),
        passed,
        detail: outcome.err(),
        stats: run_loop.stats(),
    }
}

#[must_use]
pub fn run_scenarios(scenarios: &[&Scenario], config: &RunLoopConfig) -> ConformanceReport {
    let reports: Vec<ScenarioReport> = scenarios
        .iter()
        .map(|scenario| run_scenario(scenario, config))
        .collect();
    let passed = reports.iter().filter(|r| r.passed).count();
    ConformanceReport {
        total: reports.len(),
        passed,
        failed: reports.len() - passed,
        max_tasks_per_drain: config.max_tasks_per_drain,
        scenarios: reports,
    }
}

impl ConformanceReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    #[must_use]
    pub fn render_text(&self) -> String {
        let width = self
            .scenarios
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for scenario in &self.scenarios {
            let status = if scenario.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "{status}  {:<width$}  {} ({} tasks)",
                scenario.name, scenario.summary, scenario.stats.tasks_run
            );
            if let Some(detail) = &scenario.detail {
                let _ = writeln!(out, "      {detail}");
            }
        }
        let _ = writeln!(
            out,
            "\n{} passed, {} failed, {} total",
            self.passed, self.failed, self.total
        );
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
