#![forbid(unsafe_code)]

use std::io::{self, Write};

use clap::{Args, Parser, Subcommand};
use settle_runtime::{RunLoopConfig, init_tracing};
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::report::run_scenarios;
use crate::scenario::{CATALOG, Scenario, find};

#[derive(Debug, Parser)]
#[command(
    name = "settle-conformance",
    about = "Run behavioural conformance scenarios for settle computations",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print scenario names and what they check.
    List,

    /// Run scenarios and report the results.
    Run(RunArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Scenario to run. Repeat to run several; omit to run all.
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Task budget per drain (0 = unlimited). Overrides SETTLE_MAX_TASKS_PER_DRAIN.
    #[arg(long = "max-tasks", value_name = "N")]
    pub max_tasks: Option<usize>,

    /// tracing filter directive. Overrides SETTLE_LOG; RUST_LOG still wins.
    #[arg(long = "log", value_name = "FILTER")]
    pub log: Option<String>,
}

impl RunArgs {
    /// Apply explicit flags on top of `base`.
    #[must_use]
    pub fn config(&self, base: RunLoopConfig) -> RunLoopConfig {
        let mut config = base;
        if let Some(limit) = self.max_tasks {
            config = config.with_max_tasks_per_drain(Some(limit));
        }
        if let Some(filter) = &self.log {
            config = config.with_log_filter(filter.clone());
        }
        config
    }

    pub fn selected(&self) -> Result<Vec<&'static Scenario>> {
        if self.scenarios.is_empty() {
            return Ok(CATALOG.iter().collect());
        }
        self.scenarios
            .iter()
            .map(|name| {
                find(name).ok_or_else(|| HarnessError::UnknownScenario { name: name.clone() })
            })
            .collect()
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(cli, &mut out, RunLoopConfig::from_env()?)
}

/// Execute `cli` against `base` configuration, writing the report to `out`.
pub fn run_with_output(cli: Cli, out: &mut impl Write, base: RunLoopConfig) -> Result<()> {
    match cli.command {
        Commands::List => {
            print_catalog(out)?;
            Ok(())
        }
        Commands::Run(args) => run_selected(&args, out, base),
    }
}

fn print_catalog(out: &mut impl Write) -> Result<()> {
    let width = CATALOG.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for scenario in CATALOG {
        writeln!(out, "{:<width$}  {}", scenario.name, scenario.summary)?;
    }
    Ok(())
}

fn run_selected(args: &RunArgs, out: &mut impl Write, base: RunLoopConfig) -> Result<()> {
    let config = args.config(base);
    init_tracing(&config.log_filter)?;
    let selected = args.selected()?;
    debug!(
        scenarios = selected.len(),
        max_tasks_per_drain = ?config.max_tasks_per_drain,
        "running conformance scenarios"
    );

    let report = run_scenarios(&selected, &config);
    if args.json {
        writeln!(out, "{}", report.to_json()?)?;
    } else {
        write!(out, "{}", report.render_text())?;
    }

    if report.all_passed() {
        Ok(())
    } else {
        Err(HarnessError::ScenariosFailed {
            failed: report.failed,
            total: report.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("settle-conformance").chain(args.iter().copied()))
            .expect("valid args")
    }

    #[test]
    fn parses_run_flags() {
        let cli = parse(&[
            "run",
            "--scenario",
            "increment-chain",
            "--scenario",
            "double-fulfill",
            "--json",
            "--max-tasks",
            "100",
            "--log",
            "debug",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.scenarios, vec!["increment-chain", "double-fulfill"]);
        assert!(args.json);
        assert_eq!(args.max_tasks, Some(100));
        assert_eq!(args.log.as_deref(), Some("debug"));
    }

    #[test]
    fn flags_override_environment() {
        let env = RunLoopConfig::default()
            .with_max_tasks_per_drain(Some(10))
            .with_log_filter("info");
        let args = RunArgs {
            max_tasks: Some(0),
            ..RunArgs::default()
        };
        let config = args.config(env.clone());
        assert_eq!(config.max_tasks_per_drain, None);
        assert_eq!(config.log_filter, "info");
        assert_eq!(RunArgs::default().config(env.clone()), env);
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        let args = RunArgs {
            scenarios: vec!["increment-chain".into(), "bogus".into()],
            ..RunArgs::default()
        };
        let err = args.selected().expect_err("bogus is unknown");
        assert!(matches!(err, HarnessError::UnknownScenario { ref name } if name == "bogus"));
    }

    #[test]
    fn list_prints_every_scenario() {
        let mut out = Vec::new();
        run_with_output(parse(&["list"]), &mut out, RunLoopConfig::default()).expect("list");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().count(), CATALOG.len());
        assert!(text.contains("mutual-adoption-cycle"));
    }
}
