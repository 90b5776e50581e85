//! Command-line interface for querying pipeline status.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use crate::config::{default_config_path, load_config, Config};
use crate::fetch::{FetchOrchestrator, HttpJobSource, JobSnapshot};
use crate::logging::init_logging;
use crate::status::{
    bulk_rerun_targets, filter_entities, select_runs, sort_views, EntityFilter, EntityView,
    FilterSet, RunScope, StatusSummary,
};
use crate::topology::Topology;

/// Pipeline status dashboard for the terminal.
#[derive(Parser, Debug)]
#[command(name = "jobdeck")]
#[command(about = "Aggregate job queue state into per-entity pipeline status")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Fetch all stages and print the status of every entity.
    Status(StatusArgs),

    /// Print failed authoritative jobs as JSON, ready for a bulk rerun.
    RerunTargets(RerunArgs),

    /// Load and validate the configuration file.
    Validate(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config file (JSON or YAML). Defaults to ~/.jobdeck/config.json.
    #[arg(short, long, env = "JOBDECK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Runs to consider: latest (per year) or all.
    #[arg(long)]
    pub scope: Option<RunScope>,

    /// Only show entities matching every filter, e.g. `failed` or
    /// `step-issues:extraction`. Repeatable.
    #[arg(long = "filter")]
    pub filters: Vec<EntityFilter>,

    /// Show only this step's status for each run.
    #[arg(long)]
    pub step: Option<String>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct RerunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(long)]
    pub scope: Option<RunScope>,

    /// Restrict targets to one step.
    #[arg(long)]
    pub step: Option<String>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Status(args) => {
            let (config, topology) = setup(&args.config, cli.log_level.as_deref())?;
            let scope = args.scope.unwrap_or(config.default_scope);
            if let Some(step) = &args.step {
                ensure_step(&topology, step)?;
            }
            ensure_filter_steps(&topology, &args.filters)?;
            let snapshot = fetch_snapshot(&config, &topology).await?;
            run_status(&args, scope, &snapshot, &topology)
        }
        Commands::RerunTargets(args) => {
            let (config, topology) = setup(&args.config, cli.log_level.as_deref())?;
            let scope = args.scope.unwrap_or(config.default_scope);
            if let Some(step) = &args.step {
                ensure_step(&topology, step)?;
            }
            let snapshot = fetch_snapshot(&config, &topology).await?;
            let views = snapshot.all_views(&topology);
            let targets = bulk_rerun_targets(&views, scope, args.step.as_deref());
            println!("{}", serde_json::to_string_pretty(&targets)?);
            Ok(())
        }
        Commands::Validate(args) => {
            let (_, topology) = setup(&args, cli.log_level.as_deref())?;
            println!(
                "Configuration OK: {} steps, {} stages",
                topology.steps().len(),
                topology.stage_ids().count()
            );
            Ok(())
        }
    }
}

fn setup(args: &ConfigArgs, log_level: Option<&str>) -> anyhow::Result<(Config, Topology)> {
    let path = match &args.config {
        Some(p) => p.clone(),
        None => default_config_path().context("Could not determine home directory")?,
    };
    let mut config = load_config(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
    init_logging(&config.logging);
    log::debug!("Loaded config from {}", path.display());

    let topology = config.topology()?;
    Ok((config, topology))
}

fn ensure_step(topology: &Topology, step_id: &str) -> anyhow::Result<()> {
    if topology.step(step_id).is_none() {
        bail!("Unknown step '{}'", step_id);
    }
    Ok(())
}

/// Rejects `step-issues:<id>` filters naming a step the topology lacks.
fn ensure_filter_steps(topology: &Topology, filters: &[EntityFilter]) -> anyhow::Result<()> {
    for filter in filters {
        if let EntityFilter::StepIssues(step_id) = filter {
            ensure_step(topology, step_id)
                .with_context(|| format!("Invalid filter '{}'", filter))?;
        }
    }
    Ok(())
}

async fn fetch_snapshot(config: &Config, topology: &Topology) -> anyhow::Result<JobSnapshot> {
    let source = HttpJobSource::new(&config.fetch)?;
    let orchestrator = FetchOrchestrator::new(Arc::new(source), &config.fetch);
    let stages: Vec<String> = topology.stage_ids().map(str::to_string).collect();

    let snapshot = orchestrator.fetch_all(&stages).await;
    if snapshot.all_stages_failed() {
        bail!(
            "Every stage failed to load ({} stages)",
            snapshot.missing_stages.len()
        );
    }
    Ok(snapshot)
}

fn run_status(
    args: &StatusArgs,
    scope: RunScope,
    snapshot: &JobSnapshot,
    topology: &Topology,
) -> anyhow::Result<()> {
    let mut views = snapshot.all_views(topology);
    sort_views(&mut views, scope);

    let set = FilterSet {
        scope,
        filters: args.filters.clone(),
    };
    let matching = filter_entities(&views, &set);
    let summary = StatusSummary::compute(&views, scope);
    let diagnostics: usize = views.iter().map(|v| v.diagnostics.len()).sum();

    if args.json {
        let output = serde_json::json!({
            "scope": scope,
            "entities": matching,
            "summary": summary,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for view in &matching {
        for line in render_entity(view, scope, args.step.as_deref()) {
            println!("{}", line);
        }
    }
    println!("{}", render_summary(&summary));
    if diagnostics > 0 {
        println!("{} diagnostics (run with --json for details)", diagnostics);
    }
    Ok(())
}

/// One line per selected run: entity, year, thread, run status and step
/// statuses (or only `step` when given).
pub fn render_entity(view: &EntityView, scope: RunScope, step: Option<&str>) -> Vec<String> {
    select_runs(&view.runs, scope)
        .into_iter()
        .map(|run| {
            let year = run
                .key
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string());
            let steps: Vec<String> = run
                .steps
                .iter()
                .filter(|s| step.map_or(true, |wanted| wanted == s.step_id))
                .map(|s| format!("{}={}", s.step_id, s.status))
                .collect();
            format!(
                "{:<20} {:>4} {:<12} {:<15} [{}]",
                view.entity_key,
                year,
                run.key.thread_id,
                run.status,
                steps.join(" ")
            )
        })
        .collect()
}

pub fn render_summary(summary: &StatusSummary) -> String {
    format!(
        "{} entities ({}): {} with issues, {} failed, {} pending approval, {} processing, {} fully completed",
        summary.total,
        summary.scope,
        summary.has_issues,
        summary.failed,
        summary.pending_approval,
        summary.processing,
        summary.fully_completed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobRecord;
    use crate::status::compute_entity_view;
    use crate::topology::PipelineStep;
    use chrono::{TimeZone, Utc};

    fn topology() -> Topology {
        Topology::new(vec![
            PipelineStep::new("ingestion", 1, &["precheck"]),
            PipelineStep::new("extraction", 2, &["scope1"]),
        ])
        .unwrap()
    }

    fn view() -> EntityView {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let jobs = vec![
            JobRecord::new("1", "precheck", "acme", "t-1", t0)
                .with_year(2024)
                .started(t0)
                .finished(t0),
            JobRecord::new("2", "scope1", "acme", "t-1", t0)
                .with_year(2024)
                .started(t0)
                .failed_with("boom", t0),
        ];
        compute_entity_view("acme", &jobs, &topology())
    }

    #[test]
    fn test_parse_status_args() {
        let cli = Cli::try_parse_from([
            "jobdeck",
            "status",
            "--scope",
            "all",
            "--filter",
            "failed",
            "--filter",
            "step-issues:extraction",
            "--json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.scope, Some(RunScope::All));
                assert_eq!(
                    args.filters,
                    vec![
                        EntityFilter::Failed,
                        EntityFilter::StepIssues("extraction".to_string())
                    ]
                );
                assert!(args.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_filter() {
        assert!(Cli::try_parse_from(["jobdeck", "status", "--filter", "shiny"]).is_err());
        assert!(Cli::try_parse_from(["jobdeck", "status", "--scope", "newest"]).is_err());
    }

    #[test]
    fn test_parse_rerun_targets() {
        let cli = Cli::try_parse_from([
            "jobdeck",
            "rerun-targets",
            "--config",
            "/tmp/jobdeck.yaml",
            "--step",
            "extraction",
        ])
        .unwrap();
        match cli.command {
            Commands::RerunTargets(args) => {
                assert_eq!(args.step.as_deref(), Some("extraction"));
                assert_eq!(
                    args.config.config,
                    Some(PathBuf::from("/tmp/jobdeck.yaml"))
                );
                assert!(args.scope.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_render_entity_line() {
        let lines = render_entity(&view(), RunScope::Latest, None);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("acme"));
        assert!(lines[0].contains("2024"));
        assert!(lines[0].contains("[ingestion=completed extraction=failed]"));

        let only = render_entity(&view(), RunScope::Latest, Some("extraction"));
        assert!(only[0].contains("[extraction=failed]"));
    }

    #[test]
    fn test_render_summary() {
        let summary = StatusSummary::compute(&[view()], RunScope::Latest);
        let line = render_summary(&summary);
        assert!(line.starts_with("1 entities (latest): 1 with issues, 1 failed"));
    }

    #[test]
    fn test_ensure_step() {
        assert!(ensure_step(&topology(), "extraction").is_ok());
        assert!(ensure_step(&topology(), "export").is_err());
    }

    #[test]
    fn test_step_issue_filters_checked_against_topology() {
        let known = vec![
            EntityFilter::Failed,
            EntityFilter::StepIssues("extraction".to_string()),
        ];
        assert!(ensure_filter_steps(&topology(), &known).is_ok());

        let typo = vec![EntityFilter::StepIssues("extration".to_string())];
        let err = ensure_filter_steps(&topology(), &typo).unwrap_err();
        assert_eq!(err.to_string(), "Invalid filter 'step-issues:extration'");
        assert!(format!("{:#}", err).contains("Unknown step 'extration'"));
    }
}
