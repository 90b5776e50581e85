//! Entity status views, the consumer-facing output of an aggregation pass.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog};
use crate::job::{check_record, JobRecord, JobStatus, RunStatus};
use crate::topology::Topology;

use super::aggregate::{run_status, step_views, unclassified_stages, StepView};
use super::grouper::{build_runs, Run, RunKey, StageHistory};

/// One run with its step rollups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub key: RunKey,
    pub status: RunStatus,
    pub latest_activity: DateTime<Utc>,
    pub job_count: usize,
    /// Configured steps in order, then `unclassified` if present.
    pub steps: Vec<StepView>,
}

impl RunView {
    pub fn from_run(run: &Run, topology: &Topology) -> Self {
        Self {
            key: run.key.clone(),
            status: run_status(run, topology),
            latest_activity: run.latest_activity,
            job_count: run.job_count(),
            steps: step_views(run, topology),
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&StepView> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Stage histories of the run with the step each belongs to.
    pub fn stage_histories(&self) -> impl Iterator<Item = (&StepView, &StageHistory)> {
        self.steps.iter().flat_map(|step| {
            step.stages
                .iter()
                .filter_map(move |slot| slot.history.as_ref().map(|h| (step, h)))
        })
    }

    /// True if any stage's authoritative job has `status`.
    pub fn has_status(&self, status: JobStatus) -> bool {
        self.stage_histories().any(|(_, h)| h.status == status)
    }
}

/// Everything known about one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub entity_key: String,
    /// Newest first.
    pub runs: Vec<RunView>,
    pub diagnostics: Vec<Diagnostic>,
}

impl EntityView {
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        self.runs.iter().map(|r| r.latest_activity).max()
    }

    pub fn run(&self, thread_id: &str) -> Option<&RunView> {
        self.runs.iter().find(|r| r.key.thread_id == thread_id)
    }
}

/// Builds the status view of `entity_key`.
///
/// `jobs` may hold records of other entities; they are ignored except as
/// targets when checking parent references.
pub fn compute_entity_view(entity_key: &str, jobs: &[JobRecord], topology: &Topology) -> EntityView {
    let _span = tracing::info_span!("entity_view", entity = entity_key).entered();

    let own: Vec<JobRecord> = jobs
        .iter()
        .filter(|j| j.entity_key == entity_key)
        .cloned()
        .collect();

    let mut diagnostics = DiagnosticLog::new();
    for job in &own {
        diagnostics.extend(check_record(job));
    }
    check_parents(&own, jobs, &mut diagnostics);

    let runs = build_runs(&own, &mut diagnostics);
    report_unclassified(&runs, topology, &mut diagnostics);

    let mut runs: Vec<RunView> = runs
        .iter()
        .map(|run| RunView::from_run(run, topology))
        .collect();
    runs.sort_by(|a, b| {
        b.latest_activity
            .cmp(&a.latest_activity)
            .then_with(|| b.key.thread_id.cmp(&a.key.thread_id))
    });

    log::debug!(
        "Computed view for {}: {} jobs, {} runs",
        entity_key,
        own.len(),
        runs.len()
    );

    EntityView {
        entity_key: entity_key.to_string(),
        runs,
        diagnostics: diagnostics.into_vec(),
    }
}

/// Views for every entity in `jobs`, ordered by entity key.
pub fn compute_all_views(jobs: &[JobRecord], topology: &Topology) -> Vec<EntityView> {
    let keys: BTreeSet<&str> = jobs.iter().map(|j| j.entity_key.as_str()).collect();
    keys.into_iter()
        .map(|key| compute_entity_view(key, jobs, topology))
        .collect()
}

fn check_parents(own: &[JobRecord], all: &[JobRecord], diagnostics: &mut DiagnosticLog) {
    if own.iter().all(|j| j.parent.is_none()) {
        return;
    }
    let known: HashSet<(&str, &str)> = all
        .iter()
        .map(|j| (j.stage_id.as_str(), j.id.as_str()))
        .collect();

    for job in own {
        if let Some(parent) = &job.parent {
            if !known.contains(&(parent.stage_id.as_str(), parent.job_id.as_str())) {
                diagnostics.push(Diagnostic::for_job(
                    job,
                    DiagnosticKind::OrphanedParent {
                        stage_id: parent.stage_id.clone(),
                        job_id: parent.job_id.clone(),
                    },
                ));
            }
        }
    }
}

fn report_unclassified(runs: &[Run], topology: &Topology, diagnostics: &mut DiagnosticLog) {
    let mut seen = HashSet::new();
    for run in runs {
        for stage_id in unclassified_stages(run, topology) {
            if !seen.insert(stage_id) {
                continue;
            }
            if let Some(history) = run.stage(stage_id) {
                diagnostics.push(Diagnostic::for_job(
                    &history.authoritative,
                    DiagnosticKind::UnclassifiedStage {
                        stage_id: stage_id.to_string(),
                    },
                ));
            }
        }
    }
}
