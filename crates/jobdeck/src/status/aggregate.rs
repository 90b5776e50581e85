//! Rolls stage statuses up to steps and runs.
//!
//! Precedence, most actionable first:
//! `failed > needs_approval > processing > waiting > completed`.
//! A stage with no job in the run counts as `waiting`, so a step is only
//! `completed` once every one of its stages has a completed authoritative job.

use serde::Serialize;

use crate::job::{JobStatus, RunStatus, StepStatus};
use crate::topology::{PipelineStep, Topology, UNCLASSIFIED_STEP};

use super::grouper::{Run, StageHistory};

/// Per-status tallies over a step's stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub completed: usize,
    pub processing: usize,
    pub failed: usize,
    pub needs_approval: usize,
    pub waiting: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::NeedsApproval => self.needs_approval += 1,
            JobStatus::Waiting => self.waiting += 1,
        }
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Completed => self.completed,
            JobStatus::Processing => self.processing,
            JobStatus::Failed => self.failed,
            JobStatus::NeedsApproval => self.needs_approval,
            JobStatus::Waiting => self.waiting,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.processing + self.failed + self.needs_approval + self.waiting
    }

    /// Adds another set of counts to this one.
    pub fn merge(&mut self, other: &StatusCounts) {
        self.completed += other.completed;
        self.processing += other.processing;
        self.failed += other.failed;
        self.needs_approval += other.needs_approval;
        self.waiting += other.waiting;
    }
}

/// One stage of a step as seen in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSlot {
    pub stage_id: String,
    pub status: JobStatus,
    /// `None` when the run has no job for this stage yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<StageHistory>,
}

impl StageSlot {
    pub fn is_rerun(&self) -> bool {
        self.history.as_ref().is_some_and(StageHistory::is_rerun)
    }

    pub fn rerun_count(&self) -> usize {
        self.history.as_ref().map_or(0, StageHistory::rerun_count)
    }
}

/// Status rollup of one step in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub step_id: String,
    pub label: String,
    pub order: u32,
    pub status: StepStatus,
    pub counts: StatusCounts,
    pub stages: Vec<StageSlot>,
}

impl StepView {
    pub fn stage(&self, stage_id: &str) -> Option<&StageSlot> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn has_issues(&self) -> bool {
        self.status.is_issue()
    }
}

fn stage_status(run: &Run, stage_id: &str) -> JobStatus {
    run.stage(stage_id)
        .map(|h| h.status)
        .unwrap_or(JobStatus::Waiting)
}

/// Status of `step` in `run`.
pub fn step_status(run: &Run, step: &PipelineStep) -> StepStatus {
    JobStatus::worst_of(step.stages.iter().map(|s| stage_status(run, s)))
        .unwrap_or(JobStatus::Waiting)
}

/// Per-status counts over the authoritative jobs of `step`'s stages.
pub fn step_counts(run: &Run, step: &PipelineStep) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for stage in &step.stages {
        counts.record(stage_status(run, stage));
    }
    counts
}

/// Stages present in the run that the topology does not know about.
pub fn unclassified_stages<'a>(run: &'a Run, topology: &Topology) -> Vec<&'a str> {
    run.stages
        .keys()
        .map(String::as_str)
        .filter(|stage| !topology.contains_stage(stage))
        .collect()
}

/// Synthetic step holding the run's unclassified stages, if there are any.
pub fn unclassified_step(run: &Run, topology: &Topology) -> Option<PipelineStep> {
    let stages = unclassified_stages(run, topology);
    if stages.is_empty() {
        return None;
    }
    Some(PipelineStep {
        step_id: UNCLASSIFIED_STEP.to_string(),
        label: Some("Unclassified".to_string()),
        stages: stages.into_iter().map(str::to_string).collect(),
        order: u32::MAX,
    })
}

/// Status of the whole run across every step of the pipeline.
pub fn run_status(run: &Run, topology: &Topology) -> RunStatus {
    let extra = unclassified_step(run, topology);
    let statuses = topology
        .steps()
        .iter()
        .chain(extra.as_ref())
        .map(|step| step_status(run, step));
    JobStatus::worst_of(statuses).unwrap_or(JobStatus::Waiting)
}

pub fn build_step_view(run: &Run, step: &PipelineStep) -> StepView {
    let stages = step
        .stages
        .iter()
        .map(|stage_id| {
            let history = run.stage(stage_id).cloned();
            StageSlot {
                stage_id: stage_id.clone(),
                status: history
                    .as_ref()
                    .map(|h| h.status)
                    .unwrap_or(JobStatus::Waiting),
                history,
            }
        })
        .collect();

    StepView {
        step_id: step.step_id.clone(),
        label: step.display_label().to_string(),
        order: step.order,
        status: step_status(run, step),
        counts: step_counts(run, step),
        stages,
    }
}

/// Step views for every configured step, followed by the unclassified
/// bucket when the run has stages outside the topology.
pub fn step_views(run: &Run, topology: &Topology) -> Vec<StepView> {
    let extra = unclassified_step(run, topology);
    topology
        .steps()
        .iter()
        .chain(extra.as_ref())
        .map(|step| build_step_view(run, step))
        .collect()
}
