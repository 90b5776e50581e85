//! Entity predicates for dashboard filtering.
//!
//! Every predicate looks at the runs picked by [`select_runs`] and nothing
//! else, so the same view answers differently for `latest` and `all`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

use super::scope::{select_runs, RunScope};
use super::view::EntityView;

fn any_selected(view: &EntityView, scope: RunScope, status: JobStatus) -> bool {
    select_runs(&view.runs, scope)
        .iter()
        .any(|run| run.has_status(status))
}

pub fn has_pending_approval(view: &EntityView, scope: RunScope) -> bool {
    any_selected(view, scope, JobStatus::NeedsApproval)
}

pub fn has_failed_jobs(view: &EntityView, scope: RunScope) -> bool {
    any_selected(view, scope, JobStatus::Failed)
}

pub fn has_processing_jobs(view: &EntityView, scope: RunScope) -> bool {
    any_selected(view, scope, JobStatus::Processing)
}

/// At least one run selected, and every selected run has jobs and is
/// completed across all of its steps.
pub fn is_fully_completed(view: &EntityView, scope: RunScope) -> bool {
    let runs = select_runs(&view.runs, scope);
    !runs.is_empty()
        && runs
            .iter()
            .all(|run| run.job_count > 0 && run.status == JobStatus::Completed)
}

pub fn has_issues(view: &EntityView, scope: RunScope) -> bool {
    has_failed_jobs(view, scope) || has_pending_approval(view, scope)
}

/// True if `step_id` is failed or awaiting approval in any selected run.
pub fn has_pipeline_step_issues(view: &EntityView, scope: RunScope, step_id: &str) -> bool {
    select_runs(&view.runs, scope)
        .iter()
        .filter_map(|run| run.step(step_id))
        .any(|step| step.has_issues())
}

/// A named predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "stepId", rename_all = "camelCase")]
pub enum EntityFilter {
    PendingApproval,
    Failed,
    Processing,
    FullyCompleted,
    HasIssues,
    StepIssues(String),
}

impl EntityFilter {
    pub fn matches(&self, view: &EntityView, scope: RunScope) -> bool {
        match self {
            EntityFilter::PendingApproval => has_pending_approval(view, scope),
            EntityFilter::Failed => has_failed_jobs(view, scope),
            EntityFilter::Processing => has_processing_jobs(view, scope),
            EntityFilter::FullyCompleted => is_fully_completed(view, scope),
            EntityFilter::HasIssues => has_issues(view, scope),
            EntityFilter::StepIssues(step_id) => has_pipeline_step_issues(view, scope, step_id),
        }
    }
}

impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityFilter::PendingApproval => f.write_str("pending-approval"),
            EntityFilter::Failed => f.write_str("failed"),
            EntityFilter::Processing => f.write_str("processing"),
            EntityFilter::FullyCompleted => f.write_str("fully-completed"),
            EntityFilter::HasIssues => f.write_str("has-issues"),
            EntityFilter::StepIssues(step) => write!(f, "step-issues:{}", step),
        }
    }
}

/// Parses the names printed by `Display`, e.g. `failed` or `step-issues:extraction`.
impl FromStr for EntityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(step) = s.strip_prefix("step-issues:") {
            if step.is_empty() {
                return Err("step-issues needs a step id, e.g. step-issues:extraction".to_string());
            }
            return Ok(EntityFilter::StepIssues(step.to_string()));
        }
        match s {
            "pending-approval" => Ok(EntityFilter::PendingApproval),
            "failed" => Ok(EntityFilter::Failed),
            "processing" => Ok(EntityFilter::Processing),
            "fully-completed" => Ok(EntityFilter::FullyCompleted),
            "has-issues" => Ok(EntityFilter::HasIssues),
            other => Err(format!("unknown filter '{}'", other)),
        }
    }
}

/// Filters combined with AND, evaluated under one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    pub scope: RunScope,
    pub filters: Vec<EntityFilter>,
}

impl FilterSet {
    pub fn new(scope: RunScope) -> Self {
        Self {
            scope,
            filters: Vec::new(),
        }
    }

    pub fn with(mut self, filter: EntityFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// An empty set matches every entity.
    pub fn matches(&self, view: &EntityView) -> bool {
        self.filters.iter().all(|f| f.matches(view, self.scope))
    }
}

pub fn filter_entities<'a>(views: &'a [EntityView], set: &FilterSet) -> Vec<&'a EntityView> {
    views.iter().filter(|v| set.matches(v)).collect()
}
