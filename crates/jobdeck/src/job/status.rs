//! Status of a single job record.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticKind};

use super::record::JobRecord;

/// Derived status of a job, step or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Processing,
    NeedsApproval,
    Completed,
    Failed,
}

/// Status of a pipeline step within one run.
pub type StepStatus = JobStatus;

/// Status of a whole run.
pub type RunStatus = JobStatus;

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Failed,
        JobStatus::NeedsApproval,
        JobStatus::Processing,
        JobStatus::Waiting,
        JobStatus::Completed,
    ];

    /// Rank used when rolling statuses up: higher is more urgent.
    ///
    /// `failed > needs_approval > processing > waiting > completed`
    pub fn severity(self) -> u8 {
        match self {
            JobStatus::Completed => 0,
            JobStatus::Waiting => 1,
            JobStatus::Processing => 2,
            JobStatus::NeedsApproval => 3,
            JobStatus::Failed => 4,
        }
    }

    /// Combines two statuses, keeping the more urgent one.
    pub fn worse(self, other: JobStatus) -> JobStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Rolls up a set of statuses. Returns `None` for an empty set.
    pub fn worst_of<I: IntoIterator<Item = JobStatus>>(statuses: I) -> Option<JobStatus> {
        statuses.into_iter().reduce(JobStatus::worse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Processing => "processing",
            JobStatus::NeedsApproval => "needs_approval",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Failed or awaiting a human decision.
    pub fn is_issue(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::NeedsApproval)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Resolves the status of one job. First match wins:
///
/// 1. failed
/// 2. approval required but not granted
/// 3. finished
/// 4. started but not finished
/// 5. waiting
///
/// A job that would be `completed` but has inconsistent timestamps is
/// reported as `processing` instead.
pub fn resolve(job: &JobRecord) -> JobStatus {
    if job.failed {
        return JobStatus::Failed;
    }
    if job.awaits_approval() {
        return JobStatus::NeedsApproval;
    }
    match (job.started_at, job.finished_at) {
        (_, Some(_)) if !job.timestamps_consistent() => JobStatus::Processing,
        (_, Some(_)) => JobStatus::Completed,
        (Some(_), None) => JobStatus::Processing,
        (None, None) => JobStatus::Waiting,
    }
}

/// Checks a record against the data-model invariants.
pub fn check_record(job: &JobRecord) -> Vec<Diagnostic> {
    let mut found = Vec::new();

    if !job.timestamps_consistent() {
        found.push(Diagnostic::for_job(job, DiagnosticKind::InconsistentTimestamps));
    }
    if job.failed && job.finished_at.is_none() {
        found.push(Diagnostic::for_job(job, DiagnosticKind::FailedWithoutFinish));
    }
    if let Some(approval) = job.approval {
        if approval.approved && !approval.required {
            found.push(Diagnostic::for_job(
                job,
                DiagnosticKind::ApprovedWithoutRequirement,
            ));
        }
    }

    found
}
