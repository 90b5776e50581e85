//! Non-fatal anomalies found while aggregating job data.
//!
//! Nothing in the engine fails on bad input. Malformed records are clamped to
//! a conservative status and reported here instead.

use serde::Serialize;

use crate::job::JobRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// `finished_at` precedes `started_at`, is set without `started_at`, or
    /// `started_at` precedes `created_at`.
    InconsistentTimestamps,
    /// `failed` is set but `finished_at` is not.
    FailedWithoutFinish,
    /// `approval.approved` is set while `approval.required` is not.
    ApprovedWithoutRequirement,
    /// The parent reference points at a job missing from the snapshot.
    OrphanedParent { stage_id: String, job_id: String },
    /// Several jobs of one stage in one run share the same activity timestamps.
    AmbiguousRerunTie { stage_id: String, tied_with: Vec<String> },
    /// The stage is not part of any configured pipeline step.
    UnclassifiedStage { stage_id: String },
    /// The stage's fetch failed or has not completed yet.
    MissingStageData { stage_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn for_job(job: &JobRecord, kind: DiagnosticKind) -> Self {
        Self {
            job_id: Some(job.id.clone()),
            thread_id: Some(job.thread_id.clone()),
            kind,
        }
    }

    pub fn for_stage(stage_id: &str, reason: &str) -> Self {
        Self {
            job_id: None,
            thread_id: None,
            kind: DiagnosticKind::MissingStageData {
                stage_id: stage_id.to_string(),
                reason: reason.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let job = self.job_id.as_deref().unwrap_or("-");
        match &self.kind {
            DiagnosticKind::InconsistentTimestamps => {
                write!(f, "job {}: inconsistent timestamps, treated as processing", job)
            }
            DiagnosticKind::FailedWithoutFinish => {
                write!(f, "job {}: failed without a finish time", job)
            }
            DiagnosticKind::ApprovedWithoutRequirement => {
                write!(f, "job {}: approved but no approval was required", job)
            }
            DiagnosticKind::OrphanedParent { stage_id, job_id } => {
                write!(f, "job {}: parent {}/{} not found", job, stage_id, job_id)
            }
            DiagnosticKind::AmbiguousRerunTie {
                stage_id,
                tied_with,
            } => write!(
                f,
                "job {}: rerun tie on stage {} with [{}], kept first seen",
                job,
                stage_id,
                tied_with.join(", ")
            ),
            DiagnosticKind::UnclassifiedStage { stage_id } => {
                write!(f, "job {}: stage {} is not mapped to a step", job, stage_id)
            }
            DiagnosticKind::MissingStageData { stage_id, reason } => {
                write!(f, "stage {}: data missing ({})", stage_id, reason)
            }
        }
    }
}

/// Collects diagnostics for one aggregation pass.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::MissingStageData { .. } => log::debug!("{}", diagnostic),
            _ => log::warn!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
