//! Groups job records into runs and detects reruns.
//!
//! A run is every record sharing `(entity_key, year, thread_id)`. Within a
//! run, records of the same stage form that stage's history; the record with
//! the most recent activity is authoritative for the stage's status.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog};
use crate::job::{resolve, JobRecord, JobStatus};

/// Identity of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunKey {
    pub entity_key: String,
    pub year: Option<i32>,
    pub thread_id: String,
}

impl RunKey {
    pub fn of(job: &JobRecord) -> Self {
        Self {
            entity_key: job.entity_key.clone(),
            year: job.year,
            thread_id: job.thread_id.clone(),
        }
    }
}

/// All jobs of one stage within one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHistory {
    pub stage_id: String,
    /// The job whose status represents the stage.
    pub authoritative: JobRecord,
    /// Resolved status of `authoritative`.
    pub status: JobStatus,
    /// Every job of the stage, oldest `created_at` first.
    pub jobs: Vec<JobRecord>,
}

impl StageHistory {
    /// True when the stage ran more than once in the run.
    pub fn is_rerun(&self) -> bool {
        self.jobs.len() > 1
    }

    /// Number of jobs recorded for the stage, the original one included.
    pub fn rerun_count(&self) -> usize {
        self.jobs.len()
    }
}

/// Grouper output for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub key: RunKey,
    /// Stage id → history.
    pub stages: BTreeMap<String, StageHistory>,
    /// Maximum effective timestamp over every job of the run.
    pub latest_activity: DateTime<Utc>,
}

impl Run {
    pub fn stage(&self, stage_id: &str) -> Option<&StageHistory> {
        self.stages.get(stage_id)
    }

    pub fn job_count(&self) -> usize {
        self.stages.values().map(|h| h.jobs.len()).sum()
    }
}

/// Orders two jobs of the same stage by recency of activity.
///
/// Compares `finished_at ?? started_at ?? created_at`, then `created_at`.
/// `Ordering::Equal` means the pair cannot be told apart.
pub fn compare_activity(a: &JobRecord, b: &JobRecord) -> Ordering {
    a.effective_timestamp()
        .cmp(&b.effective_timestamp())
        .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Buckets jobs by run, keeping input order inside each bucket.
pub fn group(jobs: &[JobRecord]) -> BTreeMap<RunKey, Vec<JobRecord>> {
    let mut buckets: BTreeMap<RunKey, Vec<JobRecord>> = BTreeMap::new();
    for job in jobs {
        buckets.entry(RunKey::of(job)).or_default().push(job.clone());
    }
    buckets
}

/// Splits one run's bucket by stage and picks each stage's authoritative job.
///
/// Residual ties (same activity and creation time) keep the first job in
/// input order and are reported as diagnostics.
pub fn by_stage(
    bucket: &[JobRecord],
    diagnostics: &mut DiagnosticLog,
) -> BTreeMap<String, StageHistory> {
    let mut per_stage: BTreeMap<&str, Vec<&JobRecord>> = BTreeMap::new();
    for job in bucket {
        per_stage.entry(job.stage_id.as_str()).or_default().push(job);
    }

    let mut stages = BTreeMap::new();
    for (stage_id, jobs) in per_stage {
        let (authoritative, tied) = pick_authoritative(&jobs);

        if !tied.is_empty() {
            diagnostics.push(Diagnostic::for_job(
                authoritative,
                DiagnosticKind::AmbiguousRerunTie {
                    stage_id: stage_id.to_string(),
                    tied_with: tied.iter().map(|j| j.id.clone()).collect(),
                },
            ));
        }

        let mut history: Vec<JobRecord> = jobs.iter().map(|&j| j.clone()).collect();
        // stable: equal created_at keeps input order
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        stages.insert(
            stage_id.to_string(),
            StageHistory {
                stage_id: stage_id.to_string(),
                status: resolve(authoritative),
                authoritative: authoritative.clone(),
                jobs: history,
            },
        );
    }

    stages
}

/// Returns the most recent job and the jobs that tie with it.
fn pick_authoritative<'a>(jobs: &[&'a JobRecord]) -> (&'a JobRecord, Vec<&'a JobRecord>) {
    let mut best = jobs[0];
    let mut tied = Vec::new();

    for &candidate in &jobs[1..] {
        match compare_activity(candidate, best) {
            Ordering::Greater => {
                best = candidate;
                tied.clear();
            }
            Ordering::Equal => tied.push(candidate),
            Ordering::Less => {}
        }
    }

    (best, tied)
}

/// Groups a job list into runs.
pub fn build_runs(jobs: &[JobRecord], diagnostics: &mut DiagnosticLog) -> Vec<Run> {
    group(jobs)
        .into_iter()
        .filter_map(|(key, bucket)| {
            let latest_activity = bucket.iter().map(JobRecord::effective_timestamp).max()?;
            let stages = by_stage(&bucket, diagnostics);
            Some(Run {
                key,
                stages,
                latest_activity,
            })
        })
        .collect()
}
