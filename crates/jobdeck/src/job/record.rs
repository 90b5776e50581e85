//! Canonical job record shape shared by every part of the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-approval gate attached to a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApproval {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub approved: bool,
}

/// Reference to a causally preceding job (display only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub stage_id: String,
    pub job_id: String,
}

/// One execution fact reported by the job queue.
///
/// Records are immutable once fetched. A manual rerun of a stage shows up as
/// a new record with the same `thread_id` and a later `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Identifier, unique within its stage.
    pub id: String,
    /// Processing stage (queue) the job ran on.
    pub stage_id: String,
    /// Owning business entity.
    pub entity_key: String,
    /// Reporting year; `None` for entity-wide jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Run this job belongs to.
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<JobApproval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    /// Low-level execution retries inside this one job.
    #[serde(default)]
    pub attempts_made: u32,
}

impl JobRecord {
    /// Creates a waiting job with only the identifying fields set.
    pub fn new(
        id: impl Into<String>,
        stage_id: impl Into<String>,
        entity_key: impl Into<String>,
        thread_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            stage_id: stage_id.into(),
            entity_key: entity_key.into(),
            year: None,
            thread_id: thread_id.into(),
            created_at,
            started_at: None,
            finished_at: None,
            failed: false,
            failed_reason: None,
            stacktrace: None,
            approval: None,
            parent: None,
            attempts_made: 0,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn finished(mut self, at: DateTime<Utc>) -> Self {
        self.finished_at = Some(at);
        self
    }

    /// Marks the job failed. Sets `finished_at` if it was not already set.
    pub fn failed_with(mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.failed = true;
        self.failed_reason = Some(reason.into());
        if self.finished_at.is_none() {
            self.finished_at = Some(at);
        }
        self
    }

    pub fn with_approval(mut self, required: bool, approved: bool) -> Self {
        self.approval = Some(JobApproval { required, approved });
        self
    }

    pub fn with_parent(mut self, stage_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        self.parent = Some(ParentRef {
            stage_id: stage_id.into(),
            job_id: job_id.into(),
        });
        self
    }

    /// Most recent activity: `finished_at ?? started_at ?? created_at`.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.finished_at
            .or(self.started_at)
            .unwrap_or(self.created_at)
    }

    /// True when the job sits behind an approval gate that has not been passed.
    pub fn awaits_approval(&self) -> bool {
        self.approval
            .map(|a| a.required && !a.approved)
            .unwrap_or(false)
    }

    /// True when the timestamps respect `created <= started <= finished`
    /// and `finished_at` is only present together with `started_at`.
    pub fn timestamps_consistent(&self) -> bool {
        match (self.started_at, self.finished_at) {
            (None, None) => true,
            (Some(started), None) => started >= self.created_at,
            (None, Some(_)) => false,
            (Some(started), Some(finished)) => {
                started >= self.created_at && finished >= started
            }
        }
    }
}
