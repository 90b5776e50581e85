//! Builder patterns for creating test data programmatically.
//!
//! Job timestamps are expressed in minutes after a fixed base instant so
//! scenarios read as a timeline.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use jobdeck::config::schema::{Config, FetchConfig, LoggingConfig, TopologyConfig};
use jobdeck::job::{JobApproval, JobRecord, ParentRef};
use jobdeck::status::RunScope;
use jobdeck::topology::{PipelineStep, Topology};

/// Base instant for relative timestamps.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// `base_time()` plus `minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

/// Builder for creating `JobRecord` instances.
pub struct JobBuilder {
    id: String,
    stage_id: String,
    entity_key: String,
    year: Option<i32>,
    thread_id: String,
    created: i64,
    started: Option<i64>,
    finished: Option<i64>,
    failed_reason: Option<String>,
    approval: Option<JobApproval>,
    parent: Option<ParentRef>,
}

impl JobBuilder {
    /// Create a waiting job for `acme`/2024 on thread `t-1`, created at minute 0.
    pub fn new(id: &str, stage_id: &str) -> Self {
        Self {
            id: id.to_string(),
            stage_id: stage_id.to_string(),
            entity_key: "acme".to_string(),
            year: Some(2024),
            thread_id: "t-1".to_string(),
            created: 0,
            started: None,
            finished: None,
            failed_reason: None,
            approval: None,
            parent: None,
        }
    }

    pub fn entity(mut self, entity_key: &str) -> Self {
        self.entity_key = entity_key.to_string();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn no_year(mut self) -> Self {
        self.year = None;
        self
    }

    pub fn thread(mut self, thread_id: &str) -> Self {
        self.thread_id = thread_id.to_string();
        self
    }

    pub fn created(mut self, minute: i64) -> Self {
        self.created = minute;
        self
    }

    /// Mark as processing from `minute`.
    pub fn started(mut self, minute: i64) -> Self {
        self.started = Some(minute);
        self
    }

    /// Mark as completed: created at `minute`, started and finished a minute later.
    pub fn completed(mut self, minute: i64) -> Self {
        self.created = minute;
        self.started = Some(minute);
        self.finished = Some(minute + 1);
        self
    }

    /// Mark as failed: created at `minute`, failed a minute later.
    pub fn failed(mut self, minute: i64) -> Self {
        self.created = minute;
        self.started = Some(minute);
        self.finished = Some(minute + 1);
        self.failed_reason = Some("job failed".to_string());
        self
    }

    pub fn awaiting_approval(mut self) -> Self {
        self.approval = Some(JobApproval {
            required: true,
            approved: false,
        });
        self
    }

    pub fn approved(mut self) -> Self {
        self.approval = Some(JobApproval {
            required: true,
            approved: true,
        });
        self
    }

    pub fn parent(mut self, stage_id: &str, job_id: &str) -> Self {
        self.parent = Some(ParentRef {
            stage_id: stage_id.to_string(),
            job_id: job_id.to_string(),
        });
        self
    }

    pub fn build(self) -> JobRecord {
        let mut job = JobRecord::new(
            &self.id,
            &self.stage_id,
            &self.entity_key,
            &self.thread_id,
            at(self.created),
        );
        job.year = self.year;
        job.started_at = self.started.map(at);
        job.finished_at = self.finished.map(at);
        if let Some(reason) = self.failed_reason {
            job.failed = true;
            job.failed_reason = Some(reason);
        }
        job.approval = self.approval;
        job.parent = self.parent;
        job
    }
}

/// Builder for creating `Topology` instances.
pub struct TopologyBuilder {
    steps: Vec<PipelineStep>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step; its order is its position in the builder.
    pub fn step(mut self, step_id: &str, label: &str, stages: &[&str]) -> Self {
        let order = self.steps.len() as u32 + 1;
        self.steps
            .push(PipelineStep::new(step_id, order, stages).with_label(label));
        self
    }

    pub fn steps(&self) -> Vec<PipelineStep> {
        self.steps.clone()
    }

    pub fn build(self) -> Topology {
        Topology::new(self.steps).unwrap()
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The document pipeline used throughout the scenarios:
/// ingestion → Data Extraction → review.
pub fn document_pipeline() -> TopologyBuilder {
    TopologyBuilder::new()
        .step("ingestion", "Ingestion", &["precheck"])
        .step("extraction", "Data Extraction", &["scope1", "scope2"])
        .step("review", "Review", &["approval"])
}

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    topology: TopologyBuilder,
    fetch: FetchConfig,
    default_scope: RunScope,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            topology: document_pipeline(),
            fetch: FetchConfig::default(),
            default_scope: RunScope::Latest,
        }
    }

    pub fn topology(mut self, topology: TopologyBuilder) -> Self {
        self.topology = topology;
        self
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.fetch.base_url = Some(url.to_string());
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.fetch.concurrency = concurrency;
        self
    }

    pub fn default_scope(mut self, scope: RunScope) -> Self {
        self.default_scope = scope;
        self
    }

    pub fn build(self) -> Config {
        Config {
            version: "1.0".to_string(),
            topology: TopologyConfig {
                steps: self.topology.steps(),
            },
            fetch: self.fetch,
            logging: LoggingConfig::default(),
            default_scope: self.default_scope,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
