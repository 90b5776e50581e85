pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetch;
pub mod job;
pub mod logging;
pub mod status;
pub mod topology;

pub use cache::ViewCache;
pub use config::{load_config, Config};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{ConfigError, FetchError, JobdeckError, NormalizeError, Result};
pub use fetch::{FetchOrchestrator, HttpJobSource, JobSnapshot, JobSource, MemoryJobSource};
pub use job::{resolve, JobRecord, JobStatus, RunStatus, StepStatus};
pub use status::{
    bulk_rerun_targets, compute_all_views, compute_entity_view, filter_entities, select_runs,
    EntityFilter, EntityView, FilterSet, RunScope, RunView, StatusSummary,
};
pub use topology::{PipelineStep, Topology};
