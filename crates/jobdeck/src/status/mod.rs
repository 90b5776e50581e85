//! Pure aggregation engine: runs, step rollups, scopes and predicates.
//!
//! Nothing here performs I/O. Every function takes an immutable job list and
//! a [`Topology`](crate::topology::Topology) and recomputes its result from
//! scratch, so calling it twice on the same input yields the same view.

pub mod aggregate;
pub mod filters;
pub mod grouper;
pub mod queries;
pub mod scope;
pub mod view;

pub use aggregate::{
    build_step_view, run_status, step_counts, step_status, step_views, StageSlot, StatusCounts,
    StepView,
};
pub use filters::{
    filter_entities, has_failed_jobs, has_issues, has_pending_approval, has_pipeline_step_issues,
    has_processing_jobs, is_fully_completed, EntityFilter, FilterSet,
};
pub use grouper::{build_runs, compare_activity, group, Run, RunKey, StageHistory};
pub use queries::{bulk_rerun_targets, pending_approvals, sort_views, JobTarget, StatusSummary};
pub use scope::{select_runs, RunScope};
pub use view::{compute_all_views, compute_entity_view, EntityView, RunView};
