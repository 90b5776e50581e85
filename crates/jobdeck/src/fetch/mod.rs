//! Fetching job records from the queue API into snapshots.

pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod retry;
pub mod snapshot;
pub mod source;

pub use http::HttpJobSource;
pub use normalize::{normalize_job, normalize_page};
pub use orchestrator::{CancellationFlag, FetchOrchestrator, SnapshotBroadcaster, SnapshotEvent};
pub use retry::{with_retry, RetryPolicy};
pub use snapshot::JobSnapshot;
pub use source::{JobPage, JobSource, MemoryJobSource};
