//! Fetch cycle: pulls every stage under a concurrency limit and assembles a
//! [`JobSnapshot`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, Semaphore};
use tracing::Instrument;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::job::JobRecord;

use super::retry::{with_retry, RetryPolicy};
use super::snapshot::JobSnapshot;
use super::source::JobSource;

/// Progress of a fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    StageLoaded {
        stage_id: String,
        records: usize,
        skipped: usize,
    },
    StageFailed {
        stage_id: String,
        error: String,
    },
    CycleFinished {
        records: usize,
        missing_stages: usize,
        content_hash: u64,
    },
}

/// Fan-out of [`SnapshotEvent`]s to any number of listeners.
#[derive(Clone)]
pub struct SnapshotBroadcaster {
    sender: Arc<broadcast::Sender<SnapshotEvent>>,
}

impl SnapshotBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: SnapshotEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.sender.subscribe()
    }
}

impl Default for SnapshotBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared flag that stops a fetch cycle before its next request.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct StageData {
    records: Vec<JobRecord>,
    skipped: usize,
}

pub struct FetchOrchestrator {
    source: Arc<dyn JobSource>,
    policy: RetryPolicy,
    concurrency: usize,
    max_pages: u32,
    broadcaster: SnapshotBroadcaster,
    cancel: CancellationFlag,
    latest: RwLock<JobSnapshot>,
}

impl FetchOrchestrator {
    pub fn new(source: Arc<dyn JobSource>, config: &FetchConfig) -> Self {
        Self {
            source,
            policy: RetryPolicy::from(&config.retry),
            concurrency: config.concurrency.max(1),
            max_pages: config.max_pages.max(1),
            broadcaster: SnapshotBroadcaster::default(),
            cancel: CancellationFlag::new(),
            latest: RwLock::new(JobSnapshot::default()),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn broadcaster(&self) -> &SnapshotBroadcaster {
        &self.broadcaster
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.broadcaster.subscribe()
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// The most recent snapshot, partial while a cycle is running.
    pub fn latest(&self) -> JobSnapshot {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Fetches every stage and returns the assembled snapshot.
    ///
    /// A stage that fails (after retries) or is cancelled is recorded in
    /// `missing_stages`; the cycle itself never fails.
    pub async fn fetch_all(&self, stages: &[String]) -> JobSnapshot {
        let span = tracing::info_span!("fetch_cycle", stages = stages.len());
        async {
            {
                let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
                *latest = JobSnapshot::default();
            }

            let semaphore = Arc::new(Semaphore::new(self.concurrency));
            let mut futures = Vec::with_capacity(stages.len());
            for stage_id in stages {
                let sem = semaphore.clone();
                futures.push(async move {
                    let result = match sem.acquire().await {
                        Ok(_permit) => self.fetch_stage(stage_id).await,
                        Err(_) => Err(FetchError::Cancelled),
                    };
                    self.record_stage(stage_id, &result);
                    (stage_id, result)
                });
            }
            let results = join_all(futures).await;

            // Assemble in request order so the result does not depend on timing
            let mut snapshot = JobSnapshot::default();
            for (stage_id, result) in results {
                match result {
                    Ok(data) => {
                        snapshot.records.extend(data.records);
                        snapshot.skipped_records += data.skipped;
                        snapshot.loaded_stages.insert(stage_id.clone());
                    }
                    Err(e) => {
                        snapshot.missing_stages.insert(stage_id.clone(), e.to_string());
                    }
                }
            }

            let content_hash = snapshot.content_hash();
            log::info!(
                "Fetch cycle finished: {} records from {} stages, {} missing, {} skipped",
                snapshot.records.len(),
                snapshot.loaded_stages.len(),
                snapshot.missing_stages.len(),
                snapshot.skipped_records
            );
            self.broadcaster.send(SnapshotEvent::CycleFinished {
                records: snapshot.records.len(),
                missing_stages: snapshot.missing_stages.len(),
                content_hash,
            });

            {
                let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
                *latest = snapshot.clone();
            }
            snapshot
        }
        .instrument(span)
        .await
    }

    /// Follows a stage's cursors until exhausted or `max_pages` is reached.
    async fn fetch_stage(&self, stage_id: &str) -> Result<StageData, FetchError> {
        let span = tracing::info_span!("fetch_stage", stage = stage_id);
        async {
            let mut data = StageData {
                records: Vec::new(),
                skipped: 0,
            };
            let mut cursor: Option<String> = None;

            for page_no in 0..self.max_pages {
                if self.cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }

                let what = format!("fetch {} page {}", stage_id, page_no + 1);
                let current = cursor.as_deref();
                let page = with_retry(&self.policy, &what, || {
                    self.source.fetch_page(stage_id, current)
                })
                .await?;

                data.records.extend(page.jobs);
                data.skipped += page.skipped;

                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => return Ok(data),
                }
            }

            log::warn!(
                "Stage {} has more than {} pages, keeping the first {}",
                stage_id,
                self.max_pages,
                self.max_pages
            );
            Ok(data)
        }
        .instrument(span)
        .await
    }

    /// Merges a finished stage into the partial snapshot and announces it.
    fn record_stage(&self, stage_id: &str, result: &Result<StageData, FetchError>) {
        let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
        match result {
            Ok(data) => {
                latest.records.extend(data.records.iter().cloned());
                latest.skipped_records += data.skipped;
                latest.loaded_stages.insert(stage_id.to_string());
                drop(latest);
                self.broadcaster.send(SnapshotEvent::StageLoaded {
                    stage_id: stage_id.to_string(),
                    records: data.records.len(),
                    skipped: data.skipped,
                });
            }
            Err(e) => {
                latest
                    .missing_stages
                    .insert(stage_id.to_string(), e.to_string());
                drop(latest);
                log::warn!("Stage {} could not be fetched: {}", stage_id, e);
                self.broadcaster.send(SnapshotEvent::StageFailed {
                    stage_id: stage_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}
