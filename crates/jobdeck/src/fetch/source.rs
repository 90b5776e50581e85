//! Where job records come from.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::job::JobRecord;

/// One page of a stage's job list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<JobRecord>,
    /// Payloads on this page that could not be normalized.
    pub skipped: usize,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// A paginated job API.
///
/// Implementations normalize payloads before returning them, so the engine
/// only ever sees canonical records.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_page(&self, stage_id: &str, cursor: Option<&str>)
        -> Result<JobPage, FetchError>;
}

/// Page size of [`MemoryJobSource::default`].
const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory source with scriptable failures, for tests and offline runs.
pub struct MemoryJobSource {
    stages: HashMap<String, Vec<JobRecord>>,
    page_size: usize,
    failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    calls: AtomicUsize,
}

impl MemoryJobSource {
    pub fn new(page_size: usize) -> Self {
        Self {
            stages: HashMap::new(),
            page_size: page_size.max(1),
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Adds `job` to its stage.
    pub fn with_job(mut self, job: JobRecord) -> Self {
        self.stages.entry(job.stage_id.clone()).or_default().push(job);
        self
    }

    pub fn with_jobs(self, jobs: impl IntoIterator<Item = JobRecord>) -> Self {
        jobs.into_iter().fold(self, Self::with_job)
    }

    /// Queues an error returned by the next request for `stage_id`.
    pub fn fail_next(&self, stage_id: &str, error: FetchError) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures
            .entry(stage_id.to_string())
            .or_default()
            .push_back(error);
    }

    /// Total `fetch_page` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryJobSource {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[async_trait]
impl JobSource for MemoryJobSource {
    async fn fetch_page(
        &self,
        stage_id: &str,
        cursor: Option<&str>,
    ) -> Result<JobPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            failures.get_mut(stage_id).and_then(VecDeque::pop_front)
        };
        if let Some(error) = scripted {
            return Err(error);
        }

        let offset = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| FetchError::Client {
                    status: 400,
                    body: format!("invalid cursor '{}'", c),
                })?,
            None => 0,
        };

        let all = self.stages.get(stage_id).map(Vec::as_slice).unwrap_or(&[]);
        let end = offset.saturating_add(self.page_size).min(all.len());
        let jobs = all.get(offset..end).unwrap_or(&[]).to_vec();
        let next_cursor = (end < all.len()).then(|| end.to_string());

        Ok(JobPage {
            jobs,
            skipped: 0,
            next_cursor,
        })
    }
}
