//! Cross-entity queries built on the predicates: summary badges, bulk
//! rerun selection and list ordering.

use std::cmp::Ordering;

use serde::Serialize;

use crate::job::JobStatus;

use super::filters::{
    has_failed_jobs, has_issues, has_pending_approval, has_processing_jobs, is_fully_completed,
};
use super::scope::{select_runs, RunScope};
use super::view::EntityView;

/// Entity counts per predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub scope: RunScope,
    pub total: usize,
    pub pending_approval: usize,
    pub failed: usize,
    pub processing: usize,
    pub fully_completed: usize,
    pub has_issues: usize,
}

impl StatusSummary {
    pub fn compute(views: &[EntityView], scope: RunScope) -> Self {
        let count = |pred: fn(&EntityView, RunScope) -> bool| {
            views.iter().filter(|v| pred(v, scope)).count()
        };
        Self {
            scope,
            total: views.len(),
            pending_approval: count(has_pending_approval),
            failed: count(has_failed_jobs),
            processing: count(has_processing_jobs),
            fully_completed: count(is_fully_completed),
            has_issues: count(has_issues),
        }
    }
}

/// Authoritative job picked by a cross-entity query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTarget {
    pub entity_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub thread_id: String,
    pub step_id: String,
    pub stage_id: String,
    pub job_id: String,
}

fn collect_targets(
    views: &[EntityView],
    scope: RunScope,
    status: JobStatus,
    step_id: Option<&str>,
) -> Vec<JobTarget> {
    let mut targets = Vec::new();
    for view in views {
        for run in select_runs(&view.runs, scope) {
            for (step, history) in run.stage_histories() {
                if history.status != status {
                    continue;
                }
                if step_id.is_some_and(|wanted| wanted != step.step_id) {
                    continue;
                }
                targets.push(JobTarget {
                    entity_key: view.entity_key.clone(),
                    year: run.key.year,
                    thread_id: run.key.thread_id.clone(),
                    step_id: step.step_id.clone(),
                    stage_id: history.stage_id.clone(),
                    job_id: history.authoritative.id.clone(),
                });
            }
        }
    }
    targets
}

/// Failed authoritative jobs in the selected runs, optionally limited to
/// one step. Failed jobs superseded by a rerun are not included.
pub fn bulk_rerun_targets(
    views: &[EntityView],
    scope: RunScope,
    step_id: Option<&str>,
) -> Vec<JobTarget> {
    let targets = collect_targets(views, scope, JobStatus::Failed, step_id);
    log::info!(
        "Selected {} rerun targets across {} entities (scope={})",
        targets.len(),
        views.len(),
        scope
    );
    targets
}

/// Authoritative jobs awaiting approval in the selected runs.
pub fn pending_approvals(views: &[EntityView], scope: RunScope) -> Vec<JobTarget> {
    collect_targets(views, scope, JobStatus::NeedsApproval, None)
}

/// Orders entities for list display: entities with issues under `scope`
/// first, then most recent activity, then entity key.
pub fn sort_views(views: &mut [EntityView], scope: RunScope) {
    views.sort_by(|a, b| {
        has_issues(b, scope)
            .cmp(&has_issues(a, scope))
            .then_with(|| match (a.latest_activity(), b.latest_activity()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.entity_key.cmp(&b.entity_key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobRecord;
    use crate::status::view::compute_entity_view;
    use crate::topology::{PipelineStep, Topology};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn topology() -> Topology {
        Topology::new(vec![
            PipelineStep::new("ingestion", 1, &["precheck"]),
            PipelineStep::new("extraction", 2, &["scope1", "scope2"]),
        ])
        .unwrap()
    }

    fn done(id: &str, stage: &str, entity: &str, at: i64) -> JobRecord {
        JobRecord::new(id, stage, entity, "t-1", t(at))
            .with_year(2024)
            .started(t(at))
            .finished(t(at + 1))
    }

    fn failed(id: &str, stage: &str, entity: &str, at: i64) -> JobRecord {
        JobRecord::new(id, stage, entity, "t-1", t(at))
            .with_year(2024)
            .started(t(at))
            .failed_with("boom", t(at + 1))
    }

    fn views() -> Vec<EntityView> {
        let jobs = vec![
            // acme: scope1 failed then rerun ok, scope2 failed
            failed("a1", "scope1", "acme", 0),
            done("a2", "scope1", "acme", 5),
            failed("a3", "scope2", "acme", 1),
            done("a4", "precheck", "acme", 0),
            // globex: precheck failed
            failed("g1", "precheck", "globex", 2),
            // initech: all done
            done("i1", "precheck", "initech", 0),
            done("i2", "scope1", "initech", 1),
            done("i3", "scope2", "initech", 2),
            // umbrella: waiting for approval
            done("u1", "precheck", "umbrella", 30).with_approval(true, false),
        ];
        ["acme", "globex", "initech", "umbrella"]
            .iter()
            .map(|key| compute_entity_view(key, &jobs, &topology()))
            .collect()
    }

    #[test]
    fn test_summary_counts() {
        let summary = StatusSummary::compute(&views(), RunScope::Latest);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.pending_approval, 1);
        assert_eq!(summary.fully_completed, 1);
        assert_eq!(summary.has_issues, 3);
        assert_eq!(summary.processing, 0);
    }

    #[test]
    fn test_rerun_targets_skip_superseded_failures() {
        let targets = bulk_rerun_targets(&views(), RunScope::Latest, None);
        let ids: Vec<&str> = targets.iter().map(|t| t.job_id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "g1"]);

        let only_ingestion = bulk_rerun_targets(&views(), RunScope::Latest, Some("ingestion"));
        assert_eq!(only_ingestion.len(), 1);
        assert_eq!(only_ingestion[0].entity_key, "globex");
        assert_eq!(only_ingestion[0].stage_id, "precheck");
        assert_eq!(only_ingestion[0].step_id, "ingestion");
    }

    #[test]
    fn test_pending_approvals() {
        let items = pending_approvals(&views(), RunScope::All);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].job_id, "u1");
        assert_eq!(items[0].year, Some(2024));
    }

    #[test]
    fn test_sort_views_issues_first_then_recent() {
        let mut v = views();
        sort_views(&mut v, RunScope::Latest);
        let keys: Vec<&str> = v.iter().map(|e| e.entity_key.as_str()).collect();
        assert_eq!(keys, vec!["umbrella", "acme", "globex", "initech"]);
    }
}
