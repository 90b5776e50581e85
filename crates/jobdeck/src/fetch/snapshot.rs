//! Immutable result of one fetch cycle.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::job::JobRecord;
use crate::status::{compute_entity_view, EntityView};
use crate::topology::Topology;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub records: Vec<JobRecord>,
    /// Stages that loaded completely.
    pub loaded_stages: BTreeSet<String>,
    /// Stage id → reason its data is missing.
    pub missing_stages: BTreeMap<String, String>,
    /// Payloads dropped during normalization.
    pub skipped_records: usize,
}

impl JobSnapshot {
    pub fn from_records(records: Vec<JobRecord>) -> Self {
        let loaded_stages = records.iter().map(|r| r.stage_id.clone()).collect();
        Self {
            records,
            loaded_stages,
            ..Default::default()
        }
    }

    /// Hash of the snapshot's content, independent of record order.
    pub fn content_hash(&self) -> u64 {
        let mut per_record: Vec<u64> = self
            .records
            .iter()
            .map(|r| {
                let mut h = DefaultHasher::new();
                r.hash(&mut h);
                h.finish()
            })
            .collect();
        per_record.sort_unstable();

        let mut hasher = DefaultHasher::new();
        per_record.hash(&mut hasher);
        self.missing_stages.hash(&mut hasher);
        hasher.finish()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_stages.is_empty()
    }

    /// True when stages were requested and none of them loaded.
    pub fn all_stages_failed(&self) -> bool {
        self.loaded_stages.is_empty() && !self.missing_stages.is_empty()
    }

    pub fn records_for_entity(&self, entity_key: &str) -> Vec<&JobRecord> {
        self.records
            .iter()
            .filter(|r| r.entity_key == entity_key)
            .collect()
    }

    /// Distinct entity keys, sorted.
    pub fn entity_keys(&self) -> Vec<&str> {
        let keys: BTreeSet<&str> = self.records.iter().map(|r| r.entity_key.as_str()).collect();
        keys.into_iter().collect()
    }

    /// Stage-level diagnostics for data the snapshot lacks.
    pub fn missing_stage_diagnostics(&self) -> Vec<Diagnostic> {
        self.missing_stages
            .iter()
            .map(|(stage, reason)| Diagnostic::for_stage(stage, reason))
            .collect()
    }

    /// View of one entity, with missing-stage diagnostics attached.
    pub fn entity_view(&self, entity_key: &str, topology: &Topology) -> EntityView {
        let mut view = compute_entity_view(entity_key, &self.records, topology);
        view.diagnostics.extend(self.missing_stage_diagnostics());
        view
    }

    /// Views of every entity in the snapshot, ordered by key.
    pub fn all_views(&self, topology: &Topology) -> Vec<EntityView> {
        self.entity_keys()
            .into_iter()
            .map(|key| self.entity_view(key, topology))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::topology::PipelineStep;
    use chrono::{TimeZone, Utc};

    fn job(id: &str, stage: &str, entity: &str) -> JobRecord {
        JobRecord::new(id, stage, entity, "t-1", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_content_hash_ignores_order() {
        let a = JobSnapshot::from_records(vec![job("1", "s", "acme"), job("2", "s", "acme")]);
        let b = JobSnapshot::from_records(vec![job("2", "s", "acme"), job("1", "s", "acme")]);
        assert_eq!(a.content_hash(), b.content_hash());

        let changed = JobSnapshot::from_records(vec![
            job("1", "s", "acme"),
            job("2", "s", "acme").started(Utc.timestamp_opt(1_700_000_100, 0).unwrap()),
        ]);
        assert_ne!(a.content_hash(), changed.content_hash());

        let mut partial = a.clone();
        partial
            .missing_stages
            .insert("other".to_string(), "timeout".to_string());
        assert_ne!(a.content_hash(), partial.content_hash());
    }

    #[test]
    fn test_entity_lookup() {
        let snapshot = JobSnapshot::from_records(vec![
            job("1", "s", "globex"),
            job("2", "s", "acme"),
            job("3", "s", "globex"),
        ]);
        assert_eq!(snapshot.entity_keys(), vec!["acme", "globex"]);
        assert_eq!(snapshot.records_for_entity("globex").len(), 2);
        assert!(snapshot.records_for_entity("initech").is_empty());
    }

    #[test]
    fn test_entity_view_reports_missing_stages() {
        let topology = Topology::new(vec![PipelineStep::new("ingestion", 1, &["s", "s2"])]).unwrap();
        let mut snapshot = JobSnapshot::from_records(vec![job("1", "s", "acme")]);
        snapshot
            .missing_stages
            .insert("s2".to_string(), "HTTP 503".to_string());

        assert!(!snapshot.is_complete());
        assert!(!snapshot.all_stages_failed());

        let view = snapshot.entity_view("acme", &topology);
        assert!(view.diagnostics.iter().any(|d| d.kind
            == DiagnosticKind::MissingStageData {
                stage_id: "s2".to_string(),
                reason: "HTTP 503".to_string(),
            }));
        assert_eq!(snapshot.all_views(&topology).len(), 1);
    }

    #[test]
    fn test_all_stages_failed() {
        let mut snapshot = JobSnapshot::default();
        assert!(!snapshot.all_stages_failed());
        snapshot
            .missing_stages
            .insert("s".to_string(), "down".to_string());
        assert!(snapshot.all_stages_failed());
    }
}
