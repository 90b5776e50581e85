//! Static stage → step mapping.
//!
//! A pipeline step groups one or more low-level stages and is shown as one
//! unit in status views. The table is loaded once from configuration and
//! never changes afterwards.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Step id reserved for stages that appear in job data but not in the table.
pub const UNCLASSIFIED_STEP: &str = "unclassified";

/// One configured pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineStep {
    pub step_id: String,
    /// Display label; falls back to `step_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Stage ids in display order.
    pub stages: Vec<String>,
    /// Position of the step in the pipeline.
    pub order: u32,
}

impl PipelineStep {
    pub fn new(step_id: &str, order: u32, stages: &[&str]) -> Self {
        Self {
            step_id: step_id.to_string(),
            label: None,
            stages: stages.iter().map(|s| s.to_string()).collect(),
            order,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.step_id)
    }
}

/// Validated, immutable topology.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Sorted by `order`.
    steps: Vec<PipelineStep>,
    /// stage id → index into `steps`.
    stage_index: HashMap<String, usize>,
}

impl Topology {
    /// Builds a topology from configured steps.
    ///
    /// Rejects empty tables, duplicate step ids or orders, steps without
    /// stages, stages listed under two steps and the reserved
    /// [`UNCLASSIFIED_STEP`] id.
    pub fn new(mut steps: Vec<PipelineStep>) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::Validation {
                message: "topology must define at least one step".to_string(),
            });
        }

        let mut step_ids = HashSet::new();
        let mut orders = HashSet::new();
        for step in &steps {
            if step.step_id == UNCLASSIFIED_STEP {
                return Err(ConfigError::InvalidStep {
                    step_id: step.step_id.clone(),
                    reason: "step id is reserved".to_string(),
                });
            }
            if !step_ids.insert(step.step_id.as_str()) {
                return Err(ConfigError::InvalidStep {
                    step_id: step.step_id.clone(),
                    reason: "duplicate step id".to_string(),
                });
            }
            if !orders.insert(step.order) {
                return Err(ConfigError::InvalidStep {
                    step_id: step.step_id.clone(),
                    reason: format!("duplicate order {}", step.order),
                });
            }
            if step.stages.is_empty() {
                return Err(ConfigError::InvalidStep {
                    step_id: step.step_id.clone(),
                    reason: "step has no stages".to_string(),
                });
            }
        }

        steps.sort_by_key(|s| s.order);

        let mut stage_index = HashMap::new();
        for (idx, step) in steps.iter().enumerate() {
            for stage in &step.stages {
                if let Some(prev) = stage_index.insert(stage.clone(), idx) {
                    return Err(ConfigError::InvalidStep {
                        step_id: step.step_id.clone(),
                        reason: format!(
                            "stage '{}' is already part of step '{}'",
                            stage, steps[prev].step_id
                        ),
                    });
                }
            }
        }

        Ok(Self { steps, stage_index })
    }

    /// Steps in pipeline order.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn step_for_stage(&self, stage_id: &str) -> Option<&PipelineStep> {
        self.stage_index.get(stage_id).map(|&idx| &self.steps[idx])
    }

    pub fn contains_stage(&self, stage_id: &str) -> bool {
        self.stage_index.contains_key(stage_id)
    }

    /// Every configured stage, in step order.
    pub fn stage_ids(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .flat_map(|s| s.stages.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<PipelineStep> {
        vec![
            PipelineStep::new("extraction", 2, &["scope1", "scope2"]).with_label("Data Extraction"),
            PipelineStep::new("ingestion", 1, &["precheck"]),
            PipelineStep::new("review", 3, &["approval"]),
        ]
    }

    #[test]
    fn test_steps_sorted_by_order() {
        let topology = Topology::new(steps()).unwrap();
        let ids: Vec<&str> = topology.steps().iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(ids, vec!["ingestion", "extraction", "review"]);

        let stages: Vec<&str> = topology.stage_ids().collect();
        assert_eq!(stages, vec!["precheck", "scope1", "scope2", "approval"]);
    }

    #[test]
    fn test_stage_lookup() {
        let topology = Topology::new(steps()).unwrap();
        let step = topology.step_for_stage("scope2").unwrap();
        assert_eq!(step.step_id, "extraction");
        assert_eq!(step.display_label(), "Data Extraction");
        assert!(topology.step_for_stage("unknown").is_none());
        assert!(topology.contains_stage("approval"));
        assert_eq!(topology.step("review").unwrap().display_label(), "review");
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            Topology::new(vec![]),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_stage() {
        let mut s = steps();
        s.push(PipelineStep::new("late", 4, &["scope1"]));
        let err = Topology::new(s).unwrap_err();
        assert!(err.to_string().contains("already part of step 'extraction'"));
    }

    #[test]
    fn test_rejects_duplicate_step_and_order() {
        let mut s = steps();
        s.push(PipelineStep::new("review", 9, &["other"]));
        assert!(Topology::new(s).is_err());

        let mut s = steps();
        s.push(PipelineStep::new("export", 3, &["other"]));
        assert!(Topology::new(s).is_err());
    }

    #[test]
    fn test_rejects_reserved_and_empty_steps() {
        let mut s = steps();
        s.push(PipelineStep::new(UNCLASSIFIED_STEP, 9, &["other"]));
        assert!(Topology::new(s).is_err());

        let mut s = steps();
        s.push(PipelineStep::new("empty", 9, &[]));
        assert!(Topology::new(s).is_err());
    }
}
