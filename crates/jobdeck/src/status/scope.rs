//! Run scope selection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::view::RunView;

/// Which runs of an entity a query looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunScope {
    /// The most recent run of each year.
    #[default]
    Latest,
    /// Every run.
    All,
}

impl RunScope {
    pub fn as_str(self) -> &'static str {
        match self {
            RunScope::Latest => "latest",
            RunScope::All => "all",
        }
    }
}

impl fmt::Display for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RunScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(RunScope::Latest),
            "all" => Ok(RunScope::All),
            other => Err(format!("unknown scope '{}', expected latest or all", other)),
        }
    }
}

/// Picks the runs a scope covers, keeping the input order.
///
/// `Latest` keeps one run per year: the one with the most recent activity,
/// ties going to the lexicographically greatest thread id.
pub fn select_runs(runs: &[RunView], scope: RunScope) -> Vec<&RunView> {
    match scope {
        RunScope::All => runs.iter().collect(),
        RunScope::Latest => {
            let mut winners: BTreeMap<Option<i32>, usize> = BTreeMap::new();
            for (idx, run) in runs.iter().enumerate() {
                let slot = winners.entry(run.key.year).or_insert(idx);
                let current = &runs[*slot];
                let newer = (run.latest_activity, &run.key.thread_id)
                    > (current.latest_activity, &current.key.thread_id);
                if newer {
                    *slot = idx;
                }
            }

            let mut picked: Vec<usize> = winners.into_values().collect();
            picked.sort_unstable();
            picked.into_iter().map(|idx| &runs[idx]).collect()
        }
    }
}
