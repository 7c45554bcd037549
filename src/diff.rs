use crate::config::ConfigKind;
use crate::warnings::{Warning, WarningSet};

/// Outcome of comparing one configuration's baseline and candidate sets.
#[derive(Debug, Clone)]
pub struct DiffResult {
    pub config: ConfigKind,
    /// In candidate but not baseline, key-sorted.
    pub added: Vec<Warning>,
    /// In baseline but not candidate, key-sorted. Informational only.
    pub removed: Vec<Warning>,
}

impl DiffResult {
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
    }
}

/// Set difference in both directions. Both sets must have been extracted
/// under the same match policy.
pub fn diff(config: ConfigKind, baseline: &WarningSet, candidate: &WarningSet) -> DiffResult {
    let added = candidate
        .iter()
        .filter(|(key, _)| !baseline.contains(key))
        .map(|(_, w)| w.clone())
        .collect();
    let removed = baseline
        .iter()
        .filter(|(key, _)| !candidate.contains(key))
        .map(|(_, w)| w.clone())
        .collect();
    DiffResult {
        config,
        added,
        removed,
    }
}
