//! Quality Cache - per-classifier correlation quality across divisions
//!
//! The aggregate for a classifier averages `cc_quality` over a fixed set of
//! divisions, so it depends on those divisions' RecHHF records and score
//! pools. Entries are computed on first read and dropped when a RecHHF in
//! the dependency set is upserted.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::types::ClassifierDivision;

/// Correlation quality of one classifier across the configured divisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierQuality {
    pub classifier: String,
    /// Mean `cc_quality` over divisions with a RecHHF (0 when none)
    pub cc_quality: f64,
    pub by_division: BTreeMap<String, f64>,
}

impl ClassifierQuality {
    pub fn from_divisions(
        classifier: impl Into<String>,
        by_division: BTreeMap<String, f64>,
    ) -> Self {
        let cc_quality = if by_division.is_empty() {
            0.0
        } else {
            by_division.values().sum::<f64>() / by_division.len() as f64
        };
        Self {
            classifier: classifier.into(),
            cc_quality,
            by_division,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: FxHashMap<String, ClassifierQuality>,
    /// Bumped per classifier on every dependency invalidation
    generations: FxHashMap<String, u64>,
    /// Bumped on clear
    epoch: u64,
}

impl CacheState {
    fn generation(&self, classifier: &str) -> (u64, u64) {
        (self.epoch, self.generations.get(classifier).copied().unwrap_or(0))
    }
}

/// Memoized [`ClassifierQuality`] keyed by classifier
///
/// A value computed across an invalidation is returned but not stored.
pub struct QualityCache {
    divisions: Vec<String>,
    state: RwLock<CacheState>,
}

impl QualityCache {
    pub fn new(divisions: Vec<String>) -> Self {
        Self {
            divisions,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Divisions every entry depends on
    pub fn divisions(&self) -> &[String] {
        &self.divisions
    }

    pub fn get(&self, classifier: &str) -> Option<ClassifierQuality> {
        self.state.read().ok()?.entries.get(classifier).cloned()
    }

    /// Cached entry, or compute it from the dependency divisions and store it
    pub fn get_or_compute(
        &self,
        classifier: &str,
        compute: impl FnOnce(&[String]) -> ClassifierQuality,
    ) -> ClassifierQuality {
        let generation = match self.state.read() {
            Ok(state) => {
                if let Some(hit) = state.entries.get(classifier) {
                    return hit.clone();
                }
                Some(state.generation(classifier))
            }
            Err(_) => None,
        };

        let computed = compute(&self.divisions);
        if let (Some(generation), Ok(mut state)) = (generation, self.state.write()) {
            if state.generation(classifier) == generation {
                state.entries.insert(classifier.to_string(), computed.clone());
            } else {
                tracing::debug!(
                    "discarding quality for {}: invalidated during compute",
                    classifier
                );
            }
        }
        computed
    }

    /// Drop the classifier's entry if `key` is one of its dependencies
    ///
    /// Returns true when an entry was removed.
    pub fn invalidate(&self, key: &ClassifierDivision) -> bool {
        if !self.divisions.iter().any(|d| *d == key.division) {
            return false;
        }
        match self.state.write() {
            Ok(mut state) => {
                *state.generations.entry(key.classifier.clone()).or_insert(0) += 1;
                state.entries.remove(&key.classifier).is_some()
            }
            Err(_) => false,
        }
    }

    /// Drop every entry (new scores change all pools)
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.entries.clear();
            state.epoch += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
