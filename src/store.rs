//! Collaborator interfaces and in-memory backends
//!
//! The engine reads scores and skill indicators and writes RecHHF records
//! through these traits. The in-memory implementations back the
//! `recalibrate` binary and the tests.

use anyhow::Result;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::types::{ClassifierDivision, RawScore, RecHhf};

/// Source of raw scores and published HHFs
pub trait ScoreRepository: Send + Sync {
    /// Every score for `classifier` shot in one of `divisions`, HF descending
    fn scores_for(&self, classifier: &str, divisions: &[String]) -> Result<Vec<RawScore>>;

    /// Published HHF, if any
    fn current_hhf(&self, classifier: &str, division: &str) -> Option<f64>;

    /// Every (classifier, division) pair with at least one score
    fn keys(&self) -> Vec<ClassifierDivision>;
}

/// Per-member skill indicators used by correlation quality
pub trait SkillLookup: Send + Sync {
    /// Rating (e.g. ELO) for a member in a division
    fn elo(&self, member_number: &str, division: &str) -> Option<f64>;

    /// Recommended classification percent for a member in a division
    fn rec_percent(&self, member_number: &str, division: &str) -> Option<f64>;
}

/// Persisted RecHHF records, upserted by key
pub trait RecHhfStore: Send + Sync {
    fn upsert(&self, rec: RecHhf) -> Result<(), StoreError>;
    fn get(&self, key: &ClassifierDivision) -> Option<RecHhf>;
    fn all(&self) -> Vec<RecHhf>;
}

/// Scores grouped by classifier
#[derive(Debug, Default)]
pub struct InMemoryScores {
    by_classifier: FxHashMap<String, Vec<RawScore>>,
    current_hhfs: FxHashMap<ClassifierDivision, f64>,
}

impl InMemoryScores {
    pub fn new(scores: Vec<RawScore>) -> Self {
        let mut by_classifier: FxHashMap<String, Vec<RawScore>> = FxHashMap::default();
        for score in scores {
            by_classifier.entry(score.classifier.clone()).or_default().push(score);
        }
        for scores in by_classifier.values_mut() {
            scores.sort_by(|a, b| b.hf.unwrap_or(0.0).total_cmp(&a.hf.unwrap_or(0.0)));
        }
        Self {
            by_classifier,
            current_hhfs: FxHashMap::default(),
        }
    }

    pub fn with_current_hhfs(
        mut self,
        hhfs: impl IntoIterator<Item = (ClassifierDivision, f64)>,
    ) -> Self {
        self.current_hhfs.extend(hhfs);
        self
    }

    pub fn len(&self) -> usize {
        self.by_classifier.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_classifier.is_empty()
    }
}

impl ScoreRepository for InMemoryScores {
    fn scores_for(&self, classifier: &str, divisions: &[String]) -> Result<Vec<RawScore>> {
        Ok(self
            .by_classifier
            .get(classifier)
            .map(|scores| {
                scores
                    .iter()
                    .filter(|s| divisions.iter().any(|d| *d == s.division))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn current_hhf(&self, classifier: &str, division: &str) -> Option<f64> {
        self.current_hhfs
            .get(&ClassifierDivision::new(classifier, division))
            .copied()
    }

    fn keys(&self) -> Vec<ClassifierDivision> {
        let mut keys: Vec<ClassifierDivision> = self
            .by_classifier
            .values()
            .flatten()
            .map(RawScore::key)
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Skill indicators for one member in one division
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkillRecord {
    pub elo: Option<f64>,
    pub rec_percent: Option<f64>,
}

#[derive(Debug, Default)]
pub struct InMemorySkills {
    records: FxHashMap<(String, String), SkillRecord>,
}

impl InMemorySkills {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        member_number: impl Into<String>,
        division: impl Into<String>,
        record: SkillRecord,
    ) {
        self.records.insert((member_number.into(), division.into()), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&self, member_number: &str, division: &str) -> Option<&SkillRecord> {
        self.records
            .get(&(member_number.to_string(), division.to_string()))
    }
}

impl SkillLookup for InMemorySkills {
    fn elo(&self, member_number: &str, division: &str) -> Option<f64> {
        self.record(member_number, division).and_then(|r| r.elo)
    }

    fn rec_percent(&self, member_number: &str, division: &str) -> Option<f64> {
        self.record(member_number, division).and_then(|r| r.rec_percent)
    }
}

/// RecHHF records keyed by (classifier, division)
#[derive(Debug, Default)]
pub struct InMemoryRecHhfStore {
    records: RwLock<BTreeMap<ClassifierDivision, RecHhf>>,
}

impl InMemoryRecHhfStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecHhfStore for InMemoryRecHhfStore {
    fn upsert(&self, rec: RecHhf) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        records.insert(rec.key(), rec);
        Ok(())
    }

    fn get(&self, key: &ClassifierDivision) -> Option<RecHhf> {
        self.records.read().ok()?.get(key).cloned()
    }

    fn all(&self) -> Vec<RecHhf> {
        self.records
            .read()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}
