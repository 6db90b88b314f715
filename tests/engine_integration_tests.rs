// Engine Integration Tests
//
// Purpose: Run the full recalibration pipeline over in-memory collaborators
// Run with: cargo test --test engine_integration_tests

use approx::assert_relative_eq;
use hhf_calibration::store::SkillRecord;
use hhf_calibration::{
    ClassifierDivision, EngineConfig, HitCounts, InMemoryRecHhfStore, InMemoryScores,
    InMemorySkills, PowerFactor, RawScore, RecHhf, RecHhfStore, RecommendationChoice,
    RecommendationEngine, ScoreSource, StoreError,
};
use std::sync::{Arc, Mutex};

// ============================================================================
// Helpers
// ============================================================================

/// Score whose claimed HF is computed from `hits` under `pf`
fn score(
    classifier: &str,
    division: &str,
    member: &str,
    hits: u32,
    time: f64,
    pf: PowerFactor,
) -> RawScore {
    let points = pf.target_points(&HitCounts::decode(hits)) as f64;
    RawScore {
        classifier: classifier.into(),
        division: division.into(),
        member_number: member.into(),
        hf: Some(hhf_calibration::utils::round4(points / time)),
        target_hits: Some(vec![hits]),
        strings: Some(vec![time]),
        source: ScoreSource::StageScore,
        ..Default::default()
    }
}

/// `n` A-zone hits only: identical under both power factors
fn a_hits(classifier: &str, division: &str, member: &str, n: u32, time: f64) -> RawScore {
    score(classifier, division, member, n, time, PowerFactor::Minor)
}

fn engine_with(
    scores: Vec<RawScore>,
    skills: InMemorySkills,
    store: Arc<dyn RecHhfStore>,
) -> RecommendationEngine {
    RecommendationEngine::new(
        EngineConfig::builtin().unwrap(),
        Arc::new(InMemoryScores::new(scores)),
        store,
        Arc::new(skills),
    )
    .unwrap()
}

fn key(classifier: &str, division: &str) -> ClassifierDivision {
    ClassifierDivision::new(classifier, division)
}

/// Store that refuses upserts for one division
struct FlakyStore {
    inner: InMemoryRecHhfStore,
    reject_division: String,
    attempts: Mutex<usize>,
}

impl RecHhfStore for FlakyStore {
    fn upsert(&self, rec: RecHhf) -> Result<(), StoreError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        if rec.division == self.reject_division {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.upsert(rec)
    }

    fn get(&self, key: &ClassifierDivision) -> Option<RecHhf> {
        self.inner.get(key)
    }

    fn all(&self) -> Vec<RecHhf> {
        self.inner.all()
    }
}

// ============================================================================
// Section 1: Single key
// ============================================================================

#[test]
fn test_end_to_end_scenario() {
    // HFs 10, 9, 8, 7, 6 (n A-hits over 5s)
    let scores = (0..5)
        .map(|i| a_hits("99-11", "co", &format!("M{}", i), 10 - i, 5.0))
        .collect();
    let store = Arc::new(InMemoryRecHhfStore::new());
    let engine = engine_with(scores, InMemorySkills::new(), store.clone());

    let rec = engine.hydrate(&key("99-11", "co")).unwrap();

    assert_eq!(rec.choice, RecommendationChoice::R1);
    assert_relative_eq!(rec.rec_hhf, 10.4211, epsilon = 1e-9);
    assert_eq!(rec.runs, 5);
    assert_eq!(rec.invalid_runs, 0);
    assert_eq!(rec.classifier_division, "99-11:co");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_minor_equivalent_pooling_for_irons() {
    // 10A 2C over 5s: major 58 -> 11.6, minor 56 -> 11.2
    let hits = 10 + (2 << 8);
    let scores = vec![
        score("99-11", "ltd", "L1", hits, 5.0, PowerFactor::Major),
        score("99-11", "pcsl_pi", "P1", hits, 5.0, PowerFactor::Minor),
        // excluded from irn calibration, still displayed
        score("99-11", "prod", "D1", hits, 4.0, PowerFactor::Minor),
    ];
    let engine = engine_with(scores, InMemorySkills::new(), Arc::new(InMemoryRecHhfStore::new()));

    let pool = engine
        .pooled_population(&key("99-11", "irn"), hhf_calibration::MapVariant::Calibration)
        .unwrap();
    assert_eq!(pool.hfs(), vec![11.2, 11.2]);
    assert_eq!(pool.scores[0].percentile, 0.0);
    assert_eq!(pool.scores[1].percentile, 0.0);

    let display = engine
        .pooled_population(&key("99-11", "irn"), hhf_calibration::MapVariant::Display)
        .unwrap();
    assert_eq!(display.len(), 3);

    // ltd on its own keeps the claimed major HF
    let ltd = engine
        .pooled_population(&key("99-11", "ltd"), hhf_calibration::MapVariant::Calibration)
        .unwrap();
    assert_eq!(ltd.hfs(), vec![11.6]);
}

#[test]
fn test_inconsistent_scores_never_reach_calibration() {
    let mut scores: Vec<RawScore> = (0..8)
        .map(|i| a_hits("99-12", "co", &format!("M{}", i), 6 + i, 4.0))
        .collect();
    let mut corrupt = a_hits("99-12", "co", "BAD", 15, 4.0);
    corrupt.hf = Some(40.0);
    scores.push(corrupt);
    let mut no_hits = a_hits("99-12", "co", "NOHITS", 15, 4.0);
    no_hits.target_hits = None;
    scores.push(no_hits);

    let engine = engine_with(scores, InMemorySkills::new(), Arc::new(InMemoryRecHhfStore::new()));
    let rec = engine.recommend(&key("99-12", "co")).unwrap();

    assert_eq!(rec.runs, 8);
    assert_eq!(rec.invalid_runs, 2);
    // best valid score is 13 A-hits over 4s
    assert!(rec.rec1_hhf < 40.0);
    let expected = hhf_calibration::utils::round4(16.25 * 0.99 / 0.95);
    assert_relative_eq!(rec.rec1_hhf, expected, epsilon = 1e-9);
}

#[test]
fn test_low_sample_division_defaults_to_r5() {
    let scores = (0..10)
        .map(|i| a_hits("99-99", "rev", &format!("R{}", i), 5 + i, 6.0))
        .collect();
    let engine = engine_with(scores, InMemorySkills::new(), Arc::new(InMemoryRecHhfStore::new()));
    let rec = engine.recommend(&key("99-99", "rev")).unwrap();
    assert_eq!(rec.choice, RecommendationChoice::R5);
    assert_eq!(rec.rec_hhf, rec.rec5_hhf);
}

// ============================================================================
// Section 2: Batches
// ============================================================================

fn batch_scores() -> Vec<RawScore> {
    let mut scores = Vec::new();
    for (c, classifier) in ["99-11", "99-12", "03-02"].iter().enumerate() {
        for i in 0..12u32 {
            scores.push(a_hits(classifier, "co", &format!("C{}", i), 3 + i, 4.0 + c as f64));
            scores.push(a_hits(classifier, "ltd", &format!("L{}", i), 2 + i, 4.5 + c as f64));
        }
    }
    scores
}

#[test]
fn test_failing_key_does_not_block_batch() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryRecHhfStore::new(),
        reject_division: "ltd".into(),
        attempts: Mutex::new(0),
    });
    let engine = engine_with(batch_scores(), InMemorySkills::new(), store.clone());

    let keys = vec![key("99-11", "ltd"), key("99-11", "co"), key("99-12", "co")];
    let report = engine.reconcile(&keys);

    assert_eq!(report.updated, vec![key("99-11", "co"), key("99-12", "co")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, key("99-11", "ltd"));
    assert!(report.failed[0].1.contains("connection reset"));
    assert_eq!(*store.attempts.lock().unwrap(), 3);
    assert_eq!(store.all().len(), 2);
}

#[test]
fn test_rerun_is_idempotent() {
    let store = Arc::new(InMemoryRecHhfStore::new());
    let engine = engine_with(batch_scores(), InMemorySkills::new(), store.clone());
    let keys = engine.all_keys();

    engine.reconcile(&keys);
    let first = store.all();
    engine.reconcile(&keys);
    let second = store.all();

    assert_eq!(first.len(), keys.len());
    assert_eq!(first, second);
}

#[test]
fn test_parallel_matches_sequential() {
    let sequential_store = Arc::new(InMemoryRecHhfStore::new());
    let sequential = engine_with(batch_scores(), InMemorySkills::new(), sequential_store.clone());
    let keys = sequential.all_keys();
    sequential.reconcile(&keys);

    let parallel_store = Arc::new(InMemoryRecHhfStore::new());
    let parallel = engine_with(batch_scores(), InMemorySkills::new(), parallel_store.clone());
    let report = parallel.reconcile_parallel(&keys, 4).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.updated.len(), keys.len());
    assert_eq!(sequential_store.all(), parallel_store.all());
}

#[test]
fn test_all_keys_include_derived_divisions() {
    let engine = engine_with(
        batch_scores(),
        InMemorySkills::new(),
        Arc::new(InMemoryRecHhfStore::new()),
    );
    let keys = engine.all_keys();
    // co feeds opt, ltd feeds irn
    assert!(keys.contains(&key("99-11", "opt")));
    assert!(keys.contains(&key("03-02", "irn")));
    assert_eq!(keys.len(), 12);
}

// ============================================================================
// Section 3: Quality
// ============================================================================

#[test]
fn test_quality_and_cache_invalidation() {
    let mut skills = InMemorySkills::new();
    let mut scores = Vec::new();
    for i in 0..10u32 {
        let member = format!("M{}", i);
        scores.push(a_hits("99-11", "co", &member, 4 + i, 5.0));
        skills.insert(
            member,
            "co",
            SkillRecord {
                elo: Some(1000.0 + 50.0 * i as f64),
                rec_percent: Some(40.0 + 5.0 * i as f64),
            },
        );
    }
    let store = Arc::new(InMemoryRecHhfStore::new());
    let engine = engine_with(scores, skills, store.clone());
    let k = key("99-11", "co");
    engine.hydrate(&k).unwrap();

    let quality = engine.quality(&k).unwrap();
    assert_eq!(quality.runs, 10);
    assert_relative_eq!(quality.elo_correlation, 1.0, epsilon = 1e-9);
    assert_relative_eq!(quality.classification_correlation, 1.0, epsilon = 1e-9);
    // small population: offset -40 applies
    assert!(quality.quality <= 60.0);
    let rec = store.get(&k).unwrap();
    assert_relative_eq!(
        quality.cc_quality,
        300.0 / 2.4 - rec.super_mean_squared_error,
        epsilon = 1e-9
    );

    let aggregate = engine.classifier_quality("99-11");
    assert_eq!(aggregate.by_division.len(), 1);
    assert_relative_eq!(aggregate.cc_quality, quality.cc_quality, epsilon = 1e-9);
    assert_eq!(engine.quality_cache().len(), 1);

    // recalculating a dependency drops the cached aggregate
    engine.hydrate(&k).unwrap();
    assert!(engine.quality_cache().is_empty());
}

#[test]
fn test_quality_for_unstored_key_computes_rec() {
    let scores = (0..6)
        .map(|i| a_hits("99-11", "lo", &format!("M{}", i), 5 + i, 5.0))
        .collect();
    let store = Arc::new(InMemoryRecHhfStore::new());
    let engine = engine_with(scores, InMemorySkills::new(), store.clone());

    let quality = engine.quality(&key("99-11", "lo")).unwrap();
    assert_eq!(quality.runs, 6);
    assert_eq!(quality.elo_correlation, 0.0);
    assert!(quality.rec_hhf > 0.0);
    assert!(store.is_empty());

    // nothing published for this key
    assert_eq!(quality.cur_hhf, -1.0);
    assert_eq!(quality.inverse95_cur_percentile, -1.0);
    assert_eq!(quality.hq_quality, None);
}

#[test]
fn test_quality_against_published_hhf() {
    // HFs 10, 9, 8, 7, 6 with 10.0 published
    let scores = (0..5)
        .map(|i| a_hits("99-11", "co", &format!("M{}", i), 10 - i, 5.0))
        .collect();
    let repository =
        InMemoryScores::new(scores).with_current_hhfs(vec![(key("99-11", "co"), 10.0)]);
    let engine = RecommendationEngine::new(
        EngineConfig::builtin().unwrap(),
        Arc::new(repository),
        Arc::new(InMemoryRecHhfStore::new()),
        Arc::new(InMemorySkills::new()),
    )
    .unwrap();

    let quality = engine.quality(&key("99-11", "co")).unwrap();
    assert_eq!(quality.cur_hhf, 10.0);
    assert_eq!(quality.inverse100_cur_percentile, 0.0);
    assert_eq!(quality.inverse95_cur_percentile, 0.0);
    assert_eq!(quality.inverse85_cur_percentile, 20.0);
    assert_eq!(quality.inverse75_cur_percentile, 40.0);
    assert_eq!(quality.inverse60_cur_percentile, 80.0);
    assert_eq!(quality.inverse40_cur_percentile, 80.0);
    // distance 10 + 60 + 25 + 17.5 + 1.5 = 114, offset -40
    assert_relative_eq!(quality.hq_quality.unwrap(), -54.0, epsilon = 1e-9);
    // the recommendation sits higher than the published HHF
    assert!(quality.inverse85_percentile <= quality.inverse85_cur_percentile);
}
