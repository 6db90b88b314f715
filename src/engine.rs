//! Recommendation Engine - main coordinator for HHF recalibration
//!
//! Per (classifier, division) key the pipeline is strictly sequential:
//!
//! 1. Pool scores over the calibration view of the division maps
//! 2. Gate every score through hit factor reconstruction; divisions that mix
//!    power factors use the minor-equivalent HF
//! 3. Annotate percentiles, compute the three percentile candidates and one
//!    curve fit over the full pool
//! 4. Publish the candidate the policy picks, as a full upsert
//!
//! Batches run one key after another by default. `reconcile_parallel` uses a
//! bounded rayon pool; keys share no mutable state except the store.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::calibration::percentile::{
    recommended_for_target, PooledPopulation, PooledScore, A_TARGET, GM_TARGET, M_TARGET,
};
use crate::calibration::policy::{Candidates, RecommendationPolicy};
use crate::calibration::weibull::{CurveCalibrator, CurveFit, WeibullCalibrator};
use crate::config::EngineConfig;
use crate::divisions::{Direction, DivisionEquivalence, MapVariant};
use crate::hitfactor::reconstruct::reconstruct;
use crate::quality::QualityScorer;
use crate::quality_cache::{ClassifierQuality, QualityCache};
use crate::store::{RecHhfStore, ScoreRepository, SkillLookup};
use crate::types::{ClassifierDivision, QualityRecord, RawScore, RecHhf};

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub updated: Vec<ClassifierDivision>,
    /// Keys that failed, with the error message
    pub failed: Vec<(ClassifierDivision, String)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, key: ClassifierDivision, result: Result<RecHhf>) {
        match result {
            Ok(_) => self.updated.push(key),
            Err(e) => {
                warn!("recalibration failed for {}: {:#}", key, e);
                self.failed.push((key, format!("{:#}", e)));
            }
        }
    }
}

/// Outcome of pooling one score
enum PoolEntry {
    Hf(f64),
    /// Zero or missing HF, left out without counting as invalid
    Skipped,
    /// Rejected by reconstruction
    Invalid,
}

/// Coordinates pooling, candidate calculation, policy and persistence
pub struct RecommendationEngine {
    config: EngineConfig,
    equivalence: DivisionEquivalence,
    policy: RecommendationPolicy,
    scores: Arc<dyn ScoreRepository>,
    store: Arc<dyn RecHhfStore>,
    skills: Arc<dyn SkillLookup>,
    calibrator: Box<dyn CurveCalibrator>,
    quality_cache: QualityCache,
}

impl RecommendationEngine {
    pub fn new(
        config: EngineConfig,
        scores: Arc<dyn ScoreRepository>,
        store: Arc<dyn RecHhfStore>,
        skills: Arc<dyn SkillLookup>,
    ) -> Result<Self> {
        let equivalence = config.equivalence()?;
        let policy = config.policy();
        let quality_cache = QualityCache::new(config.quality_divisions.clone());

        debug!(
            "engine ready: {} derived divisions, {} policy decisions",
            equivalence.forward().len(),
            policy.decided_count()
        );

        Ok(Self {
            config,
            equivalence,
            policy,
            scores,
            store,
            skills,
            calibrator: Box::new(WeibullCalibrator::default()),
            quality_cache,
        })
    }

    /// Replace the curve calibrator
    pub fn with_calibrator(mut self, calibrator: Box<dyn CurveCalibrator>) -> Self {
        self.calibrator = calibrator;
        self
    }

    pub fn equivalence(&self) -> &DivisionEquivalence {
        &self.equivalence
    }

    pub fn quality_cache(&self) -> &QualityCache {
        &self.quality_cache
    }

    /// What a score contributes to a pool
    ///
    /// Calibration pools only take scores that reconstruct to a positive HF;
    /// display pools take every claimed HF.
    fn pooled_hf(&self, score: &RawScore, key_division: &str, variant: MapVariant) -> PoolEntry {
        match variant {
            MapVariant::Display => match score.hf {
                Some(hf) if hf >= 0.0 => PoolEntry::Hf(hf),
                _ => PoolEntry::Skipped,
            },
            MapVariant::Calibration => {
                let reconstructed = match reconstruct(&score.fields()) {
                    Ok(r) => r,
                    Err(e) => {
                        debug!(
                            "excluding {} {} from {}: {}",
                            score.member_number, score.division, key_division, e
                        );
                        return PoolEntry::Invalid;
                    }
                };
                let hf = if self.config.uses_minor_hf(key_division) {
                    reconstructed.minor_hf
                } else {
                    reconstructed.claimed_hf
                };
                if hf > 0.0 {
                    PoolEntry::Hf(hf)
                } else {
                    PoolEntry::Skipped
                }
            }
        }
    }

    /// Pooled, sorted and percentile-annotated population for a key
    pub fn pooled_population(
        &self,
        key: &ClassifierDivision,
        variant: MapVariant,
    ) -> Result<PooledPopulation> {
        let divisions = self.equivalence.pool_divisions(&key.division, variant);
        let raw = self
            .scores
            .scores_for(&key.classifier, &divisions)
            .with_context(|| format!("Failed to load scores for {}", key))?;

        let mut invalid_runs = 0;
        let mut pooled = Vec::with_capacity(raw.len());
        for score in raw.iter().filter(|s| !s.is_major_match()) {
            match self.pooled_hf(score, &key.division, variant) {
                PoolEntry::Hf(hf) => pooled.push(PooledScore {
                    member_number: score.member_number.clone(),
                    division: score.division.clone(),
                    hf,
                    percentile: 0.0,
                    timestamp: score.timestamp,
                }),
                PoolEntry::Invalid => invalid_runs += 1,
                PoolEntry::Skipped => {}
            }
        }

        Ok(PooledPopulation::new(key.clone(), pooled, invalid_runs))
    }

    /// Weibull wbl5 per source division when the pool spans several
    fn division_hhfs(&self, population: &PooledPopulation) -> BTreeMap<String, f64> {
        let divisions = population.divisions();
        if divisions.len() < 2 {
            return BTreeMap::new();
        }
        divisions
            .into_iter()
            .map(|d| {
                let fit = self.calibrator.fit(&population.hfs_for_division(&d));
                (d, fit.wbl5)
            })
            .collect()
    }

    /// Compute the RecHHF record for a key without persisting it
    pub fn recommend(&self, key: &ClassifierDivision) -> Result<RecHhf> {
        let population = self.pooled_population(key, MapVariant::Calibration)?;
        let hfs = population.hfs();

        let fit: CurveFit = self.calibrator.fit(&hfs);
        let candidates = Candidates {
            r1: recommended_for_target(&population.scores, GM_TARGET),
            r5: recommended_for_target(&population.scores, M_TARGET),
            r15: recommended_for_target(&population.scores, A_TARGET),
            wbl1: fit.wbl1,
            wbl3: fit.wbl3,
            wbl5: fit.wbl5,
            wbl15: fit.wbl15,
        };
        let choice = self.policy.choice_for(&key.classifier, &key.division);
        let rec_hhf = choice.pick(&candidates);

        if population.is_empty() {
            debug!("{}: empty calibration pool", key);
        }

        Ok(RecHhf {
            classifier: key.classifier.clone(),
            division: key.division.clone(),
            classifier_division: key.to_string(),
            cur_hhf: self
                .scores
                .current_hhf(&key.classifier, &key.division)
                .unwrap_or(-1.0),
            rec_hhf,
            choice,
            rec1_hhf: candidates.r1,
            rec5_hhf: candidates.r5,
            rec15_hhf: candidates.r15,
            k: fit.k,
            lambda: fit.lambda,
            wbl1_hhf: fit.wbl1,
            wbl3_hhf: fit.wbl3,
            wbl5_hhf: fit.wbl5,
            wbl15_hhf: fit.wbl15,
            kurtosis: fit.kurtosis,
            skewness: fit.skewness,
            mean_squared_error: fit.mean_squared_error,
            mean_absolute_error: fit.mean_absolute_error,
            super_mean_squared_error: fit.super_mean_squared_error,
            super_mean_absolute_error: fit.super_mean_absolute_error,
            max_error: fit.max_error,
            runs: population.len(),
            invalid_runs: population.invalid_runs,
            division_hhfs: self.division_hhfs(&population),
        })
    }

    /// Recompute, upsert and invalidate dependent quality entries
    pub fn hydrate(&self, key: &ClassifierDivision) -> Result<RecHhf> {
        let rec = self.recommend(key)?;
        self.store
            .upsert(rec.clone())
            .with_context(|| format!("Failed to store RecHHF for {}", key))?;
        self.quality_cache.invalidate(key);
        debug!("{}: rec {} ({}) over {} runs", key, rec.rec_hhf, rec.choice, rec.runs);
        Ok(rec)
    }

    /// Recalculate exactly these keys, one after another
    ///
    /// A failing key is logged and reported; the rest of the batch continues.
    pub fn reconcile(&self, keys: &[ClassifierDivision]) -> BatchReport {
        let mut report = BatchReport::default();
        for key in keys {
            report.record(key.clone(), self.hydrate(key));
        }
        info!(
            "reconciled {} keys ({} failed)",
            report.updated.len(),
            report.failed.len()
        );
        report
    }

    /// [`reconcile`](Self::reconcile) over a pool of `workers` threads
    pub fn reconcile_parallel(
        &self,
        keys: &[ClassifierDivision],
        workers: usize,
    ) -> Result<BatchReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .context("Failed to build worker pool")?;

        let results: Vec<(ClassifierDivision, Result<RecHhf>)> = pool.install(|| {
            keys.par_iter()
                .map(|key| (key.clone(), self.hydrate(key)))
                .collect()
        });

        let mut report = BatchReport::default();
        for (key, result) in results {
            report.record(key, result);
        }
        info!(
            "reconciled {} keys on {} workers ({} failed)",
            report.updated.len(),
            workers.max(1),
            report.failed.len()
        );
        Ok(report)
    }

    /// Keys whose calibration pools contain scores from `ingested` keys
    pub fn affected_keys(&self, ingested: &[ClassifierDivision]) -> Vec<ClassifierDivision> {
        let pairs = ingested.iter().map(|k| (k.classifier.clone(), k.division.clone()));
        let mut keys: Vec<ClassifierDivision> = self
            .equivalence
            .explode(pairs, Direction::SourceToDerived, MapVariant::Calibration, |c| c.clone())
            .into_iter()
            .map(|(classifier, division)| ClassifierDivision::new(classifier, division))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Reconcile after ingestion: the ingested keys plus every derived key they feed
    pub fn reconcile_ingested(&self, ingested: &[ClassifierDivision]) -> BatchReport {
        self.quality_cache.clear();
        self.reconcile(&self.affected_keys(ingested))
    }

    /// Every key with scores, plus the derived keys those scores feed
    pub fn all_keys(&self) -> Vec<ClassifierDivision> {
        self.affected_keys(&self.scores.keys())
    }

    /// Stored RecHHF for a key, computed on the fly when none is stored
    fn rec_for(&self, key: &ClassifierDivision) -> Result<RecHhf> {
        match self.store.get(key) {
            Some(rec) => Ok(rec),
            None => self.recommend(key),
        }
    }

    /// Quality of a key's calibration, over its display population
    pub fn quality(&self, key: &ClassifierDivision) -> Result<QualityRecord> {
        let rec = self.rec_for(key)?;
        let display = self.pooled_population(key, MapVariant::Display)?;
        Ok(QualityScorer::new(self.skills.as_ref()).score(&rec, &display))
    }

    /// Correlation quality averaged over the configured divisions
    ///
    /// Only divisions with a stored RecHHF take part. Cached until one of
    /// them is recalculated.
    pub fn classifier_quality(&self, classifier: &str) -> ClassifierQuality {
        self.quality_cache.get_or_compute(classifier, |divisions| {
            let by_division = divisions
                .iter()
                .filter_map(|division| {
                    let key = ClassifierDivision::new(classifier, division.clone());
                    self.store.get(&key)?;
                    match self.quality(&key) {
                        Ok(q) => Some((division.clone(), q.cc_quality)),
                        Err(e) => {
                            warn!("quality failed for {}: {:#}", key, e);
                            None
                        }
                    }
                })
                .collect();
            ClassifierQuality::from_divisions(classifier, by_division)
        })
    }
}
