//! Batch recalibration
//!
//! Usage:
//!   recalibrate <scores.csv|scores.parquet> <output.json>
//!       [--config engine.json] [--hhfs hhfs.csv] [--skills skills.csv] [--workers N]
//!
//! Recalculates every (classifier, division) key found in the scores plus
//! the derived divisions they feed, then writes RecHHF and quality records
//! as pretty JSON.

use anyhow::{bail, Context, Result};
use hhf_calibration::data::{load_current_hhfs, load_skills};
use hhf_calibration::{
    EngineConfig, InMemoryRecHhfStore, InMemoryScores, InMemorySkills, RecHhfStore,
    RecommendationEngine, ScoreData,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: recalibrate <scores> <output.json> \
    [--config F] [--hhfs F] [--skills F] [--workers N]";

struct Args {
    scores: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    hhfs: Option<PathBuf>,
    skills: Option<PathBuf>,
    workers: usize,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut hhfs = None;
    let mut skills = None;
    let mut workers = 1;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--hhfs" => hhfs = Some(PathBuf::from(value("--hhfs")?)),
            "--skills" => skills = Some(PathBuf::from(value("--skills")?)),
            "--workers" => {
                workers = value("--workers")?
                    .parse()
                    .context("--workers must be a positive integer")?
            }
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let [scores, output]: [PathBuf; 2] = positional.try_into().map_err(|_| anyhow::anyhow!(USAGE))?;

    Ok(Args {
        scores,
        output,
        config,
        hhfs,
        skills,
        workers,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hhf_calibration=info,recalibrate=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;
    let start = Instant::now();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::builtin()?,
    };

    let data = ScoreData::load(&args.scores)?;
    let mut repository = InMemoryScores::new(data.scores);
    if let Some(path) = &args.hhfs {
        repository = repository.with_current_hhfs(load_current_hhfs(path)?);
    }
    let skills = match &args.skills {
        Some(path) => load_skills(path)?,
        None => InMemorySkills::new(),
    };

    let store = Arc::new(InMemoryRecHhfStore::new());
    let engine = RecommendationEngine::new(
        config,
        Arc::new(repository),
        store.clone(),
        Arc::new(skills),
    )?;

    let keys = engine.all_keys();
    tracing::info!("recalibrating {} keys on {} workers", keys.len(), args.workers);

    let report = if args.workers > 1 {
        engine.reconcile_parallel(&keys, args.workers)?
    } else {
        engine.reconcile(&keys)
    };

    let recs = store.all();
    let qualities: Vec<_> = recs
        .iter()
        .filter_map(|rec| match engine.quality(&rec.key()) {
            Ok(q) => Some(q),
            Err(e) => {
                tracing::warn!("quality failed for {}: {:#}", rec.key(), e);
                None
            }
        })
        .collect();

    let output = json!({
        "rec_hhfs": recs,
        "quality": qualities,
        "failed": report
            .failed
            .iter()
            .map(|(key, error)| json!({ "key": key.to_string(), "error": error }))
            .collect::<Vec<_>>(),
    });
    std::fs::write(&args.output, serde_json::to_string_pretty(&output)?)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    tracing::info!(
        "wrote {} RecHHFs ({} failed) to {:?} in {:.2?}",
        recs.len(),
        report.failed.len(),
        args.output,
        start.elapsed()
    );

    if !report.is_complete() {
        bail!("{} keys failed", report.failed.len());
    }
    Ok(())
}
