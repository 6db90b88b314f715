//! Data Loading
//!
//! Loads score exports, published HHFs and skill indicators with Polars.
//! Scores come from CSV or Parquet; the format is picked by extension.
//!
//! Score columns:
//!
//! | column            | type                   | required |
//! |-------------------|------------------------|----------|
//! | classifier        | string                 | yes      |
//! | division          | string                 | yes      |
//! | member_number     | string                 | yes      |
//! | hf                | float                  | yes      |
//! | percent           | float                  | no       |
//! | target_hits       | pipe-separated ints    | no       |
//! | strings           | pipe-separated floats  | no       |
//! | steel_hits        | float                  | no       |
//! | steel_mikes       | float                  | no       |
//! | steel_no_shoots   | float                  | no       |
//! | source            | string                 | no       |
//! | timestamp         | int (epoch ms)         | no       |
//!
//! An empty `target_hits` cell next to string times is a steel-only stage.

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use crate::store::{InMemorySkills, SkillRecord};
use crate::types::{ClassifierDivision, RawScore, ScoreSource};

/// Raw score records loaded from disk
pub struct ScoreData {
    pub scores: Vec<RawScore>,
}

impl ScoreData {
    /// Load scores from a `.csv` or `.parquet` file
    pub fn load(path: &Path) -> Result<Self> {
        let df = read_table(path)?;
        let data = Self::from_dataframe(&df)
            .with_context(|| format!("Invalid score table: {:?}", path))?;
        tracing::info!("loaded {} scores from {:?}", data.scores.len(), path);
        Ok(data)
    }

    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let classifiers = string_column(df, "classifier")?;
        let divisions = string_column(df, "division")?;
        let members = string_column(df, "member_number")?;
        let hfs = f64_column(df, "hf")?;
        let percents = optional_f64_column(df, "percent")?;
        let target_hits = optional_string_column(df, "target_hits")?;
        let strings = optional_string_column(df, "strings")?;
        let steel_hits = optional_f64_column(df, "steel_hits")?;
        let steel_mikes = optional_f64_column(df, "steel_mikes")?;
        let steel_no_shoots = optional_f64_column(df, "steel_no_shoots")?;
        let sources = optional_string_column(df, "source")?;
        let timestamps = optional_i64_column(df, "timestamp")?;

        let mut scores = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let (Some(classifier), Some(division)) = (&classifiers[idx], &divisions[idx]) else {
                continue;
            };

            // an empty hit list is a steel-only stage when string times are present
            let score_strings: Option<Vec<f64>> = strings[idx].as_deref().and_then(parse_pipe_list);
            let hits = match target_hits[idx].as_deref().map(str::trim) {
                Some(cell) if !cell.is_empty() => parse_pipe_list(cell),
                _ if score_strings.is_some() => Some(Vec::new()),
                _ => None,
            };

            scores.push(RawScore {
                classifier: classifier.clone(),
                division: division.to_lowercase(),
                member_number: members[idx].clone().unwrap_or_default(),
                hf: hfs[idx],
                percent: percents[idx],
                target_hits: hits,
                strings: score_strings,
                steel_hits: steel_hits[idx],
                steel_mikes: steel_mikes[idx],
                steel_no_shoots: steel_no_shoots[idx],
                source: sources[idx].as_deref().map(ScoreSource::parse).unwrap_or_default(),
                timestamp: timestamps[idx],
            });
        }

        Ok(ScoreData { scores })
    }
}

/// Published HHFs: `classifier, division, hhf`
pub fn load_current_hhfs(path: &Path) -> Result<Vec<(ClassifierDivision, f64)>> {
    let df = read_csv(path)?;
    let classifiers = string_column(&df, "classifier")?;
    let divisions = string_column(&df, "division")?;
    let hhfs = f64_column(&df, "hhf")?;

    let mut out = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        if let (Some(c), Some(d), Some(hhf)) = (&classifiers[idx], &divisions[idx], hhfs[idx]) {
            out.push((ClassifierDivision::new(c.clone(), d.to_lowercase()), hhf));
        }
    }
    Ok(out)
}

/// Skill indicators: `member_number, division, elo, rec_percent`
pub fn load_skills(path: &Path) -> Result<InMemorySkills> {
    let df = read_csv(path)?;
    let members = string_column(&df, "member_number")?;
    let divisions = string_column(&df, "division")?;
    let elos = optional_f64_column(&df, "elo")?;
    let rec_percents = optional_f64_column(&df, "rec_percent")?;

    let mut skills = InMemorySkills::new();
    for idx in 0..df.height() {
        if let (Some(member), Some(division)) = (&members[idx], &divisions[idx]) {
            skills.insert(
                member.clone(),
                division.to_lowercase(),
                SkillRecord {
                    elo: elos[idx],
                    rec_percent: rec_percents[idx],
                },
            );
        }
    }
    Ok(skills)
}

fn read_table(path: &Path) -> Result<DataFrame> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to scan parquet: {:?}", path))?
            .collect()
            .with_context(|| format!("Failed to load parquet: {:?}", path)),
        _ => read_csv(path),
    }
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.into()))
        .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load CSV: {:?}", path))
}

/// Pipe-separated list; None if any element fails to parse or the list is empty
fn parse_pipe_list<T: std::str::FromStr>(value: &str) -> Option<Vec<T>> {
    let items: Option<Vec<T>> = value
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect();
    items.filter(|v| !v.is_empty())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::String)
        .with_context(|| format!("Column '{}' cannot be read as string", name))?;
    let values = column
        .str()
        .with_context(|| format!("Column '{}' is not string type", name))?;
    Ok(values.into_iter().map(|v| v.map(str::to_string)).collect())
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' is not numeric", name))?;
    let values = column
        .f64()
        .with_context(|| format!("Column '{}' is not f64 type", name))?;
    Ok(values.into_iter().collect())
}

fn optional_string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if df.column(name).is_err() {
        return Ok(vec![None; df.height()]);
    }
    string_column(df, name)
}

fn optional_f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    if df.column(name).is_err() {
        return Ok(vec![None; df.height()]);
    }
    f64_column(df, name)
}

fn optional_i64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    if df.column(name).is_err() {
        return Ok(vec![None; df.height()]);
    }
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::Int64)
        .with_context(|| format!("Column '{}' is not integer", name))?;
    let values = column
        .i64()
        .with_context(|| format!("Column '{}' is not i64 type", name))?;
    Ok(values.into_iter().collect())
}
