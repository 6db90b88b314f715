//! Engine configuration
//!
//! JSON file with the division maps, the divisions scored on minor-equivalent
//! HF, the divisions averaged into the per-classifier quality figure, and an
//! optional policy table. A missing policy falls back to the built-in one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::calibration::policy::RecommendationPolicy;
use crate::divisions::{DivisionEquivalence, DivisionMapConfig};

const BUILTIN_CONFIG: &str = include_str!("../data/engine_config.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub divisions: DivisionMapConfig,

    /// Divisions whose pool mixes power factors; scores are replaced by
    /// their minor-equivalent HF and failing scores are dropped
    #[serde(default)]
    pub minor_hf_divisions: Vec<String>,

    /// Divisions averaged into the per-classifier quality aggregate
    #[serde(default)]
    pub quality_divisions: Vec<String>,

    #[serde(default)]
    pub policy: Option<RecommendationPolicy>,
}

impl EngineConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config: {:?}", path))?;

        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse engine config JSON: {:?}", path))?;

        config.validated()
    }

    /// Configuration shipped with the crate
    pub fn builtin() -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(BUILTIN_CONFIG)
            .with_context(|| "Failed to parse built-in engine config")?;
        config.validated()
    }

    fn validated(mut self) -> Result<Self> {
        // surfaces chains and unknown exclusions at load time
        self.equivalence()?;

        if self.policy.is_none() {
            self.policy = Some(RecommendationPolicy::builtin()?);
        }
        Ok(self)
    }

    /// Build the precomputed division views
    pub fn equivalence(&self) -> Result<DivisionEquivalence> {
        DivisionEquivalence::from_config(&self.divisions)
            .with_context(|| "Invalid division equivalence map")
    }

    /// Policy table, defaulting to an empty one if never resolved
    pub fn policy(&self) -> RecommendationPolicy {
        self.policy.clone().unwrap_or_default()
    }

    pub fn uses_minor_hf(&self, division: &str) -> bool {
        self.minor_hf_divisions.iter().any(|d| d == division)
    }
}
