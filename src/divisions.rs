//! Division equivalence
//!
//! Some divisions are "derived": their score pool is the union of their own
//! scores and the scores of several "source" divisions from other rule sets
//! (e.g. an irons division pooling limited and production). One canonical
//! forward map `derived -> [sources]` is configured; every other view is
//! computed once at construction:
//!
//! - display inverse: `source -> [derived]`, every source
//! - calibration inverse: same, minus the excluded sources
//! - display pool / calibration pool: `derived -> [derived, sources...]`
//!
//! Calibration always uses the calibration views. Display views are broader:
//! an excluded source's scores are still shown under the derived division,
//! they just never move its recommended HHF.
//!
//! A division may not be both derived and a source. That keeps explosion a
//! single step, so exploding twice adds nothing.

use ahash::AHashSet;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hash;

use crate::error::ConfigError;

/// Serialized form of the division maps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DivisionMapConfig {
    /// Canonical map: derived division -> source divisions
    pub equivalence: BTreeMap<String, Vec<String>>,
    /// Sources that may be displayed but never calibrated against
    #[serde(default)]
    pub calibration_exclusions: Vec<String>,
}

/// Which view of the maps to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapVariant {
    /// Every configured source
    Display,
    /// Sources minus calibration exclusions
    Calibration,
}

/// Direction of an explosion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Tag source-division entries with the derived divisions they feed
    SourceToDerived,
    /// Tag derived-division entries with their source divisions
    DerivedToSources,
}

/// Canonical division maps plus their precomputed views
#[derive(Debug, Clone)]
pub struct DivisionEquivalence {
    forward: BTreeMap<String, Vec<String>>,
    excluded: FxHashSet<String>,

    inverse_display: FxHashMap<String, Vec<String>>,
    inverse_calibration: FxHashMap<String, Vec<String>>,
    pool_display: FxHashMap<String, Vec<String>>,
    pool_calibration: FxHashMap<String, Vec<String>>,
}

impl DivisionEquivalence {
    /// Validate the canonical map and build every derived view
    pub fn from_config(config: &DivisionMapConfig) -> Result<Self, ConfigError> {
        let all_sources: FxHashSet<&str> = config
            .equivalence
            .values()
            .flatten()
            .map(String::as_str)
            .collect();

        for (derived, sources) in &config.equivalence {
            if sources.iter().any(|s| s == derived) {
                return Err(ConfigError::SelfEquivalence(derived.clone()));
            }
            if all_sources.contains(derived.as_str()) {
                return Err(ConfigError::ChainedEquivalence(derived.clone()));
            }
        }
        for excluded in &config.calibration_exclusions {
            if !all_sources.contains(excluded.as_str()) {
                return Err(ConfigError::UnknownExclusion(excluded.clone()));
            }
        }

        let excluded: FxHashSet<String> = config.calibration_exclusions.iter().cloned().collect();

        let mut inverse_display: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut inverse_calibration: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut pool_display = FxHashMap::default();
        let mut pool_calibration = FxHashMap::default();

        for (derived, sources) in &config.equivalence {
            let mut display = vec![derived.clone()];
            let mut calibration = vec![derived.clone()];

            for source in sources {
                if display.contains(source) {
                    continue;
                }
                display.push(source.clone());
                inverse_display
                    .entry(source.clone())
                    .or_default()
                    .push(derived.clone());

                if !excluded.contains(source) {
                    calibration.push(source.clone());
                    inverse_calibration
                        .entry(source.clone())
                        .or_default()
                        .push(derived.clone());
                }
            }

            pool_display.insert(derived.clone(), display);
            pool_calibration.insert(derived.clone(), calibration);
        }

        Ok(Self {
            forward: config.equivalence.clone(),
            excluded,
            inverse_display,
            inverse_calibration,
            pool_display,
            pool_calibration,
        })
    }

    /// Canonical `derived -> [sources]` map
    pub fn forward(&self) -> &BTreeMap<String, Vec<String>> {
        &self.forward
    }

    pub fn is_derived(&self, division: &str) -> bool {
        self.forward.contains_key(division)
    }

    pub fn is_excluded(&self, division: &str) -> bool {
        self.excluded.contains(division)
    }

    /// `source -> [derived]` for the chosen variant
    pub fn inverse(&self, variant: MapVariant) -> &FxHashMap<String, Vec<String>> {
        match variant {
            MapVariant::Display => &self.inverse_display,
            MapVariant::Calibration => &self.inverse_calibration,
        }
    }

    /// Derived divisions a source division's scores feed into
    pub fn derived_for(&self, source: &str, variant: MapVariant) -> &[String] {
        self.inverse(variant)
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every division whose scores make up `division`'s pool
    ///
    /// Derived divisions come first, followed by their sources in configured
    /// order. A division that is not derived pools only itself.
    pub fn pool_divisions(&self, division: &str, variant: MapVariant) -> Vec<String> {
        let pools = match variant {
            MapVariant::Display => &self.pool_display,
            MapVariant::Calibration => &self.pool_calibration,
        };
        pools
            .get(division)
            .cloned()
            .unwrap_or_else(|| vec![division.to_string()])
    }

    fn extra_divisions(
        &self,
        division: &str,
        direction: Direction,
        variant: MapVariant,
    ) -> Vec<String> {
        match direction {
            Direction::SourceToDerived => self.derived_for(division, variant).to_vec(),
            Direction::DerivedToSources => {
                let mut pool = self.pool_divisions(division, variant);
                pool.retain(|d| d != division);
                pool
            }
        }
    }

    /// Expand `(entity, division)` pairs with every additional division
    ///
    /// Each input pair is kept and followed by copies of its entity tagged
    /// with the extra divisions for `direction`. Output is de-duplicated on
    /// `(key(entity), division)`, keeping first occurrences in input order.
    pub fn explode<E, K, F>(
        &self,
        pairs: impl IntoIterator<Item = (E, String)>,
        direction: Direction,
        variant: MapVariant,
        key: F,
    ) -> Vec<(E, String)>
    where
        E: Clone,
        K: Eq + Hash,
        F: Fn(&E) -> K,
    {
        let mut seen: AHashSet<(K, String)> = AHashSet::new();
        let mut exploded = Vec::new();

        for (entity, division) in pairs {
            let extras = self.extra_divisions(&division, direction, variant);
            for candidate in std::iter::once(division).chain(extras) {
                if seen.insert((key(&entity), candidate.clone())) {
                    exploded.push((entity.clone(), candidate));
                }
            }
        }

        exploded
    }
}
