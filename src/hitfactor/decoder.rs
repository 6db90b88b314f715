//! Bit-packed hit decoding
//!
//! Score exports store the hits of one target as a single integer: one 4-bit
//! counter per scoring zone. Layout, least significant first:
//!
//! | zone | shift |
//! |------|-------|
//! | A    | 0     |
//! | B    | 4     |
//! | C    | 8     |
//! | D    | 12    |
//! | NS   | 16    |
//! | M    | 20    |
//! | NPM  | 24    |
//!
//! NPM takes every bit from 24 upwards, so every `u32` is a valid encoding
//! and `encode(decode(n)) == n`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

const FIELD_MASK: u32 = 0xF;
const SHIFT_B: u32 = 4;
const SHIFT_C: u32 = 8;
const SHIFT_D: u32 = 12;
const SHIFT_NS: u32 = 16;
const SHIFT_M: u32 = 20;
const SHIFT_NPM: u32 = 24;

/// Scoring zone of a single hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitZone {
    A,
    B,
    C,
    D,
    #[serde(rename = "M")]
    Mike,
    #[serde(rename = "NS")]
    NoShoot,
    #[serde(rename = "NPM")]
    NoPenaltyMike,
}

impl HitZone {
    /// Zones in canonical output order
    pub const ALL: [HitZone; 7] = [
        HitZone::A,
        HitZone::B,
        HitZone::C,
        HitZone::D,
        HitZone::Mike,
        HitZone::NoShoot,
        HitZone::NoPenaltyMike,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HitZone::A => "A",
            HitZone::B => "B",
            HitZone::C => "C",
            HitZone::D => "D",
            HitZone::Mike => "M",
            HitZone::NoShoot => "NS",
            HitZone::NoPenaltyMike => "NPM",
        }
    }
}

/// Per-zone hit counts decoded from one packed integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCounts {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub mikes: u32,
    pub no_shoots: u32,
    pub no_penalty_mikes: u32,
}

impl HitCounts {
    /// Decode one packed target encoding
    pub fn decode(packed: u32) -> Self {
        Self {
            a: packed & FIELD_MASK,
            b: (packed >> SHIFT_B) & FIELD_MASK,
            c: (packed >> SHIFT_C) & FIELD_MASK,
            d: (packed >> SHIFT_D) & FIELD_MASK,
            no_shoots: (packed >> SHIFT_NS) & FIELD_MASK,
            mikes: (packed >> SHIFT_M) & FIELD_MASK,
            no_penalty_mikes: packed >> SHIFT_NPM,
        }
    }

    /// Decode and sum several per-target encodings
    pub fn decode_all(packed: &[u32]) -> Self {
        packed
            .iter()
            .fold(Self::default(), |acc, &p| acc + Self::decode(p))
    }

    /// Pack the counts back into a single integer
    ///
    /// Only meaningful for counts obtained from [`HitCounts::decode`]; summed
    /// counts can overflow their 4-bit fields.
    pub fn encode(&self) -> u32 {
        self.a
            | (self.b << SHIFT_B)
            | (self.c << SHIFT_C)
            | (self.d << SHIFT_D)
            | (self.no_shoots << SHIFT_NS)
            | (self.mikes << SHIFT_M)
            | (self.no_penalty_mikes << SHIFT_NPM)
    }

    pub fn count(&self, zone: HitZone) -> u32 {
        match zone {
            HitZone::A => self.a,
            HitZone::B => self.b,
            HitZone::C => self.c,
            HitZone::D => self.d,
            HitZone::Mike => self.mikes,
            HitZone::NoShoot => self.no_shoots,
            HitZone::NoPenaltyMike => self.no_penalty_mikes,
        }
    }

    pub fn total(&self) -> u64 {
        HitZone::ALL.iter().map(|&z| u64::from(self.count(z))).sum()
    }

    /// Expand into one zone per hit, in A, B, C, D, M, NS, NPM order
    pub fn letters(&self) -> SmallVec<[HitZone; 16]> {
        let mut letters = SmallVec::new();
        for zone in HitZone::ALL {
            for _ in 0..self.count(zone) {
                letters.push(zone);
            }
        }
        letters
    }
}

impl std::ops::Add for HitCounts {
    type Output = HitCounts;

    fn add(self, rhs: HitCounts) -> HitCounts {
        HitCounts {
            a: self.a + rhs.a,
            b: self.b + rhs.b,
            c: self.c + rhs.c,
            d: self.d + rhs.d,
            mikes: self.mikes + rhs.mikes,
            no_shoots: self.no_shoots + rhs.no_shoots,
            no_penalty_mikes: self.no_penalty_mikes + rhs.no_penalty_mikes,
        }
    }
}

/// Decode a packed integer straight into hit letters
pub fn target_hits_to_letters(packed: u32) -> SmallVec<[HitZone; 16]> {
    HitCounts::decode(packed).letters()
}
