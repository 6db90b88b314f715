//! Hit factor modules
//!
//! - `decoder`: bit-packed per-target hit encodings
//! - `reconstruct`: major/minor HF recomputation and validation

pub mod decoder;
pub mod reconstruct;

pub use decoder::{target_hits_to_letters, HitCounts, HitZone};
pub use reconstruct::{minor_hf, reconstruct, PowerFactor, Reconstruction, ScoreFields};
