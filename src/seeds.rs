//! Seed management for world composition
//!
//! Provides separate seeds for each pipeline stage, derived from a single
//! master seed, plus per-feature RNG streams inside a stage. Two runs with
//! the same master seed and the same composition see exactly the same random
//! choices, which is the engine's reproducibility contract.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use xxhash_rust::xxh64::xxh64;

/// Seeds for all composition stages.
///
/// Each stage gets its own seed so that adding randomness to one stage never
/// shifts the choices made by another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositionSeeds {
    /// Master seed (kept for display and replay)
    pub master: u64,
    /// Biome and continent placement
    pub biomes: u64,
    /// Point snapping and local coordinates
    pub points: u64,
    /// Flow routing (roads, rivers, walls)
    pub flows: u64,
    /// Village and town layout design
    pub structures: u64,
}

impl CompositionSeeds {
    /// Derive all stage seeds deterministically from a master seed.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            biomes: derive_seed(master, "biomes"),
            points: derive_seed(master, "points"),
            flows: derive_seed(master, "flows"),
            structures: derive_seed(master, "structures"),
        }
    }
}

/// Derive a stage seed from the master seed and a stage tag.
///
/// Uses xxh64 with the master seed as the hash seed. The std `DefaultHasher`
/// is not stable across Rust releases, and these values must survive in
/// saved worlds, so a fixed hash function is required.
fn derive_seed(master: u64, stage: &str) -> u64 {
    xxh64(stage.as_bytes(), master)
}

/// An independent RNG stream for one feature within one stage.
///
/// The stream depends only on (stage seed, feature id), so features never
/// consume randomness from each other's streams and can fail or be skipped
/// without disturbing the rest of the composition.
pub fn feature_rng(stage_seed: u64, feature_id: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(xxh64(feature_id.as_bytes(), stage_seed))
}

/// RNG stream for a stage as a whole, for choices not tied to one feature.
pub fn stage_rng(stage_seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(stage_seed)
}
