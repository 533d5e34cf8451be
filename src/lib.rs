//! World composition library
//!
//! A deterministic, seed-driven composition engine for hex-tiled voxel
//! worlds, featuring:
//! - Declarative composition documents (biomes, points, flows, structures)
//! - Constraint-driven biome placement with retries and priorities
//! - Gap filling that preserves ocean/coast/land topology and continent
//!   connectivity
//! - Road, river and wall routing with curvature and obstacle avoidance
//! - Village and town design from templates
//! - Per-cell parameter synthesis for the downstream voxel builders

pub mod assemble;
pub mod biome_placement;
pub mod composition;
pub mod defaults;
pub mod error;
pub mod flows;
pub mod gap_fill;
pub mod grid;
pub mod hex;
pub mod points;
pub mod prepare;
pub mod render;
pub mod seeds;
pub mod structures;
pub mod world;
