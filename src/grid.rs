//! Filled hex grid and cell plan records
//!
//! The authoritative per-cell state the pipeline accumulates: which feature
//! or filler owns a cell and the string parameter map the downstream voxel
//! builders consume. Also defines the `CellPlan` record handed to the
//! persistence collaborator, which the engine never writes itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::composition::ParamMap;
use crate::hex::Hex;

/// What kind of gap filler produced a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillerKind {
    Ocean,
    Land,
    Coast,
    Continent,
    Mountain,
}

impl FillerKind {
    /// Voxel builder this filler kind maps to.
    pub fn builder_name(self) -> &'static str {
        match self {
            FillerKind::Ocean => "ocean",
            FillerKind::Land => "island",
            FillerKind::Coast => "coast",
            FillerKind::Continent => "island",
            FillerKind::Mountain => "mountain",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FillerKind::Ocean => "ocean",
            FillerKind::Land => "land",
            FillerKind::Coast => "coast",
            FillerKind::Continent => "continent",
            FillerKind::Mountain => "mountain",
        }
    }
}

/// Owner of a filled cell: a placed biome or a gap filler.
#[derive(Clone, Debug, PartialEq)]
pub enum CellKind {
    Biome { feature_id: String },
    Filler(FillerKind),
}

impl CellKind {
    pub fn is_biome(&self) -> bool {
        matches!(self, CellKind::Biome { .. })
    }

    pub fn filler(&self) -> Option<FillerKind> {
        match self {
            CellKind::Filler(kind) => Some(*kind),
            CellKind::Biome { .. } => None,
        }
    }
}

/// One cell of the filled grid.
#[derive(Clone, Debug, PartialEq)]
pub struct FilledCell {
    pub kind: CellKind,
    pub parameters: ParamMap,
}

/// The complete cell field, keyed by axial coordinate.
///
/// Backed by a BTreeMap so iteration order is the (q, r) order and the whole
/// pipeline stays deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilledHexGrid {
    cells: BTreeMap<Hex, FilledCell>,
}

impl FilledHexGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hex: Hex, cell: FilledCell) {
        self.cells.insert(hex, cell);
    }

    pub fn get(&self, hex: Hex) -> Option<&FilledCell> {
        self.cells.get(&hex)
    }

    pub fn get_mut(&mut self, hex: Hex) -> Option<&mut FilledCell> {
        self.cells.get_mut(&hex)
    }

    pub fn contains(&self, hex: Hex) -> bool {
        self.cells.contains_key(&hex)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hex, &FilledCell)> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Hex, &mut FilledCell)> {
        self.cells.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Hex> {
        self.cells.keys()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Count cells produced by a given filler kind.
    pub fn count_filler(&self, kind: FillerKind) -> usize {
        self.cells
            .values()
            .filter(|c| c.kind.filler() == Some(kind))
            .count()
    }
}

/// Persistence record for one cell, upserted by the external collaborator
/// keyed on (worldId, position).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPlan {
    pub world_id: String,
    /// Cell key in "q:r" form.
    pub position: String,
    pub parameters: ParamMap,
    pub enabled: bool,
}

/// Capability the orchestrator hands the finished plan to. Implementations
/// are expected to upsert idempotently by (worldId, position).
pub trait CellPlanSink {
    fn store(&mut self, plans: &[CellPlan]) -> std::io::Result<()>;
}

/// Sink that keeps plans in memory; used by tests and the CLI.
#[derive(Default)]
pub struct MemoryPlanSink {
    pub plans: Vec<CellPlan>,
}

impl CellPlanSink for MemoryPlanSink {
    fn store(&mut self, plans: &[CellPlan]) -> std::io::Result<()> {
        self.plans.extend_from_slice(plans);
        Ok(())
    }
}
