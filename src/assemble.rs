//! Plan assembly
//!
//! Merges the filled grid, the synthesized flow descriptors and the
//! structure layouts into one authoritative parameter map per cell, then
//! renders the `CellPlan` records for the persistence collaborator.
//!
//! Key precedence is structure > flow > biome/filler, and `g_builder` is
//! write-once: the first non-empty value a cell receives sticks.

use std::collections::BTreeMap;

use crate::composition::ParamMap;
use crate::flows::{params as flow_params, FlowComposeResult};
use crate::gap_fill::HexGridFillResult;
use crate::grid::CellPlan;
use crate::hex::Hex;
use crate::structures::StructureDesignResult;

/// The assembled plan: every cell's final parameter map.
#[derive(Debug, Default, PartialEq)]
pub struct AssembledPlan {
    pub cells: BTreeMap<Hex, ParamMap>,
}

impl AssembledPlan {
    /// Render persistence records, in cell order.
    pub fn to_cell_plans(&self, world_id: &str) -> Vec<CellPlan> {
        self.cells
            .iter()
            .map(|(hex, parameters)| CellPlan {
                world_id: world_id.to_string(),
                position: hex.position_key(),
                parameters: parameters.clone(),
                enabled: true,
            })
            .collect()
    }
}

/// Merge all stage outputs into the final per-cell parameter maps.
pub fn assemble(
    fill: &HexGridFillResult,
    flows: &FlowComposeResult,
    structures: &StructureDesignResult,
) -> AssembledPlan {
    let mut plan = AssembledPlan::default();

    // Highest precedence first; lower layers only fill gaps
    for (cell, params) in &structures.cell_params {
        merge_below(plan.cells.entry(*cell).or_default(), params);
    }
    for (cell, params) in flow_params::synthesize(flows) {
        merge_below(plan.cells.entry(cell).or_default(), &params);
    }
    for (cell, filled) in fill.grid.iter() {
        merge_below(plan.cells.entry(*cell).or_default(), &filled.parameters);
    }

    plan
}

/// Merge a lower-precedence layer into `params`: existing keys win, except
/// that an empty `g_builder` may still be replaced.
fn merge_below(params: &mut ParamMap, lower: &ParamMap) {
    for (key, value) in lower {
        match params.get(key) {
            None => {
                params.insert(key.clone(), value.clone());
            }
            Some(existing) if key == "g_builder" && existing.is_empty() => {
                params.insert(key.clone(), value.clone());
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellKind, FilledCell, FillerKind};

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_structure_beats_flow_beats_biome() {
        let cell = Hex::new(1, 1);

        let mut fill = HexGridFillResult::default();
        fill.grid.insert(
            cell,
            FilledCell {
                kind: CellKind::Filler(FillerKind::Land),
                parameters: params(&[("g_builder", "island"), ("g_offset", "1"), ("biome", "land")]),
            },
        );

        let mut flows = FlowComposeResult::default();
        flows.sidewalls.entry(cell).or_default().push(
            crate::flows::SideWallCell {
                flow_feature_id: "sw".into(),
                height: 3,
                level: 50,
                width: 1,
                distance: 0,
                minimum: 1,
                sides: vec![crate::hex::Side::East],
            },
        );

        let mut structures = StructureDesignResult {
            success: true,
            ..Default::default()
        };
        structures
            .cell_params
            .insert(cell, params(&[("g_builder", "village"), ("g_village", "{}")]));

        let plan = assemble(&fill, &flows, &structures);
        let merged = &plan.cells[&cell];

        // Structure builder wins; biome fills the rest; flow descriptor kept
        assert_eq!(merged.get("g_builder").map(String::as_str), Some("village"));
        assert_eq!(merged.get("g_offset").map(String::as_str), Some("1"));
        assert!(merged.contains_key("g_sidewall"));
        assert!(merged.contains_key("g_village"));
    }

    #[test]
    fn test_empty_builder_is_replaced() {
        let mut merged = params(&[("g_builder", "")]);
        merge_below(&mut merged, &params(&[("g_builder", "coast")]));
        assert_eq!(merged.get("g_builder").map(String::as_str), Some("coast"));

        let mut kept = params(&[("g_builder", "mountain")]);
        merge_below(&mut kept, &params(&[("g_builder", "coast")]));
        assert_eq!(kept.get("g_builder").map(String::as_str), Some("mountain"));
    }

    #[test]
    fn test_cell_plans_are_ordered_and_enabled() {
        let mut fill = HexGridFillResult::default();
        for hex in [Hex::new(3, 0), Hex::new(-1, 0)] {
            fill.grid.insert(
                hex,
                FilledCell {
                    kind: CellKind::Filler(FillerKind::Ocean),
                    parameters: params(&[("g_builder", "ocean")]),
                },
            );
        }
        let plan = assemble(
            &fill,
            &FlowComposeResult::default(),
            &StructureDesignResult {
                success: true,
                ..Default::default()
            },
        );
        let records = plan.to_cell_plans("w1");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, "-1:0");
        assert_eq!(records[1].position, "3:0");
        assert!(records.iter().all(|r| r.enabled));
        assert!(records.iter().all(|r| r.world_id == "w1"));
    }
}
