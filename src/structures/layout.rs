//! Intra-cell settlement layout
//!
//! Generates the building plots, the plaza and the street stubs for one
//! footprint cell, and renders them as the `g_village` and `road` cell
//! descriptors.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::hex::Side;
use crate::points::{CELL_GRID_SIZE, CELL_MARGIN};

use super::templates::CellRole;

/// Street width between plot rows, in blocks.
const STREET_WIDTH: i32 = 2;

/// One rectangular building plot in cell-local coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub lx: i32,
    pub lz: i32,
    pub w: i32,
    pub h: i32,
    pub kind: String,
}

/// `g_village` descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VillageParam {
    pub plots: Vec<Plot>,
    pub level: i32,
}

/// `road` descriptor for plaza-internal streets, same shape as open roads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreetParam {
    pub level: i32,
    pub route: Vec<StreetLeg>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreetLeg {
    pub side: Side,
    pub width: i32,
    #[serde(rename = "type")]
    pub road_type: String,
}

/// Designed layout of one footprint cell.
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    pub level: i32,
    pub plots: Vec<Plot>,
    /// Sides with boundary streets toward neighboring footprint cells.
    pub streets: Vec<Side>,
}

impl GridConfig {
    /// Render the plot layout as the `g_village` parameter value.
    pub fn to_village_parameter(&self) -> String {
        let descriptor = VillageParam {
            plots: self.plots.clone(),
            level: self.level,
        };
        serde_json::to_string(&descriptor).unwrap_or_default()
    }

    /// Render the boundary streets as a `road` parameter value, if any.
    pub fn to_road_parameter(&self) -> Option<String> {
        if self.streets.is_empty() {
            return None;
        }
        let descriptor = StreetParam {
            level: self.level,
            route: self
                .streets
                .iter()
                .map(|side| StreetLeg {
                    side: *side,
                    width: STREET_WIDTH,
                    road_type: "street".into(),
                })
                .collect(),
        };
        Some(serde_json::to_string(&descriptor).unwrap_or_default())
    }
}

/// Lay out one cell: a plot grid with streets between the rows, and for
/// plaza cells an open square in the middle.
pub fn design_cell(
    role: CellRole,
    plots_per_axis: i32,
    level: i32,
    streets: Vec<Side>,
    rng: &mut ChaCha8Rng,
) -> GridConfig {
    let usable = CELL_GRID_SIZE - 2 * CELL_MARGIN;
    let per_axis = plots_per_axis.max(1);
    let pitch = (usable + STREET_WIDTH) / per_axis;
    let plot_size = pitch - STREET_WIDTH;

    // Plaza occupies the central block of a plaza cell
    let center_low = per_axis / 2 - 1;
    let center_high = per_axis / 2;
    let in_plaza = |ix: i32, iz: i32| {
        role == CellRole::Plaza
            && (center_low..=center_high).contains(&ix)
            && (center_low..=center_high).contains(&iz)
    };

    let mut plots = Vec::new();
    if role == CellRole::Plaza {
        let lx = CELL_MARGIN + center_low.max(0) * pitch;
        let span = (center_high - center_low.max(0) + 1) * pitch - STREET_WIDTH;
        plots.push(Plot {
            lx,
            lz: lx,
            w: span,
            h: span,
            kind: "plaza".into(),
        });
    }

    for ix in 0..per_axis {
        for iz in 0..per_axis {
            if in_plaza(ix, iz) {
                continue;
            }
            // Leave the odd plot empty so settlements look lived-in, not
            // stamped
            if rng.gen_bool(0.15) {
                continue;
            }
            let kind = match rng.gen_range(0..6) {
                0 => "garden",
                1 | 2 => "house",
                3 => "barn",
                _ => "house",
            };
            plots.push(Plot {
                lx: CELL_MARGIN + ix * pitch,
                lz: CELL_MARGIN + iz * pitch,
                w: plot_size,
                h: plot_size,
                kind: kind.into(),
            });
        }
    }

    GridConfig {
        level,
        plots,
        streets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::feature_rng;

    #[test]
    fn test_plots_stay_inside_cell() {
        let mut rng = feature_rng(7, "village-1");
        let config = design_cell(CellRole::Dwellings, 4, 60, vec![], &mut rng);

        assert!(!config.plots.is_empty());
        for plot in &config.plots {
            assert!(plot.lx >= CELL_MARGIN);
            assert!(plot.lz >= CELL_MARGIN);
            assert!(plot.lx + plot.w <= CELL_GRID_SIZE - CELL_MARGIN);
            assert!(plot.lz + plot.h <= CELL_GRID_SIZE - CELL_MARGIN);
            assert!(plot.w > 0 && plot.h > 0);
        }
    }

    #[test]
    fn test_plaza_cell_has_plaza_plot() {
        let mut rng = feature_rng(7, "village-1");
        let config = design_cell(CellRole::Plaza, 4, 60, vec![], &mut rng);
        assert!(config.plots.iter().any(|p| p.kind == "plaza"));
    }

    #[test]
    fn test_village_parameter_round_trip() {
        let mut rng = feature_rng(7, "village-1");
        let config = design_cell(CellRole::Plaza, 4, 60, vec![Side::East], &mut rng);

        let village: VillageParam =
            serde_json::from_str(&config.to_village_parameter()).unwrap();
        assert_eq!(village.level, 60);
        assert_eq!(village.plots, config.plots);

        let road: StreetParam =
            serde_json::from_str(&config.to_road_parameter().unwrap()).unwrap();
        assert_eq!(road.route[0].side, Side::East);
        assert_eq!(road.route[0].road_type, "street");
    }

    #[test]
    fn test_layout_is_deterministic() {
        let build = || {
            let mut rng = feature_rng(99, "town-1");
            design_cell(CellRole::Dwellings, 4, 50, vec![], &mut rng)
        };
        assert_eq!(build(), build());
    }
}
