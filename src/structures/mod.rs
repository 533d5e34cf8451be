//! Structure design
//!
//! Turns structure features (villages, towns) into per-cell plot layouts
//! and street descriptors from a named template. The template registry is a
//! capability supplied by the caller; `templates::BuiltinTemplates` covers
//! the stock layouts.

pub mod layout;
pub mod templates;

use std::collections::BTreeMap;

use log::{debug, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::biome_placement::BiomePlacementResult;
use crate::composition::{Composition, Feature, FeatureStatus, ParamMap, StructureFeature};
use crate::error::ComposeError;
use crate::hex::Hex;
use crate::seeds::feature_rng;

use layout::{design_cell, GridConfig};
use templates::{TemplateProvider, VillageTemplate};

/// Designed layout of one structure: one grid config per footprint cell.
#[derive(Clone, Debug)]
pub struct DesignResult {
    /// Builder tag for the cells: "village" or "town".
    pub builder: String,
    pub cells: BTreeMap<Hex, GridConfig>,
}

/// Output of the structure stage.
#[derive(Debug, Default, PartialEq)]
pub struct StructureDesignResult {
    /// Parameters to merge onto the plan, keyed by cell.
    pub cell_params: BTreeMap<Hex, ParamMap>,
    pub designed: usize,
    pub errors: Vec<ComposeError>,
    pub success: bool,
}

/// Design a template at a concrete anchor cell.
pub fn design(
    template: &VillageTemplate,
    anchor: Hex,
    base_level: i32,
    rng: &mut ChaCha8Rng,
) -> DesignResult {
    let footprint_cells: Vec<Hex> = template
        .footprint
        .iter()
        .map(|c| anchor.add(c.offset))
        .collect();

    let mut cells = BTreeMap::new();
    for footprint in &template.footprint {
        let cell = anchor.add(footprint.offset);
        // Boundary streets run toward the neighboring footprint cells
        let streets = crate::hex::Side::ALL
            .into_iter()
            .filter(|side| footprint_cells.contains(&cell.neighbor(*side)))
            .collect();
        cells.insert(
            cell,
            design_cell(
                footprint.role,
                template.plots_per_axis,
                base_level,
                streets,
                rng,
            ),
        );
    }

    DesignResult {
        builder: template.builder.to_string(),
        cells,
    }
}

/// Design every structure feature of the composition.
pub fn compose_structures(
    composition: &mut Composition,
    placement: &BiomePlacementResult,
    provider: &dyn TemplateProvider,
    stage_seed: u64,
) -> StructureDesignResult {
    let mut result = StructureDesignResult {
        success: true,
        ..Default::default()
    };

    // Anchor cells of structures designed earlier in this run, so later
    // structures can anchor on them.
    let mut designed_anchors: Vec<(String, String, Hex)> = Vec::new();

    for index in 0..composition.features.len() {
        let Feature::Structure(structure) = composition.features[index].clone() else {
            continue;
        };
        if structure.header.status == FeatureStatus::Failed {
            continue;
        }

        match design_structure(&structure, composition, placement, &designed_anchors, provider, stage_seed) {
            Ok((anchor, designed)) => {
                for (cell, config) in &designed.cells {
                    let params = result.cell_params.entry(*cell).or_default();
                    params.insert("g_builder".into(), designed.builder.clone());
                    params.insert("g_village".into(), config.to_village_parameter());
                    if let Some(road) = config.to_road_parameter() {
                        params.insert("road".into(), road);
                    }
                }
                debug!(
                    "designed structure '{}' over {} cells",
                    structure.header.name,
                    designed.cells.len()
                );
                designed_anchors.push((
                    structure.header.feature_id.clone(),
                    structure.header.name.clone(),
                    anchor,
                ));
                composition.features[index].header_mut().status = FeatureStatus::Composed;
                result.designed += 1;
            }
            Err(error) => {
                warn!("structure '{}' failed: {error}", structure.header.name);
                composition.features[index]
                    .header_mut()
                    .set_failed(error.to_string());
                if error.is_fatal() {
                    result.success = false;
                }
                result.errors.push(error);
            }
        }
    }

    result
}

fn design_structure(
    structure: &StructureFeature,
    composition: &Composition,
    placement: &BiomePlacementResult,
    designed_anchors: &[(String, String, Hex)],
    provider: &dyn TemplateProvider,
    stage_seed: u64,
) -> Result<(Hex, DesignResult), ComposeError> {
    let template = provider
        .template(&structure.template)
        .ok_or_else(|| ComposeError::TemplateNotFound {
            template: structure.template.clone(),
        })?;

    let mut rng = feature_rng(stage_seed, &structure.header.feature_id);
    let anchor = resolve_anchor(structure, composition, placement, designed_anchors, &mut rng)?;
    Ok((anchor, design(template, anchor, structure.base_level, &mut rng)))
}

/// Anchor cell from the structure's first position, or the origin.
///
/// The anchor name may reference a placed biome, a placed point, or a
/// structure designed earlier in this run. A name that resolves to nothing
/// concrete fails the structure instead of silently landing at the origin.
fn resolve_anchor(
    structure: &StructureFeature,
    composition: &Composition,
    placement: &BiomePlacementResult,
    designed_anchors: &[(String, String, Hex)],
    rng: &mut ChaCha8Rng,
) -> Result<Hex, ComposeError> {
    let Some(position) = structure.positions.first() else {
        return Ok(Hex::ORIGIN);
    };
    let base = resolve_anchor_cell(&position.anchor, composition, placement, designed_anchors)
        .ok_or_else(|| ComposeError::UnknownTarget {
            feature: structure.header.name.clone(),
            target: position.anchor.clone(),
        })?;
    let span = position.distance_to - position.distance_from;
    let distance = if span > 0 {
        position.distance_from + rng.gen_range(0..=span)
    } else {
        position.distance_from
    };
    Ok(base.translate(position.side(), distance))
}

fn resolve_anchor_cell(
    anchor: &str,
    composition: &Composition,
    placement: &BiomePlacementResult,
    designed_anchors: &[(String, String, Hex)],
) -> Option<Hex> {
    if anchor == "origin" {
        return Some(Hex::ORIGIN);
    }
    if let Some(biome) = placement.find(anchor) {
        return Some(biome.center);
    }
    if let Some(Feature::Point(point)) = composition.find_feature(anchor) {
        return point.placed_coordinate;
    }
    designed_anchors
        .iter()
        .find(|(id, name, _)| id == anchor || name == anchor)
        .map(|(_, _, cell)| *cell)
}
