//! Point placement
//!
//! Snaps zero-size point features into a concrete cell of their target
//! biome, honoring the INSIDE/EDGE mode, avoid filters and prefer-near
//! scoring, then assigns local (lx, lz) coordinates within the cell.

use std::collections::HashSet;

use log::warn;
use rand::Rng;

use crate::biome_placement::BiomePlacementResult;
use crate::composition::{Composition, Feature, FeatureStatus, SnapMode};
use crate::error::ComposeError;
use crate::hex::Hex;
use crate::seeds::feature_rng;

/// Local coordinate space of one cell, shared with the voxel builders.
pub const CELL_GRID_SIZE: i32 = 32;
/// Points keep this many blocks away from the cell border.
pub const CELL_MARGIN: i32 = 4;

/// A point feature with concrete coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedPoint {
    pub feature_id: String,
    pub cell: Hex,
    pub lx: i32,
    pub lz: i32,
    /// Feature id of the biome the point landed in.
    pub in_biome: String,
}

/// Output of the point placement stage.
#[derive(Debug, Default, PartialEq)]
pub struct PointPlacementResult {
    pub placed: Vec<PlacedPoint>,
    pub errors: Vec<ComposeError>,
    pub success: bool,
}

/// Place every point feature of the composition.
pub fn compose_points(
    composition: &mut Composition,
    placement: &BiomePlacementResult,
    stage_seed: u64,
) -> PointPlacementResult {
    let mut result = PointPlacementResult {
        success: true,
        ..Default::default()
    };

    for index in 0..composition.features.len() {
        let Feature::Point(point) = &composition.features[index] else {
            continue;
        };
        if point.header.status == FeatureStatus::Failed {
            continue;
        }
        let feature_name = point.header.name.clone();

        match place_point(&composition.features[index], placement, stage_seed) {
            Ok(placed) => {
                let Feature::Point(point) = &mut composition.features[index] else {
                    unreachable!()
                };
                point.placed_coordinate = Some(placed.cell);
                point.placed_lx = Some(placed.lx);
                point.placed_lz = Some(placed.lz);
                point.placed_in_biome = Some(placed.in_biome.clone());
                point.header.status = FeatureStatus::Composed;
                result.placed.push(placed);
            }
            Err(error) => {
                warn!("point placement failed for '{feature_name}': {error}");
                composition.features[index]
                    .header_mut()
                    .set_failed(error.to_string());
                result.errors.push(error);
                result.success = false;
            }
        }
    }

    result
}

fn place_point(
    feature: &Feature,
    placement: &BiomePlacementResult,
    stage_seed: u64,
) -> Result<PlacedPoint, ComposeError> {
    let Feature::Point(point) = feature else {
        return Err(ComposeError::Internal("not a point feature".into()));
    };

    let target = placement
        .find(&point.snap.target)
        .ok_or_else(|| ComposeError::UnknownTarget {
            feature: point.header.name.clone(),
            target: point.snap.target.clone(),
        })?;
    let target_cells: HashSet<Hex> = target.coordinates.iter().copied().collect();

    // Candidate cells by snap mode
    let mut candidates: Vec<Hex> = target
        .coordinates
        .iter()
        .copied()
        .filter(|cell| {
            let inside = cell.neighbors().iter().all(|n| target_cells.contains(n));
            match point.snap.mode {
                SnapMode::Inside => inside,
                SnapMode::Edge => !inside,
            }
        })
        .collect();
    candidates.sort();

    // Drop cells touching any avoid biome
    let mut avoid_cells: HashSet<Hex> = HashSet::new();
    for name in &point.snap.avoid {
        if let Some(biome) = placement.find(name) {
            avoid_cells.extend(biome.coordinates.iter().copied());
        }
    }
    candidates.retain(|cell| {
        !avoid_cells.contains(cell) && !cell.neighbors().iter().any(|n| avoid_cells.contains(n))
    });

    if candidates.is_empty() {
        return Err(ComposeError::PlacementExhausted {
            feature: point.header.name.clone(),
            attempts: target.coordinates.len() as u32,
        });
    }

    // Prefer cells close to the preferNear biomes; candidates are already
    // in lex order, so min_by_key settles score ties deterministically.
    let mut near_cells: Vec<Hex> = Vec::new();
    for name in &point.snap.prefer_near {
        if let Some(biome) = placement.find(name) {
            near_cells.extend(biome.coordinates.iter().copied());
        }
    }
    let score = |cell: Hex| {
        near_cells
            .iter()
            .map(|n| cell.distance(*n))
            .min()
            .unwrap_or(0)
    };
    let chosen = candidates
        .iter()
        .copied()
        .min_by_key(|cell| (score(*cell), *cell))
        .ok_or_else(|| ComposeError::Internal("empty candidate set".into()))?;

    // Local coordinates from the point's own stream
    let mut rng = feature_rng(stage_seed, &point.header.feature_id);
    let lx = CELL_MARGIN + rng.gen_range(0..CELL_GRID_SIZE - 2 * CELL_MARGIN);
    let lz = CELL_MARGIN + rng.gen_range(0..CELL_GRID_SIZE - 2 * CELL_MARGIN);

    Ok(PlacedPoint {
        feature_id: point.header.feature_id.clone(),
        cell: chosen,
        lx,
        lz,
        in_biome: target.feature_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome_placement::PlacedBiome;
    use crate::composition::{
        AreaType, FeatureHeader, ParamMap, PointFeature, SnapConfig,
    };
    use crate::hex;
    use crate::seeds::CompositionSeeds;

    fn blob(id: &str, center: Hex, radius: i32) -> PlacedBiome {
        let cells = hex::spiral(center, radius);
        PlacedBiome {
            feature_id: id.into(),
            name: id.into(),
            area_type: AreaType::Plains,
            continent_id: None,
            center,
            actual_size: cells.len(),
            coordinates: cells,
            parameters: ParamMap::new(),
        }
    }

    fn placement(placed: Vec<PlacedBiome>) -> BiomePlacementResult {
        let mut result = BiomePlacementResult {
            success: true,
            ..Default::default()
        };
        for biome in placed {
            for cell in &biome.coordinates {
                result.claimed.insert(*cell, biome.feature_id.clone());
            }
            result.placed.push(biome);
        }
        result
    }

    fn point(id: &str, mode: SnapMode, target: &str, avoid: Vec<&str>, near: Vec<&str>) -> Feature {
        Feature::Point(PointFeature {
            header: FeatureHeader {
                name: id.into(),
                feature_id: id.into(),
                ..Default::default()
            },
            snap: SnapConfig {
                mode,
                target: target.into(),
                avoid: avoid.into_iter().map(String::from).collect(),
                prefer_near: near.into_iter().map(String::from).collect(),
            },
            placed_coordinate: None,
            placed_lx: None,
            placed_lz: None,
            placed_in_biome: None,
        })
    }

    fn composition(features: Vec<Feature>) -> Composition {
        Composition {
            world_id: Some("w1".into()),
            name: "test".into(),
            seed: None,
            features,
            continents: vec![],
        }
    }

    #[test]
    fn test_inside_point_has_all_neighbors_in_target() {
        let plains = blob("plains", Hex::ORIGIN, 3);
        let cells: HashSet<Hex> = plains.coordinates.iter().copied().collect();
        let placement = placement(vec![plains]);
        let mut comp = composition(vec![point("p1", SnapMode::Inside, "plains", vec![], vec![])]);

        let seeds = CompositionSeeds::from_master(54321);
        let result = compose_points(&mut comp, &placement, seeds.points);
        assert!(result.success);

        let placed = &result.placed[0];
        for n in placed.cell.neighbors() {
            assert!(cells.contains(&n));
        }
        assert!(placed.lx >= CELL_MARGIN && placed.lx < CELL_GRID_SIZE - CELL_MARGIN);
        assert!(placed.lz >= CELL_MARGIN && placed.lz < CELL_GRID_SIZE - CELL_MARGIN);
    }

    #[test]
    fn test_edge_point_touches_outside() {
        let plains = blob("plains", Hex::ORIGIN, 2);
        let cells: HashSet<Hex> = plains.coordinates.iter().copied().collect();
        let placement = placement(vec![plains]);
        let mut comp = composition(vec![point("p1", SnapMode::Edge, "plains", vec![], vec![])]);

        let seeds = CompositionSeeds::from_master(54321);
        let result = compose_points(&mut comp, &placement, seeds.points);
        assert!(result.success);

        let placed = &result.placed[0];
        assert!(placed
            .cell
            .neighbors()
            .iter()
            .any(|n| !cells.contains(n)));
    }

    #[test]
    fn test_avoid_filter_keeps_distance() {
        let plains = blob("plains", Hex::ORIGIN, 3);
        let forest = blob("forest", Hex::new(4, 0), 1);
        let forest_cells: HashSet<Hex> = forest.coordinates.iter().copied().collect();
        let placement = placement(vec![plains, forest]);
        let mut comp = composition(vec![point(
            "p1",
            SnapMode::Inside,
            "plains",
            vec!["forest"],
            vec![],
        )]);

        let seeds = CompositionSeeds::from_master(54321);
        let result = compose_points(&mut comp, &placement, seeds.points);
        assert!(result.success);

        let placed = &result.placed[0];
        assert!(!forest_cells.contains(&placed.cell));
        for n in placed.cell.neighbors() {
            assert!(!forest_cells.contains(&n));
        }
    }

    #[test]
    fn test_prefer_near_pulls_point_over() {
        let plains = blob("plains", Hex::ORIGIN, 3);
        let forest = blob("forest", Hex::new(6, 0), 1);
        let placement = placement(vec![plains, forest]);
        let mut comp = composition(vec![point(
            "p1",
            SnapMode::Inside,
            "plains",
            vec![],
            vec!["forest"],
        )]);

        let seeds = CompositionSeeds::from_master(54321);
        let result = compose_points(&mut comp, &placement, seeds.points);
        let placed = &result.placed[0];

        // The inside cell closest to the forest is on the eastern rim of the
        // inner region
        assert_eq!(placed.cell, Hex::new(2, 0));
    }

    #[test]
    fn test_unknown_target_fails_feature() {
        let placement = placement(vec![]);
        let mut comp = composition(vec![point("p1", SnapMode::Inside, "nowhere", vec![], vec![])]);

        let seeds = CompositionSeeds::from_master(54321);
        let result = compose_points(&mut comp, &placement, seeds.points);
        assert!(!result.success);
        assert!(matches!(result.errors[0], ComposeError::UnknownTarget { .. }));
        assert_eq!(comp.features[0].header().status, FeatureStatus::Failed);
    }

    #[test]
    fn test_replay_is_identical() {
        let plains = blob("plains", Hex::ORIGIN, 3);
        let placement_a = placement(vec![plains.clone()]);
        let placement_b = placement(vec![plains]);
        let seeds = CompositionSeeds::from_master(777);

        let mut comp_a = composition(vec![point("p1", SnapMode::Inside, "plains", vec![], vec![])]);
        let mut comp_b = comp_a.clone();
        let a = compose_points(&mut comp_a, &placement_a, seeds.points);
        let b = compose_points(&mut comp_b, &placement_b, seeds.points);

        assert_eq!(a.placed, b.placed);
        assert_eq!(comp_a, comp_b);
    }
}
