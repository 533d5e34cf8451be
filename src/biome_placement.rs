//! Biome and continent placement
//!
//! Assigns hex coordinates to every area feature: picks a target size from
//! the declared range, resolves candidate centers from the feature's
//! positions, then grows the footprint as a CIRCLE region or a LINE walk.
//! Collisions with already-placed biomes trigger bounded retries; everything
//! is driven by the feature's own RNG stream so results replay exactly.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::composition::{
    AreaFeature, AreaShape, AreaType, Composition, Feature, FeatureStatus, ParamMap,
};
use crate::error::ComposeError;
use crate::hex::{Hex, Side};
use crate::seeds::feature_rng;

/// Attempts per position before falling through to the next position.
const N_RETRIES: i32 = 12;
/// Full passes over all positions, with growing distance jitter.
const N_OUTER: i32 = 5;

/// An area feature with concrete coordinates on the lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedBiome {
    pub feature_id: String,
    pub name: String,
    pub area_type: AreaType,
    pub continent_id: Option<String>,
    pub center: Hex,
    /// All cells of the footprint, in claim order; a single 6-connected
    /// component.
    pub coordinates: Vec<Hex>,
    pub actual_size: usize,
    pub parameters: ParamMap,
}

impl PlacedBiome {
    pub fn contains(&self, hex: Hex) -> bool {
        self.coordinates.contains(&hex)
    }

    /// Closest footprint cell to a reference cell.
    pub fn closest_cell(&self, to: Hex) -> Hex {
        self.coordinates
            .iter()
            .copied()
            .min_by_key(|cell| (cell.distance(to), *cell))
            .unwrap_or(self.center)
    }
}

/// Output of the placement stage.
#[derive(Debug, Default, PartialEq)]
pub struct BiomePlacementResult {
    pub placed: Vec<PlacedBiome>,
    /// Which feature claimed each cell.
    pub claimed: HashMap<Hex, String>,
    /// Total center candidates rejected across all features.
    pub retries: u32,
    pub errors: Vec<ComposeError>,
    pub success: bool,
}

impl BiomePlacementResult {
    /// Look a placed biome up by feature id or name.
    pub fn find(&self, reference: &str) -> Option<&PlacedBiome> {
        self.placed
            .iter()
            .find(|b| b.feature_id == reference)
            .or_else(|| self.placed.iter().find(|b| b.name == reference))
    }
}

/// Place every area feature of the composition.
///
/// Features are processed in a stable order: descending priority of their
/// first position, then insertion order. For a fixed (seed, composition)
/// the result is exactly reproducible.
pub fn compose_biomes(composition: &mut Composition, stage_seed: u64) -> BiomePlacementResult {
    let mut result = BiomePlacementResult {
        success: true,
        ..Default::default()
    };

    let mut order: Vec<usize> = composition
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| matches!(f, Feature::Area(_)))
        .map(|(i, _)| i)
        .collect();
    order.sort_by_key(|&i| {
        let Feature::Area(area) = &composition.features[i] else {
            unreachable!()
        };
        -area.positions.first().map_or(0, |p| p.priority)
    });

    for index in order {
        let Feature::Area(area) = composition.features[index].clone() else {
            continue;
        };
        if area.header.status == FeatureStatus::Failed {
            continue;
        }

        let mut rng = feature_rng(stage_seed, &area.header.feature_id);
        match place_area(&area, &result, &mut rng) {
            Ok((placed, rejected)) => {
                debug!(
                    "placed '{}' at {} with {} cells",
                    placed.name,
                    placed.center,
                    placed.actual_size
                );
                result.retries += rejected;
                for cell in &placed.coordinates {
                    result.claimed.insert(*cell, placed.feature_id.clone());
                }
                result.placed.push(placed);
                composition.features[index].header_mut().status = FeatureStatus::Composed;
            }
            Err(error) => {
                warn!("placement failed for '{}': {error}", area.header.name);
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

/// Place one area: sample a size, resolve a free center, grow the shape.
fn place_area(
    area: &AreaFeature,
    current: &BiomePlacementResult,
    rng: &mut ChaCha8Rng,
) -> Result<(PlacedBiome, u32), ComposeError> {
    let (size_from, size_to) = area.effective_size();
    let positions = effective_positions(area);
    let mut rejected = 0u32;

    for jitter in 0..N_OUTER {
        let target = rng.gen_range(size_from..=size_to).max(1) as usize;

        for position in &positions {
            let Some(anchor) = resolve_anchor(&position.anchor, current) else {
                continue;
            };
            let side = position.side();

            for attempt in 0..N_RETRIES {
                let span = position.distance_to - position.distance_from;
                let base = if span > 0 {
                    position.distance_from + rng.gen_range(0..=span)
                } else {
                    position.distance_from
                };
                let distance = base + attempt + jitter;
                let center = anchor.translate(side, distance);

                if current.claimed.contains_key(&center) {
                    rejected += 1;
                    continue;
                }

                let grown = match area.shape {
                    AreaShape::Circle => grow_circle(center, target, &current.claimed, rng),
                    AreaShape::Line => {
                        walk_line(center, target, side, area.deviation_probabilities(), &current.claimed, rng)
                    }
                };
                match grown {
                    Some(coordinates) => {
                        let actual_size = coordinates.len();
                        return Ok((
                            PlacedBiome {
                                feature_id: area.header.feature_id.clone(),
                                name: area.header.name.clone(),
                                area_type: area.area_type,
                                continent_id: area.continent_id.clone(),
                                center,
                                coordinates,
                                actual_size,
                                parameters: area.header.parameters.clone(),
                            },
                            rejected,
                        ));
                    }
                    None => rejected += 1,
                }
            }
        }
    }

    Err(ComposeError::PlacementExhausted {
        feature: area.header.name.clone(),
        attempts: (N_OUTER * positions.len() as i32 * N_RETRIES) as u32,
    })
}

/// An area with no declared positions sits at the origin.
fn effective_positions(area: &AreaFeature) -> Vec<crate::composition::Position> {
    if area.positions.is_empty() {
        vec![crate::composition::Position {
            direction: None,
            direction_angle: None,
            distance_from: 0,
            distance_to: 0,
            anchor: "origin".into(),
            priority: 0,
            resolved_side: Some(Side::NorthEast),
        }]
    } else {
        area.positions.clone()
    }
}

/// Resolve an anchor name to a hex: the origin, or the center of a biome
/// placed earlier in this run. Unplaced anchors yield None and the position
/// is skipped.
fn resolve_anchor(anchor: &str, current: &BiomePlacementResult) -> Option<Hex> {
    if anchor == "origin" {
        return Some(Hex::ORIGIN);
    }
    current.find(anchor).map(|biome| biome.center)
}

/// Grow a connected CIRCLE region of exactly `target` unclaimed cells.
///
/// Each step extends the region by one unclaimed 6-neighbor of the frontier.
/// Candidates are enumerated in (q, r) lexicographic order before the RNG
/// picks one, so equal seeds replay the same region.
fn grow_circle(
    center: Hex,
    target: usize,
    claimed: &HashMap<Hex, String>,
    rng: &mut ChaCha8Rng,
) -> Option<Vec<Hex>> {
    if claimed.contains_key(&center) {
        return None;
    }
    let mut cells = vec![center];
    let mut members: HashSet<Hex> = cells.iter().copied().collect();

    while cells.len() < target {
        let mut frontier: Vec<Hex> = cells
            .iter()
            .flat_map(|cell| cell.neighbors())
            .filter(|n| !members.contains(n) && !claimed.contains_key(n))
            .collect();
        frontier.sort();
        frontier.dedup();
        if frontier.is_empty() {
            return None;
        }
        let next = frontier[rng.gen_range(0..frontier.len())];
        members.insert(next);
        cells.push(next);
    }
    Some(cells)
}

/// Walk a LINE of `target` distinct cells from `center` along `primary`.
///
/// Each step may deviate 60 degrees left or right for a single step with the
/// configured probabilities, then reverts to the primary direction. Claimed
/// cells block the walk; a blocked step tries the two rotations before
/// giving up. Returns None when the walk cannot reach the target size.
fn walk_line(
    center: Hex,
    target: usize,
    primary: Side,
    deviation: (f64, f64),
    claimed: &HashMap<Hex, String>,
    rng: &mut ChaCha8Rng,
) -> Option<Vec<Hex>> {
    if claimed.contains_key(&center) {
        return None;
    }
    let (dev_left, dev_right) = deviation;
    let mut cells = vec![center];
    let mut members: HashSet<Hex> = cells.iter().copied().collect();
    let mut current = center;

    // The walk may revisit its own cells after a deviation; cap the step
    // count so a blocked line terminates.
    let mut steps_left = target * 4 + 8;
    while members.len() < target && steps_left > 0 {
        steps_left -= 1;

        let roll: f64 = rng.gen();
        let preferred = if roll < dev_left {
            primary.rotate_ccw()
        } else if roll < dev_left + dev_right {
            primary.rotate_cw()
        } else {
            primary
        };

        let mut stepped = false;
        for side in [preferred, primary, preferred.rotate_cw(), preferred.rotate_ccw()] {
            let next = current.neighbor(side);
            if !claimed.contains_key(&next) {
                current = next;
                if members.insert(next) {
                    cells.push(next);
                }
                stepped = true;
                break;
            }
        }
        if !stepped {
            break;
        }
    }

    if members.len() == target {
        Some(cells)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{Compass, FeatureHeader, Position};
    use crate::seeds::CompositionSeeds;

    fn area(id: &str, area_type: AreaType, shape: AreaShape, positions: Vec<Position>) -> Feature {
        Feature::Area(AreaFeature {
            header: FeatureHeader {
                name: id.into(),
                feature_id: id.into(),
                ..Default::default()
            },
            area_type,
            shape,
            size_from: 4,
            size_to: 6,
            positions,
            continent_id: None,
            height: None,
            deviation_left: None,
            deviation_right: None,
            deviation_tendency: None,
            direction_deviation: None,
            calculated_size_from: None,
            calculated_size_to: None,
        })
    }

    fn position(direction: Compass, from: i32, to: i32, anchor: &str, priority: i32) -> Position {
        Position {
            direction: Some(direction),
            direction_angle: None,
            distance_from: from,
            distance_to: to,
            anchor: anchor.into(),
            priority,
            resolved_side: None,
        }
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

    fn connected(cells: &[Hex]) -> bool {
        let members: HashSet<Hex> = cells.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut stack = vec![cells[0]];
        seen.insert(cells[0]);
        while let Some(cell) = stack.pop() {
            for n in cell.neighbors() {
                if members.contains(&n) && seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        seen.len() == members.len()
    }

    #[test]
    fn test_single_circle_biome() {
        let mut comp = composition(vec![area("f1", AreaType::Forest, AreaShape::Circle, vec![])]);
        let seeds = CompositionSeeds::from_master(12345);
        let result = compose_biomes(&mut comp, seeds.biomes);

        assert!(result.success);
        let biome = &result.placed[0];
        assert!(biome.actual_size >= 4 && biome.actual_size <= 6);
        assert_eq!(biome.actual_size, biome.coordinates.len());
        assert!(connected(&biome.coordinates));
        assert_eq!(comp.features[0].header().status, FeatureStatus::Composed);
    }

    #[test]
    fn test_two_biomes_are_disjoint() {
        let mut comp = composition(vec![
            area("f1", AreaType::Forest, AreaShape::Circle, vec![]),
            area(
                "m1",
                AreaType::Mountains,
                AreaShape::Circle,
                vec![position(Compass::N, 5, 7, "origin", 0)],
            ),
        ]);
        let seeds = CompositionSeeds::from_master(12345);
        let result = compose_biomes(&mut comp, seeds.biomes);

        assert!(result.success);
        assert_eq!(result.placed.len(), 2);
        let a: HashSet<Hex> = result.placed[0].coordinates.iter().copied().collect();
        let b: HashSet<Hex> = result.placed[1].coordinates.iter().copied().collect();
        assert!(a.is_disjoint(&b));
    }

    #[test]
    fn test_priority_orders_placement() {
        let mut comp = composition(vec![
            area(
                "low",
                AreaType::Forest,
                AreaShape::Circle,
                vec![position(Compass::E, 0, 0, "origin", 1)],
            ),
            area(
                "high",
                AreaType::Plains,
                AreaShape::Circle,
                vec![position(Compass::E, 0, 0, "origin", 9)],
            ),
        ]);
        let seeds = CompositionSeeds::from_master(7);
        let result = compose_biomes(&mut comp, seeds.biomes);

        // The high-priority feature placed first
        assert_eq!(result.placed[0].feature_id, "high");
    }

    #[test]
    fn test_anchor_on_other_feature() {
        let mut comp = composition(vec![
            area("f1", AreaType::Forest, AreaShape::Circle, vec![]),
            area(
                "m1",
                AreaType::Mountains,
                AreaShape::Circle,
                vec![position(Compass::Se, 6, 8, "f1", 0)],
            ),
        ]);
        let seeds = CompositionSeeds::from_master(99);
        let result = compose_biomes(&mut comp, seeds.biomes);

        assert!(result.success);
        let forest = result.find("f1").unwrap();
        let mountains = result.find("m1").unwrap();
        let distance = forest.center.distance(mountains.center);
        // Jitter and collision retries may push the center outward a little
        assert!(distance >= 6, "distance {distance}");
    }

    #[test]
    fn test_line_shape_respects_size() {
        let mut line = area(
            "l1",
            AreaType::Mountains,
            AreaShape::Line,
            vec![position(Compass::E, 0, 0, "origin", 0)],
        );
        if let Feature::Area(a) = &mut line {
            a.deviation_tendency = Some(crate::composition::DeviationTendency::Moderate);
        }
        let mut comp = composition(vec![line]);
        let seeds = CompositionSeeds::from_master(4242);
        let result = compose_biomes(&mut comp, seeds.biomes);

        assert!(result.success);
        let biome = &result.placed[0];
        assert!(biome.actual_size >= 4 && biome.actual_size <= 6);
        assert!(connected(&biome.coordinates));
    }

    #[test]
    fn test_deterministic_replay() {
        let build = || {
            composition(vec![
                area("f1", AreaType::Forest, AreaShape::Circle, vec![]),
                area(
                    "m1",
                    AreaType::Mountains,
                    AreaShape::Circle,
                    vec![position(Compass::N, 5, 7, "origin", 0)],
                ),
            ])
        };
        let seeds = CompositionSeeds::from_master(12345);
        let mut a = build();
        let mut b = build();
        let result_a = compose_biomes(&mut a, seeds.biomes);
        let result_b = compose_biomes(&mut b, seeds.biomes);

        assert_eq!(result_a.placed, result_b.placed);
        assert_eq!(a, b);
    }
}
