//! Closed-loop and side walls
//!
//! A wall whose start and end point coincide is routed as a hex ring around
//! that point. A side wall is not routed at all: it decorates the boundary
//! cells of a target biome with per-side wall descriptors.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::biome_placement::BiomePlacementResult;
use crate::composition::{Composition, Feature, FlowFeature, FlowKind};
use crate::error::ComposeError;
use crate::hex::{self, Hex, Side};
use crate::seeds::feature_rng;

use super::{loop_radius, segment_for, FlowComposeResult, SegmentEnd, SideWallCell};

/// Route a closed-loop wall on the ring around its anchor point.
///
/// The ring is traversed in canonical order, so the emitted cells and their
/// entry/exit sides are deterministic; the last cell connects back to the
/// first.
pub fn compose_closed_loop(
    flow: &FlowFeature,
    composition: &Composition,
    stage_seed: u64,
    result: &mut FlowComposeResult,
) -> Result<(), ComposeError> {
    let reference = flow
        .start_point_id
        .as_deref()
        .ok_or_else(|| ComposeError::UnknownTarget {
            feature: flow.header.name.clone(),
            target: "<missing startPointId>".into(),
        })?;
    let center = match composition.find_feature(reference) {
        Some(Feature::Point(point)) => point.placed_coordinate,
        _ => None,
    }
    .ok_or_else(|| ComposeError::UnknownTarget {
        feature: flow.header.name.clone(),
        target: reference.to_string(),
    })?;

    let mut rng = feature_rng(stage_seed, &flow.header.feature_id);
    let radius = loop_radius(flow, &mut rng);
    let ring = hex::ring(center, radius);
    let count = ring.len();

    for (i, cell) in ring.iter().enumerate() {
        let prev = ring[(i + count - 1) % count];
        let next = ring[(i + 1) % count];
        let from = cell.side_towards(prev).map(SegmentEnd::Side);
        let to = cell.side_towards(next).map(SegmentEnd::Side);
        result
            .segments
            .entry(*cell)
            .or_default()
            .push(segment_for(flow, from, to));
    }

    result.routes.insert(flow.header.feature_id.clone(), ring);
    Ok(())
}

/// Decorate the boundary of a target biome with side wall descriptors.
///
/// Every cell within `distance` hexes of the biome boundary whose outward
/// sides intersect the configured side set gets a `SideWallCell`; the cell
/// parameter synthesis later renders these as `g_sidewall` JSON.
pub fn compose_side_wall(
    flow: &FlowFeature,
    placement: &BiomePlacementResult,
    result: &mut FlowComposeResult,
) -> Result<(), ComposeError> {
    let FlowKind::SideWall {
        target_biome_id,
        sides,
        distance,
        minimum,
        height,
        ..
    } = &flow.kind
    else {
        return Err(ComposeError::Internal("not a side wall".into()));
    };

    let target = placement
        .find(target_biome_id)
        .ok_or_else(|| ComposeError::UnknownTarget {
            feature: flow.header.name.clone(),
            target: target_biome_id.clone(),
        })?;
    let members: HashSet<Hex> = target.coordinates.iter().copied().collect();
    let configured: Vec<Side> = if sides.is_empty() {
        Side::ALL.to_vec()
    } else {
        sides.clone()
    };

    // BFS inward from the boundary. Each boundary cell seeds the walk with
    // the configured sides that actually face out of the biome from it, and
    // deeper cells inherit (and union) the sets of the boundary cells they
    // descend from, so no cell is tagged with a side it has no outward
    // reach on.
    let mut depth: HashMap<Hex, i32> = HashMap::new();
    let mut side_sets: HashMap<Hex, Vec<Side>> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut boundary: Vec<Hex> = target
        .coordinates
        .iter()
        .copied()
        .filter(|cell| cell.neighbors().iter().any(|n| !members.contains(n)))
        .collect();
    boundary.sort();
    for cell in &boundary {
        let outward: Vec<Side> = configured
            .iter()
            .copied()
            .filter(|side| !members.contains(&cell.neighbor(*side)))
            .collect();
        if outward.is_empty() {
            continue;
        }
        depth.insert(*cell, 0);
        side_sets.insert(*cell, outward);
        queue.push_back(*cell);
    }
    while let Some(cell) = queue.pop_front() {
        let Some(&d) = depth.get(&cell) else {
            continue;
        };
        if d >= *distance {
            continue;
        }
        let inherited = side_sets.get(&cell).cloned().unwrap_or_default();
        for next in cell.neighbors() {
            if !members.contains(&next) {
                continue;
            }
            match depth.get(&next) {
                None => {
                    depth.insert(next, d + 1);
                    side_sets.insert(next, inherited.clone());
                    queue.push_back(next);
                }
                // Another boundary front reaches this cell at the same
                // depth; it faces out both ways
                Some(&known) if known == d + 1 => {
                    if let Some(set) = side_sets.get_mut(&next) {
                        for side in &inherited {
                            if !set.contains(side) {
                                set.push(*side);
                            }
                        }
                    }
                }
                Some(_) => {}
            }
        }
    }

    let mut cells: Vec<Hex> = depth.keys().copied().collect();
    cells.sort();
    for cell in cells {
        let Some(sides) = side_sets.get(&cell) else {
            continue;
        };
        let mut sides = sides.clone();
        sides.sort();
        result.sidewalls.entry(cell).or_default().push(SideWallCell {
            flow_feature_id: flow.header.feature_id.clone(),
            height: *height,
            level: flow.level,
            width: flow.width_blocks,
            distance: *distance,
            minimum: *minimum,
            sides,
        });
    }

    Ok(())
}
