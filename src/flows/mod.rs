//! Flow composition
//!
//! Routes linear features (roads, rivers, walls, side walls) across the
//! filled grid and records, per crossed cell, a segment describing where the
//! flow enters and leaves. Closed-loop and side walls are handled in
//! `walls`; pathfinding with curvature lives in `routing`; the JSON cell
//! descriptors are synthesized in `params`.

pub mod params;
pub mod routing;
pub mod walls;

use std::collections::BTreeMap;

use log::{debug, warn};
use rand::Rng;

use crate::biome_placement::BiomePlacementResult;
use crate::composition::{Composition, Feature, FeatureStatus, FlowFeature, FlowKind};
use crate::error::ComposeError;
use crate::gap_fill::HexGridFillResult;
use crate::hex::{Hex, Side};
use crate::seeds::feature_rng;

use routing::{RouteOutcome, Router};

/// One end of a segment: a cell edge, or a local coordinate for flows
/// terminating at a point inside the cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentEnd {
    Side(Side),
    Local { lx: i32, lz: i32 },
}

impl SegmentEnd {
    pub fn side(&self) -> Option<Side> {
        match self {
            SegmentEnd::Side(side) => Some(*side),
            SegmentEnd::Local { .. } => None,
        }
    }
}

/// How one flow crosses one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowSegment {
    pub flow_feature_id: String,
    /// "road", "river" or "wall".
    pub flow_type: String,
    pub from: Option<SegmentEnd>,
    pub to: Option<SegmentEnd>,
    pub width: i32,
    pub level: i32,
    /// Rivers only.
    pub depth: Option<i32>,
    /// Roads only.
    pub road_type: Option<String>,
}

/// A side wall descriptor attached to one boundary cell.
#[derive(Clone, Debug, PartialEq)]
pub struct SideWallCell {
    pub flow_feature_id: String,
    pub height: i32,
    pub level: i32,
    pub width: i32,
    pub distance: i32,
    pub minimum: i32,
    pub sides: Vec<Side>,
}

/// Output of the flow stage.
#[derive(Debug, Default, PartialEq)]
pub struct FlowComposeResult {
    /// Per-cell segments, in flow composition order.
    pub segments: BTreeMap<Hex, Vec<FlowSegment>>,
    /// Per-cell side wall descriptors.
    pub sidewalls: BTreeMap<Hex, Vec<SideWallCell>>,
    /// Ordered route of every composed flow, for merge targets.
    pub routes: BTreeMap<String, Vec<Hex>>,
    pub total_segments: usize,
    pub composed: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<ComposeError>,
    pub success: bool,
}

/// A resolved flow endpoint.
#[derive(Clone, Copy, Debug)]
enum Endpoint {
    /// A point feature: cell plus local coordinates.
    Point { cell: Hex, lx: i32, lz: i32 },
    /// A biome or flow: just a cell.
    Cell(Hex),
}

impl Endpoint {
    fn cell(self) -> Hex {
        match self {
            Endpoint::Point { cell, .. } => cell,
            Endpoint::Cell(cell) => cell,
        }
    }

    fn local(self) -> Option<SegmentEnd> {
        match self {
            Endpoint::Point { lx, lz, .. } => Some(SegmentEnd::Local { lx, lz }),
            Endpoint::Cell(_) => None,
        }
    }
}

/// Compose every flow feature, in insertion order.
pub fn compose_flows(
    composition: &mut Composition,
    placement: &BiomePlacementResult,
    fill: &HexGridFillResult,
    stage_seed: u64,
) -> FlowComposeResult {
    let mut result = FlowComposeResult {
        success: true,
        ..Default::default()
    };

    for index in 0..composition.features.len() {
        let Feature::Flow(flow) = composition.features[index].clone() else {
            continue;
        };
        if flow.header.status == FeatureStatus::Failed {
            continue;
        }

        let outcome = if let FlowKind::SideWall { .. } = flow.kind {
            walls::compose_side_wall(&flow, placement, &mut result)
        } else if flow.is_closed_loop() {
            walls::compose_closed_loop(&flow, composition, stage_seed, &mut result)
        } else {
            compose_open_flow(&flow, composition, placement, fill, stage_seed, &mut result)
        };

        match outcome {
            Ok(()) => {
                composition.features[index].header_mut().status = FeatureStatus::Composed;
                result.composed += 1;
            }
            Err(error) => {
                warn!("flow '{}' failed: {error}", flow.header.name);
                composition.features[index]
                    .header_mut()
                    .set_failed(error.to_string());
                if flow.force {
                    result.success = false;
                }
                result.errors.push(error);
            }
        }
    }

    result.total_segments = result.segments.values().map(Vec::len).sum();
    debug!(
        "composed {} flows, {} segments",
        result.composed, result.total_segments
    );
    result
}

/// Route an open (non-loop) flow between its endpoints and emit segments.
fn compose_open_flow(
    flow: &FlowFeature,
    composition: &Composition,
    placement: &BiomePlacementResult,
    fill: &HexGridFillResult,
    stage_seed: u64,
    result: &mut FlowComposeResult,
) -> Result<(), ComposeError> {
    let start_ref = flow
        .start_point_id
        .as_deref()
        .ok_or_else(|| ComposeError::UnknownTarget {
            feature: flow.header.name.clone(),
            target: "<missing startPointId>".into(),
        })?;
    let end_ref = match (&flow.end_point_id, &flow.kind) {
        (Some(end), _) => end.as_str(),
        (None, FlowKind::River {
            merge_to_id: Some(merge_to),
            ..
        }) => merge_to.as_str(),
        _ => {
            return Err(ComposeError::UnknownTarget {
                feature: flow.header.name.clone(),
                target: "<missing endPointId>".into(),
            })
        }
    };

    // Resolve both ends; biome endpoints pick the footprint cell closest to
    // the opposite end.
    let rough_start = resolve_endpoint(start_ref, flow, composition, placement, result, None)?;
    let end = resolve_endpoint(end_ref, flow, composition, placement, result, Some(rough_start.cell()))?;
    let start = resolve_endpoint(start_ref, flow, composition, placement, result, Some(end.cell()))?;

    // Waypoints between the endpoints, each resolved relative to the
    // previous leg's end.
    let mut leg_targets: Vec<Endpoint> = Vec::new();
    let mut cursor = start.cell();
    for waypoint in &flow.waypoint_ids {
        let resolved =
            resolve_endpoint(waypoint, flow, composition, placement, result, Some(cursor))?;
        cursor = resolved.cell();
        leg_targets.push(resolved);
    }
    leg_targets.push(end);

    let mut rng = feature_rng(stage_seed, &flow.header.feature_id);
    let router = Router::new(flow, placement, fill);

    let mut route: Vec<Hex> = vec![start.cell()];
    let mut truncated = false;
    for target in &leg_targets {
        let from = *route.last().ok_or_else(|| {
            ComposeError::Internal("route lost its starting cell".into())
        })?;
        match router.route(from, target.cell(), flow.curvature(), &mut rng) {
            RouteOutcome::Reached(cells) => {
                route.extend(cells.into_iter().skip(1));
            }
            RouteOutcome::MergedIntoOcean(cells) => {
                route.extend(cells.into_iter().skip(1));
                truncated = true;
                break;
            }
            RouteOutcome::Unreachable => {
                return Err(ComposeError::Unreachable {
                    feature: flow.header.name.clone(),
                    from: from.to_string(),
                    to: target.cell().to_string(),
                });
            }
        }
    }

    if truncated {
        result.warnings.push(format!(
            "river '{}' merged into ocean at {} before reaching '{}'",
            flow.header.name,
            route.last().map(|h| h.to_string()).unwrap_or_default(),
            end_ref
        ));
    }

    emit_segments(flow, &route, start.local(), if truncated { None } else { end.local() }, result);
    result.routes.insert(flow.header.feature_id.clone(), route);
    Ok(())
}

/// Resolve an endpoint reference: a placed point, a placed biome, or an
/// already-routed flow.
fn resolve_endpoint(
    reference: &str,
    flow: &FlowFeature,
    composition: &Composition,
    placement: &BiomePlacementResult,
    result: &FlowComposeResult,
    toward: Option<Hex>,
) -> Result<Endpoint, ComposeError> {
    if let Some(Feature::Point(point)) = composition.find_feature(reference) {
        if let (Some(cell), Some(lx), Some(lz)) =
            (point.placed_coordinate, point.placed_lx, point.placed_lz)
        {
            return Ok(Endpoint::Point { cell, lx, lz });
        }
        return Err(ComposeError::UnknownTarget {
            feature: flow.header.name.clone(),
            target: reference.to_string(),
        });
    }

    if let Some(biome) = placement.find(reference) {
        let cell = match toward {
            Some(hint) => biome.closest_cell(hint),
            None => biome.center,
        };
        return Ok(Endpoint::Cell(cell));
    }

    // A previously routed flow (rivers merging into rivers)
    if let Some(feature) = composition.find_feature(reference) {
        if let Some(route) = result.routes.get(feature.feature_id()) {
            let cell = match toward {
                Some(hint) => route
                    .iter()
                    .copied()
                    .min_by_key(|cell| (cell.distance(hint), *cell))
                    .unwrap_or(route[0]),
                None => route[0],
            };
            return Ok(Endpoint::Cell(cell));
        }
    }

    Err(ComposeError::UnknownTarget {
        feature: flow.header.name.clone(),
        target: reference.to_string(),
    })
}

/// Write one segment per routed cell. Interior cells carry entry and exit
/// sides; endpoint cells carry the point's local coordinates when the flow
/// is bound to a point.
pub(crate) fn emit_segments(
    flow: &FlowFeature,
    route: &[Hex],
    start_local: Option<SegmentEnd>,
    end_local: Option<SegmentEnd>,
    result: &mut FlowComposeResult,
) {
    let last = route.len().saturating_sub(1);
    for (i, cell) in route.iter().enumerate() {
        let from = if i > 0 {
            route[i - 1]
                .side_towards(*cell)
                .map(|side| SegmentEnd::Side(side.opposite()))
        } else {
            start_local
        };
        let to = if i < last {
            cell.side_towards(route[i + 1]).map(SegmentEnd::Side)
        } else {
            end_local
        };
        result
            .segments
            .entry(*cell)
            .or_default()
            .push(segment_for(flow, from, to));
    }
}

pub(crate) fn segment_for(
    flow: &FlowFeature,
    from: Option<SegmentEnd>,
    to: Option<SegmentEnd>,
) -> FlowSegment {
    let (depth, road_type) = match &flow.kind {
        FlowKind::River { depth, .. } => (Some(*depth), None),
        FlowKind::Road { road_type } => (None, Some(road_type.clone())),
        _ => (None, None),
    };
    FlowSegment {
        flow_feature_id: flow.header.feature_id.clone(),
        flow_type: flow.kind.type_name().to_string(),
        from,
        to,
        width: flow.width_blocks,
        level: flow.level,
        depth,
        road_type,
    }
}

/// Sample the closed-loop radius from the flow's size range.
pub(crate) fn loop_radius(flow: &FlowFeature, rng: &mut impl Rng) -> i32 {
    let from = flow.size_from.unwrap_or(1).max(1);
    let to = flow.size_to.unwrap_or(from).max(from);
    if to > from {
        rng.gen_range(from..=to)
    } else {
        from
    }
}
