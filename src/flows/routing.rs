//! Flow pathfinding
//!
//! A* over the filled grid with terrain-aware step costs, wrapped in a
//! walker that applies the flow's curvature: after each step the route may
//! wiggle 60 degrees left or right when that does not take it meaningfully
//! farther from the goal.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::biome_placement::BiomePlacementResult;
use crate::composition::{FlowFeature, FlowKind};
use crate::gap_fill::HexGridFillResult;
use crate::grid::{CellKind, FillerKind};
use crate::hex::Hex;

/// Terrain class a cell presents to the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Terrain {
    Ocean,
    Mountain,
    Open,
    Missing,
}

/// Result of routing one leg.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Full path from start to goal, inclusive.
    Reached(Vec<Hex>),
    /// River with `force=false` entered open water; path ends there.
    MergedIntoOcean(Vec<Hex>),
    Unreachable,
}

/// Node for the A* priority queue. Orders by estimated total cost, then by
/// cell, so equal-cost frontiers pop deterministically.
#[derive(Clone, Copy)]
struct PathNode {
    cell: Hex,
    estimate: f64,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.estimate == other.estimate && self.cell == other.cell
    }
}

impl Eq for PathNode {}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse cost ordering for a min-heap; cell order breaks ties
        other
            .estimate
            .partial_cmp(&self.estimate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

/// Routing context for one flow.
pub struct Router<'a> {
    fill: &'a HexGridFillResult,
    placement: &'a BiomePlacementResult,
    avoid: HashSet<Hex>,
    is_river: bool,
    is_wall: bool,
    force: bool,
}

impl<'a> Router<'a> {
    pub fn new(
        flow: &FlowFeature,
        placement: &'a BiomePlacementResult,
        fill: &'a HexGridFillResult,
    ) -> Self {
        let mut avoid = HashSet::new();
        for name in &flow.avoid {
            if let Some(biome) = placement.find(name) {
                avoid.extend(biome.coordinates.iter().copied());
            }
        }
        Self {
            fill,
            placement,
            avoid,
            is_river: matches!(flow.kind, FlowKind::River { .. }),
            is_wall: matches!(flow.kind, FlowKind::Wall { .. }),
            force: flow.force,
        }
    }

    fn terrain(&self, cell: Hex) -> Terrain {
        match self.fill.grid.get(cell) {
            None => Terrain::Missing,
            Some(filled) => match &filled.kind {
                CellKind::Filler(FillerKind::Ocean) => Terrain::Ocean,
                CellKind::Filler(FillerKind::Mountain) => Terrain::Mountain,
                CellKind::Filler(_) => Terrain::Open,
                CellKind::Biome { feature_id } => match self.placement.find(feature_id) {
                    Some(biome) if !biome.area_type.is_land() => Terrain::Ocean,
                    Some(biome)
                        if biome.area_type == crate::composition::AreaType::Mountains =>
                    {
                        Terrain::Mountain
                    }
                    _ => Terrain::Open,
                },
            },
        }
    }

    /// Cost of stepping onto a cell; None when the cell is off limits.
    fn step_cost(&self, cell: Hex) -> Option<f64> {
        if self.avoid.contains(&cell) {
            return None;
        }
        let penalty: f64 = match self.terrain(cell) {
            Terrain::Missing => return None,
            Terrain::Ocean if self.is_river => -1.0,
            Terrain::Ocean => 4.0,
            Terrain::Mountain if self.is_wall => 0.0,
            Terrain::Mountain => 3.0,
            Terrain::Open => 0.0,
        };
        Some((1.0 + penalty).max(0.25))
    }

    fn passable(&self, cell: Hex) -> bool {
        self.step_cost(cell).is_some()
    }

    /// Route from `start` to `goal`, applying curvature per step.
    pub fn route(
        &self,
        start: Hex,
        goal: Hex,
        curvature: (f64, f64),
        rng: &mut ChaCha8Rng,
    ) -> RouteOutcome {
        if start == goal {
            return RouteOutcome::Reached(vec![start]);
        }
        let (tend_left, tend_right) = curvature;
        let mut route = vec![start];
        let mut current = start;
        let mut previous: Option<Hex> = None;
        let max_steps = (start.distance(goal) as usize) * 6 + 64;

        while current != goal {
            if route.len() > max_steps {
                return RouteOutcome::Unreachable;
            }

            let Some(path) = self.astar(current, goal) else {
                return RouteOutcome::Unreachable;
            };
            let mut next = path[1];

            // Optional wiggle: rotate the planned step 60 degrees, but only
            // when it stays passable and does not lose more than one hex of
            // progress toward the goal.
            let roll: f64 = rng.gen();
            let wiggle = current.side_towards(next).and_then(|side| {
                if roll < tend_left {
                    Some(side.rotate_ccw())
                } else if roll < tend_left + tend_right {
                    Some(side.rotate_cw())
                } else {
                    None
                }
            });
            if let Some(side) = wiggle {
                let candidate = current.neighbor(side);
                if Some(candidate) != previous
                    && candidate != goal
                    && self.passable(candidate)
                    && candidate.distance(goal) <= next.distance(goal) + 1
                {
                    next = candidate;
                }
            }

            previous = Some(current);
            current = next;
            route.push(next);

            if self.is_river && !self.force && self.terrain(next) == Terrain::Ocean {
                return RouteOutcome::MergedIntoOcean(collapse_backtracks(route));
            }
        }

        RouteOutcome::Reached(collapse_backtracks(route))
    }

    /// Plain A* from `start` to `goal`. Returns the full path, or None.
    fn astar(&self, start: Hex, goal: Hex) -> Option<Vec<Hex>> {
        let mut open = BinaryHeap::new();
        let mut best_cost: HashMap<Hex, f64> = HashMap::new();
        let mut came_from: HashMap<Hex, Hex> = HashMap::new();

        best_cost.insert(start, 0.0);
        open.push(PathNode {
            cell: start,
            estimate: start.distance(goal) as f64,
        });

        while let Some(PathNode { cell, estimate }) = open.pop() {
            if cell == goal {
                let mut path = vec![goal];
                let mut cursor = goal;
                while let Some(prev) = came_from.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            let cost_here = *best_cost.get(&cell)?;
            if estimate - cost_here > cell.distance(goal) as f64 + 1e-9 {
                continue; // stale queue entry
            }

            for next in cell.neighbors() {
                let Some(step) = self.step_cost(next) else {
                    continue;
                };
                let tentative = cost_here + step;
                if best_cost
                    .get(&next)
                    .map_or(true, |known| tentative < known - 1e-9)
                {
                    best_cost.insert(next, tentative);
                    came_from.insert(next, cell);
                    open.push(PathNode {
                        cell: next,
                        estimate: tentative + next.distance(goal) as f64,
                    });
                }
            }
        }
        None
    }
}

/// Remove immediate a-b-a backtracks a wiggle can introduce, so a cell's
/// entry and exit sides always differ.
fn collapse_backtracks(route: Vec<Hex>) -> Vec<Hex> {
    let mut cells = route;
    loop {
        let mut changed = false;
        let mut i = 1;
        while i + 1 < cells.len() {
            if cells[i - 1] == cells[i + 1] {
                cells.drain(i..=i + 1);
                changed = true;
            } else {
                i += 1;
            }
        }
        if !changed {
            return cells;
        }
    }
}
