//! Gap filling
//!
//! Expands sparse biome placements into a complete tile field in four
//! passes: continent paths, a land buffer ring, a coast ring, and ocean
//! border rings. The continent pass guarantees that any two areas sharing a
//! continent id end up connected over land cells.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use log::debug;

use crate::biome_placement::BiomePlacementResult;
use crate::composition::{Composition, ParamMap};
use crate::defaults::apply_defaults;
use crate::grid::{CellKind, FilledCell, FilledHexGrid, FillerKind};
use crate::hex::Hex;

/// Output of the gap fill stage.
#[derive(Debug, Default, PartialEq)]
pub struct HexGridFillResult {
    pub grid: FilledHexGrid,
    pub continent_cells: usize,
    pub land_cells: usize,
    pub coast_cells: usize,
    pub ocean_cells: usize,
}

impl HexGridFillResult {
    /// Cells added by fillers, excluding the original biome footprints.
    pub fn filled_cells(&self) -> usize {
        self.continent_cells + self.land_cells + self.coast_cells + self.ocean_cells
    }
}

/// Fill the gaps around the placed biomes.
pub fn fill(
    placement: &BiomePlacementResult,
    composition: &Composition,
    ocean_border_rings: u32,
) -> HexGridFillResult {
    let mut result = HexGridFillResult::default();

    // Seed the grid with the placed biome footprints
    for biome in &placement.placed {
        let mut parameters = biome.parameters.clone();
        parameters
            .entry("biome".into())
            .or_insert_with(|| biome.area_type.display_name().to_string());
        parameters
            .entry("biomeName".into())
            .or_insert_with(|| biome.name.clone());
        if let Some(continent_id) = &biome.continent_id {
            parameters
                .entry("continentId".into())
                .or_insert_with(|| continent_id.clone());
        }
        for cell in &biome.coordinates {
            result.grid.insert(
                *cell,
                FilledCell {
                    kind: CellKind::Biome {
                        feature_id: biome.feature_id.clone(),
                    },
                    parameters: parameters.clone(),
                },
            );
        }
    }

    fill_continents(placement, composition, &mut result);
    fill_land(placement, &mut result);
    fill_coast(placement, &mut result);
    fill_ocean(ocean_border_rings, &mut result);

    debug!(
        "gap fill: {} continent, {} land, {} coast, {} ocean cells",
        result.continent_cells, result.land_cells, result.coast_cells, result.ocean_cells
    );
    result
}

/// Connect all areas sharing a continent id with filler paths.
///
/// For each pair of member biomes, a shortest hex path is found by BFS over
/// cells not claimed by a foreign biome, and unclaimed path cells become
/// continent filler carrying the continent declaration's parameters.
fn fill_continents(
    placement: &BiomePlacementResult,
    composition: &Composition,
    result: &mut HexGridFillResult,
) {
    // Continent ids in declaration order, then ids only present on areas
    let mut continent_ids: Vec<String> = composition
        .continents
        .iter()
        .map(|c| c.continent_id.clone())
        .collect();
    for biome in &placement.placed {
        if let Some(id) = &biome.continent_id {
            if !continent_ids.contains(id) {
                continent_ids.push(id.clone());
            }
        }
    }

    for continent_id in continent_ids {
        let members: Vec<usize> = placement
            .placed
            .iter()
            .enumerate()
            .filter(|(_, b)| b.continent_id.as_deref() == Some(continent_id.as_str()))
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            continue;
        }

        // Cells of biomes outside this continent are obstacles
        let mut obstacles: HashSet<Hex> = HashSet::new();
        for biome in &placement.placed {
            if biome.continent_id.as_deref() != Some(continent_id.as_str()) {
                obstacles.extend(biome.coordinates.iter().copied());
            }
        }

        let mut parameters = composition
            .find_continent(&continent_id)
            .map(|c| c.parameters.clone())
            .unwrap_or_default();
        parameters
            .entry("continentId".into())
            .or_insert_with(|| continent_id.clone());
        let kind = if parameters.get("g_builder").map(String::as_str) == Some("mountain") {
            FillerKind::Mountain
        } else {
            FillerKind::Continent
        };
        apply_defaults(
            &mut parameters,
            &[("g_builder", kind.builder_name()), ("biome", kind.display_name())],
        );

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let from = &placement.placed[members[i]];
                let to = &placement.placed[members[j]];
                let Some(path) = shortest_path(
                    &from.coordinates,
                    &to.coordinates,
                    &obstacles,
                ) else {
                    continue;
                };
                for cell in path {
                    if !result.grid.contains(cell) {
                        result.grid.insert(
                            cell,
                            FilledCell {
                                kind: CellKind::Filler(kind),
                                parameters: parameters.clone(),
                            },
                        );
                        result.continent_cells += 1;
                    }
                }
            }
        }
    }
}

/// Multi-source BFS from `from` until any cell of `to` is reached, stepping
/// only over non-obstacle cells within the obstacle bounding region.
/// Neighbors are visited in canonical side order, so the path is
/// deterministic.
fn shortest_path(from: &[Hex], to: &[Hex], obstacles: &HashSet<Hex>) -> Option<Vec<Hex>> {
    let targets: HashSet<Hex> = to.iter().copied().collect();

    // Bound the search so a fully blocked pair terminates: obstacles are
    // finite, so a detour never needs to leave their bounding box by more
    // than one ring plus the endpoints' own extent.
    let mut all_bounds: Vec<Hex> = from.to_vec();
    all_bounds.extend(to.iter().copied());
    all_bounds.extend(obstacles.iter().copied());
    let (min_q, max_q, min_r, max_r) = bounds(&all_bounds);
    let in_bounds = |hex: Hex| {
        hex.q >= min_q - 2 && hex.q <= max_q + 2 && hex.r >= min_r - 2 && hex.r <= max_r + 2
    };

    let mut parent: HashMap<Hex, Hex> = HashMap::new();
    let mut visited: HashSet<Hex> = HashSet::new();
    let mut queue = VecDeque::new();
    let mut sorted_from = from.to_vec();
    sorted_from.sort();
    for cell in sorted_from {
        visited.insert(cell);
        queue.push_back(cell);
    }

    while let Some(cell) = queue.pop_front() {
        if targets.contains(&cell) {
            // Rebuild the path back to the source set
            let mut path = vec![cell];
            let mut cursor = cell;
            while let Some(prev) = parent.get(&cursor) {
                path.push(*prev);
                cursor = *prev;
            }
            path.reverse();
            return Some(path);
        }
        for next in cell.neighbors() {
            if !in_bounds(next) || obstacles.contains(&next) || !visited.insert(next) {
                continue;
            }
            parent.insert(next, cell);
            queue.push_back(next);
        }
    }
    None
}

fn bounds(cells: &[Hex]) -> (i32, i32, i32, i32) {
    let mut min_q = i32::MAX;
    let mut max_q = i32::MIN;
    let mut min_r = i32::MAX;
    let mut max_r = i32::MIN;
    for cell in cells {
        min_q = min_q.min(cell.q);
        max_q = max_q.max(cell.q);
        min_r = min_r.min(cell.r);
        max_r = max_r.max(cell.r);
    }
    (min_q, max_q, min_r, max_r)
}

/// One buffer ring of land filler beyond every land biome.
fn fill_land(placement: &BiomePlacementResult, result: &mut HexGridFillResult) {
    let mut seeds: BTreeSet<Hex> = BTreeSet::new();
    for biome in &placement.placed {
        if biome.area_type.is_land() {
            seeds.extend(biome.coordinates.iter().copied());
        }
    }
    // Continent filler counts as land for buffering
    for (hex, cell) in result.grid.iter() {
        if matches!(
            cell.kind.filler(),
            Some(FillerKind::Continent | FillerKind::Mountain)
        ) {
            seeds.insert(*hex);
        }
    }

    let mut ring: BTreeSet<Hex> = BTreeSet::new();
    for seed in &seeds {
        for next in seed.neighbors() {
            if !result.grid.contains(next) {
                ring.insert(next);
            }
        }
    }

    let mut parameters = ParamMap::new();
    apply_defaults(
        &mut parameters,
        &[
            ("g_builder", FillerKind::Land.builder_name()),
            ("g_offset", "1"),
            ("biome", FillerKind::Land.display_name()),
        ],
    );
    for cell in ring {
        result.grid.insert(
            cell,
            FilledCell {
                kind: CellKind::Filler(FillerKind::Land),
                parameters: parameters.clone(),
            },
        );
        result.land_cells += 1;
    }
}

/// One ring of coast: unclaimed cells touching land on one side and open
/// water or emptiness on another.
fn fill_coast(placement: &BiomePlacementResult, result: &mut HexGridFillResult) {
    let is_land_cell = |grid: &FilledHexGrid, hex: Hex| {
        grid.get(hex).is_some_and(|cell| match &cell.kind {
            CellKind::Filler(kind) => {
                matches!(kind, FillerKind::Land | FillerKind::Continent | FillerKind::Mountain)
            }
            CellKind::Biome { feature_id } => placement
                .find(feature_id)
                .is_some_and(|b| b.area_type.is_land()),
        })
    };
    let is_open = |grid: &FilledHexGrid, hex: Hex| match grid.get(hex) {
        None => true,
        Some(cell) => match &cell.kind {
            CellKind::Filler(kind) => *kind == FillerKind::Ocean,
            CellKind::Biome { feature_id } => placement
                .find(feature_id)
                .is_some_and(|b| !b.area_type.is_land()),
        },
    };

    let mut ring: BTreeSet<Hex> = BTreeSet::new();
    let land_cells: Vec<Hex> = result
        .grid
        .iter()
        .filter(|(hex, _)| is_land_cell(&result.grid, **hex))
        .map(|(hex, _)| *hex)
        .collect();
    for cell in land_cells {
        for candidate in cell.neighbors() {
            if result.grid.contains(candidate) || ring.contains(&candidate) {
                continue;
            }
            let touches_open = candidate
                .neighbors()
                .iter()
                .any(|n| is_open(&result.grid, *n));
            if touches_open {
                ring.insert(candidate);
            }
        }
    }

    let mut parameters = ParamMap::new();
    apply_defaults(
        &mut parameters,
        &[
            ("g_builder", FillerKind::Coast.builder_name()),
            ("g_offset", "0"),
            ("biome", FillerKind::Coast.display_name()),
        ],
    );
    for cell in ring {
        result.grid.insert(
            cell,
            FilledCell {
                kind: CellKind::Filler(FillerKind::Coast),
                parameters: parameters.clone(),
            },
        );
        result.coast_cells += 1;
    }
}

/// The configured number of ocean rings around everything placed so far.
fn fill_ocean(rings: u32, result: &mut HexGridFillResult) {
    let mut parameters = ParamMap::new();
    apply_defaults(
        &mut parameters,
        &[
            ("g_builder", FillerKind::Ocean.builder_name()),
            ("g_offset", "-8"),
            ("biome", FillerKind::Ocean.display_name()),
        ],
    );

    for _ in 0..rings {
        let mut ring: BTreeSet<Hex> = BTreeSet::new();
        for (hex, _) in result.grid.iter() {
            for next in hex.neighbors() {
                if !result.grid.contains(next) {
                    ring.insert(next);
                }
            }
        }
        for cell in ring {
            result.grid.insert(
                cell,
                FilledCell {
                    kind: CellKind::Filler(FillerKind::Ocean),
                    parameters: parameters.clone(),
                },
            );
            result.ocean_cells += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome_placement::PlacedBiome;
    use crate::composition::AreaType;
    use crate::hex;

    fn biome(id: &str, area_type: AreaType, continent: Option<&str>, cells: Vec<Hex>) -> PlacedBiome {
        PlacedBiome {
            feature_id: id.into(),
            name: id.into(),
            area_type,
            continent_id: continent.map(String::from),
            center: cells[0],
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

    fn empty_composition() -> Composition {
        Composition {
            world_id: Some("w1".into()),
            name: "test".into(),
            seed: None,
            features: vec![],
            continents: vec![],
        }
    }

    #[test]
    fn test_continent_members_get_connected() {
        let a = biome("a", AreaType::Mountains, Some("main"), vec![Hex::new(0, 0)]);
        let b = biome("b", AreaType::Mountains, Some("main"), vec![Hex::new(8, 0)]);
        let placement = placement(vec![a, b]);

        let result = fill(&placement, &empty_composition(), 0);
        assert!(result.continent_cells > 0);

        // Walk from a to b over same-continent cells only
        let mut stack = vec![Hex::new(0, 0)];
        let mut seen: HashSet<Hex> = stack.iter().copied().collect();
        let mut reached = false;
        while let Some(cell) = stack.pop() {
            if cell == Hex::new(8, 0) {
                reached = true;
                break;
            }
            for next in cell.neighbors() {
                let on_continent = result.grid.get(next).is_some_and(|c| {
                    c.parameters.get("continentId").map(String::as_str) == Some("main")
                });
                if on_continent && seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        assert!(reached, "continent members not connected");
    }

    #[test]
    fn test_continent_path_avoids_foreign_biomes() {
        let a = biome("a", AreaType::Mountains, Some("main"), vec![Hex::new(0, 0)]);
        let b = biome("b", AreaType::Mountains, Some("main"), vec![Hex::new(6, 0)]);
        // A wall of foreign cells across the direct line
        let wall: Vec<Hex> = (-3..=3).map(|r| Hex::new(3, r)).collect();
        let foreign = biome("f", AreaType::Forest, Some("other"), wall.clone());
        let placement = placement(vec![a, b, foreign]);

        let result = fill(&placement, &empty_composition(), 0);
        for cell in wall {
            let owner = result.grid.get(cell).unwrap();
            assert!(matches!(owner.kind, CellKind::Biome { .. }));
        }
        assert!(result.continent_cells > 0);
    }

    #[test]
    fn test_land_ring_is_one_deep() {
        let forest = biome("f", AreaType::Forest, None, vec![Hex::new(0, 0)]);
        let placement = placement(vec![forest]);
        let result = fill(&placement, &empty_composition(), 0);

        assert_eq!(result.land_cells, 6);
        for cell in hex::ring(Hex::new(0, 0), 1) {
            assert_eq!(
                result.grid.get(cell).unwrap().kind.filler(),
                Some(FillerKind::Land)
            );
        }
    }

    #[test]
    fn test_coast_surrounds_land() {
        let forest = biome("f", AreaType::Forest, None, vec![Hex::new(0, 0)]);
        let placement = placement(vec![forest]);
        let result = fill(&placement, &empty_composition(), 0);

        // The second ring is coast
        assert_eq!(result.coast_cells, 12);
        for cell in hex::ring(Hex::new(0, 0), 2) {
            assert_eq!(
                result.grid.get(cell).unwrap().kind.filler(),
                Some(FillerKind::Coast),
                "cell {cell} is not coast"
            );
        }
    }

    #[test]
    fn test_ocean_border_rings() {
        let forest = biome("f", AreaType::Forest, None, vec![Hex::new(0, 0)]);
        let placement = placement(vec![forest]);
        let result = fill(&placement, &empty_composition(), 2);

        // Rings at radius 3 and 4 around the single-cell biome
        assert_eq!(result.ocean_cells, 18 + 24);
        assert_eq!(
            result.grid.get(Hex::new(4, -4)).unwrap().kind.filler(),
            Some(FillerKind::Ocean)
        );
    }

    #[test]
    fn test_ocean_biome_gets_no_land_buffer() {
        let ocean = biome("o", AreaType::Ocean, None, vec![Hex::new(0, 0)]);
        let placement = placement(vec![ocean]);
        let result = fill(&placement, &empty_composition(), 0);

        assert_eq!(result.land_cells, 0);
        assert_eq!(result.coast_cells, 0);
    }
}
