//! Flow cell parameter synthesis
//!
//! Converts per-cell flow segments into the user-visible JSON descriptors
//! carried in the cell parameter map: `road`, `river`, `wall` and
//! `g_sidewall`. Serde struct order keeps the emitted keys stable so the
//! descriptors round-trip byte for byte.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::composition::ParamMap;
use crate::hex::{Hex, Side};

use super::{FlowComposeResult, FlowSegment, SegmentEnd};

/// `road` descriptor: all road crossings of one cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadParam {
    pub level: i32,
    pub route: Vec<RoadLeg>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadLeg {
    pub side: Side,
    pub width: i32,
    #[serde(rename = "type")]
    pub road_type: String,
}

/// `river` descriptor: directional crossings of one cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverParam {
    pub group_id: String,
    pub from: Vec<RiverEnd>,
    pub to: Vec<RiverEnd>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiverEnd {
    pub side: Side,
    pub width: i32,
    pub depth: i32,
}

/// `wall` descriptor, same shape as a road route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallParam {
    pub level: i32,
    pub route: Vec<WallLeg>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallLeg {
    pub side: Side,
    pub width: i32,
}

/// `g_sidewall` descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideWallParam {
    pub height: i32,
    pub level: i32,
    pub width: i32,
    pub distance: i32,
    pub minimum: i32,
    pub sides: Vec<Side>,
}

/// Render all flow state into per-cell parameter maps.
pub fn synthesize(result: &FlowComposeResult) -> BTreeMap<Hex, ParamMap> {
    let mut out: BTreeMap<Hex, ParamMap> = BTreeMap::new();

    for (cell, segments) in &result.segments {
        let params = out.entry(*cell).or_default();

        let roads: Vec<&FlowSegment> =
            segments.iter().filter(|s| s.flow_type == "road").collect();
        if !roads.is_empty() {
            let road = RoadParam {
                level: roads[0].level,
                route: roads
                    .iter()
                    .flat_map(|s| segment_sides(s))
                    .map(|(side, segment)| RoadLeg {
                        side,
                        width: segment.width,
                        road_type: segment.road_type.clone().unwrap_or_default(),
                    })
                    .collect(),
            };
            params.insert("road".into(), to_json(&road));
        }

        let rivers: Vec<&FlowSegment> =
            segments.iter().filter(|s| s.flow_type == "river").collect();
        if !rivers.is_empty() {
            let river = RiverParam {
                group_id: rivers[0].flow_feature_id.clone(),
                from: river_ends(&rivers, |s| s.from),
                to: river_ends(&rivers, |s| s.to),
            };
            params.insert("river".into(), to_json(&river));
        }

        let walls: Vec<&FlowSegment> =
            segments.iter().filter(|s| s.flow_type == "wall").collect();
        if !walls.is_empty() {
            let wall = WallParam {
                level: walls[0].level,
                route: walls
                    .iter()
                    .flat_map(|s| segment_sides(s))
                    .map(|(side, segment)| WallLeg {
                        side,
                        width: segment.width,
                    })
                    .collect(),
            };
            params.insert("wall".into(), to_json(&wall));
        }
    }

    for (cell, sidewalls) in &result.sidewalls {
        let params = out.entry(*cell).or_default();
        let first = &sidewalls[0];
        // A cell decorated twice merges the side sets
        let mut sides: Vec<Side> = Vec::new();
        for wall in sidewalls {
            for side in &wall.sides {
                if !sides.contains(side) {
                    sides.push(*side);
                }
            }
        }
        let descriptor = SideWallParam {
            height: first.height,
            level: first.level,
            width: first.width,
            distance: first.distance,
            minimum: first.minimum,
            sides,
        };
        params.insert("g_sidewall".into(), to_json(&descriptor));
    }

    out
}

/// Both Side-typed ends of a segment, from first.
fn segment_sides(segment: &FlowSegment) -> Vec<(Side, &FlowSegment)> {
    [segment.from, segment.to]
        .into_iter()
        .flatten()
        .filter_map(|end| end.side())
        .map(|side| (side, segment))
        .collect()
}

fn river_ends(
    rivers: &[&FlowSegment],
    pick: impl Fn(&FlowSegment) -> Option<SegmentEnd>,
) -> Vec<RiverEnd> {
    rivers
        .iter()
        .filter_map(|segment| {
            pick(segment).and_then(|end| end.side()).map(|side| RiverEnd {
                side,
                width: segment.width,
                depth: segment.depth.unwrap_or(0),
            })
        })
        .collect()
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(
        flow_type: &str,
        id: &str,
        from: Option<Side>,
        to: Option<Side>,
        depth: Option<i32>,
    ) -> FlowSegment {
        FlowSegment {
            flow_feature_id: id.into(),
            flow_type: flow_type.into(),
            from: from.map(SegmentEnd::Side),
            to: to.map(SegmentEnd::Side),
            width: 3,
            level: 95,
            depth,
            road_type: if flow_type == "road" {
                Some("paved".into())
            } else {
                None
            },
        }
    }

    #[test]
    fn test_road_descriptor_round_trip() {
        let mut result = FlowComposeResult::default();
        result.segments.entry(Hex::ORIGIN).or_default().push(segment(
            "road",
            "road-1",
            Some(Side::West),
            Some(Side::East),
            None,
        ));

        let params = synthesize(&result);
        let json = &params[&Hex::ORIGIN]["road"];
        assert!(json.contains("\"WEST\""));
        assert!(json.contains("\"EAST\""));
        assert!(json.contains("\"type\":\"paved\""));

        let parsed: RoadParam = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.level, 95);
        assert_eq!(parsed.route.len(), 2);
        assert_eq!(to_json(&parsed), *json);
    }

    #[test]
    fn test_river_descriptor_keeps_direction() {
        let mut result = FlowComposeResult::default();
        result.segments.entry(Hex::ORIGIN).or_default().push(segment(
            "river",
            "river-1",
            Some(Side::NorthWest),
            Some(Side::SouthEast),
            Some(2),
        ));

        let params = synthesize(&result);
        let parsed: RiverParam = serde_json::from_str(&params[&Hex::ORIGIN]["river"]).unwrap();
        assert_eq!(parsed.group_id, "river-1");
        assert_eq!(parsed.from[0].side, Side::NorthWest);
        assert_eq!(parsed.to[0].side, Side::SouthEast);
        assert_eq!(parsed.from[0].depth, 2);
    }

    #[test]
    fn test_endpoint_cell_has_single_sided_descriptor() {
        let mut result = FlowComposeResult::default();
        result.segments.entry(Hex::ORIGIN).or_default().push(segment(
            "river",
            "river-1",
            None,
            Some(Side::East),
            Some(1),
        ));

        let params = synthesize(&result);
        let parsed: RiverParam = serde_json::from_str(&params[&Hex::ORIGIN]["river"]).unwrap();
        assert!(parsed.from.is_empty());
        assert_eq!(parsed.to.len(), 1);
    }

    #[test]
    fn test_sidewall_descriptor_merges_sides() {
        let mut result = FlowComposeResult::default();
        let cell = Hex::new(1, -1);
        result.sidewalls.entry(cell).or_default().extend([
            super::super::SideWallCell {
                flow_feature_id: "sw-1".into(),
                height: 4,
                level: 70,
                width: 1,
                distance: 0,
                minimum: 1,
                sides: vec![Side::NorthEast],
            },
            super::super::SideWallCell {
                flow_feature_id: "sw-1".into(),
                height: 4,
                level: 70,
                width: 1,
                distance: 0,
                minimum: 1,
                sides: vec![Side::NorthEast, Side::East],
            },
        ]);

        let params = synthesize(&result);
        let parsed: SideWallParam = serde_json::from_str(&params[&cell]["g_sidewall"]).unwrap();
        assert_eq!(parsed.sides, vec![Side::NorthEast, Side::East]);
        assert_eq!(parsed.height, 4);
    }
}
