//! Composition document model
//!
//! The declarative input the engine consumes: a world id, an ordered list of
//! features (areas, points, flows, structures) and optional continent
//! declarations. Field names follow the external JSON document format, so
//! the whole model carries serde derives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hex::{Hex, Side};

/// Per-cell and per-feature parameters, as written to the final plan.
/// A BTreeMap keeps iteration and serialization order stable.
pub type ParamMap = BTreeMap<String, String>;

/// Terrain type of an area feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaType {
    Plains,
    Forest,
    Mountains,
    Desert,
    Swamp,
    Ocean,
    Coast,
    Island,
    Village,
    Town,
}

impl AreaType {
    /// Ocean areas do not count as land for gap filling.
    pub fn is_land(self) -> bool {
        !matches!(self, AreaType::Ocean)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AreaType::Plains => "plains",
            AreaType::Forest => "forest",
            AreaType::Mountains => "mountains",
            AreaType::Desert => "desert",
            AreaType::Swamp => "swamp",
            AreaType::Ocean => "ocean",
            AreaType::Coast => "coast",
            AreaType::Island => "island",
            AreaType::Village => "village",
            AreaType::Town => "town",
        }
    }
}

/// Footprint shape of an area feature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaShape {
    #[default]
    Circle,
    Line,
}

/// Mountain height class, mapped to builder parameters by the preparer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MountainHeight {
    HighPeaks,
    MediumPeaks,
    LowPeaks,
    Meadow,
}

/// Shortcut for line-walk and flow-curvature probabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviationTendency {
    None,
    Slight,
    Moderate,
    Strong,
}

impl DeviationTendency {
    /// Per-step deviation probability this tendency stands for.
    pub fn probability(self) -> f64 {
        match self {
            DeviationTendency::None => 0.0,
            DeviationTendency::Slight => 0.2,
            DeviationTendency::Moderate => 0.4,
            DeviationTendency::Strong => 0.6,
        }
    }
}

/// Eight-point compass direction used in declarative positions.
///
/// The hex lattice only has six step directions; compass names are mapped to
/// angles and resolved to the nearest axial side by the preparer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compass {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl Compass {
    /// Compass angle in degrees, north = 0, clockwise.
    pub const fn angle(self) -> u16 {
        match self {
            Compass::N => 0,
            Compass::Ne => 45,
            Compass::E => 90,
            Compass::Se => 135,
            Compass::S => 180,
            Compass::Sw => 225,
            Compass::W => 270,
            Compass::Nw => 315,
        }
    }
}

/// Snap mode for point features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapMode {
    Inside,
    Edge,
}

/// Lifecycle status of a feature as it moves through the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureStatus {
    #[default]
    New,
    Prepared,
    Composed,
    Created,
    Failed,
}

/// A declarative placement: step a sampled distance from an anchor in a
/// compass direction. Higher priority positions are tried first across
/// features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Compass>,
    /// Exact angle in degrees; overrides `direction` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_angle: Option<u16>,
    #[serde(default)]
    pub distance_from: i32,
    #[serde(default)]
    pub distance_to: i32,
    /// Feature name to step from, or "origin" for the zero hex.
    #[serde(default = "origin_anchor")]
    pub anchor: String,
    #[serde(default)]
    pub priority: i32,
    /// Nearest axial side for the declared angle, resolved by the preparer.
    #[serde(skip)]
    pub resolved_side: Option<Side>,
}

fn origin_anchor() -> String {
    "origin".to_string()
}

impl Position {
    /// The exact angle this position declares: `directionAngle` when given,
    /// otherwise the compass direction's angle, otherwise 0.
    pub fn angle(&self) -> u16 {
        self.direction_angle
            .or_else(|| self.direction.map(Compass::angle))
            .unwrap_or(0)
    }

    /// The axial side to step along. Falls back to resolving the angle on
    /// the fly when the preparer has not run.
    pub fn side(&self) -> Side {
        self.resolved_side.unwrap_or_else(|| Side::from_angle(self.angle()))
    }
}

/// Fields shared by all feature variants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureHeader {
    pub name: String,
    pub feature_id: String,
    #[serde(default)]
    pub parameters: ParamMap,
    #[serde(default)]
    pub status: FeatureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl FeatureHeader {
    pub fn set_failed(&mut self, message: impl Into<String>) {
        self.status = FeatureStatus::Failed;
        self.status_message = Some(message.into());
    }
}

/// A region feature: a biome or a continent member covering multiple cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaFeature {
    #[serde(flatten)]
    pub header: FeatureHeader,
    pub area_type: AreaType,
    #[serde(default)]
    pub shape: AreaShape,
    pub size_from: i32,
    pub size_to: i32,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<MountainHeight>,
    /// Per-step probability of a single-step 60 degree turn to the left
    /// during a LINE walk. Overrides `deviationTendency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_right: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_tendency: Option<DeviationTendency>,
    /// Legacy combined deviation; expands to `D/2, D/2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_deviation: Option<f64>,
    /// Effective size bounds, resolved by the preparer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_size_from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_size_to: Option<i32>,
}

impl AreaFeature {
    /// Effective (left, right) deviation probabilities for a LINE walk.
    pub fn deviation_probabilities(&self) -> (f64, f64) {
        let fallback = if let Some(t) = self.deviation_tendency {
            (t.probability(), t.probability())
        } else if let Some(d) = self.direction_deviation {
            (d / 2.0, d / 2.0)
        } else {
            (0.0, 0.0)
        };
        (
            self.deviation_left.unwrap_or(fallback.0),
            self.deviation_right.unwrap_or(fallback.1),
        )
    }

    /// Effective size bounds, after the preparer resolved them.
    pub fn effective_size(&self) -> (i32, i32) {
        (
            self.calculated_size_from.unwrap_or(self.size_from),
            self.calculated_size_to.unwrap_or(self.size_to),
        )
    }
}

/// Snap configuration of a point feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapConfig {
    pub mode: SnapMode,
    /// Name of the biome the point must land in.
    pub target: String,
    #[serde(default)]
    pub avoid: Vec<String>,
    #[serde(default)]
    pub prefer_near: Vec<String>,
}

/// A zero-size point of interest placed inside one cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointFeature {
    #[serde(flatten)]
    pub header: FeatureHeader,
    pub snap: SnapConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_coordinate: Option<Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_lx: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_lz: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_in_biome: Option<String>,
}

/// Variant payload of a flow feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flowType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowKind {
    #[serde(rename_all = "camelCase")]
    Road {
        #[serde(default)]
        road_type: String,
    },
    #[serde(rename_all = "camelCase")]
    River {
        #[serde(default)]
        depth: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        merge_to_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Wall {
        #[serde(default)]
        material: String,
        #[serde(default)]
        height: i32,
    },
    #[serde(rename_all = "camelCase")]
    SideWall {
        target_biome_id: String,
        /// Outward sides to emit walls on; empty means all six.
        #[serde(default)]
        sides: Vec<Side>,
        #[serde(default)]
        distance: i32,
        #[serde(default)]
        minimum: i32,
        #[serde(default)]
        height: i32,
        #[serde(default)]
        material: String,
    },
}

impl FlowKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlowKind::Road { .. } => "road",
            FlowKind::River { .. } => "river",
            FlowKind::Wall { .. } => "wall",
            FlowKind::SideWall { .. } => "sidewall",
        }
    }
}

/// A linear feature routed across cells along their edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowFeature {
    #[serde(flatten)]
    pub header: FeatureHeader,
    #[serde(flatten)]
    pub kind: FlowKind,
    #[serde(default = "default_width")]
    pub width_blocks: i32,
    #[serde(default)]
    pub level: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_point_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_point_id: Option<String>,
    #[serde(default)]
    pub waypoint_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tend_left: Option<DeviationTendency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tend_right: Option<DeviationTendency>,
    /// Closed-loop walls: ring radius range around the anchor point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_to: Option<i32>,
    /// Biome names the route must not enter.
    #[serde(default)]
    pub avoid: Vec<String>,
    /// Escalates this flow's failure to fatal and forbids early termination.
    #[serde(default)]
    pub force: bool,
}

fn default_width() -> i32 {
    3
}

impl FlowFeature {
    /// Curvature probabilities (left, right).
    pub fn curvature(&self) -> (f64, f64) {
        (
            self.tend_left.map_or(0.0, DeviationTendency::probability),
            self.tend_right.map_or(0.0, DeviationTendency::probability),
        )
    }

    /// A wall whose start and end point coincide is routed as a closed ring.
    pub fn is_closed_loop(&self) -> bool {
        matches!(self.kind, FlowKind::Wall { .. })
            && self.start_point_id.is_some()
            && self.start_point_id == self.end_point_id
    }
}

/// A village or town designed from a named template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureFeature {
    #[serde(flatten)]
    pub header: FeatureHeader,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub base_level: i32,
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// A feature of the composition, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Feature {
    Area(AreaFeature),
    Point(PointFeature),
    Flow(FlowFeature),
    Structure(StructureFeature),
}

impl Feature {
    pub fn header(&self) -> &FeatureHeader {
        match self {
            Feature::Area(f) => &f.header,
            Feature::Point(f) => &f.header,
            Feature::Flow(f) => &f.header,
            Feature::Structure(f) => &f.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut FeatureHeader {
        match self {
            Feature::Area(f) => &mut f.header,
            Feature::Point(f) => &mut f.header,
            Feature::Flow(f) => &mut f.header,
            Feature::Structure(f) => &mut f.header,
        }
    }

    pub fn feature_id(&self) -> &str {
        &self.header().feature_id
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Feature::Area(_) => "area",
            Feature::Point(_) => "point",
            Feature::Flow(f) => f.kind.type_name(),
            Feature::Structure(_) => "structure",
        }
    }
}

/// A named group of areas that must stay connected after gap filling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Continent {
    pub continent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: ParamMap,
}

/// The composition document: the engine's sole input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub continents: Vec<Continent>,
}

impl Composition {
    /// Look a feature up by feature id, falling back to its display name.
    /// Anchors and snap targets reference names; flow endpoints reference
    /// ids; both forms resolve here.
    pub fn find_feature(&self, reference: &str) -> Option<&Feature> {
        self.features
            .iter()
            .find(|f| f.feature_id() == reference)
            .or_else(|| self.features.iter().find(|f| f.name() == reference))
    }

    /// Index of a feature by id or name, for in-place mutation.
    pub fn find_feature_index(&self, reference: &str) -> Option<usize> {
        self.features
            .iter()
            .position(|f| f.feature_id() == reference)
            .or_else(|| self.features.iter().position(|f| f.name() == reference))
    }

    /// The continent declaration for an id, if any.
    pub fn find_continent(&self, continent_id: &str) -> Option<&Continent> {
        self.continents
            .iter()
            .find(|c| c.continent_id == continent_id)
    }
}
