//! Axial hex coordinate arithmetic
//!
//! The composition engine works on a pointy-top hex lattice addressed by
//! axial coordinates (q, r). This module provides the coordinate math every
//! stage builds on: neighbors, distance, ring and line enumeration, and the
//! cartesian projection used by the plan renderer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six edge directions of a pointy-top hex cell.
///
/// The declaration order (NE, E, SE, SW, W, NW) is the canonical order used
/// for ring traversal and for tie-breaking; it must not be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "NORTH_EAST")]
    NorthEast,
    #[serde(rename = "EAST")]
    East,
    #[serde(rename = "SOUTH_EAST")]
    SouthEast,
    #[serde(rename = "SOUTH_WEST")]
    SouthWest,
    #[serde(rename = "WEST")]
    West,
    #[serde(rename = "NORTH_WEST")]
    NorthWest,
}

impl Side {
    /// All six sides in canonical order.
    pub const ALL: [Side; 6] = [
        Side::NorthEast,
        Side::East,
        Side::SouthEast,
        Side::SouthWest,
        Side::West,
        Side::NorthWest,
    ];

    /// Axial step vector for this side (pointy-top layout).
    pub const fn vector(self) -> Hex {
        match self {
            Side::NorthEast => Hex { q: 1, r: -1 },
            Side::East => Hex { q: 1, r: 0 },
            Side::SouthEast => Hex { q: 0, r: 1 },
            Side::SouthWest => Hex { q: -1, r: 1 },
            Side::West => Hex { q: -1, r: 0 },
            Side::NorthWest => Hex { q: 0, r: -1 },
        }
    }

    /// The side on the opposite edge of the cell.
    pub const fn opposite(self) -> Side {
        match self {
            Side::NorthEast => Side::SouthWest,
            Side::East => Side::West,
            Side::SouthEast => Side::NorthWest,
            Side::SouthWest => Side::NorthEast,
            Side::West => Side::East,
            Side::NorthWest => Side::SouthEast,
        }
    }

    /// Rotate one step (60 degrees) clockwise.
    pub const fn rotate_cw(self) -> Side {
        match self {
            Side::NorthEast => Side::East,
            Side::East => Side::SouthEast,
            Side::SouthEast => Side::SouthWest,
            Side::SouthWest => Side::West,
            Side::West => Side::NorthWest,
            Side::NorthWest => Side::NorthEast,
        }
    }

    /// Rotate one step (60 degrees) counter-clockwise.
    pub const fn rotate_ccw(self) -> Side {
        match self {
            Side::NorthEast => Side::NorthWest,
            Side::East => Side::NorthEast,
            Side::SouthEast => Side::East,
            Side::SouthWest => Side::SouthEast,
            Side::West => Side::SouthWest,
            Side::NorthWest => Side::West,
        }
    }

    /// Center angle of this side in degrees, with north = 0 and angles
    /// increasing clockwise.
    pub const fn center_angle(self) -> u16 {
        match self {
            Side::NorthEast => 30,
            Side::East => 90,
            Side::SouthEast => 150,
            Side::SouthWest => 210,
            Side::West => 270,
            Side::NorthWest => 330,
        }
    }

    /// Resolve an arbitrary compass angle (degrees, north = 0, clockwise) to
    /// the nearest axial side. An angle equidistant from two sides resolves
    /// to the side reached first in canonical order, so 0 resolves NE and
    /// 180 resolves SE.
    pub fn from_angle(degrees: u16) -> Side {
        let degrees = degrees % 360;
        let mut best = Side::NorthEast;
        let mut best_dist = u16::MAX;
        for side in Side::ALL {
            let d = degrees.abs_diff(side.center_angle());
            let d = d.min(360 - d);
            if d < best_dist {
                best = side;
                best_dist = d;
            }
        }
        best
    }

    /// The canonical name used in cell parameter descriptors.
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Side::NorthEast => "NORTH_EAST",
            Side::East => "EAST",
            Side::SouthEast => "SOUTH_EAST",
            Side::SouthWest => "SOUTH_WEST",
            Side::West => "WEST",
            Side::NorthWest => "NORTH_WEST",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Axial hex coordinate (q, r) on a pointy-top lattice.
///
/// Cube form is x = q, z = r, y = -x - z. Ordering is (q, r) lexicographic,
/// which several stages use as a deterministic tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

impl Hex {
    pub const ORIGIN: Hex = Hex { q: 0, r: 0 };

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Third cube coordinate.
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    pub const fn add(self, other: Hex) -> Hex {
        Hex {
            q: self.q + other.q,
            r: self.r + other.r,
        }
    }

    pub const fn sub(self, other: Hex) -> Hex {
        Hex {
            q: self.q - other.q,
            r: self.r - other.r,
        }
    }

    pub const fn scale(self, factor: i32) -> Hex {
        Hex {
            q: self.q * factor,
            r: self.r * factor,
        }
    }

    /// Hex distance to the origin.
    pub const fn length(self) -> i32 {
        (self.q.abs() + self.r.abs() + self.s().abs()) / 2
    }

    /// Hex distance between two cells.
    pub const fn distance(self, other: Hex) -> i32 {
        self.sub(other).length()
    }

    /// Adjacent cell across the given side.
    pub const fn neighbor(self, side: Side) -> Hex {
        self.add(side.vector())
    }

    /// All six neighbors in canonical side order.
    pub fn neighbors(self) -> [Hex; 6] {
        [
            self.neighbor(Side::NorthEast),
            self.neighbor(Side::East),
            self.neighbor(Side::SouthEast),
            self.neighbor(Side::SouthWest),
            self.neighbor(Side::West),
            self.neighbor(Side::NorthWest),
        ]
    }

    /// Step `steps` cells in the direction of `side`.
    pub const fn translate(self, side: Side, steps: i32) -> Hex {
        self.add(side.vector().scale(steps))
    }

    /// The side of `self` that faces `other`, if the two cells are adjacent.
    pub fn side_towards(self, other: Hex) -> Option<Side> {
        let delta = other.sub(self);
        Side::ALL.into_iter().find(|side| side.vector() == delta)
    }

    /// Cell key in the external "q:r" form.
    pub fn position_key(self) -> String {
        format!("{}:{}", self.q, self.r)
    }

    /// Cartesian center of this cell for a pointy-top layout with the given
    /// cell size. Used by the plan renderer only.
    pub fn to_cartesian(self, grid_size: f64) -> (f64, f64) {
        let x = 3.0_f64.sqrt() * grid_size * (self.q as f64 + self.r as f64 / 2.0);
        let z = 1.5 * grid_size * self.r as f64;
        (x, z)
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.q, self.r)
    }
}

/// The ring of cells at exact distance `radius` from `center`.
///
/// Traversal starts at the NE corner and walks the six edges in the order
/// SE, SW, W, NW, NE, E, which visits the NE, E, SE, SW, W and NW corners in
/// turn and returns to the start. A radius of zero yields the center alone.
pub fn ring(center: Hex, radius: i32) -> Vec<Hex> {
    if radius <= 0 {
        return vec![center];
    }
    let mut cells = Vec::with_capacity(6 * radius as usize);
    let mut hex = center.translate(Side::NorthEast, radius);
    let walk = [
        Side::SouthEast,
        Side::SouthWest,
        Side::West,
        Side::NorthWest,
        Side::NorthEast,
        Side::East,
    ];
    for side in walk {
        for _ in 0..radius {
            cells.push(hex);
            hex = hex.neighbor(side);
        }
    }
    cells
}

/// All cells within `radius` of `center`, enumerated ring by ring outward.
pub fn spiral(center: Hex, radius: i32) -> Vec<Hex> {
    let mut cells = vec![center];
    for r in 1..=radius {
        cells.extend(ring(center, r));
    }
    cells
}

/// Hex line from `a` to `b` inclusive, via cube-space linear interpolation
/// with rounding. Ties are broken toward `a` by nudging the start point a
/// hair off the exact edge.
pub fn line(a: Hex, b: Hex) -> Vec<Hex> {
    let n = a.distance(b);
    if n == 0 {
        return vec![a];
    }
    let ax = a.q as f64 + 1e-6;
    let ay = a.s() as f64 + 2e-6;
    let az = a.r as f64 - 3e-6;
    let mut cells = Vec::with_capacity(n as usize + 1);
    for i in 0..=n {
        let t = i as f64 / n as f64;
        let x = ax + (b.q as f64 - ax) * t;
        let y = ay + (b.s() as f64 - ay) * t;
        let z = az + (b.r as f64 - az) * t;
        cells.push(cube_round(x, y, z));
    }
    cells
}

/// Round fractional cube coordinates to the nearest hex, restoring the
/// x + y + z = 0 invariant on the component with the largest rounding error.
fn cube_round(x: f64, y: f64, z: f64) -> Hex {
    let rx = x.round();
    let ry = y.round();
    let rz = z.round();
    let dx = (rx - x).abs();
    let dy = (ry - y).abs();
    let dz = (rz - z).abs();
    if dx > dy && dx > dz {
        Hex::new((-ry - rz) as i32, rz as i32)
    } else if dy > dz {
        Hex::new(rx as i32, rz as i32)
    } else {
        Hex::new(rx as i32, (-rx - ry) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_sides_pair_up() {
        for side in Side::ALL {
            assert_eq!(side.opposite().opposite(), side);
            // Opposite vectors cancel out
            assert_eq!(side.vector().add(side.opposite().vector()), Hex::ORIGIN);
        }
    }

    #[test]
    fn test_neighbor_distance_is_one() {
        let center = Hex::new(3, -2);
        for neighbor in center.neighbors() {
            assert_eq!(center.distance(neighbor), 1);
        }
    }

    #[test]
    fn test_distance_symmetry() {
        let a = Hex::new(-4, 7);
        let b = Hex::new(5, -1);
        assert_eq!(a.distance(b), b.distance(a));
        assert_eq!(a.distance(a), 0);
    }

    #[test]
    fn test_ring_size_and_distance() {
        let center = Hex::new(2, 2);
        for radius in 1..5 {
            let cells = ring(center, radius);
            assert_eq!(cells.len(), 6 * radius as usize);
            for cell in &cells {
                assert_eq!(center.distance(*cell), radius);
            }
        }
    }

    #[test]
    fn test_ring_is_a_cycle() {
        let cells = ring(Hex::ORIGIN, 3);
        for pair in cells.windows(2) {
            assert_eq!(pair[0].distance(pair[1]), 1);
        }
        // Last cell closes back onto the first
        assert_eq!(cells[cells.len() - 1].distance(cells[0]), 1);
    }

    #[test]
    fn test_ring_starts_north_east() {
        let cells = ring(Hex::ORIGIN, 2);
        assert_eq!(cells[0], Hex::new(2, -2));
    }

    #[test]
    fn test_line_endpoints_and_steps() {
        let a = Hex::new(0, 0);
        let b = Hex::new(4, -2);
        let cells = line(a, b);
        assert_eq!(cells.first(), Some(&a));
        assert_eq!(cells.last(), Some(&b));
        assert_eq!(cells.len() as i32, a.distance(b) + 1);
        for pair in cells.windows(2) {
            assert_eq!(pair[0].distance(pair[1]), 1);
        }
    }

    #[test]
    fn test_line_deterministic() {
        let a = Hex::new(-3, 1);
        let b = Hex::new(2, 3);
        assert_eq!(line(a, b), line(a, b));
    }

    #[test]
    fn test_side_towards() {
        let center = Hex::new(1, 1);
        for side in Side::ALL {
            assert_eq!(center.side_towards(center.neighbor(side)), Some(side));
        }
        assert_eq!(center.side_towards(Hex::new(5, 5)), None);
    }

    #[test]
    fn test_from_angle_cardinal_points() {
        assert_eq!(Side::from_angle(90), Side::East);
        assert_eq!(Side::from_angle(270), Side::West);
        // North and south are equidistant between two sides and resolve to
        // the earlier side in canonical order
        assert_eq!(Side::from_angle(0), Side::NorthEast);
        assert_eq!(Side::from_angle(180), Side::SouthEast);
        assert_eq!(Side::from_angle(45), Side::NorthEast);
        assert_eq!(Side::from_angle(315), Side::NorthWest);
    }

    #[test]
    fn test_spiral_counts() {
        assert_eq!(spiral(Hex::ORIGIN, 0).len(), 1);
        assert_eq!(spiral(Hex::ORIGIN, 1).len(), 7);
        assert_eq!(spiral(Hex::ORIGIN, 2).len(), 19);
    }

    #[test]
    fn test_position_key() {
        assert_eq!(Hex::new(-3, 12).position_key(), "-3:12");
    }
}
