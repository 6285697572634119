//! Grid geometry helpers
//!
//! Boundary crossing times, hypotenuse intersection and the inside/on-edge
//! tests for each collision shape. Coordinates are world units unless a
//! parameter is called `local`, in which case it is relative to the tile's
//! upper-left corner.

use glam::DVec2;

use super::grid::Shape;
use crate::consts::{CONTACT_EPSILON, TILE_SIZE};

/// Which end of a move a coordinate belongs to.
///
/// A coordinate sitting exactly on a grid line belongs to the tile the
/// velocity points away from at the start of a move, and to the tile it
/// points into at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

/// Hypotenuse families. Screen coordinates, so y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagonal {
    /// `x + y = intercept`, running from lower left to upper right
    Falling,
    /// `y - x = intercept`, running from upper left to lower right
    Rising,
}

/// Tile index along one axis, with the directional tie-break described on [`Edge`].
///
/// A zero velocity component has no direction to break the tie with, so it
/// falls back to plain floor division.
#[inline]
pub fn tile_of(coord: f64, v: f64, edge: Edge) -> i32 {
    let index = (coord / TILE_SIZE).floor();
    let tile = index as i32;
    if v == 0.0 || index * TILE_SIZE != coord {
        return tile;
    }
    match (edge, v > 0.0) {
        (Edge::Start, true) | (Edge::End, false) => tile - 1,
        (Edge::Start, false) | (Edge::End, true) => tile,
    }
}

/// True when `coord` lies exactly on a grid line
#[inline]
pub fn on_grid_line(coord: f64) -> bool {
    (coord / TILE_SIZE).floor() * TILE_SIZE == coord
}

/// Fraction of `v` after which `coord + t * v` leaves its start tile.
///
/// A coordinate already on the far boundary of its start tile leaves at
/// `t = 0`. Returns `f64::INFINITY` when `v` is zero.
pub fn time_to_axis_boundary(coord: f64, v: f64) -> f64 {
    if v == 0.0 {
        return f64::INFINITY;
    }
    let tile = tile_of(coord, v, Edge::Start);
    let boundary = if v > 0.0 {
        (tile + 1) as f64 * TILE_SIZE
    } else {
        tile as f64 * TILE_SIZE
    };
    ((boundary - coord) / v).max(0.0)
}

/// Fraction of `(vx, vy)` at which the point meets a hypotenuse line.
///
/// The result may be negative (line is behind the point). Returns
/// `f64::INFINITY` when the motion is parallel to the line.
pub fn time_to_diagonal(x: f64, y: f64, vx: f64, vy: f64, intercept: f64, diagonal: Diagonal) -> f64 {
    let (offset, rate) = match diagonal {
        Diagonal::Falling => (intercept - x - y, vx + vy),
        Diagonal::Rising => (intercept - (y - x), vy - vx),
    };
    if rate == 0.0 {
        return f64::INFINITY;
    }
    offset / rate
}

impl Shape {
    /// Hypotenuse of a triangle tile whose upper-left corner is `origin`
    pub fn hypotenuse(self, origin: DVec2) -> Option<(Diagonal, f64)> {
        match self {
            Shape::UpLeft | Shape::DownRight => {
                Some((Diagonal::Falling, origin.x + origin.y + TILE_SIZE))
            }
            Shape::UpRight | Shape::DownLeft => Some((Diagonal::Rising, origin.y - origin.x)),
            Shape::None | Shape::Square => None,
        }
    }

    /// Gradient of [`Shape::solidity`]; points from the open side into the solid side.
    #[inline]
    pub fn solid_gradient(self) -> DVec2 {
        match self {
            Shape::UpLeft => DVec2::new(1.0, 1.0),
            Shape::DownRight => DVec2::new(-1.0, -1.0),
            Shape::UpRight => DVec2::new(-1.0, 1.0),
            Shape::DownLeft => DVec2::new(1.0, -1.0),
            Shape::None | Shape::Square => DVec2::ZERO,
        }
    }

    /// Signed (unnormalized) distance from the hypotenuse, positive on the
    /// solid side. For squares this is the distance to the nearest face,
    /// positive inside. Open tiles are never solid.
    pub fn solidity(self, local: DVec2) -> f64 {
        match self {
            Shape::None => f64::NEG_INFINITY,
            Shape::Square => local
                .x
                .min(TILE_SIZE - local.x)
                .min(local.y)
                .min(TILE_SIZE - local.y),
            Shape::UpLeft => local.x + local.y - TILE_SIZE,
            Shape::DownRight => TILE_SIZE - local.x - local.y,
            Shape::UpRight => local.y - local.x,
            Shape::DownLeft => local.x - local.y,
        }
    }

    /// Boundary-inclusive test: the point is in the solid region or on its edge.
    pub fn touches(self, local: DVec2) -> bool {
        if self.is_open() || !within_tile(local, -CONTACT_EPSILON) {
            return false;
        }
        self.solidity(local) >= -CONTACT_EPSILON
    }

    /// Boundary-exclusive test: the point is strictly inside the solid region
    /// and has to be moved out.
    pub fn embeds(self, local: DVec2) -> bool {
        if self.is_open() || !within_tile(local, CONTACT_EPSILON) {
            return false;
        }
        self.solidity(local) > CONTACT_EPSILON
    }

    /// Velocity after bouncing off this triangle's hypotenuse.
    ///
    /// Rising hypotenuses swap the components; falling ones swap and negate both.
    pub fn reflect(self, v: DVec2) -> DVec2 {
        match self {
            Shape::UpLeft | Shape::DownRight => DVec2::new(-v.y, -v.x),
            Shape::UpRight | Shape::DownLeft => DVec2::new(v.y, v.x),
            Shape::None | Shape::Square => v,
        }
    }
}

/// `local` lies inside the tile shrunk by `margin` on every side
#[inline]
fn within_tile(local: DVec2, margin: f64) -> bool {
    local.x > margin
        && local.y > margin
        && local.x < TILE_SIZE - margin
        && local.y < TILE_SIZE - margin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_of_tie_break() {
        // Interior coordinates ignore the tie-break
        assert_eq!(tile_of(40.0, 1.0, Edge::Start), 1);
        assert_eq!(tile_of(40.0, -1.0, Edge::End), 1);
        // On x=64: start of a rightward move belongs to the tile on the left
        assert_eq!(tile_of(64.0, 1.0, Edge::Start), 1);
        assert_eq!(tile_of(64.0, 1.0, Edge::End), 2);
        assert_eq!(tile_of(64.0, -1.0, Edge::Start), 2);
        assert_eq!(tile_of(64.0, -1.0, Edge::End), 1);
        // No direction: floor
        assert_eq!(tile_of(64.0, 0.0, Edge::Start), 2);
        assert_eq!(tile_of(-0.5, 0.0, Edge::Start), -1);
    }

    #[test]
    fn test_time_to_axis_boundary() {
        assert!((time_to_axis_boundary(40.0, 12.0) - 2.0).abs() < 1e-12);
        assert!((time_to_axis_boundary(40.0, -16.0) - 0.5).abs() < 1e-12);
        // Starting on the boundary of the start tile leaves immediately
        assert_eq!(time_to_axis_boundary(64.0, 5.0), 0.0);
        assert_eq!(time_to_axis_boundary(64.0, -5.0), 0.0);
        assert_eq!(time_to_axis_boundary(64.0, 0.0), f64::INFINITY);
    }

    #[test]
    fn test_time_to_diagonal() {
        // x + y = 96 from (40, 40) moving right 20
        let t = time_to_diagonal(40.0, 40.0, 20.0, 0.0, 96.0, Diagonal::Falling);
        assert!((t - 0.8).abs() < 1e-12);
        // y - x = 0 from (10, 0) moving down 20
        let t = time_to_diagonal(10.0, 0.0, 0.0, 20.0, 0.0, Diagonal::Rising);
        assert!((t - 0.5).abs() < 1e-12);
        // Parallel
        let t = time_to_diagonal(0.0, 0.0, 5.0, -5.0, 96.0, Diagonal::Falling);
        assert_eq!(t, f64::INFINITY);
    }

    #[test]
    fn test_triangle_classification() {
        // UpLeft: solid lower right
        let shape = Shape::UpLeft;
        assert!(shape.embeds(DVec2::new(24.0, 24.0)));
        assert!(!shape.touches(DVec2::new(4.0, 4.0)));
        // On the hypotenuse: touching but not embedded
        assert!(shape.touches(DVec2::new(16.0, 16.0)));
        assert!(!shape.embeds(DVec2::new(16.0, 16.0)));
        // On the solid leg: touching but not embedded
        assert!(shape.touches(DVec2::new(32.0, 20.0)));
        assert!(!shape.embeds(DVec2::new(32.0, 20.0)));

        assert!(Shape::UpRight.embeds(DVec2::new(4.0, 24.0)));
        assert!(Shape::DownLeft.embeds(DVec2::new(24.0, 4.0)));
        assert!(Shape::DownRight.embeds(DVec2::new(4.0, 4.0)));
        assert!(!Shape::DownRight.embeds(DVec2::new(24.0, 24.0)));
    }

    #[test]
    fn test_square_classification() {
        assert!(Shape::Square.embeds(DVec2::new(1.0, 31.0)));
        assert!(!Shape::Square.embeds(DVec2::new(0.0, 16.0)));
        assert!(Shape::Square.touches(DVec2::new(0.0, 16.0)));
        assert!(!Shape::None.touches(DVec2::new(16.0, 16.0)));
    }

    #[test]
    fn test_reflect() {
        let v = DVec2::new(20.0, 0.0);
        assert_eq!(Shape::UpLeft.reflect(v), DVec2::new(-0.0, -20.0));
        assert_eq!(Shape::UpRight.reflect(v), DVec2::new(0.0, 20.0));
    }

    #[test]
    fn test_hypotenuse_matches_solidity() {
        let origin = DVec2::new(64.0, 32.0);
        for shape in [Shape::UpLeft, Shape::UpRight, Shape::DownLeft, Shape::DownRight] {
            let (diagonal, intercept) = shape.hypotenuse(origin).unwrap();
            // Two points on the hypotenuse have zero solidity
            let (a, b) = match diagonal {
                Diagonal::Falling => (DVec2::new(0.0, 32.0), DVec2::new(32.0, 0.0)),
                Diagonal::Rising => (DVec2::new(0.0, 0.0), DVec2::new(32.0, 32.0)),
            };
            assert!(shape.solidity(a).abs() < 1e-12);
            assert!(shape.solidity(b).abs() < 1e-12);
            let world = origin + a;
            let on_line = match diagonal {
                Diagonal::Falling => world.x + world.y,
                Diagonal::Rising => world.y - world.x,
            };
            assert!((on_line - intercept).abs() < 1e-12);
        }
    }
}
