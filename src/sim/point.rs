//! Swept motion of a zero-radius point through the tile grid
//!
//! A move never crosses more than three tiles because each velocity component
//! is shorter than a tile. Moves that cut a corner are split inside the middle
//! tile, moves that touch a triangle inside their start tile are split at the
//! contact, and everything else is resolved against the single tile the point
//! ends up in. Splits are processed from a small fixed stack; when the nesting
//! gets deeper than `MAX_SPLIT_DEPTH` the point simply stops.

use glam::{DVec2, IVec2};

use super::geometry::{Edge, on_grid_line, tile_of, time_to_axis_boundary, time_to_diagonal};
use super::grid::{Bounded, Shape, TileGrid};
use crate::consts::{CONTACT_EPSILON, MAX_SPLIT_DEPTH, TILE_SIZE};
use crate::{tile_at, tile_origin};

/// Result of moving a point for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStep {
    pub pos: DVec2,
    pub vel: DVec2,
    /// First tile that caused a bounce or a stop during this step
    pub hit: Option<IVec2>,
}

/// Outcome of resolving one (sub-)move
enum Segment {
    Done(PointStep),
    /// Split the move at this fraction and resolve both halves in order
    Split(f64),
}

/// Bounce axis for a square-faced collision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bounce {
    X,
    Y,
    Both,
    Stop,
}

/// Move a point by `vel` for one step.
///
/// Each velocity component must be strictly shorter than a tile. Never fails;
/// the worst outcome is a zero velocity ("stuck"), which callers are expected
/// to tolerate for a frame.
pub fn move_point<G: TileGrid + ?Sized>(world: &Bounded<'_, G>, pos: DVec2, vel: DVec2) -> PointStep {
    move_point_within(world, pos, vel, MAX_SPLIT_DEPTH)
}

/// [`move_point`] with a split nesting limit of at most `MAX_SPLIT_DEPTH`
fn move_point_within<G: TileGrid + ?Sized>(
    world: &Bounded<'_, G>,
    pos: DVec2,
    vel: DVec2,
    max_depth: u8,
) -> PointStep {
    debug_assert!(
        vel.x.abs() < TILE_SIZE && vel.y.abs() < TILE_SIZE,
        "point velocity {vel:?} must stay below the tile size"
    );
    debug_assert!(pos.is_finite(), "point position {pos:?} must be finite");

    let mut pos = pos;
    let mut vel = vel;
    let mut hit = None;
    let max_depth = max_depth.min(MAX_SPLIT_DEPTH);

    // (fraction of `vel`, nesting depth); last in, first out
    let mut pending = [(0.0, 0u8); MAX_SPLIT_DEPTH as usize + 2];
    pending[0] = (1.0, 0);
    let mut len = 1;

    while len > 0 {
        len -= 1;
        let (fraction, depth) = pending[len];
        match resolve(world, pos, vel, fraction) {
            Segment::Done(step) => {
                pos = step.pos;
                vel = step.vel;
                hit = hit.or(step.hit);
            }
            Segment::Split(t) if depth >= max_depth => {
                log::debug!("point move at {pos:?} split too deep (t={t}), stopping in place");
                vel = DVec2::ZERO;
            }
            Segment::Split(t) => {
                pending[len] = (fraction * (1.0 - t), depth + 1);
                pending[len + 1] = (fraction * t, depth + 1);
                len += 2;
            }
        }
    }

    PointStep { pos, vel, hit }
}

/// Resolve the sub-move `pos -> pos + vel * fraction`.
fn resolve<G: TileGrid + ?Sized>(
    world: &Bounded<'_, G>,
    pos: DVec2,
    mut vel: DVec2,
    fraction: f64,
) -> Segment {
    let mut d = vel * fraction;

    // A component too small to change the coordinate would desynchronize the
    // tile bookkeeping from the actual position.
    if d.x != 0.0 && pos.x + d.x == pos.x {
        vel.x = 0.0;
        d.x = 0.0;
    }
    if d.y != 0.0 && pos.y + d.y == pos.y {
        vel.y = 0.0;
        d.y = 0.0;
    }

    if d == DVec2::ZERO {
        return Segment::Done(PointStep { pos, vel, hit: None });
    }

    let end_pos = pos + d;
    let start = seam_tile(world, pos, d, Edge::Start);
    let end = seam_tile(world, end_pos, d, Edge::End);
    let cross_x = d.x != 0.0 && start.x != end.x;
    let cross_y = d.y != 0.0 && start.y != end.y;
    let tx = time_to_axis_boundary(pos.x, d.x);
    let ty = time_to_axis_boundary(pos.y, d.y);

    // Corner cut through a third tile: split inside the middle tile, unless
    // both axes cross at the same instant (exact corner hit).
    if cross_x && cross_y && tx != ty {
        let middle = if tx < ty {
            IVec2::new(end.x, start.y)
        } else {
            IVec2::new(start.x, end.y)
        };
        return Segment::Split(split_fraction(world, pos, d, tx.min(ty), tx.max(ty), middle));
    }

    // Contact with the start tile's own collision region
    let exit = tx.min(ty);
    let start_shape = world.shape(start);
    let start_local = pos - tile_origin(start);
    match start_shape {
        Shape::None => {}
        Shape::Square => {
            // Strictly inside, or sliding along a seam between two solids
            if start_shape.embeds(start_local) || (start_shape.touches(start_local) && exit > 0.0) {
                return stop(pos, start);
            }
        }
        _ => {
            if start_shape.embeds(start_local) {
                return stop(pos, start);
            }
            let rate = start_shape.solid_gradient().dot(d);
            if rate > 0.0 && exit > 0.0 {
                let depth = start_shape.solidity(start_local);
                if depth.abs() <= CONTACT_EPSILON {
                    return bounce_off_hypotenuse(world, pos, vel, d, 0.0, start_shape, start);
                }
                if depth < 0.0 {
                    let t = -depth / rate;
                    if t <= exit && t < 1.0 {
                        return Segment::Split(t);
                    }
                }
            }
        }
    }

    let cross = (cross_x, cross_y);
    let shape = world.shape(end);
    match shape {
        Shape::None => Segment::Done(PointStep {
            pos: end_pos,
            vel,
            hit: None,
        }),
        Shape::Square => bounce_off_square(world, pos, vel, d, start, end, cross),
        _ => {
            let origin = tile_origin(end);
            let mut entry = 0.0;
            if cross_x || cross_y {
                // Triangle legs are axis aligned: entering on the solid side of
                // the hypotenuse means hitting a leg (or the right-angle corner).
                entry = match cross {
                    (true, true) => tx.max(ty),
                    (true, false) => tx,
                    _ => ty,
                };
                let entry_local = pos + d * entry - origin;
                if shape.solidity(entry_local) > CONTACT_EPSILON {
                    return bounce_off_square(world, pos, vel, d, start, end, cross);
                }
            }
            if shape.solid_gradient().dot(d) > 0.0 {
                let local = pos - origin;
                let t = if shape.solidity(local).abs() <= CONTACT_EPSILON {
                    0.0
                } else {
                    hypotenuse_time(shape, origin, pos, d)
                };
                if t >= entry - CONTACT_EPSILON && t < 1.0 {
                    return bounce_off_hypotenuse(world, pos, vel, d, t.max(0.0), shape, end);
                }
            }
            Segment::Done(PointStep {
                pos: end_pos,
                vel,
                hit: None,
            })
        }
    }
}

/// Tile containing `p` for this move. Components on a grid line use the
/// directional tie-break; a zero component has no direction, so it takes the
/// more open of the two tiles on either side of the line.
fn seam_tile<G: TileGrid + ?Sized>(world: &Bounded<'_, G>, p: DVec2, d: DVec2, edge: Edge) -> IVec2 {
    let mut tile = IVec2::new(tile_of(p.x, d.x, edge), tile_of(p.y, d.y, edge));
    if d.x == 0.0 && on_grid_line(p.x) {
        let other = tile - IVec2::X;
        if openness(world.shape(other)) > openness(world.shape(tile)) {
            tile = other;
        }
    }
    if d.y == 0.0 && on_grid_line(p.y) {
        let other = tile - IVec2::Y;
        if openness(world.shape(other)) > openness(world.shape(tile)) {
            tile = other;
        }
    }
    tile
}

#[inline]
fn openness(shape: Shape) -> u8 {
    match shape {
        Shape::None => 2,
        Shape::Square => 0,
        _ => 1,
    }
}

/// Pick a split fraction strictly inside the middle tile of a corner cut,
/// off that tile's hypotenuse when it has one.
fn split_fraction<G: TileGrid + ?Sized>(
    world: &Bounded<'_, G>,
    pos: DVec2,
    d: DVec2,
    lo: f64,
    hi: f64,
    middle: IVec2,
) -> f64 {
    let hi = hi.min(1.0);
    let shape = world.shape(middle);
    if !shape.is_triangle() {
        return (lo + hi) * 0.5;
    }
    let origin = tile_origin(middle);
    for weight in [0.5, 0.25, 0.75] {
        let t = lo + (hi - lo) * weight;
        if shape.solidity(pos + d * t - origin).abs() > CONTACT_EPSILON {
            return t;
        }
    }
    // Travelling along the hypotenuse itself
    (lo + hi) * 0.5
}

fn hypotenuse_time(shape: Shape, origin: DVec2, pos: DVec2, d: DVec2) -> f64 {
    match shape.hypotenuse(origin) {
        Some((diagonal, intercept)) => time_to_diagonal(pos.x, pos.y, d.x, d.y, intercept, diagonal),
        None => f64::INFINITY,
    }
}

#[inline]
fn stop(pos: DVec2, tile: IVec2) -> Segment {
    Segment::Done(PointStep {
        pos,
        vel: DVec2::ZERO,
        hit: Some(tile),
    })
}

fn bounce_off_hypotenuse<G: TileGrid + ?Sized>(
    world: &Bounded<'_, G>,
    pos: DVec2,
    vel: DVec2,
    d: DVec2,
    t: f64,
    shape: Shape,
    tile: IVec2,
) -> Segment {
    let contact = pos + d * t;
    land(world, contact, contact + shape.reflect(d) * (1.0 - t), shape.reflect(vel), tile)
}

/// Finish a bounce at the reflected `landing` point, or at `contact` when the
/// reflection would put the point inside a solid it never swept through.
fn land<G: TileGrid + ?Sized>(
    world: &Bounded<'_, G>,
    contact: DVec2,
    landing: DVec2,
    vel: DVec2,
    hit: IVec2,
) -> Segment {
    let tile = tile_at(landing);
    let pos = if world.shape(tile).embeds(landing - tile_origin(tile)) {
        log::trace!("bounce off {hit} would land inside {tile}, staying at {contact:?}");
        contact
    } else {
        landing
    };
    Segment::Done(PointStep {
        pos,
        vel,
        hit: Some(hit),
    })
}

/// Bounce off an axis-aligned face of `end`, reflecting the position about
/// the crossed tile boundary.
fn bounce_off_square<G: TileGrid + ?Sized>(
    world: &Bounded<'_, G>,
    pos: DVec2,
    vel: DVec2,
    d: DVec2,
    start: IVec2,
    end: IVec2,
    cross: (bool, bool),
) -> Segment {
    let bounce = match cross {
        (true, false) => Bounce::X,
        (false, true) => Bounce::Y,
        (true, true) => corner_bounce(world, d, start, end),
        // Same tile: only reachable through a leg we are already on
        (false, false) => Bounce::Stop,
    };

    let end_pos = pos + d;
    let reflect_x = || {
        let boundary = (if d.x > 0.0 { end.x } else { end.x + 1 }) as f64 * TILE_SIZE;
        2.0 * boundary - end_pos.x
    };
    let reflect_y = || {
        let boundary = (if d.y > 0.0 { end.y } else { end.y + 1 }) as f64 * TILE_SIZE;
        2.0 * boundary - end_pos.y
    };

    let tx = time_to_axis_boundary(pos.x, d.x);
    let ty = time_to_axis_boundary(pos.y, d.y);
    let (contact, new_pos, new_vel) = match bounce {
        Bounce::X => (tx, DVec2::new(reflect_x(), end_pos.y), DVec2::new(-vel.x, vel.y)),
        Bounce::Y => (ty, DVec2::new(end_pos.x, reflect_y()), DVec2::new(vel.x, -vel.y)),
        Bounce::Both => (tx.max(ty), DVec2::new(reflect_x(), reflect_y()), -vel),
        Bounce::Stop => return stop(pos, end),
    };
    land(world, pos + d * contact.min(1.0), new_pos, new_vel, end)
}

/// Choose how to bounce when a corner cut lands in a solid tile: route the
/// point toward whichever orthogonal neighbor is open.
fn corner_bounce<G: TileGrid + ?Sized>(world: &Bounded<'_, G>, d: DVec2, start: IVec2, end: IVec2) -> Bounce {
    // Reached by crossing x only / y only
    let beside = IVec2::new(end.x, start.y);
    let below = IVec2::new(start.x, end.y);
    match (world.shape(beside).is_open(), world.shape(below).is_open()) {
        // Negating vy sends the point into `beside`
        (true, false) => Bounce::Y,
        (false, true) => Bounce::X,
        (true, true) => {
            if d.x.abs() >= d.y.abs() {
                Bounce::X
            } else {
                Bounce::Y
            }
        }
        (false, false) if !world.shape(start).is_square() => {
            log::warn!("forced diagonal bounce out of corner {end} (start tile {start})");
            Bounce::Both
        }
        (false, false) => Bounce::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::TileMap;
    use proptest::prelude::*;

    fn map_with(size: IVec2, tiles: &[(IVec2, Shape)]) -> TileMap {
        let mut map = TileMap::new(size.x, size.y);
        for &(tile, shape) in tiles {
            map.set(tile, shape);
        }
        map
    }

    fn assert_near(actual: DVec2, expected: DVec2) {
        assert!(
            (actual - expected).length() < 1e-6,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_triangle_bounce() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(1, 1), Shape::UpLeft)]);
        let step = move_point(&map.bounded(), DVec2::new(40.0, 40.0), DVec2::new(20.0, 0.0));
        assert_near(step.pos, DVec2::new(56.0, 36.0));
        assert_near(step.vel, DVec2::new(0.0, -20.0));
        assert_eq!(step.hit, Some(IVec2::new(1, 1)));
    }

    #[test]
    fn test_square_face_bounce() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(4, 1), Shape::Square)]);
        let step = move_point(&map.bounded(), DVec2::new(120.0, 48.0), DVec2::new(12.0, 0.0));
        assert_near(step.pos, DVec2::new(124.0, 48.0));
        assert_near(step.vel, DVec2::new(-12.0, 0.0));
        assert_eq!(step.hit, Some(IVec2::new(4, 1)));
    }

    #[test]
    fn test_move_onto_seam_with_clearance() {
        let map = TileMap::new(10, 30);
        let step = move_point(&map.bounded(), DVec2::new(124.0, 864.0), DVec2::new(4.0, 0.0));
        assert_near(step.pos, DVec2::new(128.0, 864.0));
        assert_near(step.vel, DVec2::new(4.0, 0.0));
        assert_eq!(step.hit, None);
    }

    #[test]
    fn test_slide_along_floor_surface() {
        // y=864 is the top face of row 27
        let mut map = TileMap::new(10, 30);
        for x in 0..10 {
            map.set(IVec2::new(x, 27), Shape::Square);
        }
        let world = map.bounded();
        let step = move_point(&world, DVec2::new(124.0, 864.0), DVec2::new(4.0, 0.0));
        assert_near(step.pos, DVec2::new(128.0, 864.0));
        assert_eq!(step.hit, None);

        // And onward from the grid corner
        let step = move_point(&world, step.pos, step.vel);
        assert_near(step.pos, DVec2::new(132.0, 864.0));
        assert_eq!(step.hit, None);
    }

    #[test]
    fn test_slide_along_wall_face() {
        let mut map = TileMap::new(8, 8);
        for y in 0..8 {
            map.set(IVec2::new(4, y), Shape::Square);
        }
        let step = move_point(&map.bounded(), DVec2::new(128.0, 40.0), DVec2::new(0.0, 10.0));
        assert_near(step.pos, DVec2::new(128.0, 50.0));
        assert_eq!(step.hit, None);
    }

    #[test]
    fn test_seam_between_solids_is_stuck() {
        let map = map_with(
            IVec2::new(8, 8),
            &[(IVec2::new(3, 1), Shape::Square), (IVec2::new(4, 1), Shape::Square)],
        );
        let step = move_point(&map.bounded(), DVec2::new(128.0, 40.0), DVec2::new(0.0, 4.0));
        assert_eq!(step.vel, DVec2::ZERO);
        assert_eq!(step.pos, DVec2::new(128.0, 40.0));
        assert!(step.hit.is_some());
    }

    #[test]
    fn test_moving_into_solid_from_seam_bounces() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(4, 1), Shape::Square)]);
        let step = move_point(&map.bounded(), DVec2::new(128.0, 40.0), DVec2::new(6.0, 2.0));
        assert_near(step.pos, DVec2::new(122.0, 42.0));
        assert_near(step.vel, DVec2::new(-6.0, 2.0));
        assert_eq!(step.hit, Some(IVec2::new(4, 1)));
    }

    #[test]
    fn test_leaving_solid_from_seam_is_free() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(3, 1), Shape::Square)]);
        let step = move_point(&map.bounded(), DVec2::new(128.0, 40.0), DVec2::new(6.0, 2.0));
        assert_near(step.pos, DVec2::new(134.0, 42.0));
        assert_eq!(step.hit, None);
    }

    #[test]
    fn test_corner_hit_routes_toward_open_neighbor() {
        let map = map_with(
            IVec2::new(8, 8),
            &[(IVec2::new(4, 4), Shape::Square), (IVec2::new(3, 4), Shape::Square)],
        );
        let step = move_point(&map.bounded(), DVec2::new(120.0, 120.0), DVec2::new(16.0, 16.0));
        assert_near(step.pos, DVec2::new(136.0, 120.0));
        assert_near(step.vel, DVec2::new(16.0, -16.0));
        assert_eq!(step.hit, Some(IVec2::new(4, 4)));
    }

    #[test]
    fn test_inner_corner_reverses() {
        let map = map_with(
            IVec2::new(8, 8),
            &[
                (IVec2::new(4, 4), Shape::Square),
                (IVec2::new(3, 4), Shape::Square),
                (IVec2::new(4, 3), Shape::Square),
            ],
        );
        let step = move_point(&map.bounded(), DVec2::new(120.0, 120.0), DVec2::new(16.0, 16.0));
        assert_near(step.pos, DVec2::new(120.0, 120.0));
        assert_near(step.vel, DVec2::new(-16.0, -16.0));
        assert_eq!(step.hit, Some(IVec2::new(4, 4)));
    }

    #[test]
    fn test_corner_surrounded_by_solids_stops() {
        let map = map_with(
            IVec2::new(8, 8),
            &[
                (IVec2::new(3, 3), Shape::Square),
                (IVec2::new(4, 3), Shape::Square),
                (IVec2::new(3, 4), Shape::Square),
                (IVec2::new(4, 4), Shape::Square),
            ],
        );
        let step = move_point(&map.bounded(), DVec2::new(128.0, 128.0), DVec2::new(4.0, 4.0));
        assert_eq!(step.pos, DVec2::new(128.0, 128.0));
        assert_eq!(step.vel, DVec2::ZERO);
        assert_eq!(step.hit, Some(IVec2::new(4, 4)));
    }

    #[test]
    fn test_three_tile_crossing_open() {
        let map = TileMap::new(8, 8);
        let step = move_point(&map.bounded(), DVec2::new(120.0, 125.0), DVec2::new(12.0, 6.0));
        assert_near(step.pos, DVec2::new(132.0, 131.0));
        assert_eq!(step.hit, None);
    }

    #[test]
    fn test_three_tile_crossing_hits_middle() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(3, 4), Shape::Square)]);
        let step = move_point(&map.bounded(), DVec2::new(120.0, 125.0), DVec2::new(12.0, 6.0));
        assert_near(step.pos, DVec2::new(132.0, 125.0));
        assert_near(step.vel, DVec2::new(12.0, -6.0));
        assert_eq!(step.hit, Some(IVec2::new(3, 4)));
    }

    #[test]
    fn test_triangle_leg_acts_like_a_wall() {
        // UpLeft is solid on its right leg
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(4, 1), Shape::UpLeft)]);
        let step = move_point(&map.bounded(), DVec2::new(170.0, 48.0), DVec2::new(-12.0, 0.0));
        assert_near(step.pos, DVec2::new(162.0, 48.0));
        assert_near(step.vel, DVec2::new(12.0, 0.0));
        assert_eq!(step.hit, Some(IVec2::new(4, 1)));
    }

    #[test]
    fn test_entering_triangle_from_open_side() {
        // UpRight: solid lower left, hypotenuse y - x = const
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(2, 2), Shape::UpRight)]);
        // Fall straight down into the tile from above, x = 80 (local 16)
        let step = move_point(&map.bounded(), DVec2::new(80.0, 60.0), DVec2::new(0.0, 24.0));
        // Hypotenuse at local y = 16 -> world y = 80; contact at t = 20/24
        assert_near(step.pos, DVec2::new(84.0, 80.0));
        assert_near(step.vel, DVec2::new(24.0, 0.0));
        assert_eq!(step.hit, Some(IVec2::new(2, 2)));
    }

    #[test]
    fn test_leaving_hypotenuse_is_free() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(1, 1), Shape::UpLeft)]);
        let step = move_point(&map.bounded(), DVec2::new(48.0, 48.0), DVec2::new(-4.0, -4.0));
        assert_near(step.pos, DVec2::new(44.0, 44.0));
        assert_eq!(step.hit, None);
    }

    #[test]
    fn test_embedded_triangle_stops() {
        let map = map_with(IVec2::new(8, 8), &[(IVec2::new(1, 1), Shape::UpLeft)]);
        let step = move_point(&map.bounded(), DVec2::new(60.0, 60.0), DVec2::new(1.0, 1.0));
        assert_eq!(step.pos, DVec2::new(60.0, 60.0));
        assert_eq!(step.vel, DVec2::ZERO);
        assert_eq!(step.hit, Some(IVec2::new(1, 1)));
    }

    #[test]
    fn test_world_edge_is_solid() {
        let map = TileMap::new(4, 4);
        let step = move_point(&map.bounded(), DVec2::new(4.0, 40.0), DVec2::new(-10.0, 0.0));
        assert_near(step.pos, DVec2::new(6.0, 40.0));
        assert_eq!(step.hit, Some(IVec2::new(-1, 1)));
    }

    #[test]
    fn test_underflow_guard_zeroes_component() {
        let map = TileMap::new(8, 8);
        let step = move_point(&map.bounded(), DVec2::new(100.0, 100.0), DVec2::new(1e-20, 3.0));
        assert_eq!(step.vel.x, 0.0);
        assert_near(step.pos, DVec2::new(100.0, 103.0));
    }

    #[test]
    fn test_rest_is_idempotent_for_every_shape() {
        for shape in [
            Shape::None,
            Shape::Square,
            Shape::UpLeft,
            Shape::UpRight,
            Shape::DownLeft,
            Shape::DownRight,
        ] {
            let map = map_with(IVec2::new(4, 4), &[(IVec2::new(1, 1), shape)]);
            let pos = DVec2::new(45.0, 50.0);
            let step = move_point(&map.bounded(), pos, DVec2::ZERO);
            assert_eq!(step, PointStep { pos, vel: DVec2::ZERO, hit: None });
        }
    }

    #[test]
    fn test_bounce_never_lands_inside_solid() {
        // Slope with a block resting on top of its upper-right corner
        let map = map_with(
            IVec2::new(8, 8),
            &[(IVec2::new(1, 1), Shape::UpLeft), (IVec2::new(1, 0), Shape::Square)],
        );
        let world = map.bounded();
        let step = move_point(&world, DVec2::new(46.0, 34.0), DVec2::new(20.0, 0.0));
        assert_near(step.vel, DVec2::new(0.0, -20.0));
        assert_eq!(step.hit, Some(IVec2::new(1, 1)));
        // Held at the contact on the hypotenuse instead of inside the block
        assert_near(step.pos, DVec2::new(62.0, 34.0));
        let tile = tile_at(step.pos);
        assert!(!world.shape(tile).embeds(step.pos - tile_origin(tile)));

        // Bouncing back down off the block is held at the block's face
        let step = move_point(&world, step.pos, step.vel);
        assert_eq!(step.hit, Some(IVec2::new(1, 0)));
        assert_near(step.vel, DVec2::new(0.0, 20.0));
        let tile = tile_at(step.pos);
        assert!(!world.shape(tile).embeds(step.pos - tile_origin(tile)), "landed at {:?}", step.pos);
    }

    #[test]
    fn test_split_too_deep_stops_in_place() {
        let map = TileMap::new(8, 8);
        let world = map.bounded();
        let pos = DVec2::new(120.0, 125.0);
        let vel = DVec2::new(12.0, 6.0);
        // A corner cut needs one split
        let step = move_point_within(&world, pos, vel, 0);
        assert_eq!(step, PointStep { pos, vel: DVec2::ZERO, hit: None });
        let step = move_point_within(&world, pos, vel, 1);
        assert_near(step.pos, DVec2::new(132.0, 131.0));
        assert_eq!(step.vel, vel);
    }

    #[test]
    fn test_split_fraction_avoids_hypotenuse() {
        // Hypotenuse x + y = 96; the midpoint of the window lands on it
        let map = map_with(IVec2::new(4, 4), &[(IVec2::new(1, 1), Shape::UpLeft)]);
        let world = map.bounded();
        let (pos, d) = (DVec2::new(40.0, 48.0), DVec2::new(16.0, 0.0));
        let t = split_fraction(&world, pos, d, 0.4, 0.6, IVec2::new(1, 1));
        assert!((t - 0.45).abs() < 1e-12, "split at {t}");

        // Off the hypotenuse the midpoint is fine
        let t = split_fraction(&world, DVec2::new(40.0, 40.0), d, 0.4, 0.6, IVec2::new(1, 1));
        assert!((t - 0.5).abs() < 1e-12, "split at {t}");
        // Open middle tiles always split in the middle
        let t = split_fraction(&world, pos, d, 0.4, 0.6, IVec2::new(2, 2));
        assert!((t - 0.5).abs() < 1e-12, "split at {t}");
    }

    fn square_map(width: i32, height: i32, solid: &[bool]) -> TileMap {
        let mut map = TileMap::new(width, height);
        for (i, &s) in solid.iter().enumerate() {
            if s {
                map.set(IVec2::new(i as i32 % width, i as i32 / width), Shape::Square);
            }
        }
        map
    }

    proptest! {
        #[test]
        fn prop_deterministic_and_speed_bounded(
            seed in any::<u64>(),
            tile in (1i32..11, 1i32..11),
            offset in (0.0f64..32.0, 0.0f64..32.0),
            vel in (-31.9f64..31.9, -31.9f64..31.9),
        ) {
            let map = TileMap::scatter(12, 12, seed, 0.4);
            let world = map.bounded();
            let pos = tile_origin(IVec2::new(tile.0, tile.1)) + DVec2::new(offset.0, offset.1);
            let vel = DVec2::new(vel.0, vel.1);

            let a = move_point(&world, pos, vel);
            let b = move_point(&world, pos, vel);
            prop_assert_eq!(a, b);
            prop_assert!((a.pos - pos).length() <= vel.length() + 1e-9);
            prop_assert!(a.vel.length() <= vel.length() + 1e-9);
        }

        #[test]
        fn prop_rest_is_idempotent(
            seed in any::<u64>(),
            pos in (0.0f64..384.0, 0.0f64..384.0),
        ) {
            let map = TileMap::scatter(12, 12, seed, 0.5);
            let pos = DVec2::new(pos.0, pos.1);
            let step = move_point(&map.bounded(), pos, DVec2::ZERO);
            prop_assert_eq!(step, PointStep { pos, vel: DVec2::ZERO, hit: None });
        }

        #[test]
        fn prop_no_tunneling_through_squares(
            solid in prop::collection::vec(prop::bool::weighted(0.35), 100),
            tile in (0i32..10, 0i32..10),
            offset in (0.5f64..31.5, 0.5f64..31.5),
            vel in (-31.9f64..31.9, -31.9f64..31.9),
        ) {
            let map = square_map(10, 10, &solid);
            let start_tile = IVec2::new(tile.0, tile.1);
            prop_assume!(map.shape_at(start_tile).is_open());
            let world = map.bounded();
            let pos = tile_origin(start_tile) + DVec2::new(offset.0, offset.1);
            let vel = DVec2::new(vel.0, vel.1);

            let step = move_point(&world, pos, vel);
            if step.hit.is_none() {
                prop_assert_eq!(step.vel, vel);
                let travel = step.pos - pos;
                let samples = (travel.length() / 16.0).ceil().max(1.0) as i32;
                for i in 0..=samples {
                    let p = pos + travel * (i as f64 / samples as f64);
                    prop_assert!(
                        !world.shape(tile_at(p)).is_square(),
                        "passed through solid tile at {:?}", p
                    );
                }
            }
        }

        #[test]
        fn prop_no_tunneling_through_triangles(
            seed in any::<u64>(),
            pos in (32.0f64..352.0, 32.0f64..352.0),
            vel in (-31.9f64..31.9, -31.9f64..31.9),
        ) {
            let map = TileMap::scatter(12, 12, seed, 0.5);
            let world = map.bounded();
            let pos = DVec2::new(pos.0, pos.1);
            let start_tile = tile_at(pos);
            prop_assume!(!world.shape(start_tile).touches(pos - tile_origin(start_tile)));
            let vel = DVec2::new(vel.0, vel.1);

            let step = move_point(&world, pos, vel);
            if step.hit.is_none() {
                let travel = step.pos - pos;
                let samples = (travel.length() / 2.0).ceil().max(1.0) as i32;
                for i in 0..=samples {
                    let p = pos + travel * (i as f64 / samples as f64);
                    let tile = tile_at(p);
                    let shape = world.shape(tile);
                    prop_assert!(
                        !shape.embeds(p - tile_origin(tile)),
                        "passed through the solid half of {:?} at {:?}", shape, p
                    );
                }
            }
        }
    }
}
