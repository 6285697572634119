//! Deterministic tile collision
//!
//! Everything in here is pure and deterministic:
//! - The grid is read-only during a move
//! - No hidden state in the movers (the body controller owns its history)
//! - Seeded RNG only (map scatter)

pub mod body;
pub mod disc;
pub mod geometry;
pub mod grid;
pub mod point;

pub use body::{BodyController, BodyStep, HaltReason};
pub use disc::{Contact, DiscMover, DiscStep};
pub use geometry::{Diagonal, Edge, time_to_axis_boundary, time_to_diagonal, tile_of};
pub use grid::{Bounded, Shape, TileGrid, TileMap};
pub use point::{PointStep, move_point};
