//! Tile Bounce - swept collision for bodies moving through a tile world
//!
//! Core modules:
//! - `sim`: Deterministic physics (tile grid, point mover, disc mover, body controller)
//! - `settings`: Data-driven tuning loaded from JSON

pub mod settings;
pub mod sim;

pub use settings::{BodySettings, DiscSettings, Settings, SettingsError};

use glam::{DVec2, IVec2};

/// Engine constants
pub mod consts {
    /// Tile edge length in world units
    pub const TILE_SIZE: f64 = 32.0;

    /// Maximum nested splits of a single point move before it gives up and stops
    pub const MAX_SPLIT_DEPTH: u8 = 5;

    /// Number of fixed boundary samples approximating a disc
    pub const DISC_SAMPLES: usize = 8;
    /// Sample collection stops once this many samples reported a hit
    pub const MAX_SAMPLE_HITS: usize = 4;
    /// Gravity halving rounds used to keep floor bounces below the rebound ceiling
    pub const GRAVITY_REFINEMENT_ROUNDS: u32 = 8;

    /// Tolerance for on-surface tests (hypotenuse or square face), in world units
    pub const CONTACT_EPSILON: f64 = 1e-9;

    /// Default disc parameters
    pub const DISC_RADIUS: f64 = 8.0;
    pub const DISC_GRAVITY: f64 = 0.5;
    pub const DISC_MAX_SPEED: f64 = 16.0;
    pub const BOUNCE_DAMPING: f64 = 0.75;
    /// Extra push applied past a face when freeing an embedded sample
    pub const UNSTICK_EPSILON: f64 = 0.01;

    /// Default body controller parameters
    pub const HISTORY_LENGTH: usize = 32;
    pub const LOOP_CHECK_INTERVAL: u32 = 32;
    pub const MAX_BODY_STEPS: u32 = 1800;
    pub const MAX_EXTREME_REVISITS: usize = 3;
}

/// Tile containing a world position, using plain floor division.
#[inline]
pub fn tile_at(pos: DVec2) -> IVec2 {
    IVec2::new(
        (pos.x / consts::TILE_SIZE).floor() as i32,
        (pos.y / consts::TILE_SIZE).floor() as i32,
    )
}

/// World position of a tile's upper-left corner
#[inline]
pub fn tile_origin(tile: IVec2) -> DVec2 {
    DVec2::new(tile.x as f64, tile.y as f64) * consts::TILE_SIZE
}

/// Clamp each velocity component to `[-max, max]`
#[inline]
pub fn clamp_speed(vel: DVec2, max: f64) -> DVec2 {
    vel.clamp(DVec2::splat(-max), DVec2::splat(max))
}
