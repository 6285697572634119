//! Physics tuning
//!
//! Loaded from a JSON file on native builds; every field falls back to its
//! tuned default when missing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{
    BOUNCE_DAMPING, DISC_GRAVITY, DISC_MAX_SPEED, DISC_RADIUS, HISTORY_LENGTH,
    LOOP_CHECK_INTERVAL, MAX_BODY_STEPS, MAX_EXTREME_REVISITS, TILE_SIZE, UNSTICK_EPSILON,
};

/// Errors raised while loading or checking settings
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Disc mover parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscSettings {
    /// Disc radius in world units
    pub radius: f64,
    /// Added to vertical velocity every step (y grows downward)
    pub gravity: f64,
    /// Per-axis speed clamp applied after gravity
    pub max_speed: f64,
    /// Fraction of velocity kept after a bounce
    pub bounce_damping: f64,
    /// Extra push past a face when freeing an embedded sample
    pub unstick_epsilon: f64,
}

impl Default for DiscSettings {
    fn default() -> Self {
        Self {
            radius: DISC_RADIUS,
            gravity: DISC_GRAVITY,
            max_speed: DISC_MAX_SPEED,
            bounce_damping: BOUNCE_DAMPING,
            unstick_epsilon: UNSTICK_EPSILON,
        }
    }
}

/// Body controller parameters (history ring and loop breaker)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySettings {
    /// Recent centers kept for throw velocity and loop detection
    pub history_len: usize,
    /// Steps between loop breaker checks
    pub loop_check_interval: u32,
    /// Halt when the summed distance of the history from its mean drops below this
    pub deviation_threshold: f64,
    /// Distance within which a history entry counts as a revisit of the lowest point
    pub revisit_radius: f64,
    /// Halt when the lowest point is revisited more often than this
    pub max_revisits: usize,
    /// Hard ceiling on steps since release
    pub max_steps: u32,
}

impl Default for BodySettings {
    fn default() -> Self {
        Self {
            history_len: HISTORY_LENGTH,
            loop_check_interval: LOOP_CHECK_INTERVAL,
            deviation_threshold: 16.0,
            revisit_radius: 1.0,
            max_revisits: MAX_EXTREME_REVISITS,
            max_steps: MAX_BODY_STEPS,
        }
    }
}

/// All tunable physics settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub disc: DiscSettings,
    pub body: BodySettings,
}

impl Settings {
    /// Load and validate settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would break the movers' preconditions
    pub fn validate(&self) -> Result<(), SettingsError> {
        let disc = &self.disc;
        if !(disc.radius > 0.0) {
            return Err(SettingsError::Invalid(format!("radius must be positive, got {}", disc.radius)));
        }
        if !(disc.max_speed > 0.0) || disc.max_speed + disc.radius >= TILE_SIZE {
            return Err(SettingsError::Invalid(format!(
                "max_speed + radius must stay below the tile size {TILE_SIZE}, got {} + {}",
                disc.max_speed, disc.radius
            )));
        }
        if !(disc.gravity >= 0.0 && disc.gravity < disc.max_speed) {
            return Err(SettingsError::Invalid(format!(
                "gravity must be in [0, max_speed), got {}",
                disc.gravity
            )));
        }
        if !(disc.bounce_damping > 0.0 && disc.bounce_damping < 1.0) {
            return Err(SettingsError::Invalid(format!(
                "bounce_damping must be in (0, 1), got {}",
                disc.bounce_damping
            )));
        }
        if !(disc.unstick_epsilon > 0.0 && disc.unstick_epsilon < disc.radius) {
            return Err(SettingsError::Invalid(format!(
                "unstick_epsilon must be in (0, radius), got {}",
                disc.unstick_epsilon
            )));
        }

        let body = &self.body;
        if body.history_len < 2 {
            return Err(SettingsError::Invalid("history_len must be at least 2".into()));
        }
        if body.loop_check_interval == 0 || body.max_steps == 0 {
            return Err(SettingsError::Invalid(
                "loop_check_interval and max_steps must be non-zero".into(),
            ));
        }
        if body.deviation_threshold < 0.0 || body.revisit_radius < 0.0 {
            return Err(SettingsError::Invalid(
                "deviation_threshold and revisit_radius must not be negative".into(),
            ));
        }
        Ok(())
    }
}
