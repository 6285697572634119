//! Body controller
//!
//! Drives one disc a frame at a time, keeps a short ring of recent centers
//! and halts the body once it is clearly done bouncing.

use std::collections::VecDeque;

use glam::{DVec2, IVec2};

use super::disc::DiscMover;
use super::grid::{Bounded, TileGrid};
use crate::clamp_speed;
use crate::settings::{BodySettings, Settings};

/// Why the loop breaker stopped a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Recent centers barely deviate from their mean
    Settled,
    /// The lowest recent point keeps getting revisited
    Oscillating,
    /// Too many steps since release
    StepLimit,
}

/// Result of one controller step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyStep {
    pub center: DVec2,
    pub vel: DVec2,
    pub hit: Option<IVec2>,
    pub halted: bool,
}

/// One disc-shaped body, held or in flight
#[derive(Debug, Clone)]
pub struct BodyController {
    disc: DiscMover,
    settings: BodySettings,
    center: DVec2,
    vel: DVec2,
    history: VecDeque<DVec2>,
    steps: u32,
    halted: bool,
    halt_reason: Option<HaltReason>,
}

impl BodyController {
    /// New body at the origin, held (not moving) until released
    pub fn new(settings: &Settings) -> Self {
        Self {
            disc: DiscMover::new(&settings.disc),
            settings: settings.body.clone(),
            center: DVec2::ZERO,
            vel: DVec2::ZERO,
            history: VecDeque::with_capacity(settings.body.history_len),
            steps: 0,
            halted: true,
            halt_reason: None,
        }
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        self.center
    }

    #[inline]
    pub fn vel(&self) -> DVec2 {
        self.vel
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[inline]
    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    /// Steps taken since the last release
    #[inline]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn history(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.history.iter().copied()
    }

    /// Put the body somewhere and hold it there
    pub fn place(&mut self, center: DVec2) {
        self.center = center;
        self.vel = DVec2::ZERO;
        self.halted = true;
        self.halt_reason = None;
        self.reset_history();
    }

    /// Move a held body, recording the position for the throw estimate
    pub fn record_held(&mut self, center: DVec2) {
        self.center = center;
        self.push_history(center);
    }

    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Mean per-step displacement over the recorded history, clamped to the
    /// disc's maximum speed
    pub fn throw_velocity(&self) -> DVec2 {
        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return DVec2::ZERO;
        };
        if self.history.len() < 2 {
            return DVec2::ZERO;
        }
        let mean = (*last - *first) / (self.history.len() - 1) as f64;
        clamp_speed(mean, self.disc.settings().max_speed)
    }

    /// Let go of the body with the given velocity. Clears the history so the
    /// loop breaker only sees the flight.
    pub fn release(&mut self, vel: DVec2) {
        let max = self.disc.settings().max_speed;
        self.vel = clamp_speed(vel, max);
        self.steps = 0;
        self.halted = false;
        self.halt_reason = None;
        self.reset_history();
        log::debug!("released body at {:?} with velocity {:?}", self.center, self.vel);
    }

    /// Release with the velocity estimated from the held history
    pub fn throw(&mut self) {
        let vel = self.throw_velocity();
        self.release(vel);
    }

    /// Advance a released body by one frame. Halted bodies stay put.
    pub fn step<G: TileGrid + ?Sized>(&mut self, world: &Bounded<'_, G>) -> BodyStep {
        if self.halted {
            return BodyStep {
                center: self.center,
                vel: self.vel,
                hit: None,
                halted: true,
            };
        }

        let step = self.disc.move_disc(world, self.center, self.vel);
        self.center = step.center;
        self.vel = step.vel;
        self.steps += 1;
        self.push_history(step.center);

        if let Some(reason) = self.check_loop() {
            self.halt(reason);
        }

        BodyStep {
            center: self.center,
            vel: self.vel,
            hit: step.hit,
            halted: self.halted,
        }
    }

    fn push_history(&mut self, center: DVec2) {
        if self.history.len() >= self.settings.history_len {
            self.history.pop_front();
        }
        self.history.push_back(center);
    }

    fn check_loop(&self) -> Option<HaltReason> {
        if self.steps > self.settings.max_steps {
            return Some(HaltReason::StepLimit);
        }
        if self.settings.loop_check_interval == 0
            || self.steps % self.settings.loop_check_interval != 0
            || self.history.len() < self.settings.history_len
        {
            return None;
        }

        let count = self.history.len() as f64;
        let mean = self.history.iter().copied().sum::<DVec2>() / count;
        let deviation: f64 = self.history.iter().map(|p| p.distance(mean)).sum();
        if deviation < self.settings.deviation_threshold {
            return Some(HaltReason::Settled);
        }

        let lowest = self.lowest();
        let revisits = self
            .history
            .iter()
            .filter(|p| p.distance(lowest) <= self.settings.revisit_radius)
            .count()
            .saturating_sub(1);
        if revisits > self.settings.max_revisits {
            return Some(HaltReason::Oscillating);
        }
        None
    }

    /// Lowest (largest y) recent center; earliest wins ties
    fn lowest(&self) -> DVec2 {
        self.history
            .iter()
            .copied()
            .fold(self.center, |low, p| if p.y > low.y { p } else { low })
    }

    fn halt(&mut self, reason: HaltReason) {
        let rest = self.lowest();
        log::info!(
            "halting body after {} steps ({reason:?}): {:?} -> {:?}",
            self.steps,
            self.center,
            rest
        );
        self.center = rest;
        self.vel = DVec2::ZERO;
        self.halted = true;
        self.halt_reason = Some(reason);
    }
}
