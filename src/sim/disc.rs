//! Finite-radius disc approximated by boundary samples
//!
//! The disc is eight points on its rim, each moved with the point mover. Their
//! results are fused into one step for the center: free flight, a single
//! contact, or a corner contact resolved with one extra synthesized sample at
//! the tangent intersection of the two touching samples. After the move any
//! sample left inside a solid pushes the center back out.

use std::f64::consts::FRAC_PI_4;

use glam::{DVec2, IVec2};

use super::geometry::on_grid_line;
use super::grid::{Bounded, Shape, TileGrid};
use super::point::move_point;
use crate::consts::{CONTACT_EPSILON, DISC_SAMPLES, GRAVITY_REFINEMENT_ROUNDS, MAX_SAMPLE_HITS, TILE_SIZE};
use crate::settings::DiscSettings;
use crate::{clamp_speed, tile_at, tile_origin};

/// Greedy unstick passes; each frees at least one more sample or gives up
const UNSTICK_ROUNDS: usize = 4;

/// How the rim samples of one step were combined into the center's motion.
/// Indices are rim sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Free,
    Single(usize),
    /// Pair resolved with the synthesized sample at their tangent corner
    Corner(usize, usize),
    /// Synthesized sample was degenerate; one of the pair stood in for it
    Fallback(usize, usize),
    /// No usable pair, the most deflected sample won
    MostConstrained(usize),
}

/// Result of moving a disc for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscStep {
    pub center: DVec2,
    pub vel: DVec2,
    pub hit: Option<IVec2>,
    pub contact: Contact,
    /// The center was pushed out of a solid after the move
    pub unstuck: bool,
}

/// One rim point moved through the grid
#[derive(Debug, Clone, Copy)]
struct Sample {
    delta: DVec2,
    vel: DVec2,
    hit: Option<IVec2>,
    shape: Shape,
}

/// Moves discs of one radius. Offsets are precomputed at construction.
#[derive(Debug, Clone)]
pub struct DiscMover {
    settings: DiscSettings,
    /// Rim offsets at 0, 45, ..., 315 degrees; index 2 is the bottom
    offsets: [DVec2; DISC_SAMPLES],
    /// Tangent intersection of the rim tangents at samples `i` and `j`
    corners: [[Option<DVec2>; DISC_SAMPLES]; DISC_SAMPLES],
}

impl DiscMover {
    pub fn new(settings: &DiscSettings) -> Self {
        let radius = settings.radius;
        let normals: [DVec2; DISC_SAMPLES] = std::array::from_fn(rim_normal);
        let offsets = normals.map(|n| n * radius);

        // Filled pairwise so the table is symmetric by construction
        let mut corners = [[None; DISC_SAMPLES]; DISC_SAMPLES];
        for i in 0..DISC_SAMPLES {
            for j in (i + 1)..DISC_SAMPLES {
                if matches!(ring_distance(i, j), 1 | 2) {
                    let (a, b) = (normals[i], normals[j]);
                    let corner = (a + b) * radius / (1.0 + a.dot(b));
                    corners[i][j] = Some(corner);
                    corners[j][i] = Some(corner);
                }
            }
        }

        Self {
            settings: settings.clone(),
            offsets,
            corners,
        }
    }

    #[inline]
    pub fn settings(&self) -> &DiscSettings {
        &self.settings
    }

    #[inline]
    pub fn sample_offsets(&self) -> &[DVec2; DISC_SAMPLES] {
        &self.offsets
    }

    /// Synthesized corner offset between two samples (adjacent or 90 degrees apart)
    #[inline]
    pub fn corner_offset(&self, i: usize, j: usize) -> Option<DVec2> {
        self.corners.get(i)?.get(j).copied().flatten()
    }

    /// Move a disc centered at `center` for one step.
    ///
    /// `vel` is the velocity before gravity; the returned velocity already
    /// includes gravity and any bounce damping.
    pub fn move_disc<G: TileGrid + ?Sized>(&self, world: &Bounded<'_, G>, center: DVec2, vel: DVec2) -> DiscStep {
        let damping = self.settings.bounce_damping;
        let free_vel = clamp_speed(vel + DVec2::new(0.0, self.settings.gravity), self.settings.max_speed);
        // A floor bounce may never rebound faster than the damped incoming speed
        let ceiling = vel.y.abs() * damping;

        let mut samples = Vec::with_capacity(DISC_SAMPLES);
        let mut hits = Vec::with_capacity(MAX_SAMPLE_HITS);
        for index in sample_order(free_vel) {
            let sample = self.run_sample(world, center, self.offsets[index], vel, ceiling);
            samples.push(sample);
            if sample.hit.is_some() {
                hits.push((index, sample));
                if hits.len() >= MAX_SAMPLE_HITS {
                    break;
                }
            }
        }

        let (chosen, vel, contact) = match hits.as_slice() {
            [] => (samples[0], samples[0].vel, Contact::Free),
            [(index, only)] => (*only, only.vel * damping, Contact::Single(*index)),
            _ => {
                let (fused, contact) = self.resolve_contact(world, center, vel, ceiling, free_vel, &hits);
                (fused, fused.vel * damping, contact)
            }
        };

        let mut center = center + chosen.delta;
        let hit = chosen.hit.or_else(|| hits.first().and_then(|(_, s)| s.hit));
        let unstuck = match self.unstick(world, center) {
            Some(offset) => {
                center += offset;
                true
            }
            None => false,
        };

        log::trace!(
            "disc step: center={center:?} vel={vel:?} hits={} {contact:?} hit={hit:?} unstuck={unstuck}",
            hits.len()
        );
        DiscStep {
            center,
            vel,
            hit,
            contact,
            unstuck,
        }
    }

    /// Move one rim point, halving gravity while a floor bounce would rebound
    /// above the ceiling.
    ///
    /// Gravity makes a flat floor bounce rebound faster than it arrived, so
    /// with non-zero gravity every such bounce runs all refinement rounds and
    /// keeps `gravity / 2^GRAVITY_REFINEMENT_ROUNDS` of the step's gravity.
    fn run_sample<G: TileGrid + ?Sized>(
        &self,
        world: &Bounded<'_, G>,
        center: DVec2,
        offset: DVec2,
        vel: DVec2,
        ceiling: f64,
    ) -> Sample {
        let start = center + offset;
        let mut gravity = self.settings.gravity;
        let mut round = 0;
        loop {
            let v = clamp_speed(vel + DVec2::new(0.0, gravity), self.settings.max_speed);
            let step = move_point(world, start, v);
            let rebound = if v.y > 0.0 && step.vel.y < 0.0 {
                -step.vel.y * self.settings.bounce_damping
            } else {
                0.0
            };
            if rebound > ceiling + CONTACT_EPSILON && gravity > 0.0 && round < GRAVITY_REFINEMENT_ROUNDS {
                gravity *= 0.5;
                round += 1;
                continue;
            }
            return Sample {
                delta: step.pos - start,
                vel: step.vel,
                hit: step.hit,
                shape: step.hit.map_or(Shape::None, |tile| world.shape(tile)),
            };
        }
    }

    /// Fuse two or more contacts into a single sample
    fn resolve_contact<G: TileGrid + ?Sized>(
        &self,
        world: &Bounded<'_, G>,
        center: DVec2,
        vel: DVec2,
        ceiling: f64,
        free_vel: DVec2,
        hits: &[(usize, Sample)],
    ) -> (Sample, Contact) {
        let slanted = hits.iter().any(|(_, s)| s.shape.is_triangle());
        let pair = hits.iter().enumerate().find_map(|(n, &(i, a))| {
            hits[n + 1..]
                .iter()
                .find(|&&(j, _)| {
                    let gap = ring_distance(i, j);
                    if slanted {
                        gap == 1
                    } else {
                        gap == 2 && i % 2 == 0 && j % 2 == 0
                    }
                })
                .map(|&(j, b)| (i, a, j, b))
        });

        let Some((i, a, j, b)) = pair else {
            return most_constrained(hits, free_vel);
        };
        let Some(offset) = self.corner_offset(i, j) else {
            return most_constrained(hits, free_vel);
        };

        let corner = self.run_sample(world, center, offset, vel, ceiling);
        if corner.hit.is_some() && corner.vel != DVec2::ZERO {
            return (corner, Contact::Corner(i, j));
        }

        log::trace!("corner sample between {i} and {j} degenerate, using one of the touching samples");
        (touching_fallback(corner, a, b, free_vel), Contact::Fallback(i, j))
    }

    /// Offset that pushes the disc out of any solid its rim samples are
    /// embedded in. `None` when nothing is embedded or no candidate helps.
    pub fn unstick<G: TileGrid + ?Sized>(&self, world: &Bounded<'_, G>, center: DVec2) -> Option<DVec2> {
        let eps = self.settings.unstick_epsilon;
        let mut total = DVec2::ZERO;
        let mut embedded = self.embedded_count(world, center);
        if embedded == 0 {
            return None;
        }

        for _ in 0..UNSTICK_ROUNDS {
            let current = center + total;
            let mut best: Option<(usize, f64, DVec2)> = None;
            for &offset in &self.offsets {
                let Some((shape, local)) = buried_in(world, current + offset) else {
                    continue;
                };
                for candidate in escape_offsets(shape, local, eps) {
                    let remaining = self.embedded_count(world, current + candidate);
                    let length = candidate.length();
                    if best.is_none_or(|(r, l, _)| remaining < r || (remaining == r && length < l)) {
                        best = Some((remaining, length, candidate));
                    }
                }
            }

            match best {
                Some((remaining, _, candidate)) if remaining < embedded => {
                    total += candidate;
                    embedded = remaining;
                    if embedded == 0 {
                        break;
                    }
                }
                _ => break,
            }
        }

        if total == DVec2::ZERO {
            log::debug!("disc at {center:?} is embedded but no escape frees it");
            return None;
        }
        log::debug!("unstuck disc at {center:?} by {total:?} ({embedded} samples still embedded)");
        Some(total)
    }

    fn embedded_count<G: TileGrid + ?Sized>(&self, world: &Bounded<'_, G>, center: DVec2) -> usize {
        self.offsets
            .iter()
            .filter(|&&offset| buried_in(world, center + offset).is_some())
            .count()
    }
}

/// Solid a rim point is buried in, as the shape and the point's local
/// coordinates in one of its tiles.
///
/// A point on a grid line is buried only when every tile meeting there holds
/// it, counting the boundary on the grid line's axis and nowhere else.
fn buried_in<G: TileGrid + ?Sized>(world: &Bounded<'_, G>, p: DVec2) -> Option<(Shape, DVec2)> {
    // Keeps the seam coordinate inside each tile so `embeds` stays strict
    // along the other axis only
    const SEAM_INSET: f64 = 2.0 * CONTACT_EPSILON;

    let seam_x = on_grid_line(p.x);
    let seam_y = on_grid_line(p.y);
    let base = tile_at(p);
    let mut buried = None;
    for dx in if seam_x { -1..=0 } else { 0..=0 } {
        for dy in if seam_y { -1..=0 } else { 0..=0 } {
            let tile = base + IVec2::new(dx, dy);
            let shape = world.shape(tile);
            let mut local = p - tile_origin(tile);
            if seam_x {
                local.x = local.x.clamp(SEAM_INSET, TILE_SIZE - SEAM_INSET);
            }
            if seam_y {
                local.y = local.y.clamp(SEAM_INSET, TILE_SIZE - SEAM_INSET);
            }
            if !shape.embeds(local) {
                return None;
            }
            buried.get_or_insert((shape, local));
        }
    }
    buried
}

/// Unit vector of rim sample `i`, with exact zeros on the axes
fn rim_normal(i: usize) -> DVec2 {
    let n = DVec2::from_angle(i as f64 * FRAC_PI_4);
    let snap = |c: f64| if c.abs() < 1e-12 { 0.0 } else { c };
    DVec2::new(snap(n.x), snap(n.y))
}

/// Angular distance between two rim samples, in 45 degree steps
#[inline]
fn ring_distance(i: usize, j: usize) -> usize {
    let d = (i as isize - j as isize).rem_euclid(DISC_SAMPLES as isize) as usize;
    d.min(DISC_SAMPLES - d)
}

/// Evaluation order: start two samples behind the travel direction and sweep
/// forward, so angular neighbors run back to back and the leading half first.
fn sample_order(vel: DVec2) -> impl Iterator<Item = usize> {
    let lead = if vel == DVec2::ZERO {
        2
    } else {
        let octant = (vel.y.atan2(vel.x) / FRAC_PI_4).round() as i64;
        octant.rem_euclid(DISC_SAMPLES as i64) as usize
    };
    (0..DISC_SAMPLES).map(move |k| (lead + DISC_SAMPLES - 2 + k) % DISC_SAMPLES)
}

/// The contact whose motion deviates most from free flight
fn most_constrained(hits: &[(usize, Sample)], free_vel: DVec2) -> (Sample, Contact) {
    let deviation = |s: &Sample| (s.delta - free_vel).length();
    let (index, sample) = hits
        .iter()
        .copied()
        .fold(hits[0], |best, hit| if deviation(&hit.1) > deviation(&best.1) { hit } else { best });
    (sample, Contact::MostConstrained(index))
}

/// Stand-in for a corner sample that missed or came to a dead stop: a moving
/// touching sample, preferably one whose vertical motion reversed.
fn touching_fallback(corner: Sample, a: Sample, b: Sample, free_vel: DVec2) -> Sample {
    let fallback = if corner.hit.is_some() { corner } else { a };
    [a, b]
        .into_iter()
        .find(|s| s.vel != DVec2::ZERO && s.vel.y * free_vel.y < 0.0)
        .or_else(|| [a, b].into_iter().find(|s| s.vel != DVec2::ZERO))
        .unwrap_or(fallback)
}

/// Ways out of a solid tile for a point at `local`: through each face, and
/// across the hypotenuse for triangles.
fn escape_offsets(shape: Shape, local: DVec2, eps: f64) -> Vec<DVec2> {
    let mut out = vec![
        DVec2::new(-local.x - eps, 0.0),
        DVec2::new(TILE_SIZE - local.x + eps, 0.0),
        DVec2::new(0.0, -local.y - eps),
        DVec2::new(0.0, TILE_SIZE - local.y + eps),
    ];
    if shape.is_triangle() {
        let gradient = shape.solid_gradient();
        let normal = gradient.normalize();
        let depth = shape.solidity(local) / gradient.length();
        out.push(-normal * (depth + eps));
    }
    out
}
