//! Individually weighted sub-forces that make up a particle's velocity delta.
//!
//! Every function returns the weighted contribution for one particle. The
//! engine only calls the functions whose weight is non-zero; see
//! [`ActiveForces`].

use fermata_core::{ForceKind, ForceWeights};
use glam::Vec3;

/// The set of forces whose weight is non-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveForces {
    center_mass: bool,
    distancing: bool,
    velocity_matching: bool,
    reversion: bool,
    bounds_return: bool,
}

impl ActiveForces {
    /// Derives the enabled forces from the configured weights.
    #[must_use]
    pub fn from_weights(weights: &ForceWeights) -> Self {
        Self {
            center_mass: weights.attraction_repulsion_intensity != 0.0,
            distancing: weights.distancing_threshold != 0.0,
            velocity_matching: weights.matching_velocity_intensity != 0.0,
            reversion: weights.revert_intensity != 0.0,
            bounds_return: weights.bounding_return_intensity != 0.0,
        }
    }

    /// Reports whether the provided force contributes to each step.
    #[must_use]
    pub const fn contains(&self, kind: ForceKind) -> bool {
        match kind {
            ForceKind::CenterMass => self.center_mass,
            ForceKind::Distancing => self.distancing,
            ForceKind::VelocityMatching => self.velocity_matching,
            ForceKind::Reversion => self.reversion,
            ForceKind::BoundsReturn => self.bounds_return,
        }
    }

    /// Reports whether no force is enabled at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.center_mass
            || self.distancing
            || self.velocity_matching
            || self.reversion
            || self.bounds_return)
    }

    /// Enabled forces in step order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ForceKind> {
        [
            ForceKind::CenterMass,
            ForceKind::Distancing,
            ForceKind::VelocityMatching,
            ForceKind::Reversion,
            ForceKind::BoundsReturn,
        ]
        .into_iter()
        .filter(|kind| self.contains(*kind))
        .collect()
    }
}

/// Mean of every value except `own`, given the running total over all `count` values.
///
/// `count` must be at least two.
#[must_use]
pub fn mean_of_others(total: Vec3, own: Vec3, count: usize) -> Vec3 {
    (total - own) / (count - 1) as f32
}

/// Pull toward (positive factor) or push away from the other particles' centre.
#[must_use]
pub fn center_mass(
    position: Vec3,
    totaled_center: Vec3,
    count: usize,
    factor: f32,
    intensity: f32,
) -> Vec3 {
    let perceived_center = mean_of_others(totaled_center, position, count);
    (perceived_center - position) * (factor * intensity)
}

/// Sum of `(self - other)` over every other particle closer than the threshold.
///
/// Quadratic in the particle count when evaluated for every particle.
#[must_use]
pub fn distancing(index: usize, positions: &[Vec3], threshold_squared: f32) -> Vec3 {
    let current = positions[index];
    positions
        .iter()
        .enumerate()
        .filter(|(other_index, other)| {
            *other_index != index && current.distance_squared(**other) < threshold_squared
        })
        .fold(Vec3::ZERO, |push, (_, other)| push + (current - *other))
}

/// Pull toward the other particles' average heading.
#[must_use]
pub fn velocity_matching(
    velocity: Vec3,
    totaled_velocity: Vec3,
    count: usize,
    intensity: f32,
) -> Vec3 {
    let perceived_velocity = mean_of_others(totaled_velocity, velocity, count);
    (perceived_velocity - velocity) * intensity
}

/// Pull back toward the particle's initial position.
#[must_use]
pub fn reversion(position: Vec3, initial_position: Vec3, intensity: f32) -> Vec3 {
    (initial_position - position) * intensity
}

/// Inward correction outside the bounds, or outward push from the inner void.
///
/// Each axis outside `±bounds` contributes the bound itself pointing inward.
/// The inner push only applies when no outer axis triggered and the particle
/// lies strictly inside the inner box on all three axes at once.
#[must_use]
pub fn bounds_return(
    position: Vec3,
    bounds: Vec3,
    inner_bounds: Option<Vec3>,
    intensity: f32,
) -> Vec3 {
    let axes = [
        outward_axis(position.x, bounds.x),
        outward_axis(position.y, bounds.y),
        outward_axis(position.z, bounds.z),
    ];

    if axes.iter().any(|axis| axis.is_some()) {
        let [x, y, z] = axes.map(Option::unwrap_or_default);
        return Vec3::new(x, y, z) * intensity;
    }

    let Some(inner) = inner_bounds else {
        return Vec3::ZERO;
    };

    if position.abs().cmplt(inner).all() {
        let direction = Vec3::new(
            sign_or_positive(position.x),
            sign_or_positive(position.y),
            sign_or_positive(position.z),
        );
        return inner * direction * intensity;
    }

    Vec3::ZERO
}

/// Inward correction for one axis, or `None` when the value lies within `±bound`.
///
/// A zero bound still reports a crossing even though its correction is zero.
fn outward_axis(value: f32, bound: f32) -> Option<f32> {
    if value > bound {
        Some(-bound)
    } else if value < -bound {
        Some(bound)
    } else {
        None
    }
}

fn sign_or_positive(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Rescales `velocity` so its length never exceeds `maximum_speed`.
///
/// Direction is preserved; a non-positive maximum stops the particle.
#[must_use]
pub fn clamp_speed(velocity: Vec3, maximum_speed: f32) -> Vec3 {
    if maximum_speed <= 0.0 {
        return Vec3::ZERO;
    }

    let length_squared = velocity.length_squared();
    if length_squared <= maximum_speed * maximum_speed {
        return velocity;
    }

    velocity * (maximum_speed / length_squared.sqrt())
}
