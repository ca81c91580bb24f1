//! Per-axis summary statistics of particle positions.

use fermata_core::STDEV_EPSILON;
use glam::Vec3;

/// Per-axis mean and population standard deviation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    /// Mean position per axis.
    pub means: Vec3,
    /// Population standard deviation per axis, never below [`STDEV_EPSILON`].
    pub stdevs: Vec3,
}

/// Summarises `positions` given their already accumulated total.
///
/// The mean comes straight from the total; the variance takes a second pass
/// and divides by the particle count.
#[must_use]
pub fn summarize(positions: &[Vec3], totaled_center: Vec3) -> Summary {
    if positions.is_empty() {
        return Summary {
            means: Vec3::ZERO,
            stdevs: Vec3::splat(STDEV_EPSILON),
        };
    }

    let count = positions.len() as f32;
    let means = totaled_center / count;
    let squared_deviation = positions
        .iter()
        .fold(Vec3::ZERO, |sum, position| {
            let deviation = *position - means;
            sum + deviation * deviation
        });
    let variance = squared_deviation / count;

    Summary {
        means,
        stdevs: Vec3::new(
            floored_sqrt(variance.x),
            floored_sqrt(variance.y),
            floored_sqrt(variance.z),
        ),
    }
}

fn floored_sqrt(variance: f32) -> f32 {
    variance.max(0.0).sqrt().max(STDEV_EPSILON)
}
