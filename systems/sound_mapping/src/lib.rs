#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Maps cloud statistics onto audio control parameters.
//!
//! A cloud centred on its origin favours the chord voice of its crossfade; a
//! tightly packed cloud drives its effect fully wet. Clusters placed farther
//! from the centre of the installation play quieter.

use fermata_core::{FrameResult, Vec3};
use serde::{Deserialize, Serialize};

/// Cluster volume at the centre of the installation, in decibels.
pub const NEAR_DB: f32 = 0.0;

/// Cluster volume at the edge of the group bounds, in decibels.
pub const FAR_DB: f32 = -20.0;

/// Master volume stages a listener can cycle through, in decibels.
pub const MASTER_VOLUME_STAGES_DB: [f32; 4] = [0.0, -5.0, -10.0, -20.0];

/// Audio controls derived from a single cloud frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParameters {
    /// Crossfade position between the drone (0) and the chord (1).
    pub chord_crossfade: f32,
    /// Wet/dry mix of the cloud's effect, in `0.0..=1.0`.
    pub effect_wet: f32,
}

/// Derives both audio controls from a frame of a cloud with the provided bounds.
#[must_use]
pub fn audio_parameters(frame: &FrameResult, bounds: Vec3) -> AudioParameters {
    AudioParameters {
        chord_crossfade: chord_crossfade(frame.means, bounds),
        effect_wet: effect_wet(frame.stdevs, bounds),
    }
}

/// `1 - mean(|mean_i| / (bounds_i / 2))`, clamped to `0.0..=1.0`.
///
/// Axes without extent are skipped. With no usable axis the result is `1.0`.
#[must_use]
pub fn chord_crossfade(means: Vec3, bounds: Vec3) -> f32 {
    inverted_average(means.abs(), bounds * 0.5)
}

/// `1 - mean(stdev_i / bounds_i)`, clamped to `0.0..=1.0`.
///
/// Axes without extent are skipped. With no usable axis the result is `1.0`.
#[must_use]
pub fn effect_wet(stdevs: Vec3, bounds: Vec3) -> f32 {
    inverted_average(stdevs, bounds)
}

fn inverted_average(values: Vec3, extents: Vec3) -> f32 {
    let (sum, axes) = values
        .to_array()
        .into_iter()
        .zip(extents.to_array())
        .filter(|(_, extent)| *extent > 0.0)
        .fold((0.0, 0_u8), |(sum, axes), (value, extent)| {
            (sum + value / extent, axes + 1)
        });

    if axes == 0 {
        return 1.0;
    }

    (1.0 - sum / f32::from(axes)).clamp(0.0, 1.0)
}

/// Volume of a cluster anchored at `anchor`, in decibels.
///
/// Falls linearly from [`NEAR_DB`] at the origin to [`FAR_DB`] at a distance of
/// `|group_bounds|` and stays there beyond it; `master_db` is added on top.
#[must_use]
pub fn cluster_volume_db(anchor: Vec3, group_bounds: Vec3, master_db: f32) -> f32 {
    let reach = group_bounds.length();
    if reach <= 0.0 {
        return NEAR_DB + master_db;
    }

    let travelled = (anchor.length() / reach).clamp(0.0, 1.0);
    NEAR_DB + (FAR_DB - NEAR_DB) * travelled + master_db
}

/// Listener-facing master volume that cycles through [`MASTER_VOLUME_STAGES_DB`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MasterVolume {
    stage: usize,
}

impl MasterVolume {
    /// Starts at the provided stage, wrapping out-of-range indices.
    #[must_use]
    pub const fn at_stage(stage: usize) -> Self {
        Self {
            stage: stage % MASTER_VOLUME_STAGES_DB.len(),
        }
    }

    /// Index of the current stage.
    #[must_use]
    pub const fn stage(&self) -> usize {
        self.stage
    }

    /// Current master offset in decibels.
    #[must_use]
    pub const fn db(&self) -> f32 {
        MASTER_VOLUME_STAGES_DB[self.stage]
    }
}
