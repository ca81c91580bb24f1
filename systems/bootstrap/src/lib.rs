#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure bootstrap system that prepares a Fermata session.
//!
//! The installation is a ring of boid clouds. Each cloud is simulated by its
//! own engine, and a separate group engine moves the cloud anchors around the
//! installation. [`plan_session`] turns a [`SessionLayout`] into the engine
//! configurations and presentation data needed to start every engine.

use std::f32::consts::TAU;

use fermata_core::{ConfigError, EngineConfig, ForceWeights, Vec3};
use fermata_system_color_grading::Color;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use thiserror::Error;

/// Number of clouds in the default installation.
pub const CLOUD_COUNT: usize = 6;

/// Particles per cloud in the default installation.
pub const CLOUD_SIZE: usize = 30;

/// Oscillation periods assigned to clouds by index, in seconds.
pub const CLOUD_PERIOD_SECONDS: [f32; 7] = [8.0, 13.0, 21.0, 34.0, 55.0, 89.0, 144.0];

/// Horizontal half-extent of one cloud.
pub const CLOUD_XZ_RANGE: f32 = 25.0;

/// Vertical range of one cloud. Its engine bounds use half of it.
pub const CLOUD_Y_RANGE: f32 = CLOUD_XZ_RANGE / 2.0;

/// Horizontal half-extent of the whole installation.
pub const OVERALL_XZ_RANGE: f32 = 70.0;

/// Vertical half-extent of the whole installation.
pub const OVERALL_Y_RANGE: f32 = 0.0;

/// Extra ring radius that keeps clouds away from the centre.
pub const OVERALL_XZ_INNER_RADIUS: f32 = 15.0;

/// Force weights used by every cloud engine.
pub const CLOUD_WEIGHTS: ForceWeights = ForceWeights {
    maximum_velocity: 0.02,
    attraction_repulsion_bias: 0.0,
    attraction_repulsion_intensity: 0.005,
    revert_intensity: 0.0,
    distancing_threshold: 0.005,
    matching_velocity_intensity: 0.03,
    bounding_return_intensity: 0.1,
};

/// Force weights used by the group engine that moves the cloud anchors.
pub const GROUP_WEIGHTS: ForceWeights = ForceWeights {
    maximum_velocity: 0.005,
    attraction_repulsion_bias: -0.75,
    attraction_repulsion_intensity: 0.01,
    revert_intensity: 0.05,
    distancing_threshold: 0.2,
    matching_velocity_intensity: 0.0,
    bounding_return_intensity: 0.25,
};

/// Tunable description of the installation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionLayout {
    /// Number of clouds arranged on the ring.
    pub cloud_count: usize,
    /// Particles simulated by each cloud engine.
    pub cloud_size: usize,
    /// Period assigned to each cloud by index; the longest drives the group.
    pub cloud_periods: Vec<f32>,
    /// Symmetric half-extents of every cloud.
    pub cloud_bounds: Vec3,
    /// Horizontal half-extent of the installation.
    pub overall_xz_range: f32,
    /// Vertical half-extent of the installation.
    pub overall_y_range: f32,
    /// Extra ring radius, also the horizontal size of the group's inner void.
    pub inner_radius: f32,
    /// Weights applied to every cloud engine.
    pub cloud_weights: ForceWeights,
    /// Weights applied to the group engine.
    pub group_weights: ForceWeights,
}

impl Default for SessionLayout {
    fn default() -> Self {
        Self {
            cloud_count: CLOUD_COUNT,
            cloud_size: CLOUD_SIZE,
            cloud_periods: CLOUD_PERIOD_SECONDS.to_vec(),
            cloud_bounds: Vec3::new(CLOUD_XZ_RANGE, CLOUD_Y_RANGE / 2.0, CLOUD_XZ_RANGE),
            overall_xz_range: OVERALL_XZ_RANGE,
            overall_y_range: OVERALL_Y_RANGE,
            inner_radius: OVERALL_XZ_INNER_RADIUS,
            cloud_weights: CLOUD_WEIGHTS,
            group_weights: GROUP_WEIGHTS,
        }
    }
}

impl SessionLayout {
    /// Radius of the ring the cloud anchors start on.
    #[must_use]
    pub fn ring_radius(&self) -> f32 {
        self.overall_xz_range + self.inner_radius
    }

    /// Bounds of the group engine.
    #[must_use]
    pub fn group_bounds(&self) -> Vec3 {
        Vec3::new(
            self.overall_xz_range,
            self.overall_y_range,
            self.overall_xz_range,
        )
    }

    /// Inner void of the group engine.
    ///
    /// The vertical extent exceeds the flat ring so anchors near the centre
    /// are always pushed back out.
    #[must_use]
    pub fn group_inner_bounds(&self) -> Vec3 {
        Vec3::new(
            self.inner_radius,
            self.overall_y_range + 1.0,
            self.inner_radius,
        )
    }
}

/// Everything needed to start and present one cloud.
#[derive(Clone, Debug, PartialEq)]
pub struct CloudPlan {
    /// Index of the cloud on the ring.
    pub index: usize,
    /// Starting position of the cloud within the installation.
    pub anchor: Vec3,
    /// Colour of a particle sitting exactly on the cloud mean.
    pub base_color: Color,
    /// Engine configuration of the cloud.
    pub config: EngineConfig,
}

/// Engine configurations and presentation data for a whole session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionPlan {
    /// One plan per cloud, in ring order.
    pub clouds: Vec<CloudPlan>,
    /// Configuration of the group engine; particle `i` is cloud `i`'s anchor.
    pub group: EngineConfig,
}

impl SessionPlan {
    /// Starting anchors of every cloud, in ring order.
    #[must_use]
    pub fn anchors(&self) -> Vec<Vec3> {
        self.clouds.iter().map(|cloud| cloud.anchor).collect()
    }
}

/// Failures raised while planning a session.
#[derive(Debug, Error, PartialEq)]
pub enum BootstrapError {
    /// Fewer periods were listed than clouds requested.
    #[error("{clouds} clouds need as many periods, only {periods} were listed")]
    NotEnoughPeriods {
        /// Requested number of clouds.
        clouds: usize,
        /// Number of periods available.
        periods: usize,
    },
    /// A planned engine configuration would be rejected by the engine.
    #[error("engine `{engine}` would not start: {source}")]
    InvalidEngine {
        /// Label of the offending engine.
        engine: String,
        /// Underlying configuration problem.
        #[source]
        source: ConfigError,
    },
}

/// Label used for cloud `index` in logs and host names.
#[must_use]
pub fn cloud_label(index: usize) -> String {
    format!("cloud-{index}")
}

/// Label used for the group engine in logs and host names.
pub const GROUP_LABEL: &str = "group";

/// Plans a session from the layout.
///
/// With a seed, initial positions and every engine seed are derived from it,
/// so the whole session replays identically. Without one, entropy is used.
pub fn plan_session(
    layout: &SessionLayout,
    seed: Option<u64>,
) -> Result<SessionPlan, BootstrapError> {
    if layout.cloud_periods.len() < layout.cloud_count {
        return Err(BootstrapError::NotEnoughPeriods {
            clouds: layout.cloud_count,
            periods: layout.cloud_periods.len(),
        });
    }

    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let ring_radius = layout.ring_radius();
    let mut clouds = Vec::with_capacity(layout.cloud_count);
    for index in 0..layout.cloud_count {
        let angle = TAU * index as f32 / layout.cloud_count as f32;
        let anchor = Vec3::new(
            angle.cos() * ring_radius,
            layout.overall_y_range,
            angle.sin() * ring_radius,
        );
        let initial_positions = (0..layout.cloud_size)
            .map(|_| random_direction(&mut rng) * (layout.cloud_bounds / 1.5))
            .collect();

        let config = EngineConfig {
            period_seconds: layout.cloud_periods[index],
            bounds: layout.cloud_bounds,
            inner_bounds: None,
            initial_positions,
            weights: layout.cloud_weights,
            seed: seed.map(|_| rng.gen()),
        };
        validated(cloud_label(index), &config)?;

        clouds.push(CloudPlan {
            index,
            anchor,
            base_color: Color::from_hsl(index as f32 / layout.cloud_count as f32, 0.5, 0.4),
            config,
        });
    }

    let group = EngineConfig {
        period_seconds: layout
            .cloud_periods
            .iter()
            .copied()
            .fold(0.0, f32::max),
        bounds: layout.group_bounds(),
        inner_bounds: Some(layout.group_inner_bounds()),
        initial_positions: clouds.iter().map(|cloud| cloud.anchor).collect(),
        weights: layout.group_weights,
        seed: seed.map(|_| rng.gen()),
    };
    validated(GROUP_LABEL.to_owned(), &group)?;

    Ok(SessionPlan { clouds, group })
}

fn validated(engine: String, config: &EngineConfig) -> Result<(), BootstrapError> {
    config
        .validate()
        .map_err(|source| BootstrapError::InvalidEngine { engine, source })
}

/// Uniformly distributed unit vector.
pub fn random_direction<R: Rng>(rng: &mut R) -> Vec3 {
    let height: f32 = rng.gen_range(-1.0..=1.0);
    let azimuth: f32 = rng.gen_range(0.0..TAU);
    let ring = (1.0 - height * height).max(0.0).sqrt();
    Vec3::new(ring * azimuth.cos(), height, ring * azimuth.sin())
}
