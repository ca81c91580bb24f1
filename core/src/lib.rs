#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Fermata simulation.
//!
//! This crate defines the message surface that connects the consumer loop with
//! isolated simulation engines. Consumers submit [`Command`] values asking an
//! engine to initialise, compute a frame, or reset. The engine executes those
//! commands through its `apply` entry point and answers exclusively with
//! [`Event`] values. Nothing else crosses the boundary: engines never share
//! state with each other or with the consumer.

mod wire;

pub use glam::Vec3;
pub use wire::{decode_message, encode_message, Message, WireError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest particle collection an engine accepts.
///
/// Each particle averages over the *other* particles, dividing by `N - 1`.
pub const MINIMUM_PARTICLES: usize = 2;

/// Floor applied to every reported standard deviation.
pub const STDEV_EPSILON: f32 = 0.01;

/// Commands that express every request a consumer may send to an engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Creates the engine state from the provided configuration.
    Init {
        /// Immutable configuration established for the lifetime of the engine.
        config: Box<EngineConfig>,
    },
    /// Asks the engine to compute exactly one frame.
    ///
    /// Callers must wait for the matching [`Event::FrameComputed`] before
    /// sending another `Ready`.
    Ready,
    /// Returns every particle to its initial position with zero velocity.
    Reset,
}

impl Command {
    /// Discriminant of the command without its payload.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Init { .. } => CommandKind::Init,
            Self::Ready => CommandKind::Ready,
            Self::Reset => CommandKind::Reset,
        }
    }
}

/// Payload-free discriminant of a [`Command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Discriminant of [`Command::Init`].
    Init,
    /// Discriminant of [`Command::Ready`].
    Ready,
    /// Discriminant of [`Command::Reset`].
    Reset,
}

/// Events emitted by an engine after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Carries the frame produced by a single step.
    FrameComputed {
        /// Statistics and positions captured at the end of the step.
        frame: FrameResult,
    },
    /// Reports that initialisation failed and the engine cannot run.
    InitializationFailed {
        /// Configuration problem that prevented the engine from starting.
        error: ConfigError,
    },
    /// Reports that a command could not be honoured in the engine's state.
    CommandIgnored {
        /// Kind of command that was dropped.
        command: CommandKind,
        /// Why the engine dropped the command.
        reason: IgnoreReason,
    },
}

/// Reasons an engine may drop a command without acting on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IgnoreReason {
    /// No `Init` command has been received yet.
    NotInitialized,
    /// The engine was already initialised; configuration is immutable.
    AlreadyInitialized,
    /// A previous initialisation failed, so the engine is unusable.
    EngineFailed,
}

/// Force-weighting scalars applied by the engine.
///
/// Every weight doubles as a switch: a value of exactly zero removes the
/// corresponding force from the step entirely.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceWeights {
    /// Maximum speed expressed as a fraction of the bounds vector.
    pub maximum_velocity: f32,
    /// Offset added to the oscillating attraction/repulsion factor.
    pub attraction_repulsion_bias: f32,
    /// Weight of the pull toward (or push away from) the other particles' centre.
    pub attraction_repulsion_intensity: f32,
    /// Weight of the pull back toward each particle's initial position.
    pub revert_intensity: f32,
    /// Neighbour radius expressed as a fraction of the squared bounds length.
    pub distancing_threshold: f32,
    /// Weight of the pull toward the other particles' average velocity.
    pub matching_velocity_intensity: f32,
    /// Weight of the inward correction applied outside the bounds.
    pub bounding_return_intensity: f32,
}

impl ForceWeights {
    /// Weights with every force switched off and no velocity allowance.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            maximum_velocity: 0.0,
            attraction_repulsion_bias: 0.0,
            attraction_repulsion_intensity: 0.0,
            revert_intensity: 0.0,
            distancing_threshold: 0.0,
            matching_velocity_intensity: 0.0,
            bounding_return_intensity: 0.0,
        }
    }

    fn named(&self) -> [(&'static str, f32); 7] {
        [
            ("maximumVelocity", self.maximum_velocity),
            ("attractionRepulsionBias", self.attraction_repulsion_bias),
            (
                "attractionRepulsionIntensity",
                self.attraction_repulsion_intensity,
            ),
            ("revertIntensity", self.revert_intensity),
            ("distancingThreshold", self.distancing_threshold),
            ("matchingVelocityIntensity", self.matching_velocity_intensity),
            ("boundingReturnIntensity", self.bounding_return_intensity),
        ]
    }
}

/// Immutable configuration supplied with [`Command::Init`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Oscillation period of the attraction/repulsion clock, in seconds.
    pub period_seconds: f32,
    /// Symmetric half-extents; the valid region is `[-bounds, bounds]` per axis.
    pub bounds: Vec3,
    /// Optional symmetric exclusion zone particles are pushed out of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_bounds: Option<Vec3>,
    /// Starting position of every particle. Its length fixes the particle count.
    pub initial_positions: Vec<Vec3>,
    /// Force-weighting scalars.
    #[serde(flatten)]
    pub weights: ForceWeights,
    /// Seed for the random period offset. Entropy is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Number of particles the configuration describes.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.initial_positions.len()
    }

    /// Checks the configuration for conditions that make the engine unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.initial_positions.len();
        if count < MINIMUM_PARTICLES {
            return Err(ConfigError::TooFewParticles { count });
        }

        if !self.period_seconds.is_finite() || self.period_seconds <= 0.0 {
            return Err(ConfigError::InvalidPeriod);
        }

        if !self.bounds.is_finite() || self.bounds.min_element() < 0.0 {
            return Err(ConfigError::InvalidBounds);
        }

        if let Some(inner) = self.inner_bounds {
            if !inner.is_finite() || inner.min_element() < 0.0 {
                return Err(ConfigError::InvalidBounds);
            }
        }

        for (field, value) in self.weights.named() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite {
                    field: field.to_owned(),
                });
            }
        }

        if self.initial_positions.iter().any(|position| !position.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "initialPositions".to_owned(),
            });
        }

        Ok(())
    }
}

/// Configuration problems that prevent an engine from running.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Fewer than [`MINIMUM_PARTICLES`] initial positions were supplied.
    #[error("at least two particles are required, {count} were provided")]
    TooFewParticles {
        /// Number of initial positions actually supplied.
        count: usize,
    },
    /// The oscillation period was zero, negative or not finite.
    #[error("period must be a positive, finite number of seconds")]
    InvalidPeriod,
    /// A bounds or inner-bounds component was negative or not finite.
    #[error("bounds must be finite and non-negative on every axis")]
    InvalidBounds,
    /// A scalar or coordinate was NaN or infinite.
    #[error("`{field}` must be finite")]
    NonFinite {
        /// Wire name of the offending field.
        field: String,
    },
}

/// Frame produced by a single engine step.
///
/// Ownership of the frame moves to the consumer; the engine keeps no alias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    /// One-based step counter of the emitting engine instance.
    pub sequence: u64,
    /// Per-axis mean of all particle positions.
    pub means: Vec3,
    /// Per-axis population standard deviation, floored at [`STDEV_EPSILON`].
    pub stdevs: Vec3,
    /// Position of every particle at the end of the step.
    pub positions: Vec<Vec3>,
    /// Fractional position within the oscillation period, in `[0, 1)`.
    pub clock_percentage: f32,
    /// Attraction (positive) or repulsion (negative) factor used for the step.
    pub attraction_repulsion_factor: f32,
}

/// The individually weighted forces that make up a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ForceKind {
    /// Pull toward or push away from the mean of the other particles.
    CenterMass,
    /// Push away from neighbours closer than the distancing threshold.
    Distancing,
    /// Pull toward the average velocity of the other particles.
    VelocityMatching,
    /// Pull back toward the particle's initial position.
    Reversion,
    /// Inward correction outside the bounds, outward push inside the inner bounds.
    BoundsReturn,
}

/// Immutable representation of a single particle used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleSnapshot {
    /// Index of the particle within its engine.
    pub index: usize,
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
    /// Position captured at initialisation.
    pub initial_position: Vec3,
}

/// Read-only snapshot describing every particle of an engine.
#[derive(Clone, Debug, Default)]
pub struct ParticleView {
    snapshots: Vec<ParticleSnapshot>,
}

impl ParticleView {
    /// Creates a new particle view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ParticleSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.index);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticleSnapshot> {
        self.snapshots.iter()
    }

    /// Number of particles captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no particles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
