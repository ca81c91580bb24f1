#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative boid simulation engine for Fermata.
//!
//! An [`Engine`] owns every particle of one cloud (or of the group of clouds)
//! and advances them one step per `Ready` command. A [`Worker`] wraps the
//! engine lifecycle so that commands arriving in any order are answered with
//! well-defined events, and [`host::EngineHost`] runs a worker on its own
//! thread behind a request/response channel pair.

pub mod clock;
pub mod forces;
pub mod host;
pub mod oscillator;
pub mod statistics;

use fermata_core::{
    Command, CommandKind, ConfigError, EngineConfig, Event, ForceKind, FrameResult, IgnoreReason,
};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use self::{clock::Clock, forces::ActiveForces};

/// Simulation state for one isolated particle collection.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    period_offset: f64,
    elapsed_seconds: f64,
    maximum_speed: f32,
    distancing_threshold_squared: f32,
    forces: ActiveForces,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    initial_positions: Vec<Vec3>,
    totaled_center: Vec3,
    totaled_velocity: Vec3,
    deltas: Vec<Option<Vec3>>,
    sequence: u64,
}

impl Engine {
    /// Creates an engine from a validated configuration.
    ///
    /// The clock is restarted so elapsed time is measured from initialisation.
    pub fn new(config: EngineConfig, mut clock: Box<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let period = f64::from(config.period_seconds);
        let period_offset = rng.gen_range(0.0..period);

        let count = config.particle_count();
        let initial_positions = config.initial_positions.clone();
        let positions = initial_positions.clone();
        let totaled_center: Vec3 = positions.iter().copied().sum();

        clock.restart();

        Ok(Self {
            maximum_speed: (config.bounds * config.weights.maximum_velocity).length(),
            distancing_threshold_squared: config.bounds.length_squared()
                * config.weights.distancing_threshold,
            forces: ActiveForces::from_weights(&config.weights),
            velocities: vec![Vec3::ZERO; count],
            deltas: Vec::with_capacity(count),
            totaled_velocity: Vec3::ZERO,
            elapsed_seconds: 0.0,
            sequence: 0,
            period_offset,
            initial_positions,
            positions,
            totaled_center,
            clock,
            config,
        })
    }

    /// Advances every particle by one step and reports the resulting frame.
    pub fn step(&mut self) -> FrameResult {
        self.elapsed_seconds = self.clock.elapsed().as_secs_f64();
        let clock_percentage = oscillator::clock_percentage(
            self.elapsed_seconds,
            self.period_offset,
            f64::from(self.config.period_seconds),
        );
        let factor = oscillator::attraction_repulsion_factor(
            clock_percentage,
            self.config.weights.attraction_repulsion_bias,
        );

        self.deltas.clear();
        for index in 0..self.positions.len() {
            let delta = self.velocity_delta(index, factor);
            self.deltas.push(delta);
        }

        let mut center_total = Vec3::ZERO;
        let mut velocity_total = Vec3::ZERO;
        for ((position, velocity), delta) in self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(self.deltas.iter())
        {
            if let Some(delta) = delta {
                *velocity = forces::clamp_speed(*velocity + *delta, self.maximum_speed);
            }
            *position += *velocity;
            center_total += *position;
            velocity_total += *velocity;
        }
        self.totaled_center = center_total;
        self.totaled_velocity = velocity_total;
        self.sequence = self.sequence.saturating_add(1);

        let summary = statistics::summarize(&self.positions, self.totaled_center);
        debug!(
            sequence = self.sequence,
            clock_percentage,
            factor,
            mean = ?summary.means,
            stdev = ?summary.stdevs,
            "engine step computed"
        );

        FrameResult {
            sequence: self.sequence,
            means: summary.means,
            stdevs: summary.stdevs,
            positions: self.positions.clone(),
            clock_percentage,
            attraction_repulsion_factor: factor,
        }
    }

    /// Snaps every particle back to its initial position at rest.
    ///
    /// Running totals are recomputed from the restored state.
    pub fn reset(&mut self) {
        self.positions.copy_from_slice(&self.initial_positions);
        self.velocities.fill(Vec3::ZERO);
        self.totaled_center = self.positions.iter().copied().sum();
        self.totaled_velocity = Vec3::ZERO;
    }

    fn velocity_delta(&self, index: usize, factor: f32) -> Option<Vec3> {
        let weights = &self.config.weights;
        let count = self.positions.len();
        let position = self.positions[index];
        let velocity = self.velocities[index];
        let mut delta = None;

        if self.forces.contains(ForceKind::CenterMass) {
            accumulate(
                &mut delta,
                forces::center_mass(
                    position,
                    self.totaled_center,
                    count,
                    factor,
                    weights.attraction_repulsion_intensity,
                ),
            );
        }

        if self.forces.contains(ForceKind::Distancing) {
            accumulate(
                &mut delta,
                forces::distancing(index, &self.positions, self.distancing_threshold_squared),
            );
        }

        if self.forces.contains(ForceKind::VelocityMatching) {
            accumulate(
                &mut delta,
                forces::velocity_matching(
                    velocity,
                    self.totaled_velocity,
                    count,
                    weights.matching_velocity_intensity,
                ),
            );
        }

        if self.forces.contains(ForceKind::Reversion) {
            accumulate(
                &mut delta,
                forces::reversion(position, self.initial_positions[index], weights.revert_intensity),
            );
        }

        if self.forces.contains(ForceKind::BoundsReturn) {
            accumulate(
                &mut delta,
                forces::bounds_return(
                    position,
                    self.config.bounds,
                    self.config.inner_bounds,
                    weights.bounding_return_intensity,
                ),
            );
        }

        delta
    }
}

// Disabled forces never touch the sum, not even as a zero vector.
fn accumulate(delta: &mut Option<Vec3>, contribution: Vec3) {
    *delta = Some(match *delta {
        Some(sum) => sum + contribution,
        None => contribution,
    });
}

/// Lifecycle wrapper that answers every command with well-defined events.
///
/// A worker starts out waiting for `Init`. A valid configuration creates the
/// engine; an invalid one leaves the worker permanently failed.
#[derive(Debug)]
pub struct Worker {
    clock: Option<Box<dyn Clock>>,
    engine: Option<Engine>,
    failure: Option<ConfigError>,
}

impl Worker {
    /// Creates a worker that will hand `clock` to its engine on `Init`.
    #[must_use]
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock: Some(clock),
            engine: None,
            failure: None,
        }
    }

    fn initialize(&mut self, config: EngineConfig, out_events: &mut Vec<Event>) {
        if self.engine.is_some() {
            ignore(CommandKind::Init, IgnoreReason::AlreadyInitialized, out_events);
            return;
        }

        let Some(clock) = self.clock.take() else {
            ignore(CommandKind::Init, IgnoreReason::EngineFailed, out_events);
            return;
        };

        let particles = config.particle_count();
        let period_seconds = config.period_seconds;
        match Engine::new(config, clock) {
            Ok(engine) => {
                info!(
                    particles,
                    period_seconds,
                    period_offset = engine.period_offset,
                    "engine initialised"
                );
                self.engine = Some(engine);
            }
            Err(error) => {
                warn!(%error, "engine initialisation failed");
                self.failure = Some(error.clone());
                out_events.push(Event::InitializationFailed { error });
            }
        }
    }

    fn unavailable_reason(&self) -> IgnoreReason {
        if self.failure.is_some() {
            IgnoreReason::EngineFailed
        } else {
            IgnoreReason::NotInitialized
        }
    }
}

fn ignore(command: CommandKind, reason: IgnoreReason, out_events: &mut Vec<Event>) {
    warn!(?command, ?reason, "engine ignored command");
    out_events.push(Event::CommandIgnored { command, reason });
}

/// Applies the provided command to the worker, appending the resulting events.
pub fn apply(worker: &mut Worker, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Init { config } => worker.initialize(*config, out_events),
        Command::Ready => {
            let reason = worker.unavailable_reason();
            match worker.engine.as_mut() {
                Some(engine) => {
                    let frame = engine.step();
                    out_events.push(Event::FrameComputed { frame });
                }
                None => ignore(CommandKind::Ready, reason, out_events),
            }
        }
        Command::Reset => {
            let reason = worker.unavailable_reason();
            match worker.engine.as_mut() {
                Some(engine) => {
                    engine.reset();
                    info!(sequence = engine.sequence, "engine reset to initial positions");
                }
                None => ignore(CommandKind::Reset, reason, out_events),
            }
        }
    }
}

/// Query functions that provide read-only access to engine state.
pub mod query {
    use fermata_core::{ParticleSnapshot, ParticleView};
    use glam::Vec3;

    use super::{forces::ActiveForces, Engine, Worker};

    /// Engine owned by the worker, once initialised.
    #[must_use]
    pub fn engine(worker: &Worker) -> Option<&Engine> {
        worker.engine.as_ref()
    }

    /// Configuration error that left the worker unusable, if any.
    #[must_use]
    pub fn failure(worker: &Worker) -> Option<&fermata_core::ConfigError> {
        worker.failure.as_ref()
    }

    /// Captures a read-only view of every particle.
    #[must_use]
    pub fn particle_view(engine: &Engine) -> ParticleView {
        let snapshots = engine
            .positions
            .iter()
            .zip(engine.velocities.iter())
            .zip(engine.initial_positions.iter())
            .enumerate()
            .map(
                |(index, ((position, velocity), initial_position))| ParticleSnapshot {
                    index,
                    position: *position,
                    velocity: *velocity,
                    initial_position: *initial_position,
                },
            )
            .collect();
        ParticleView::from_snapshots(snapshots)
    }

    /// Running sum of all particle positions.
    #[must_use]
    pub fn totaled_center(engine: &Engine) -> Vec3 {
        engine.totaled_center
    }

    /// Running sum of all particle velocities.
    #[must_use]
    pub fn totaled_velocity(engine: &Engine) -> Vec3 {
        engine.totaled_velocity
    }

    /// Seconds elapsed on the engine clock at the most recent step.
    #[must_use]
    pub fn elapsed_seconds(engine: &Engine) -> f64 {
        engine.elapsed_seconds
    }

    /// Random phase drawn at initialisation, in `[0, periodSeconds)`.
    #[must_use]
    pub fn period_offset(engine: &Engine) -> f64 {
        engine.period_offset
    }

    /// Speed no particle velocity may exceed: `|bounds * maximumVelocity|`.
    #[must_use]
    pub fn maximum_speed(engine: &Engine) -> f32 {
        engine.maximum_speed
    }

    /// Squared neighbour radius: `|bounds|² * distancingThreshold`.
    #[must_use]
    pub fn distancing_threshold_squared(engine: &Engine) -> f32 {
        engine.distancing_threshold_squared
    }

    /// Forces that contribute to each step.
    #[must_use]
    pub fn active_forces(engine: &Engine) -> ActiveForces {
        engine.forces
    }

    /// Number of steps computed since initialisation.
    #[must_use]
    pub fn sequence(engine: &Engine) -> u64 {
        engine.sequence
    }
}
