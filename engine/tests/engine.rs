use std::time::Duration;

use fermata_core::{
    Command, CommandKind, ConfigError, EngineConfig, Event, ForceKind, ForceWeights, FrameResult,
    IgnoreReason, Vec3, STDEV_EPSILON,
};
use fermata_engine::{
    self as engine,
    clock::{Clock, FixedStepClock},
    forces, query, Engine, Worker,
};

fn frame_clock() -> Box<dyn Clock> {
    Box::new(FixedStepClock::per_frame(30))
}

fn pair_config(weights: ForceWeights) -> EngineConfig {
    EngineConfig {
        period_seconds: 8.0,
        bounds: Vec3::splat(20.0),
        inner_bounds: None,
        initial_positions: vec![Vec3::new(-10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0)],
        weights,
        seed: Some(11),
    }
}

fn attraction_only() -> ForceWeights {
    ForceWeights {
        maximum_velocity: 0.05,
        attraction_repulsion_bias: 2.0,
        attraction_repulsion_intensity: 1.0,
        ..ForceWeights::disabled()
    }
}

fn step(worker: &mut Worker) -> FrameResult {
    let mut events = Vec::new();
    engine::apply(worker, Command::Ready, &mut events);
    match events.pop() {
        Some(Event::FrameComputed { frame }) => frame,
        other => panic!("expected a computed frame, got {other:?}"),
    }
}

fn initialised(config: EngineConfig) -> Worker {
    let mut worker = Worker::new(frame_clock());
    let mut events = Vec::new();
    engine::apply(
        &mut worker,
        Command::Init {
            config: Box::new(config),
        },
        &mut events,
    );
    assert!(events.is_empty(), "init should not reply: {events:?}");
    worker
}

fn separation(frame: &FrameResult) -> f32 {
    frame.positions[0].distance(frame.positions[1])
}

#[test]
fn attraction_pulls_pair_together_then_stays_bounded() {
    let mut worker = initialised(pair_config(attraction_only()));

    let mut previous = 20.0;
    for _ in 0..5 {
        let frame = step(&mut worker);
        assert_eq!(frame.attraction_repulsion_factor, 1.0);
        let current = separation(&frame);
        assert!(
            current < previous,
            "separation grew from {previous} to {current}"
        );
        previous = current;
    }

    for _ in 0..200 {
        let frame = step(&mut worker);
        assert!(separation(&frame) < 20.0);
    }
}

#[test]
fn bounds_return_walks_particles_back_inside() {
    let weights = ForceWeights {
        maximum_velocity: 0.05,
        bounding_return_intensity: 0.1,
        ..ForceWeights::disabled()
    };
    let mut config = pair_config(weights);
    config.initial_positions = vec![Vec3::new(30.0, 0.0, 0.0), Vec3::new(-30.0, 0.0, 0.0)];
    let mut worker = initialised(config);

    let mut previous = [30.0_f32, -30.0_f32];
    let mut inside = false;
    for _ in 0..20 {
        let frame = step(&mut worker);
        let current = [frame.positions[0].x, frame.positions[1].x];
        assert!(current[0] < previous[0]);
        assert!(current[1] > previous[1]);
        previous = current;

        if current[0] <= 20.0 && current[1] >= -20.0 {
            inside = true;
            break;
        }
    }
    assert!(inside, "particles never re-entered the bounds");
}

#[test]
fn running_totals_match_positions_after_every_step() {
    let weights = ForceWeights {
        maximum_velocity: 0.02,
        attraction_repulsion_intensity: 0.005,
        distancing_threshold: 0.005,
        matching_velocity_intensity: 0.03,
        bounding_return_intensity: 0.1,
        ..ForceWeights::disabled()
    };
    let mut config = pair_config(weights);
    config.initial_positions = (0..30)
        .map(|index| {
            let angle = index as f32 * 0.7;
            Vec3::new(angle.cos() * 15.0, angle.sin() * 4.0, (angle * 0.5).sin() * 15.0)
        })
        .collect();
    let mut worker = initialised(config);

    for _ in 0..100 {
        let frame = step(&mut worker);
        let engine = query::engine(&worker).expect("engine");
        let summed: Vec3 = frame.positions.iter().copied().sum();
        assert!((summed - query::totaled_center(engine)).length() < 1e-3);

        let velocity_sum: Vec3 = query::particle_view(engine)
            .iter()
            .map(|particle| particle.velocity)
            .sum();
        assert!((velocity_sum - query::totaled_velocity(engine)).length() < 1e-4);
    }
}

#[test]
fn coincident_particles_report_epsilon_deviation() {
    let weights = ForceWeights {
        maximum_velocity: 0.02,
        attraction_repulsion_intensity: 0.5,
        distancing_threshold: 0.1,
        ..ForceWeights::disabled()
    };
    let mut config = pair_config(weights);
    config.initial_positions = vec![Vec3::new(2.0, -1.0, 4.0); 6];
    let mut worker = initialised(config);

    for _ in 0..10 {
        let frame = step(&mut worker);
        assert_eq!(frame.stdevs, Vec3::splat(STDEV_EPSILON));
        assert!(frame.stdevs.min_element() >= STDEV_EPSILON);
    }
}

#[test]
fn clock_percentage_repeats_every_period() {
    let config = pair_config(attraction_only());
    let period = Duration::from_secs_f32(config.period_seconds);
    let mut engine = Engine::new(config, Box::new(FixedStepClock::new(period))).expect("engine");

    let first = engine.step().clock_percentage;
    for _ in 0..20 {
        let next = engine.step().clock_percentage;
        let wrapped = (first - next).abs().min(1.0 - (first - next).abs());
        assert!(wrapped < 1e-4, "{first} vs {next}");
    }
}

#[test]
fn zero_weight_matches_skipping_the_force() {
    let weights = ForceWeights {
        maximum_velocity: 0.05,
        revert_intensity: 0.05,
        bounding_return_intensity: 0.25,
        matching_velocity_intensity: 0.0,
        ..ForceWeights::disabled()
    };
    let mut config = pair_config(weights);
    config.initial_positions = vec![
        Vec3::new(25.0, 3.0, -1.0),
        Vec3::new(-4.0, 21.5, 0.5),
        Vec3::new(0.25, -0.75, -30.0),
    ];
    let bounds = config.bounds;
    let initial = config.initial_positions.clone();
    let mut engine = Engine::new(config, frame_clock()).expect("engine");

    let active = query::active_forces(&engine);
    assert!(!active.contains(ForceKind::VelocityMatching));
    assert_eq!(
        active.kinds(),
        vec![ForceKind::Reversion, ForceKind::BoundsReturn]
    );

    let maximum_speed = query::maximum_speed(&engine);
    let mut positions = initial.clone();
    let mut velocities = vec![Vec3::ZERO; positions.len()];
    for _ in 0..50 {
        let deltas: Vec<Vec3> = positions
            .iter()
            .zip(initial.iter())
            .map(|(position, origin)| {
                forces::reversion(*position, *origin, 0.05)
                    + forces::bounds_return(*position, bounds, None, 0.25)
            })
            .collect();
        for ((position, velocity), delta) in positions
            .iter_mut()
            .zip(velocities.iter_mut())
            .zip(deltas)
        {
            *velocity = forces::clamp_speed(*velocity + delta, maximum_speed);
            *position += *velocity;
        }

        let frame = engine.step();
        assert_eq!(frame.positions, positions);
    }
}

#[test]
fn velocity_never_exceeds_maximum_speed() {
    let weights = ForceWeights {
        maximum_velocity: 0.01,
        attraction_repulsion_intensity: 0.5,
        distancing_threshold: 0.2,
        matching_velocity_intensity: 0.5,
        revert_intensity: 0.3,
        bounding_return_intensity: 1.0,
        ..ForceWeights::disabled()
    };
    let mut config = pair_config(weights);
    config.initial_positions = (0..12)
        .map(|index| Vec3::new(index as f32 * 5.0 - 30.0, 10.0 - index as f32, 3.0))
        .collect();
    let mut engine = Engine::new(config, frame_clock()).expect("engine");
    let maximum_speed = query::maximum_speed(&engine);

    for _ in 0..100 {
        let _ = engine.step();
        for particle in query::particle_view(&engine).iter() {
            assert!(particle.velocity.length() <= maximum_speed * (1.0 + 1e-5));
        }
    }
}

#[test]
fn reset_returns_to_initial_positions_without_stale_totals() {
    let config = pair_config(attraction_only());
    let initial = config.initial_positions.clone();
    let mut worker = initialised(config);

    let mut drifted = 0.0;
    for _ in 0..10 {
        let frame = step(&mut worker);
        drifted = frame
            .positions
            .iter()
            .zip(initial.iter())
            .map(|(position, origin)| position.distance(*origin))
            .sum::<f32>();
    }

    let mut events = Vec::new();
    engine::apply(&mut worker, Command::Reset, &mut events);
    assert!(events.is_empty());

    let engine = query::engine(&worker).expect("engine");
    let maximum_speed = query::maximum_speed(engine);
    let expected_total: Vec3 = initial.iter().copied().sum();
    assert_eq!(query::totaled_center(engine), expected_total);
    assert_eq!(query::totaled_velocity(engine), Vec3::ZERO);

    let frame = step(&mut worker);
    let mut recovered = 0.0;
    for (position, origin) in frame.positions.iter().zip(initial.iter()) {
        assert!(position.is_finite());
        let distance = position.distance(*origin);
        assert!(distance <= maximum_speed + 1e-4);
        recovered += distance;
    }
    assert!(recovered < drifted);
    assert!(frame.means.is_finite());
    assert!(frame.stdevs.is_finite());
}

#[test]
fn single_particle_fails_initialisation_distinctly() {
    let mut config = pair_config(attraction_only());
    config.initial_positions.truncate(1);

    let mut worker = Worker::new(frame_clock());
    let mut events = Vec::new();
    engine::apply(
        &mut worker,
        Command::Init {
            config: Box::new(config),
        },
        &mut events,
    );
    engine::apply(&mut worker, Command::Ready, &mut events);

    assert_eq!(
        events,
        vec![
            Event::InitializationFailed {
                error: ConfigError::TooFewParticles { count: 1 },
            },
            Event::CommandIgnored {
                command: CommandKind::Ready,
                reason: IgnoreReason::EngineFailed,
            },
        ]
    );
    assert!(query::engine(&worker).is_none());
    assert_eq!(
        query::failure(&worker),
        Some(&ConfigError::TooFewParticles { count: 1 })
    );
}

#[test]
fn sequence_counts_steps_across_reset() {
    let mut worker = initialised(pair_config(attraction_only()));
    assert_eq!(step(&mut worker).sequence, 1);
    assert_eq!(step(&mut worker).sequence, 2);

    let mut events = Vec::new();
    engine::apply(&mut worker, Command::Reset, &mut events);
    assert!(events.is_empty());
    assert_eq!(query::engine(&worker).map(query::sequence), Some(2));
    assert_eq!(step(&mut worker).sequence, 3);
}

#[test]
fn emitted_frames_are_not_aliased() {
    let mut worker = initialised(pair_config(attraction_only()));
    let first = step(&mut worker);
    let retained = first.positions.clone();
    let _ = step(&mut worker);
    assert_eq!(first.positions, retained);
}
