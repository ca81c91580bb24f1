use std::time::Duration;

use fermata_core::{Command, Event};
use fermata_engine::{self as engine, clock::FixedStepClock, Worker};
use fermata_system_bootstrap::{plan_session, SessionLayout};

#[test]
fn every_planned_engine_starts_and_steps() {
    let plan = plan_session(&SessionLayout::default(), Some(77)).expect("plan");
    let configs = plan
        .clouds
        .iter()
        .map(|cloud| cloud.config.clone())
        .chain(std::iter::once(plan.group.clone()));

    for config in configs {
        let particles = config.particle_count();
        let mut worker = Worker::new(Box::new(FixedStepClock::new(Duration::from_millis(33))));
        let mut events = Vec::new();
        engine::apply(
            &mut worker,
            Command::Init {
                config: Box::new(config),
            },
            &mut events,
        );
        engine::apply(&mut worker, Command::Ready, &mut events);

        match events.as_slice() {
            [Event::FrameComputed { frame }] => {
                assert_eq!(frame.positions.len(), particles);
                assert!(frame.positions.iter().all(|position| position.is_finite()));
            }
            other => panic!("unexpected events {other:?}"),
        }
    }
}

#[test]
fn layout_reads_from_partial_toml() {
    let layout: SessionLayout = toml::from_str(
        r#"
            cloud_count = 3
            cloud_size = 12
            inner_radius = 10.0
        "#,
    )
    .expect("layout");

    assert_eq!(layout.cloud_count, 3);
    assert_eq!(layout.cloud_size, 12);
    assert_eq!(layout.ring_radius(), 80.0);
    assert_eq!(layout.cloud_periods, SessionLayout::default().cloud_periods);

    let plan = plan_session(&layout, Some(4)).expect("plan");
    assert_eq!(plan.group.initial_positions.len(), 3);
    assert_eq!(plan.group.period_seconds, 144.0);
}
