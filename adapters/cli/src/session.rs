use std::{
    io::Write,
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use fermata_core::{Command, Event};
use fermata_engine::{
    clock::{Clock, FixedStepClock, MonotonicClock},
    host::EngineHost,
};
use fermata_system_bootstrap::{cloud_label, plan_session, SessionPlan, GROUP_LABEL};
use fermata_system_consumer::{CloudPresentation, GroupPresentation, Installation};
use fermata_system_sound_mapping::MasterVolume;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{OutputFormat, SessionConfig};

/// Longest wait for a single frame in lockstep mode.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Steps per second assumed by engine clocks when time is simulated.
const SIMULATED_STEPS_PER_SECOND: u32 = 30;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum OutputLine<'a> {
    Cloud(&'a CloudPresentation),
    Group(&'a GroupPresentation),
}

struct Hosts {
    clouds: Vec<EngineHost>,
    group: EngineHost,
}

impl Hosts {
    fn spawn(plan: &SessionPlan, realtime: bool) -> Result<Self> {
        let clouds = plan
            .clouds
            .iter()
            .map(|cloud| {
                let label = cloud_label(cloud.index);
                EngineHost::spawn(label.clone(), cloud.config.clone(), engine_clock(realtime))
                    .with_context(|| format!("failed to start engine `{label}`"))
            })
            .collect::<Result<Vec<_>>>()?;

        let group = EngineHost::spawn(GROUP_LABEL, plan.group.clone(), engine_clock(realtime))
            .context("failed to start the group engine")?;

        Ok(Self { clouds, group })
    }
}

fn engine_clock(realtime: bool) -> Box<dyn Clock> {
    if realtime {
        Box::new(MonotonicClock::new())
    } else {
        Box::new(FixedStepClock::per_frame(SIMULATED_STEPS_PER_SECOND))
    }
}

/// Drives a full session, writing presentations to `output` in JSON mode.
pub(crate) fn run(config: &SessionConfig, mut output: impl Write) -> Result<()> {
    let plan = plan_session(&config.layout, config.seed).context("failed to plan session")?;
    let mut hosts = Hosts::spawn(&plan, config.realtime)?;
    let mut installation = Installation::from_plan(&plan);
    installation
        .group_mut()
        .set_master_volume(MasterVolume::at_stage(config.master_volume_stage));

    info!(
        clouds = plan.clouds.len(),
        frames = config.frames,
        seed = ?config.seed,
        realtime = config.realtime,
        "session started"
    );

    let lockstep = !config.realtime;
    let tick = Duration::from_secs_f64(config.tick_seconds);
    let started = Instant::now();
    let mut events = Vec::new();
    let mut commands = Vec::new();
    let mut presented = vec![0_u64; plan.clouds.len()];
    let mut group_presented = 0_u64;

    for frame in 0..config.frames {
        let now = if config.realtime {
            started.elapsed().as_secs_f64()
        } else {
            frame as f64 * config.tick_seconds
        };

        if config.reset_at == Some(frame) {
            installation.request_reset(now);
            info!(frame, "reset requested for every engine");
        }

        for (cloud, host) in installation
            .clouds_mut()
            .iter_mut()
            .zip(hosts.clouds.iter_mut())
        {
            collect(host, lockstep, &mut events)?;
            if let Some(presentation) = cloud.handle(&events, now, &mut commands) {
                presented[presentation.cloud] += 1;
                report_cloud(config.format, &presentation, &mut output)?;
            }
            events.clear();
            dispatch(host, &mut commands)?;
        }

        collect(&mut hosts.group, lockstep, &mut events)?;
        if let Some(presentation) = installation.group_mut().handle(&events, now, &mut commands) {
            group_presented += 1;
            report_group(config.format, &presentation, &mut output)?;
        }
        events.clear();
        dispatch(&mut hosts.group, &mut commands)?;

        if config.realtime {
            thread::sleep(tick);
        }
    }

    output.flush().context("failed to flush session output")?;
    info!(
        cloud_frames = ?presented,
        group_frames = group_presented,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "session finished"
    );
    Ok(())
}

fn collect(host: &mut EngineHost, lockstep: bool, events: &mut Vec<Event>) -> Result<()> {
    if lockstep {
        while host.is_in_flight() {
            if !host.wait(RESPONSE_TIMEOUT, events)? {
                bail!(
                    "engine `{}` did not answer within {RESPONSE_TIMEOUT:?}",
                    host.label()
                );
            }
        }
    }
    host.poll(events)?;
    Ok(())
}

fn dispatch(host: &mut EngineHost, commands: &mut Vec<Command>) -> Result<()> {
    for command in commands.drain(..) {
        match command {
            Command::Ready => host.request_frame()?,
            Command::Reset => host.request_reset()?,
            Command::Init { .. } => bail!("engine `{}` is already initialised", host.label()),
        }
    }
    Ok(())
}

fn report_cloud(
    format: OutputFormat,
    presentation: &CloudPresentation,
    output: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_line(&OutputLine::Cloud(presentation), output),
        OutputFormat::Log => {
            match presentation.audio {
                Some(audio) => info!(
                    cloud = presentation.cloud,
                    sequence = presentation.sequence,
                    chord = audio.chord_crossfade,
                    wet = audio.effect_wet,
                    factor = presentation.attraction_repulsion_factor,
                    clock = presentation.clock_percentage,
                    "cloud audio updated"
                ),
                None => debug!(
                    cloud = presentation.cloud,
                    sequence = presentation.sequence,
                    mean = ?presentation.means,
                    stdev = ?presentation.stdevs,
                    "cloud presented"
                ),
            }
            Ok(())
        }
    }
}

fn report_group(
    format: OutputFormat,
    presentation: &GroupPresentation,
    output: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_line(&OutputLine::Group(presentation), output),
        OutputFormat::Log => {
            debug!(
                sequence = presentation.sequence,
                volumes_db = ?presentation.volumes_db,
                "group presented"
            );
            Ok(())
        }
    }
}

fn write_line(line: &OutputLine<'_>, output: &mut impl Write) -> Result<()> {
    serde_json::to_writer(&mut *output, line).context("failed to encode presentation")?;
    output
        .write_all(b"\n")
        .context("failed to write presentation")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fermata_system_bootstrap::SessionLayout;

    fn small_config(format: OutputFormat) -> SessionConfig {
        SessionConfig {
            frames: 40,
            seed: Some(6),
            format,
            layout: SessionLayout {
                cloud_count: 2,
                cloud_size: 5,
                ..SessionLayout::default()
            },
            ..SessionConfig::default()
        }
    }

    fn json_lines(config: &SessionConfig) -> Vec<serde_json::Value> {
        let mut buffer = Vec::new();
        run(config, &mut buffer).expect("session");
        String::from_utf8(buffer)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn json_session_emits_cloud_and_group_lines() {
        let lines = json_lines(&small_config(OutputFormat::Json));

        let clouds = lines.iter().filter(|line| line["kind"] == "cloud").count();
        let groups = lines.iter().filter(|line| line["kind"] == "group").count();
        assert!(clouds >= 2 * 10, "only {clouds} cloud lines");
        assert!(groups >= 10, "only {groups} group lines");

        let first = lines
            .iter()
            .find(|line| line["kind"] == "cloud")
            .expect("cloud line");
        assert_eq!(first["transforms"].as_array().map(Vec::len), Some(5));
        assert_eq!(first["sequence"], 1);
    }

    #[test]
    fn seeded_sessions_replay_identically() {
        let config = small_config(OutputFormat::Json);
        assert_eq!(json_lines(&config), json_lines(&config));
    }

    #[test]
    fn log_session_writes_nothing_to_output() {
        let mut buffer = Vec::new();
        run(&small_config(OutputFormat::Log), &mut buffer).expect("session");
        assert!(buffer.is_empty());
    }

    #[test]
    fn reset_mid_session_keeps_running() {
        let mut config = small_config(OutputFormat::Json);
        config.reset_at = Some(20);
        let lines = json_lines(&config);
        let last = lines
            .iter()
            .rev()
            .find(|line| line["kind"] == "cloud")
            .expect("cloud line");
        assert!(last["sequence"].as_u64().unwrap_or_default() > 5);
    }
}
