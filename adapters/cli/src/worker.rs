use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use fermata_core::{decode_message, encode_message, Command, Event, Message};
use fermata_engine::{
    self as engine,
    clock::{Clock, FixedStepClock, MonotonicClock},
    Worker,
};
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct WorkerOptions {
    /// Replaces the seed of every `init` message.
    pub(crate) seed: Option<u64>,
    /// Steps per second of a fixed-step engine clock.
    pub(crate) fixed_step: Option<u32>,
}

/// Applies one message per input line and writes every result as a line of output.
///
/// Blank, malformed and unrecognized lines are logged and skipped.
pub(crate) fn serve(
    options: WorkerOptions,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    let clock: Box<dyn Clock> = match options.fixed_step {
        Some(fps) => Box::new(FixedStepClock::per_frame(fps)),
        None => Box::new(MonotonicClock::new()),
    };
    let mut worker = Worker::new(clock);
    let mut events = Vec::new();
    let mut results = 0_u64;

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = line.context("failed to read message from input")?;
        if line.trim().is_empty() {
            continue;
        }

        let message = match decode_message(&line) {
            Ok(message) => message,
            Err(error) => {
                warn!(line = line_number, %error, "skipping message");
                continue;
            }
        };

        let Some(mut command) = message.into_command() else {
            warn!(line = line_number, "result messages only travel from the engine");
            continue;
        };
        if let (Command::Init { config }, Some(seed)) = (&mut command, options.seed) {
            config.seed = Some(seed);
        }

        engine::apply(&mut worker, command, &mut events);
        for event in events.drain(..) {
            match event {
                Event::FrameComputed { frame } => {
                    let encoded = encode_message(&Message::Result(frame))
                        .context("failed to encode result message")?;
                    writeln!(output, "{encoded}").context("failed to write result message")?;
                    output.flush().context("failed to flush result message")?;
                    results += 1;
                }
                Event::InitializationFailed { error } => {
                    error!(line = line_number, %error, "engine initialisation failed");
                }
                Event::CommandIgnored { .. } => {}
            }
        }
    }

    info!(results, "input closed, worker stopping");
    Ok(())
}
