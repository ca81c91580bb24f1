//! Runs a [`Worker`] on a dedicated thread behind a request/response channel pair.
//!
//! The host owns the only sender of requests and the only receiver of events,
//! so each engine instance sees a strictly serialised command stream and no
//! state is shared with the caller. Frames are moved across the channel; the
//! engine keeps nothing it has emitted.

use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use fermata_core::{Command, CommandKind, ConfigError, EngineConfig, Event};
use thiserror::Error;
use tracing::{error, info};

use crate::{apply, clock::Clock, Worker};

/// Failures raised while driving an engine thread.
#[derive(Debug, Error)]
pub enum HostError {
    /// The configuration can never produce a running engine.
    #[error("engine configuration rejected: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// The operating system refused to start the engine thread.
    #[error("failed to start engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// A frame was requested while the previous one is still outstanding.
    #[error("a frame is already in flight for engine `{0}`")]
    StepInFlight(String),
    /// The engine thread stopped and can no longer answer requests.
    #[error("engine `{0}` is no longer running")]
    Disconnected(String),
}

/// Handle to one engine instance running on its own thread.
#[derive(Debug)]
pub struct EngineHost {
    label: String,
    requests: Option<Sender<Command>>,
    events: Receiver<Event>,
    in_flight: bool,
    failure: Option<ConfigError>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHost {
    /// Validates `config`, starts the engine thread and sends `Init`.
    ///
    /// Configuration errors are reported here, before any thread is started.
    pub fn spawn(
        label: impl Into<String>,
        config: EngineConfig,
        clock: Box<dyn Clock>,
    ) -> Result<Self, HostError> {
        config.validate()?;

        let label = label.into();
        let (request_sender, request_receiver) = mpsc::channel::<Command>();
        let (event_sender, event_receiver) = mpsc::channel::<Event>();

        let thread = thread::Builder::new()
            .name(format!("engine-{label}"))
            .spawn(move || run_worker(clock, request_receiver, event_sender))
            .map_err(HostError::Spawn)?;

        let mut host = Self {
            label,
            requests: Some(request_sender),
            events: event_receiver,
            in_flight: false,
            failure: None,
            thread: Some(thread),
        };
        host.send(Command::Init {
            config: Box::new(config),
        })?;
        info!(engine = %host.label, "engine host started");
        Ok(host)
    }

    /// Name given to the engine thread.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reports whether a requested frame has not been received yet.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Asks the engine for one frame.
    ///
    /// Refuses with [`HostError::StepInFlight`] while the previous frame is
    /// still outstanding instead of queueing a second step.
    pub fn request_frame(&mut self) -> Result<(), HostError> {
        if self.in_flight {
            return Err(HostError::StepInFlight(self.label.clone()));
        }
        self.send(Command::Ready)?;
        self.in_flight = true;
        Ok(())
    }

    /// Asks the engine to return every particle to its initial position.
    pub fn request_reset(&mut self) -> Result<(), HostError> {
        self.send(Command::Reset)
    }

    /// Moves every event that has already arrived into `out`.
    pub fn poll(&mut self, out: &mut Vec<Event>) -> Result<(), HostError> {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.observe(event, out)?,
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(HostError::Disconnected(self.label.clone()))
                }
            }
        }
    }

    /// Blocks until at least one event arrives or `timeout` elapses, then polls.
    ///
    /// Returns `Ok(false)` when the timeout expired without any event.
    pub fn wait(&mut self, timeout: Duration, out: &mut Vec<Event>) -> Result<bool, HostError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.observe(event, out)?;
                self.poll(out)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                Err(HostError::Disconnected(self.label.clone()))
            }
        }
    }

    fn observe(&mut self, event: Event, out: &mut Vec<Event>) -> Result<(), HostError> {
        match &event {
            Event::FrameComputed { .. } => self.in_flight = false,
            Event::InitializationFailed { error } => {
                self.in_flight = false;
                self.failure = Some(error.clone());
            }
            Event::CommandIgnored {
                command: CommandKind::Ready,
                ..
            } => self.in_flight = false,
            Event::CommandIgnored { .. } => {}
        }
        out.push(event);

        match &self.failure {
            Some(error) => Err(HostError::InvalidConfig(error.clone())),
            None => Ok(()),
        }
    }

    fn send(&mut self, command: Command) -> Result<(), HostError> {
        if let Some(error) = &self.failure {
            return Err(HostError::InvalidConfig(error.clone()));
        }

        let Some(requests) = &self.requests else {
            return Err(HostError::Disconnected(self.label.clone()));
        };
        requests
            .send(command)
            .map_err(|_| HostError::Disconnected(self.label.clone()))
    }
}

impl Drop for EngineHost {
    fn drop(&mut self) {
        drop(self.requests.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(engine = %self.label, "engine thread panicked");
            } else {
                info!(engine = %self.label, "engine host stopped");
            }
        }
    }
}

fn run_worker(clock: Box<dyn Clock>, requests: Receiver<Command>, events: Sender<Event>) {
    let mut worker = Worker::new(clock);
    let mut pending = Vec::new();

    for command in requests {
        apply(&mut worker, command, &mut pending);
        for event in pending.drain(..) {
            if events.send(event).is_err() {
                return;
            }
        }
    }
}
