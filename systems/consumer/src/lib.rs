#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Consumer-side systems that turn engine frames into presentation updates.
//!
//! Every system follows the same cadence contract with its engine: it sends
//! one `Ready`, waits for the matching frame, and only asks for the next one
//! once it has consumed the previous frame at its own pace. Systems never talk
//! to an engine directly; they read the engine's events and append the
//! commands the engine should receive next.

mod cloud;
mod group;

pub use cloud::{instance_rotation, CloudPresentation, CloudVisuals, InstanceTransform};
pub use group::{GroupLayout, GroupPresentation};

use fermata_core::{Command, Event, FrameResult, IgnoreReason};
use fermata_system_bootstrap::SessionPlan;

/// Minimum time between two visual updates of one engine, in seconds.
pub const FRAME_SECONDS: f64 = 1.0 / 30.0;

/// Minimum time between two audio parameter updates of one cloud, in seconds.
pub const MUSIC_SECONDS: f64 = 1.0 / 10.0;

/// Rate limiter that opens once strictly more than `interval` has passed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGate {
    interval: f64,
    last: f64,
}

impl FrameGate {
    /// Creates a gate that first opens once `interval` seconds have passed.
    #[must_use]
    pub const fn new(interval: f64) -> Self {
        Self {
            interval,
            last: 0.0,
        }
    }

    /// Reports whether an update is due at `now`.
    #[must_use]
    pub fn is_open(&self, now: f64) -> bool {
        now > self.last + self.interval
    }

    /// Records an update performed at `now`.
    pub fn close(&mut self, now: f64) {
        self.last = now;
    }

    /// Time of the most recent update.
    #[must_use]
    pub const fn last(&self) -> f64 {
        self.last
    }
}

/// Why a system stopped asking its engine for frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// The engine rejected its configuration.
    InitializationFailed,
    /// The engine dropped a command it could never honour.
    Ignored(IgnoreReason),
}

/// Cadence bookkeeping shared by every consumer system.
#[derive(Debug, Default)]
pub(crate) struct EngineLink {
    started: bool,
    reset_requested: bool,
    awaiting: bool,
    discard_next: bool,
    pending: Option<FrameResult>,
    halt: Option<Halt>,
}

impl EngineLink {
    pub(crate) fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Absorbs `events`, flushes a queued reset and issues the first `Ready`.
    ///
    /// Frames computed before a flushed reset are never handed out.
    pub(crate) fn sync(&mut self, events: &[Event], out: &mut Vec<Command>) {
        if self.halt.is_some() {
            return;
        }

        for event in events {
            match event {
                Event::FrameComputed { frame } => {
                    self.awaiting = false;
                    if self.discard_next {
                        self.discard_next = false;
                        self.ready(out);
                    } else {
                        self.pending = Some(frame.clone());
                    }
                }
                Event::InitializationFailed { .. } => {
                    self.halt = Some(Halt::InitializationFailed);
                    return;
                }
                Event::CommandIgnored { reason, .. } => match reason {
                    IgnoreReason::EngineFailed => {
                        self.halt = Some(Halt::Ignored(*reason));
                        return;
                    }
                    IgnoreReason::NotInitialized | IgnoreReason::AlreadyInitialized => {}
                },
            }
        }

        if self.reset_requested {
            self.reset_requested = false;
            self.pending = None;
            out.push(Command::Reset);
            if self.awaiting {
                self.discard_next = true;
            } else if self.started {
                self.ready(out);
            }
        }

        if !self.started {
            self.started = true;
            self.ready(out);
        }
    }

    /// Hands out the pending frame when `gate` is open, queueing the next `Ready`.
    pub(crate) fn take_due(
        &mut self,
        gate: &mut FrameGate,
        now: f64,
        out: &mut Vec<Command>,
    ) -> Option<FrameResult> {
        if self.halt.is_some() || !gate.is_open(now) {
            return None;
        }

        let frame = self.pending.take()?;
        gate.close(now);
        self.ready(out);
        Some(frame)
    }

    fn ready(&mut self, out: &mut Vec<Command>) {
        self.awaiting = true;
        out.push(Command::Ready);
    }

    pub(crate) const fn halt(&self) -> Option<Halt> {
        self.halt
    }
}

/// Every consumer system of one session, in engine order.
#[derive(Debug)]
pub struct Installation {
    clouds: Vec<CloudVisuals>,
    group: GroupLayout,
    last_reset: Option<f64>,
}

impl Installation {
    /// Creates one cloud system per planned cloud plus the group layout.
    #[must_use]
    pub fn from_plan(plan: &SessionPlan) -> Self {
        let clouds = plan
            .clouds
            .iter()
            .map(|cloud| {
                CloudVisuals::new(
                    cloud.index,
                    cloud.config.period_seconds,
                    cloud.config.bounds,
                    cloud.base_color,
                )
            })
            .collect();

        Self {
            clouds,
            group: GroupLayout::new(plan.anchors(), plan.group.bounds),
            last_reset: None,
        }
    }

    /// Asks every engine to return to its initial positions.
    ///
    /// One `Reset` per engine is emitted on each system's next `handle` call.
    pub fn request_reset(&mut self, now: f64) {
        for cloud in &mut self.clouds {
            cloud.request_reset();
        }
        self.group.request_reset();
        self.last_reset = Some(now);
    }

    /// Time of the most recent reset request.
    #[must_use]
    pub const fn last_reset(&self) -> Option<f64> {
        self.last_reset
    }

    /// Cloud systems in ring order.
    #[must_use]
    pub fn clouds(&self) -> &[CloudVisuals] {
        &self.clouds
    }

    /// Mutable cloud systems in ring order.
    pub fn clouds_mut(&mut self) -> &mut [CloudVisuals] {
        &mut self.clouds
    }

    /// Group layout system.
    #[must_use]
    pub const fn group(&self) -> &GroupLayout {
        &self.group
    }

    /// Mutable group layout system.
    pub fn group_mut(&mut self) -> &mut GroupLayout {
        &mut self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fermata_core::{CommandKind, Vec3};

    fn frame(sequence: u64) -> FrameResult {
        FrameResult {
            sequence,
            means: Vec3::ZERO,
            stdevs: Vec3::ONE,
            positions: vec![Vec3::X, Vec3::NEG_X],
            clock_percentage: 0.5,
            attraction_repulsion_factor: 1.0,
        }
    }

    #[test]
    fn gate_opens_strictly_after_interval() {
        let mut gate = FrameGate::new(0.1);
        assert!(!gate.is_open(0.1));
        assert!(gate.is_open(0.11));

        gate.close(0.11);
        assert_eq!(gate.last(), 0.11);
        assert!(!gate.is_open(0.2));
        assert!(gate.is_open(0.25));
    }

    #[test]
    fn link_sends_first_ready_once() {
        let mut link = EngineLink::default();
        let mut out = Vec::new();
        link.sync(&[], &mut out);
        link.sync(&[], &mut out);
        assert_eq!(out, vec![Command::Ready]);
    }

    #[test]
    fn link_keeps_only_latest_frame() {
        let mut link = EngineLink::default();
        let mut gate = FrameGate::new(FRAME_SECONDS);
        let mut out = Vec::new();
        let events = [
            Event::FrameComputed { frame: frame(1) },
            Event::FrameComputed { frame: frame(2) },
        ];
        link.sync(&events, &mut out);
        out.clear();

        let due = link.take_due(&mut gate, 1.0, &mut out).expect("due frame");
        assert_eq!(due.sequence, 2);
        assert_eq!(out, vec![Command::Ready]);
        assert!(link.take_due(&mut gate, 2.0, &mut out).is_none());
    }

    #[test]
    fn closed_gate_holds_frame_back() {
        let mut link = EngineLink::default();
        let mut gate = FrameGate::new(FRAME_SECONDS);
        let mut out = Vec::new();
        link.sync(&[Event::FrameComputed { frame: frame(1) }], &mut out);
        out.clear();

        assert!(link.take_due(&mut gate, 0.01, &mut out).is_none());
        assert!(out.is_empty());
        assert!(link.take_due(&mut gate, 0.05, &mut out).is_some());
    }

    #[test]
    fn failed_engine_halts_the_link() {
        let mut link = EngineLink::default();
        let mut gate = FrameGate::new(FRAME_SECONDS);
        let mut out = Vec::new();
        link.sync(
            &[Event::CommandIgnored {
                command: CommandKind::Ready,
                reason: IgnoreReason::EngineFailed,
            }],
            &mut out,
        );
        assert_eq!(link.halt(), Some(Halt::Ignored(IgnoreReason::EngineFailed)));

        out.clear();
        link.request_reset();
        link.sync(&[Event::FrameComputed { frame: frame(1) }], &mut out);
        assert!(out.is_empty());
        assert!(link.take_due(&mut gate, 1.0, &mut out).is_none());
    }

    #[test]
    fn reset_precedes_first_ready() {
        let mut link = EngineLink::default();
        let mut out = Vec::new();
        link.request_reset();
        link.sync(&[], &mut out);
        assert_eq!(out, vec![Command::Reset, Command::Ready]);
    }

    #[test]
    fn reset_drops_frames_computed_before_it() {
        let mut link = EngineLink::default();
        let mut gate = FrameGate::new(FRAME_SECONDS);
        let mut out = Vec::new();
        link.sync(&[], &mut out);
        out.clear();

        link.request_reset();
        link.sync(&[Event::FrameComputed { frame: frame(1) }], &mut out);
        assert_eq!(out, vec![Command::Reset, Command::Ready]);
        assert!(link.take_due(&mut gate, 1.0, &mut out).is_none());

        out.clear();
        link.sync(&[Event::FrameComputed { frame: frame(2) }], &mut out);
        assert!(out.is_empty());
        let due = link.take_due(&mut gate, 1.0, &mut out).expect("post-reset frame");
        assert_eq!(due.sequence, 2);
    }

    #[test]
    fn reset_discards_the_answer_already_in_flight() {
        let mut link = EngineLink::default();
        let mut gate = FrameGate::new(FRAME_SECONDS);
        let mut out = Vec::new();
        link.sync(&[], &mut out);
        out.clear();

        link.request_reset();
        link.sync(&[], &mut out);
        assert_eq!(out, vec![Command::Reset]);

        out.clear();
        link.sync(&[Event::FrameComputed { frame: frame(1) }], &mut out);
        assert_eq!(out, vec![Command::Ready]);
        assert!(link.take_due(&mut gate, 1.0, &mut out).is_none());

        out.clear();
        link.sync(&[Event::FrameComputed { frame: frame(2) }], &mut out);
        let due = link.take_due(&mut gate, 1.0, &mut out).expect("post-reset frame");
        assert_eq!(due.sequence, 2);
    }
}
