use std::f64::consts::TAU;

use fermata_core::{Command, Event, Vec3};
use fermata_system_color_grading::{grade_frame, Color};
use fermata_system_sound_mapping::{audio_parameters, AudioParameters};
use serde::Serialize;

use crate::{EngineLink, FrameGate, Halt, FRAME_SECONDS, MUSIC_SECONDS};

/// Placement of one rendered particle instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InstanceTransform {
    /// Position relative to the cloud anchor.
    pub position: Vec3,
    /// Euler rotation in radians.
    pub rotation: Vec3,
}

/// Slow tumble of particle `index`, completing a cycle every half period.
#[must_use]
pub fn instance_rotation(now: f64, period_seconds: f32, index: usize) -> Vec3 {
    let cycle = TAU * now / (0.5 * f64::from(period_seconds));
    let offset = index as f64;
    Vec3::new(
        0.0,
        (cycle.cos() - offset) as f32,
        (cycle.sin() + offset) as f32,
    )
}

/// Everything a renderer and an audio chain need from one cloud frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudPresentation {
    /// Index of the cloud on the ring.
    pub cloud: usize,
    /// Sequence number of the presented frame.
    pub sequence: u64,
    /// Consumer time at which the frame was presented, in seconds.
    pub presented_at: f64,
    /// Per-axis mean of the cloud.
    pub means: Vec3,
    /// Per-axis standard deviation of the cloud.
    pub stdevs: Vec3,
    /// Fractional position within the oscillation period.
    pub clock_percentage: f32,
    /// Attraction (positive) or repulsion (negative) factor of the step.
    pub attraction_repulsion_factor: f32,
    /// One transform per particle.
    pub transforms: Vec<InstanceTransform>,
    /// One graded colour per particle.
    pub colors: Vec<Color>,
    /// Audio controls, present only when the audio gate was open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioParameters>,
}

/// Presents the frames of a single cloud engine.
#[derive(Debug)]
pub struct CloudVisuals {
    index: usize,
    period_seconds: f32,
    bounds: Vec3,
    base_color: Color,
    link: EngineLink,
    visual_gate: FrameGate,
    audio_gate: FrameGate,
}

impl CloudVisuals {
    /// Creates the presentation system of cloud `index`.
    #[must_use]
    pub fn new(index: usize, period_seconds: f32, bounds: Vec3, base_color: Color) -> Self {
        Self {
            index,
            period_seconds,
            bounds,
            base_color,
            link: EngineLink::default(),
            visual_gate: FrameGate::new(FRAME_SECONDS),
            audio_gate: FrameGate::new(MUSIC_SECONDS),
        }
    }

    /// Why the cloud stopped requesting frames, if it did.
    #[must_use]
    pub const fn halt(&self) -> Option<Halt> {
        self.link.halt()
    }

    /// Queues a `Reset` for the next [`CloudVisuals::handle`] call.
    pub fn request_reset(&mut self) {
        self.link.request_reset();
    }

    /// Consumes engine events and presents the latest frame once the visual gate opens.
    ///
    /// The first call emits the initial `Ready`. Every presented frame is
    /// followed by exactly one new `Ready`.
    pub fn handle(
        &mut self,
        events: &[Event],
        now: f64,
        out: &mut Vec<Command>,
    ) -> Option<CloudPresentation> {
        self.link.sync(events, out);
        let frame = self.link.take_due(&mut self.visual_gate, now, out)?;

        let transforms = frame
            .positions
            .iter()
            .enumerate()
            .map(|(index, position)| InstanceTransform {
                position: *position,
                rotation: instance_rotation(now, self.period_seconds, index),
            })
            .collect();

        let mut colors = Vec::with_capacity(frame.positions.len());
        grade_frame(&frame, self.base_color, &mut colors);

        let audio = if self.audio_gate.is_open(now) {
            self.audio_gate.close(now);
            Some(audio_parameters(&frame, self.bounds))
        } else {
            None
        };

        Some(CloudPresentation {
            cloud: self.index,
            sequence: frame.sequence,
            presented_at: now,
            means: frame.means,
            stdevs: frame.stdevs,
            clock_percentage: frame.clock_percentage,
            attraction_repulsion_factor: frame.attraction_repulsion_factor,
            transforms,
            colors,
            audio,
        })
    }
}
