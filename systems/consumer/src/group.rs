use fermata_core::{Command, Event, Vec3};
use fermata_system_sound_mapping::{cluster_volume_db, MasterVolume};
use serde::Serialize;

use crate::{EngineLink, FrameGate, Halt, FRAME_SECONDS};

/// Cloud placement and loudness derived from one group frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPresentation {
    /// Sequence number of the presented group frame.
    pub sequence: u64,
    /// Consumer time at which the frame was presented, in seconds.
    pub presented_at: f64,
    /// Anchor of every cloud, in ring order.
    pub anchors: Vec<Vec3>,
    /// Volume of every cloud's audio chain in decibels, in ring order.
    pub volumes_db: Vec<f32>,
}

/// Moves cloud anchors with the group engine and derives per-cluster volume.
#[derive(Debug)]
pub struct GroupLayout {
    anchors: Vec<Vec3>,
    group_bounds: Vec3,
    master: MasterVolume,
    link: EngineLink,
    gate: FrameGate,
}

impl GroupLayout {
    /// Creates the layout from the starting anchors and the group engine bounds.
    #[must_use]
    pub fn new(anchors: Vec<Vec3>, group_bounds: Vec3) -> Self {
        Self {
            anchors,
            group_bounds,
            master: MasterVolume::default(),
            link: EngineLink::default(),
            gate: FrameGate::new(FRAME_SECONDS),
        }
    }

    /// Most recently presented anchors.
    #[must_use]
    pub fn anchors(&self) -> &[Vec3] {
        &self.anchors
    }

    /// Current per-cluster volumes, in ring order.
    #[must_use]
    pub fn volumes_db(&self) -> Vec<f32> {
        self.anchors
            .iter()
            .map(|anchor| cluster_volume_db(*anchor, self.group_bounds, self.master.db()))
            .collect()
    }

    /// Master volume applied on top of every cluster.
    #[must_use]
    pub const fn master_volume(&self) -> MasterVolume {
        self.master
    }

    /// Selects the master volume stage.
    pub fn set_master_volume(&mut self, master: MasterVolume) {
        self.master = master;
    }

    /// Why the group stopped requesting frames, if it did.
    #[must_use]
    pub const fn halt(&self) -> Option<Halt> {
        self.link.halt()
    }

    /// Queues a `Reset` for the next [`GroupLayout::handle`] call.
    pub fn request_reset(&mut self) {
        self.link.request_reset();
    }

    /// Consumes group engine events and moves the anchors once the gate opens.
    pub fn handle(
        &mut self,
        events: &[Event],
        now: f64,
        out: &mut Vec<Command>,
    ) -> Option<GroupPresentation> {
        self.link.sync(events, out);
        let frame = self.link.take_due(&mut self.gate, now, out)?;

        for (anchor, position) in self.anchors.iter_mut().zip(frame.positions.iter()) {
            *anchor = *position;
        }

        Some(GroupPresentation {
            sequence: frame.sequence,
            presented_at: now,
            anchors: self.anchors.clone(),
            volumes_db: self.volumes_db(),
        })
    }
}
