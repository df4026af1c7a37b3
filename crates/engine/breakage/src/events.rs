//! Physics notifications consumed by the breakage system

use crate::types::{BodyId, BodyOwner, EntityId};
use fracture::RenderMesh;
use glam::Vec3;
use std::sync::Arc;

/// Why a body's mesh changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshUpdateReason {
    Explosion,
    Deform,
    Carve,
}

/// A body split off a new part
#[derive(Debug, Clone)]
pub struct PartCreated {
    pub event_id: Option<u64>,
    /// Owner of the parent body
    pub owner: BodyOwner,
    pub parent_body: BodyId,
    pub new_body: BodyId,
    /// Packed part id in the parent (see [`crate::PartId`])
    pub part_id_src: u32,
    /// Packed part id in the new body
    pub part_id_new: u32,
    pub total_parts: u32,
    /// Mesh of the new part when the physics engine generated it
    pub deformed_mesh: Option<Arc<RenderMesh>>,
}

/// Parts were removed from a body
#[derive(Debug, Clone)]
pub struct PartsRemoved {
    pub event_id: Option<u64>,
    pub owner: BodyOwner,
    pub body: BodyId,
    /// Bitmask over part ids; bit 0 of word 0 is part `id_offset`
    pub part_mask: Vec<u64>,
    pub id_offset: u32,
}

/// A hidden part became visible
#[derive(Debug, Clone)]
pub struct PartRevealed {
    pub event_id: Option<u64>,
    pub owner: BodyOwner,
    pub body: BodyId,
    pub part_id: u32,
}

/// A body's mesh was deformed, carved or blown apart
#[derive(Debug, Clone)]
pub struct MeshUpdated {
    pub event_id: Option<u64>,
    pub owner: BodyOwner,
    pub body: BodyId,
    /// Packed part id of the updated part; selects the slot
    pub part_id: u32,
    pub deformed_mesh: Option<Arc<RenderMesh>>,
    pub reason: MeshUpdateReason,
    pub contact_point: Vec3,
    pub contact_normal: Vec3,
    /// The mesh is skinned and needs normals and tangents rebuilt
    pub skinned: bool,
}

/// A joint between two bodies broke
#[derive(Debug, Clone)]
pub struct JointBroken {
    pub event_id: Option<u64>,
    pub owners: [BodyOwner; 2],
    pub bodies: [BodyId; 2],
    pub joint_id: u32,
    pub break_point: Vec3,
    pub break_normal: Vec3,
}

#[derive(Debug, Clone)]
pub struct Collision {
    pub owners: [BodyOwner; 2],
    pub bodies: [BodyId; 2],
    pub point: Vec3,
    pub normal: Vec3,
    pub impulse: f32,
}

#[derive(Debug, Clone)]
pub struct StateChange {
    pub owner: BodyOwner,
    pub body: BodyId,
    pub awake: bool,
}

/// Any notification the bridge listens to
#[derive(Debug, Clone)]
pub enum PhysicsEvent {
    PartCreated(PartCreated),
    PartsRemoved(PartsRemoved),
    PartRevealed(PartRevealed),
    MeshUpdated(MeshUpdated),
    JointBroken(JointBroken),
    Collision(Collision),
    StateChange(StateChange),
    PostStep { dt: f32 },
}

/// Listener kinds registered with the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PartCreated,
    PartsRemoved,
    PartRevealed,
    MeshUpdated,
    JointBroken,
    Collision,
    StateChange,
    PostStep,
}

/// When the physics world delivers a listener's events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchPoint {
    /// Batched after the step completes
    PostStep,
    /// Synchronously from inside the step
    Immediate,
    /// At the next safe point of the simulation thread
    Deferred,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::PartCreated,
        EventKind::PartsRemoved,
        EventKind::PartRevealed,
        EventKind::MeshUpdated,
        EventKind::JointBroken,
        EventKind::Collision,
        EventKind::StateChange,
        EventKind::PostStep,
    ];

    /// Dispatch point the bridge registers this kind with
    pub fn dispatch_point(self) -> DispatchPoint {
        match self {
            EventKind::PartCreated | EventKind::StateChange => DispatchPoint::Immediate,
            EventKind::MeshUpdated => DispatchPoint::Deferred,
            _ => DispatchPoint::PostStep,
        }
    }
}

impl PhysicsEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PhysicsEvent::PartCreated(_) => EventKind::PartCreated,
            PhysicsEvent::PartsRemoved(_) => EventKind::PartsRemoved,
            PhysicsEvent::PartRevealed(_) => EventKind::PartRevealed,
            PhysicsEvent::MeshUpdated(_) => EventKind::MeshUpdated,
            PhysicsEvent::JointBroken(_) => EventKind::JointBroken,
            PhysicsEvent::Collision(_) => EventKind::Collision,
            PhysicsEvent::StateChange(_) => EventKind::StateChange,
            PhysicsEvent::PostStep { .. } => EventKind::PostStep,
        }
    }

    /// Ordering id of structural events
    pub fn event_id(&self) -> Option<u64> {
        match self {
            PhysicsEvent::PartCreated(e) => e.event_id,
            PhysicsEvent::PartsRemoved(e) => e.event_id,
            PhysicsEvent::PartRevealed(e) => e.event_id,
            PhysicsEvent::MeshUpdated(e) => e.event_id,
            PhysicsEvent::JointBroken(e) => e.event_id,
            _ => None,
        }
    }

    /// Events that change geometry and must only arrive while stepping
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PhysicsEvent::PartCreated(_)
                | PhysicsEvent::PartsRemoved(_)
                | PhysicsEvent::PartRevealed(_)
                | PhysicsEvent::MeshUpdated(_)
                | PhysicsEvent::JointBroken(_)
        )
    }
}

/// Generic notification forwarded to entities
#[derive(Debug, Clone, PartialEq)]
pub enum EntityNotification {
    PartBroken {
        part: usize,
        new_entity: Option<EntityId>,
    },
    JointBroken {
        joint_id: u32,
        point: Vec3,
        normal: Vec3,
    },
    Collision {
        other: BodyOwner,
        point: Vec3,
        normal: Vec3,
        impulse: f32,
    },
    Awake(bool),
}
