//! Collaborator interfaces
//!
//! The breakage system never owns bodies, entities or effects. It drives
//! them through these traits, implemented by the host engine.

use crate::events::{DispatchPoint, EntityNotification, EventKind};
use crate::types::{BodyId, BodyOwner, CreateParams, EntityId, ObjectKey, StaticNodeId};
use fracture::{MeshAsset, PhysGeometry};
use glam::{Mat4, Vec3};
use std::sync::Arc;

/// Rigid-body physics world
pub trait PhysicsWorld {
    /// False while loading or paused; structural events are then spurious
    fn is_stepping(&self) -> bool;

    fn register_listener(&mut self, kind: EventKind, point: DispatchPoint);

    fn destroy_body(&mut self, body: BodyId);

    fn body_transform(&self, body: BodyId) -> Option<Mat4>;

    /// Linear and angular velocity
    fn body_velocity(&self, body: BodyId) -> Option<(Vec3, Vec3)>;

    /// Create a body for `geometry` at `world_tm`
    fn physicalize(
        &mut self,
        owner: BodyOwner,
        geometry: Arc<PhysGeometry>,
        world_tm: Mat4,
        dynamic: bool,
    ) -> BodyId;

    fn set_body_owner(&mut self, body: BodyId, owner: BodyOwner);

    fn set_velocity(&mut self, body: BodyId, linear: Vec3, angular: Vec3);

    fn add_impulse(&mut self, body: BodyId, impulse: Vec3, point: Vec3);
}

/// Entity and scene layer
pub trait EntityWorld {
    fn has_class(&self, class: &str) -> bool;

    fn spawn_entity(
        &mut self,
        class: &str,
        params: &CreateParams,
        asset: Arc<MeshAsset>,
    ) -> Option<EntityId>;

    fn remove_entity(&mut self, entity: EntityId);

    fn hide_entity(&mut self, entity: EntityId, hide: bool);

    /// Whether the entity was drawn recently
    fn is_rendered(&self, entity: EntityId) -> bool;

    fn entity_params(&self, entity: EntityId) -> Option<CreateParams>;

    fn slot_asset(&self, entity: EntityId, slot: usize) -> Option<Arc<MeshAsset>>;

    fn set_slot_asset(&mut self, entity: EntityId, slot: usize, asset: Option<Arc<MeshAsset>>);

    fn set_part_hidden(&mut self, entity: EntityId, part: usize, hidden: bool);

    fn static_node_asset(&self, node: StaticNodeId) -> Option<Arc<MeshAsset>>;

    fn static_node_transform(&self, node: StaticNodeId) -> Option<Mat4>;

    fn set_static_node_asset(&mut self, node: StaticNodeId, asset: Arc<MeshAsset>);

    fn hide_static_node(&mut self, node: StaticNodeId, hide: bool);

    /// Re-create physics for vegetation attached to the object
    fn rephysicalize_foliage(&mut self, key: ObjectKey);

    fn spawn_particle(&mut self, asset: Arc<MeshAsset>, world_tm: Mat4, velocity: Vec3, lifetime: f32);

    fn notify(&mut self, entity: EntityId, notification: EntityNotification);
}

/// Particle effect playback
pub trait EffectSink {
    fn spawn_effect(&mut self, effect: &str, position: Vec3, normal: Vec3, scale: f32);
}

/// Everything the breakage system talks to
pub trait BreakageHost: PhysicsWorld + EntityWorld + EffectSink {}

impl<T: PhysicsWorld + EntityWorld + EffectSink> BreakageHost for T {}
