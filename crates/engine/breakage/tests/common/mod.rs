//! Shared test fixtures: a recording host and simple assets

#![allow(dead_code)]

use breakage::{
    BodyId, BodyOwner, CreateParams, DispatchPoint, EffectSink, EntityId, EntityNotification,
    EntityWorld, EventKind, ObjectKey, PhysicsWorld, StaticNodeId,
};
use fracture::{AssetId, MeshAsset, PhysGeometry, RenderMesh, SubObject, Vertex};
use glam::{Mat4, Vec2, Vec3};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MockEntity {
    pub class: String,
    pub params: CreateParams,
    pub slots: Vec<Option<Arc<MeshAsset>>>,
    pub hidden: bool,
    pub hidden_parts: BTreeSet<usize>,
}

#[derive(Debug, Clone)]
pub struct MockNode {
    pub asset: Arc<MeshAsset>,
    pub world_tm: Mat4,
    pub hidden: bool,
}

/// Host that records every call
#[derive(Debug, Default)]
pub struct MockHost {
    pub stepping: bool,
    pub listeners: Vec<(EventKind, DispatchPoint)>,
    pub bodies: HashMap<BodyId, Mat4>,
    pub next_body: u64,
    pub destroyed: Vec<BodyId>,
    pub physicalized: Vec<(BodyOwner, bool)>,
    pub body_owners: HashMap<BodyId, BodyOwner>,
    pub classes: HashSet<String>,
    pub entities: HashMap<EntityId, MockEntity>,
    pub next_entity: u64,
    pub spawn_order: Vec<(String, EntityId)>,
    pub removed: Vec<EntityId>,
    pub hide_calls: Vec<(EntityId, bool)>,
    pub static_nodes: HashMap<StaticNodeId, MockNode>,
    pub static_hide_calls: Vec<(StaticNodeId, bool)>,
    pub rendered: HashSet<EntityId>,
    pub foliage: Vec<ObjectKey>,
    pub particles: Vec<(Arc<MeshAsset>, f32)>,
    pub notifications: Vec<(EntityId, EntityNotification)>,
    pub effects: Vec<(String, Vec3, Vec3, f32)>,
}

impl MockHost {
    /// Stepping host with every default class registered
    pub fn new() -> Self {
        let mut host = Self {
            stepping: true,
            next_body: 1000,
            next_entity: 1000,
            ..Default::default()
        };
        for class in ["BreakableDebris", "StaticProxy", "ReplayClone"] {
            host.classes.insert(class.to_string());
        }
        host
    }

    pub fn add_entity(&mut self, id: u64, asset: Arc<MeshAsset>, world_tm: Mat4) -> EntityId {
        let entity = EntityId(id);
        self.entities.insert(
            entity,
            MockEntity {
                class: "Scene".to_string(),
                params: CreateParams::at(world_tm),
                slots: vec![Some(asset)],
                hidden: false,
                hidden_parts: BTreeSet::new(),
            },
        );
        entity
    }

    pub fn add_static_node(&mut self, id: u64, asset: Arc<MeshAsset>) -> StaticNodeId {
        let node = StaticNodeId(id);
        self.static_nodes.insert(
            node,
            MockNode {
                asset,
                world_tm: Mat4::IDENTITY,
                hidden: false,
            },
        );
        node
    }

    pub fn add_body(&mut self, id: u64, world_tm: Mat4) -> BodyId {
        let body = BodyId(id);
        self.bodies.insert(body, world_tm);
        body
    }

    pub fn spawned_of(&self, class: &str) -> Vec<EntityId> {
        self.spawn_order
            .iter()
            .filter(|(c, _)| c == class)
            .map(|(_, e)| *e)
            .collect()
    }

    pub fn hide_count(&self, entity: EntityId) -> usize {
        self.hide_calls
            .iter()
            .filter(|(e, hide)| *e == entity && *hide)
            .count()
    }

    pub fn slot(&self, entity: EntityId, slot: usize) -> Option<Arc<MeshAsset>> {
        self.entities.get(&entity)?.slots.get(slot)?.clone()
    }
}

impl PhysicsWorld for MockHost {
    fn is_stepping(&self) -> bool {
        self.stepping
    }

    fn register_listener(&mut self, kind: EventKind, point: DispatchPoint) {
        self.listeners.push((kind, point));
    }

    fn destroy_body(&mut self, body: BodyId) {
        self.bodies.remove(&body);
        self.destroyed.push(body);
    }

    fn body_transform(&self, body: BodyId) -> Option<Mat4> {
        self.bodies.get(&body).copied()
    }

    fn body_velocity(&self, body: BodyId) -> Option<(Vec3, Vec3)> {
        self.bodies.get(&body).map(|_| (Vec3::ZERO, Vec3::ZERO))
    }

    fn physicalize(
        &mut self,
        owner: BodyOwner,
        _geometry: Arc<PhysGeometry>,
        world_tm: Mat4,
        dynamic: bool,
    ) -> BodyId {
        self.next_body += 1;
        let body = BodyId(self.next_body);
        self.bodies.insert(body, world_tm);
        self.body_owners.insert(body, owner);
        self.physicalized.push((owner, dynamic));
        body
    }

    fn set_body_owner(&mut self, body: BodyId, owner: BodyOwner) {
        self.body_owners.insert(body, owner);
    }

    fn set_velocity(&mut self, _body: BodyId, _linear: Vec3, _angular: Vec3) {}

    fn add_impulse(&mut self, _body: BodyId, _impulse: Vec3, _point: Vec3) {}
}

impl EntityWorld for MockHost {
    fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    fn spawn_entity(
        &mut self,
        class: &str,
        params: &CreateParams,
        asset: Arc<MeshAsset>,
    ) -> Option<EntityId> {
        self.next_entity += 1;
        let entity = EntityId(self.next_entity);
        self.entities.insert(
            entity,
            MockEntity {
                class: class.to_string(),
                params: *params,
                slots: vec![Some(asset)],
                hidden: false,
                hidden_parts: BTreeSet::new(),
            },
        );
        self.spawn_order.push((class.to_string(), entity));
        Some(entity)
    }

    fn remove_entity(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
        self.removed.push(entity);
    }

    fn hide_entity(&mut self, entity: EntityId, hide: bool) {
        self.hide_calls.push((entity, hide));
        if let Some(e) = self.entities.get_mut(&entity) {
            e.hidden = hide;
        }
    }

    fn is_rendered(&self, entity: EntityId) -> bool {
        self.rendered.contains(&entity)
    }

    fn entity_params(&self, entity: EntityId) -> Option<CreateParams> {
        self.entities.get(&entity).map(|e| e.params)
    }

    fn slot_asset(&self, entity: EntityId, slot: usize) -> Option<Arc<MeshAsset>> {
        self.slot(entity, slot)
    }

    fn set_slot_asset(&mut self, entity: EntityId, slot: usize, asset: Option<Arc<MeshAsset>>) {
        if let Some(e) = self.entities.get_mut(&entity) {
            if e.slots.len() <= slot {
                e.slots.resize(slot + 1, None);
            }
            e.slots[slot] = asset;
        }
    }

    fn set_part_hidden(&mut self, entity: EntityId, part: usize, hidden: bool) {
        if let Some(e) = self.entities.get_mut(&entity) {
            if hidden {
                e.hidden_parts.insert(part);
            } else {
                e.hidden_parts.remove(&part);
            }
        }
    }

    fn static_node_asset(&self, node: StaticNodeId) -> Option<Arc<MeshAsset>> {
        self.static_nodes.get(&node).map(|n| Arc::clone(&n.asset))
    }

    fn static_node_transform(&self, node: StaticNodeId) -> Option<Mat4> {
        self.static_nodes.get(&node).map(|n| n.world_tm)
    }

    fn set_static_node_asset(&mut self, node: StaticNodeId, asset: Arc<MeshAsset>) {
        if let Some(n) = self.static_nodes.get_mut(&node) {
            n.asset = asset;
        }
    }

    fn hide_static_node(&mut self, node: StaticNodeId, hide: bool) {
        self.static_hide_calls.push((node, hide));
        if let Some(n) = self.static_nodes.get_mut(&node) {
            n.hidden = hide;
        }
    }

    fn rephysicalize_foliage(&mut self, key: ObjectKey) {
        self.foliage.push(key);
    }

    fn spawn_particle(&mut self, asset: Arc<MeshAsset>, _world_tm: Mat4, _velocity: Vec3, lifetime: f32) {
        self.particles.push((asset, lifetime));
    }

    fn notify(&mut self, entity: EntityId, notification: EntityNotification) {
        self.notifications.push((entity, notification));
    }
}

impl EffectSink for MockHost {
    fn spawn_effect(&mut self, effect: &str, position: Vec3, normal: Vec3, scale: f32) {
        self.effects.push((effect.to_string(), position, normal, scale));
    }
}

/// Axis-aligned box mesh between `min` and `max`, one material
pub fn box_mesh(min: Vec3, max: Vec3) -> RenderMesh {
    let mut mesh = RenderMesh::new();
    for axis in 0..3 {
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for (side, s) in [(-1.0f32, min[axis]), (1.0, max[axis])] {
            let mut normal = Vec3::ZERO;
            normal[axis] = side;
            let quad = [(min[u], min[v]), (max[u], min[v]), (max[u], max[v]), (min[u], max[v])].map(|(a, b)| {
                let mut p = Vec3::ZERO;
                p[axis] = s;
                p[u] = a;
                p[v] = b;
                Vertex::new(p, normal, Vec2::new(a, b))
            });
            if side > 0.0 {
                mesh.push_triangle([quad[0], quad[1], quad[2]], 0);
                mesh.push_triangle([quad[0], quad[2], quad[3]], 0);
            } else {
                mesh.push_triangle([quad[0], quad[2], quad[1]], 0);
                mesh.push_triangle([quad[0], quad[3], quad[2]], 0);
            }
        }
    }
    mesh
}

/// Thin 1 x 1 pane in the XY plane
pub fn pane_asset(id: u64) -> MeshAsset {
    let mesh = box_mesh(Vec3::new(0.0, 0.0, -0.01), Vec3::new(1.0, 1.0, 0.01));
    MeshAsset::new(AssetId(id), format!("pane{}", id), mesh)
}

/// Roughly cubic asset that cannot be fractured as a plane
pub fn cube_asset(id: u64) -> MeshAsset {
    MeshAsset::new(AssetId(id), format!("cube{}", id), box_mesh(Vec3::ZERO, Vec3::ONE))
}

/// Compound asset of `parts` boxes side by side along X
pub fn compound_asset(id: u64, parts: usize) -> MeshAsset {
    let subs = (0..parts)
        .map(|i| {
            let x = i as f32;
            let mesh = box_mesh(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 0.5, 0.5, 0.5));
            let part = MeshAsset::new(AssetId(id * 100 + i as u64), format!("part{}", i), mesh);
            SubObject::new(format!("part{}", i), Some(Arc::new(part)))
        })
        .collect();
    MeshAsset::compound(AssetId(id), format!("compound{}", id), subs)
}

/// Part mask covering `count` parts
pub fn full_mask(count: usize) -> Vec<u64> {
    let mut words = vec![0u64; count.div_ceil(64)];
    for i in 0..count {
        words[i / 64] |= 1 << (i % 64);
    }
    words
}
