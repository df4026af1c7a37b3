//! Breakage orchestration
//!
//! [`BreakageManager`] interprets structural physics events and gameplay
//! break requests. For every fragment it decides between a particle, a
//! spawned entity or an in-place geometry update, drives effects, and keeps
//! the broken-object ledger that reset and replay work from.
//!
//! Per tracked object the state only moves forward until a reset:
//!
//! ```text
//! Intact -> PartiallyBroken -> Hidden
//! ```

use crate::assets::{AssetStore, PlaneCache};
use crate::budget::WorldBreakageBudget;
use crate::config::{verbose, BreakageConfig};
use crate::error::{BreakageError, Result};
use crate::events::{
    EntityNotification, JointBroken, MeshUpdateReason, MeshUpdated, PartCreated, PartRevealed,
    PartsRemoved,
};
use crate::jobs::{DeferredJobPool, JobKey};
use crate::ledger::{BrokenObjRec, BrokenObjectLedger};
use crate::metadata::PieceProps;
use crate::part_id::PartId;
use crate::types::{
    BodyId, BodyOwner, BreakageFlags, BreakageParams, CreateParams, EntityId, GeomRef, ObjectKey,
    PartMask, StaticNodeId, TrackedState,
};
use crate::world::BreakageHost;
use fracture::{
    check_geometry, nearest_triangle, BreakableMaterial, ErasedIsland, FlatPieceParams,
    IslandExtractor, MeshAsset, PhysGeometry, RenderMesh,
};
use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

/// Impulse → initial debris velocity
const IMPULSE_TO_VELOCITY: f32 = 0.1;

/// Upper bound on islands spawned from one helper mesh
const MAX_HELPER_ISLANDS: usize = 64;

/// How a fragment is represented in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Particle,
    Entity,
    /// Dropped (particle budget saturated)
    Skip,
}

/// Result of [`BreakageManager::break_into_pieces`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakOutcome {
    pub entities: Vec<EntityId>,
    pub particles: usize,
    /// The remainder replaced the owner's geometry
    pub in_place: bool,
    /// The asset failed the fracture checks and was left untouched
    pub unbreakable: bool,
    /// Pieces skipped because the debris budget was saturated
    pub skipped: usize,
}

/// Breakage bookkeeping of one object
#[derive(Debug, Clone, Default)]
pub(crate) struct TrackedObject {
    pub(crate) state: TrackedState,
    pub(crate) hidden: PartMask,
}

#[derive(Debug, Clone, Copy)]
struct DebrisTimer {
    entity: EntityId,
    remaining: f32,
    rearm: f32,
}

/// Central breakage dispatcher
#[derive(Debug)]
pub struct BreakageManager {
    pub(crate) config: BreakageConfig,
    pub(crate) assets: AssetStore,
    pub(crate) planes: PlaneCache,
    pub(crate) tracked: HashMap<ObjectKey, TrackedObject>,
    pub(crate) ledger: BrokenObjectLedger,
    pub(crate) budget: WorldBreakageBudget,
    debris: Vec<DebrisTimer>,
    jobs: DeferredJobPool,
    pub(crate) proxies: HashMap<StaticNodeId, EntityId>,
    pub(crate) spawned: Vec<EntityId>,
}

impl BreakageManager {
    pub fn new(config: BreakageConfig) -> Self {
        let budget = WorldBreakageBudget::new(config.max_debris_particles);
        Self {
            config,
            assets: AssetStore::new(),
            planes: PlaneCache::new(),
            tracked: HashMap::new(),
            ledger: BrokenObjectLedger::new(),
            budget,
            debris: Vec::new(),
            jobs: DeferredJobPool::new(),
            proxies: HashMap::new(),
            spawned: Vec::new(),
        }
    }

    pub fn config(&self) -> &BreakageConfig {
        &self.config
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetStore {
        &mut self.assets
    }

    pub fn planes(&self) -> &PlaneCache {
        &self.planes
    }

    pub fn budget(&self) -> &WorldBreakageBudget {
        &self.budget
    }

    /// Breakage state of an object (`Intact` when never broken)
    pub fn state(&self, key: ObjectKey) -> TrackedState {
        self.tracked.get(&key).map(|t| t.state).unwrap_or_default()
    }

    /// Whether a part of the object is currently hidden
    pub fn is_part_hidden(&self, key: ObjectKey, part: usize) -> bool {
        self.tracked.get(&key).is_some_and(|t| t.hidden.get(part))
    }

    /// Lightweight entity standing in for a static node, if one was created
    pub fn proxy_for(&self, node: StaticNodeId) -> Option<EntityId> {
        self.proxies.get(&node).copied()
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.in_flight()
    }

    /// Read access to the broken-object ledger
    pub fn get_part_broken_objects(&self) -> &[BrokenObjRec] {
        self.ledger.records()
    }

    /// Whether `asset` can be broken with `material`
    ///
    /// Pure: the answer depends only on the arguments. Assets whose mesh was
    /// already freed by a fracture build fall back to the cached verdict.
    pub fn is_geometry_breakable(
        &self,
        body: Option<BodyId>,
        asset: &MeshAsset,
        material: &BreakableMaterial,
    ) -> bool {
        if asset.mesh.is_none() {
            if let Some(verdict) = self.planes.verdict(asset) {
                return verdict;
            }
        }
        match check_geometry(asset, material) {
            Ok(_) => true,
            Err(err) => {
                tracing::trace!("'{}' (body {:?}) is not breakable: {}", asset.name, body, err);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Physics events
    // ------------------------------------------------------------------

    /// A body split off a new part
    pub fn on_part_created(&mut self, ev: &PartCreated, host: &mut dyn BreakageHost) -> Result<()> {
        let key = ev.owner.object_key().ok_or(BreakageError::UnknownOwner)?;
        let src = PartId::from_raw(ev.part_id_src);
        let new = PartId::from_raw(ev.part_id_new);
        let slot = src.slot();
        let source = self
            .current_asset(key, slot, host)
            .ok_or(BreakageError::UnknownOwner)?;
        let owner_tm = self.object_transform(key, host).unwrap_or(Mat4::IDENTITY);
        let body_tm = host.body_transform(ev.new_body).unwrap_or(owner_tm);

        let mut props = PieceProps::default();
        let mut removed_part = None;
        let (fragment, generated) = if let Some(mesh) = &ev.deformed_mesh {
            (self.assets.generated(&source, (**mesh).clone(), None), true)
        } else if source.is_compound() {
            let index = src.part_index();
            let Some(sub) = source.sub_objects.get(index) else {
                verbose!(self.config, "'{}' has no sub-object {}", source.name, index);
                host.destroy_body(ev.new_body);
                return Ok(());
            };
            props = self
                .assets
                .piece_props(&source)
                .get(index)
                .cloned()
                .unwrap_or_default();
            if let Some(bone) = &props.bone {
                verbose!(self.config, "bone attachment '{}' on '{}' is not supported", bone, sub.name);
            }
            removed_part = Some(index);
            let local = owner_tm.inverse().transform_point3(body_tm.w_axis.truncate());
            let carved = props
                .pieces
                .as_deref()
                .and_then(|name| self.carve_helper_piece(&source, name, local));
            match (carved, sub.mesh.clone()) {
                (Some(piece), _) => (piece, true),
                (None, Some(mesh)) => (mesh, false),
                (None, None) => {
                    host.destroy_body(ev.new_body);
                    return Ok(());
                }
            }
        } else {
            (Arc::clone(&source), false)
        };

        if let Some(part) = removed_part {
            let mut mask = PartMask::new();
            mask.set(part);
            self.remove_parts(key, &mask, &source, true, host)?;
        } else {
            self.mark_broken(key, slot, &source);
        }

        let flags = BreakageFlags::default();
        let rep = self.choose_representation(&props, flags, generated, fragment.aabb().volume());
        let mut new_entity = None;
        match rep {
            Representation::Entity => {
                let params = CreateParams {
                    source_node: match key {
                        ObjectKey::StaticNode(n) => Some(n),
                        ObjectKey::Entity(_) => None,
                    },
                    ..CreateParams::at(body_tm)
                };
                let class = self.config.spawn_class.clone();
                let entity = self.spawn_checked(&class, fragment, &params, host)?;
                host.set_body_owner(ev.new_body, BodyOwner::Entity(entity));
                self.spawned.push(entity);
                self.arm_debris_timer(entity, &props, generated);
                new_entity = Some(entity);
            }
            Representation::Particle => {
                let velocity = host
                    .body_velocity(ev.new_body)
                    .map(|(linear, _)| linear)
                    .unwrap_or(Vec3::ZERO);
                host.destroy_body(ev.new_body);
                let lifetime = self.config.particle_lifetime;
                self.create_object_as_particles(fragment, &CreateParams::at(body_tm), velocity, lifetime, host);
            }
            Representation::Skip => {
                verbose!(self.config, "debris budget saturated, dropping part of '{}'", source.name);
                host.destroy_body(ev.new_body);
            }
        }

        if let ObjectKey::Entity(owner) = key {
            host.notify(
                owner,
                EntityNotification::PartBroken {
                    part: new.part_index(),
                    new_entity,
                },
            );
        }
        tracing::debug!(
            "part {} of {:?} created as {:?} ({} parts total)",
            src.local_part_id,
            key,
            rep,
            ev.total_parts
        );
        Ok(())
    }

    /// Parts were removed from a body
    pub fn on_parts_removed(&mut self, ev: &PartsRemoved, host: &mut dyn BreakageHost) -> Result<()> {
        let key = ev.owner.object_key().ok_or(BreakageError::UnknownOwner)?;
        let asset = self
            .current_asset(key, 0, host)
            .ok_or(BreakageError::UnknownOwner)?;
        let mask = PartMask::from_words(&ev.part_mask, ev.id_offset);
        self.remove_parts(key, &mask, &asset, true, host)
    }

    /// A hidden part became visible again
    pub fn on_part_revealed(&mut self, ev: &PartRevealed, host: &mut dyn BreakageHost) -> Result<()> {
        let key = ev.owner.object_key().ok_or(BreakageError::UnknownOwner)?;
        let part = PartId::from_raw(ev.part_id).part_index();
        let entity = match key {
            ObjectKey::Entity(e) => e,
            ObjectKey::StaticNode(n) => self.ensure_proxy(n, host)?,
        };
        let tracked = self.tracked.entry(key).or_default();
        tracked.hidden.clear(part);
        host.set_part_hidden(entity, part, false);
        if tracked.state == TrackedState::Hidden {
            tracked.state = TrackedState::PartiallyBroken;
            host.hide_entity(entity, false);
        }
        Ok(())
    }

    /// A body's mesh was deformed, carved or blown apart
    ///
    /// Fails with `ResourceExhausted` when a skinned mesh needs a job slot and
    /// none is free; the caller re-queues the event.
    pub fn on_mesh_updated(&mut self, ev: &MeshUpdated, host: &mut dyn BreakageHost) -> Result<()> {
        let key = ev.owner.object_key().ok_or(BreakageError::UnknownOwner)?;
        let slot = PartId::from_raw(ev.part_id).slot();
        let job = JobKey { object: key, slot };

        if let Some(mesh) = &ev.deformed_mesh {
            // an older job for this slot lands first
            if let Some(previous) = self.jobs.wait(job) {
                self.apply_mesh(key, slot, previous, host)?;
            }
            if ev.skinned {
                self.jobs
                    .submit_skin_recompute(job, (**mesh).clone())
                    .map_err(|_| BreakageError::ResourceExhausted)?;
            } else {
                self.apply_mesh(key, slot, (**mesh).clone(), host)?;
            }
        }

        host.rephysicalize_foliage(key);
        let effect = match ev.reason {
            MeshUpdateReason::Explosion => self.config.fracture.explosion_effect.clone(),
            MeshUpdateReason::Deform => self.config.fracture.deform_effect.clone(),
            MeshUpdateReason::Carve => self.config.fracture.carve_effect.clone(),
        };
        if let Some(effect) = effect {
            spawn_contact_effect(&effect, ev.contact_point, ev.contact_normal, host);
        }
        Ok(())
    }

    /// A joint broke between two bodies
    pub fn on_joint_broken(&mut self, ev: &JointBroken, host: &mut dyn BreakageHost) -> Result<()> {
        if let Some(effect) = self.config.fracture.joint_effect.clone() {
            spawn_contact_effect(&effect, ev.break_point, ev.break_normal, host);
        }

        for owner in ev.owners {
            let Some(key) = owner.object_key() else {
                continue;
            };
            let Some(asset) = self.current_asset(key, 0, host) else {
                continue;
            };
            if !asset.is_compound() {
                continue;
            }
            let props = self.assets.piece_props(&asset);
            let Some(helper) = props.iter().find_map(|p| p.pieces.clone()) else {
                continue;
            };
            let owner_tm = self.object_transform(key, host).unwrap_or(Mat4::IDENTITY);
            let local = owner_tm.inverse().transform_point3(ev.break_point);
            let Some((updated, erased)) = self.erase_helper_piece(&asset, &helper, local) else {
                continue;
            };
            self.mark_broken(key, 0, &asset);
            self.set_object_asset(key, 0, updated, host);
            tracing::debug!(
                "joint {} erased {} triangles of '{}'",
                ev.joint_id,
                erased.triangles,
                helper
            );
        }
        Ok(())
    }

    /// Advance the clock, land finished jobs and run debris timers
    pub fn on_post_step(&mut self, dt: f32, host: &mut dyn BreakageHost) {
        self.budget.advance(dt);
        for (key, mesh) in self.jobs.poll_finished() {
            if let Err(e) = self.apply_mesh(key.object, key.slot, mesh, host) {
                verbose!(self.config, "dropping finished mesh job for {:?}: {}", key, e);
            }
        }
        self.update_debris_timers(dt, host);
    }

    // ------------------------------------------------------------------
    // Gameplay entry points
    // ------------------------------------------------------------------

    /// Break `source` at `params.impact_point`
    ///
    /// Planar assets shatter through the fracture grid; compound assets spawn
    /// their sub-objects and authored pieces. Assets that fail the fracture
    /// checks are reported as unbreakable and left untouched.
    pub fn break_into_pieces(
        &mut self,
        source: GeomRef,
        world_tm: Mat4,
        params: &BreakageParams,
        host: &mut dyn BreakageHost,
    ) -> Result<BreakOutcome> {
        let (asset, owner, slot, body) = match source {
            GeomRef::Asset { asset, body } => (
                self.assets.get(asset).ok_or(BreakageError::UnknownAsset(asset))?,
                None,
                0,
                body,
            ),
            GeomRef::Slot { entity, slot } => (
                host.slot_asset(entity, slot).ok_or(BreakageError::UnknownOwner)?,
                Some(ObjectKey::Entity(entity)),
                slot,
                None,
            ),
        };

        let mut outcome = if asset.is_compound() {
            self.break_compound(&asset, world_tm, params, owner, host)?
        } else {
            // only bodiless geometry keeps a static remainder
            let static_mode = body.is_none();
            self.break_planar(&asset, world_tm, params, owner, slot, static_mode, host)?
        };
        if outcome.unbreakable {
            return Ok(outcome);
        }

        if let Some(key) = owner {
            if !outcome.in_place {
                self.mark_broken(key, slot, &asset);
                self.hide_whole(key, host);
            }
        }
        if let Some(body) = body {
            host.destroy_body(body);
        }
        if params.flags.material_effects {
            if let Some(effect) = self.config.fracture.explosion_effect.clone() {
                let normal = params.impact_impulse.normalize_or(Vec3::Y);
                spawn_contact_effect(&effect, params.impact_point, -normal, host);
            }
        }
        outcome.entities.dedup();
        tracing::debug!(
            "'{}' broke into {} entities and {} particles",
            asset.name,
            outcome.entities.len(),
            outcome.particles
        );
        Ok(outcome)
    }

    /// Spawn an already-resolved fragment as a simulated entity
    pub fn create_object_as_entity(
        &mut self,
        asset: Arc<MeshAsset>,
        params: &CreateParams,
        velocity: Vec3,
        host: &mut dyn BreakageHost,
    ) -> Result<EntityId> {
        let phys = match (&asset.phys, &asset.mesh) {
            (Some(phys), _) => Some(Arc::clone(phys)),
            (None, Some(mesh)) => Some(Arc::new(PhysGeometry::trimesh_from_render(mesh))),
            (None, None) => None,
        };
        let class = self.config.spawn_class.clone();
        let entity = self.spawn_checked(&class, asset, params, host)?;
        if let Some(phys) = phys {
            let body = host.physicalize(BodyOwner::Entity(entity), phys, params.world_tm, true);
            host.set_velocity(body, velocity, Vec3::ZERO);
        }
        self.spawned.push(entity);
        Ok(entity)
    }

    /// Spawn an already-resolved fragment as a short-lived particle
    ///
    /// Returns false when the debris budget is saturated.
    pub fn create_object_as_particles(
        &mut self,
        asset: Arc<MeshAsset>,
        params: &CreateParams,
        velocity: Vec3,
        lifetime: f32,
        host: &mut dyn BreakageHost,
    ) -> bool {
        let lifetime = if lifetime > 0.0 {
            lifetime
        } else {
            self.config.particle_lifetime
        };
        if !self.budget.try_acquire(lifetime) {
            verbose!(self.config, "debris budget saturated, skipping '{}'", asset.name);
            return false;
        }
        host.spawn_particle(asset, params.world_tm, velocity, lifetime);
        true
    }

    /// Restore every broken object to its original geometry
    pub fn reset_broken_objects(&mut self, host: &mut dyn BreakageHost) {
        let dropped = self.jobs.wait_all();
        if !dropped.is_empty() {
            tracing::debug!("discarding {} mesh jobs on reset", dropped.len());
        }

        let records = self.ledger.take();
        let restored = records.len();
        for rec in records.into_iter().rev() {
            match (rec.source_node, rec.entity) {
                (Some(node), _) => {
                    host.set_static_node_asset(node, Arc::clone(&rec.original));
                    host.hide_static_node(node, false);
                }
                (None, Some(entity)) => {
                    host.set_slot_asset(entity, rec.slot, Some(Arc::clone(&rec.original)));
                }
                (None, None) => {}
            }
        }

        for (key, tracked) in self.tracked.drain() {
            match key {
                ObjectKey::Entity(entity) => {
                    for part in tracked.hidden.iter() {
                        host.set_part_hidden(entity, part, false);
                    }
                    if tracked.state == TrackedState::Hidden {
                        host.hide_entity(entity, false);
                    }
                }
                ObjectKey::StaticNode(node) => host.hide_static_node(node, false),
            }
        }
        for (node, proxy) in self.proxies.drain() {
            host.remove_entity(proxy);
            host.hide_static_node(node, false);
        }
        for entity in self.spawned.drain(..) {
            host.remove_entity(entity);
        }
        self.debris.clear();
        self.budget.clear();
        for geometry in self.assets.release_generated() {
            self.planes.release(geometry);
        }
        tracing::info!("reset {} broken objects", restored);
    }

    // ------------------------------------------------------------------
    // Breaking
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn break_planar(
        &mut self,
        asset: &Arc<MeshAsset>,
        world_tm: Mat4,
        params: &BreakageParams,
        owner: Option<ObjectKey>,
        slot: usize,
        static_mode: bool,
        host: &mut dyn BreakageHost,
    ) -> Result<BreakOutcome> {
        let mut outcome = BreakOutcome::default();
        let seed = contact_seed(params.impact_point, params.impact_impulse) ^ asset.id.0;
        let plane = match self.planes.get_or_build(&mut self.assets, asset, static_mode, seed) {
            Ok(plane) => plane,
            Err(e) => {
                verbose!(self.config, "'{}' is not breakable: {}", asset.name, e);
                outcome.unbreakable = true;
                return Ok(outcome);
            }
        };

        let fracture = &self.config.fracture;
        let impulse = params.explosion_impulse.length() + params.impact_impulse.length();
        let radius = fracture.blast_radius * (1.0 + fracture.impulse_radius_scale * impulse);
        let local = world_tm.inverse().transform_point3(params.impact_point);
        let stream = plane.break_at(local, radius, seed, fracture.filter_angle());
        if stream.piece_count() == 0 {
            return Ok(outcome);
        }

        let effect = if params.flags.material_effects {
            plane
                .material()
                .crumble_effect
                .clone()
                .or_else(|| fracture.crumble_effect.clone())
        } else {
            None
        };
        let piece_params = FlatPieceParams {
            effect: effect.as_deref(),
            no_physics: false,
            edge_alpha: 1.0,
            crumble_spacing: fracture.crumble_spacing,
        };

        let mut cursor = stream.cursor();
        while !cursor.is_finished() {
            let Some(piece) = plane.create_flat_stat_obj(&mut cursor, &world_tm, &piece_params) else {
                continue;
            };
            for fx in &piece.effects {
                host.spawn_effect(&fx.effect, fx.position, fx.normal, fx.alpha);
            }

            if piece.terminal && static_mode {
                let (mesh, phys) = piece.to_asset_frame();
                let phys = phys.map(Arc::new);
                let remainder = self.assets.generated(asset, mesh, phys.clone());
                match owner {
                    Some(key) => {
                        self.mark_broken(key, slot, asset);
                        self.set_object_asset(key, slot, Arc::clone(&remainder), host);
                        if let (Some(phys), ObjectKey::Entity(entity)) = (phys, key) {
                            host.physicalize(BodyOwner::Entity(entity), phys, world_tm, false);
                        }
                        outcome.in_place = true;
                    }
                    None => {
                        let params = CreateParams::at(world_tm);
                        let class = self.config.spawn_class.clone();
                        let entity = self.spawn_checked(&class, remainder, &params, host)?;
                        if let Some(phys) = phys {
                            host.physicalize(BodyOwner::Entity(entity), phys, world_tm, false);
                        }
                        self.spawned.push(entity);
                        outcome.entities.push(entity);
                    }
                }
                continue;
            }

            let phys = piece.phys.clone().map(Arc::new);
            let fragment = self.assets.generated(asset, piece.mesh.clone(), phys);
            let velocity = debris_velocity(piece.world_center(), params);
            let rep = self.choose_representation(&PieceProps::default(), params.flags, true, piece.volume());
            self.place_fragment(fragment, piece.world_tm, velocity, rep, &PieceProps::default(), params, &mut outcome, host)?;
        }
        Ok(outcome)
    }

    fn break_compound(
        &mut self,
        asset: &Arc<MeshAsset>,
        world_tm: Mat4,
        params: &BreakageParams,
        owner: Option<ObjectKey>,
        host: &mut dyn BreakageHost,
    ) -> Result<BreakOutcome> {
        let mut outcome = BreakOutcome::default();
        let props = self.assets.piece_props(asset);
        let mut rng = StdRng::seed_from_u64(contact_seed(params.impact_point, params.impact_impulse) ^ asset.id.0);

        for (index, sub) in asset.sub_objects.iter().enumerate() {
            if sub.helper {
                continue;
            }
            if owner.is_some_and(|key| self.is_part_hidden(key, index)) {
                continue;
            }
            let piece_props = props.get(index).cloned().unwrap_or_default();

            if let Some(helper) = piece_props.pieces.as_deref() {
                let Some(helper_tm) = asset.sub_object(helper).map(|h| world_tm * h.local_tm) else {
                    verbose!(self.config, "'{}' names missing helper '{}'", asset.name, helper);
                    continue;
                };
                for island in self.helper_islands(asset, helper) {
                    let center = helper_tm.transform_point3(island.aabb().center());
                    let velocity = debris_velocity(center, params);
                    let rep = self.choose_representation(&piece_props, params.flags, true, island.aabb().volume());
                    self.place_fragment(island, helper_tm, velocity, rep, &piece_props, params, &mut outcome, host)?;
                }
                continue;
            }
            if params.flags.only_helper_pieces {
                continue;
            }
            let Some(mesh) = sub.mesh.clone() else {
                continue;
            };

            let sub_tm = world_tm * sub.local_tm;
            let count = piece_props.count.unwrap_or(params.generic_count).max(1);
            let extent = mesh.aabb().size();
            for _ in 0..count {
                let tm = if count > 1 || piece_props.size_var.is_some() || piece_props.rot_axes.is_some() {
                    sub_tm * generic_transform(&piece_props, extent, &mut rng)
                } else {
                    sub_tm
                };
                let velocity = debris_velocity(tm.w_axis.truncate(), params);
                let rep = self.choose_representation(&piece_props, params.flags, false, mesh.aabb().volume());
                self.place_fragment(Arc::clone(&mesh), tm, velocity, rep, &piece_props, params, &mut outcome, host)?;
            }
        }
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn place_fragment(
        &mut self,
        fragment: Arc<MeshAsset>,
        world_tm: Mat4,
        velocity: Vec3,
        rep: Representation,
        props: &PieceProps,
        params: &BreakageParams,
        outcome: &mut BreakOutcome,
        host: &mut dyn BreakageHost,
    ) -> Result<()> {
        match rep {
            Representation::Entity => {
                let generated = AssetStore::is_generated(fragment.id);
                let entity = self.create_object_as_entity(fragment, &CreateParams::at(world_tm), velocity, host)?;
                self.arm_debris_timer(entity, props, generated);
                outcome.entities.push(entity);
            }
            Representation::Particle => {
                let spawned = self.create_object_as_particles(
                    fragment,
                    &CreateParams::at(world_tm),
                    velocity,
                    params.particle_lifetime,
                    host,
                );
                if spawned {
                    outcome.particles += 1;
                } else {
                    outcome.skipped += 1;
                }
            }
            Representation::Skip => outcome.skipped += 1,
        }
        Ok(())
    }

    /// Pick how a fragment shows up in the scene
    pub fn choose_representation(
        &self,
        props: &PieceProps,
        flags: BreakageFlags,
        generated: bool,
        volume: f32,
    ) -> Representation {
        if flags.force_entity || props.wants_entity(self.config.multiplayer) {
            return Representation::Entity;
        }
        // client-local particles would desync sessions
        if self.config.multiplayer {
            return Representation::Entity;
        }
        if generated && volume < self.config.min_entity_volume {
            return if self.budget.is_saturated() {
                Representation::Skip
            } else {
                Representation::Particle
            };
        }
        Representation::Entity
    }

    // ------------------------------------------------------------------
    // Helper pieces
    // ------------------------------------------------------------------

    fn helper_mesh<'a>(source: &'a MeshAsset, helper: &str) -> Option<(&'a Mat4, &'a RenderMesh)> {
        let sub = source.sub_object(helper)?;
        let mesh = sub.mesh.as_ref()?.mesh.as_ref()?;
        Some((&sub.local_tm, mesh))
    }

    /// Carve the island of `helper` nearest to `local_point`
    fn carve_helper_piece(&mut self, source: &MeshAsset, helper: &str, local_point: Vec3) -> Option<Arc<MeshAsset>> {
        let (helper_tm, mesh) = Self::helper_mesh(source, helper)?;
        let seed = nearest_triangle(mesh, helper_tm.inverse().transform_point3(local_point))?;
        let island = IslandExtractor::global().carve_island(mesh, seed)?;
        Some(self.assets.generated(source, island, None))
    }

    /// Every island of `helper` as its own asset
    fn helper_islands(&mut self, source: &MeshAsset, helper: &str) -> Vec<Arc<MeshAsset>> {
        let Some((_, mesh)) = Self::helper_mesh(source, helper) else {
            return Vec::new();
        };
        let extractor = IslandExtractor::global();
        let mut claimed = vec![false; mesh.triangle_count()];
        let mut islands = Vec::new();
        while let Some(seed) = claimed.iter().position(|c| !c) {
            if islands.len() >= MAX_HELPER_ISLANDS {
                verbose!(self.config, "helper '{}' has more than {} islands", helper, MAX_HELPER_ISLANDS);
                break;
            }
            for tri in extractor.island(mesh, seed) {
                claimed[tri] = true;
            }
            if let Some(island) = extractor.carve_island(mesh, seed) {
                islands.push(self.assets.generated(source, island, None));
            }
        }
        islands
    }

    /// Erase the island of `helper` under `local_point`
    fn erase_helper_piece(
        &mut self,
        source: &MeshAsset,
        helper: &str,
        local_point: Vec3,
    ) -> Option<(Arc<MeshAsset>, ErasedIsland)> {
        let index = source.sub_objects.iter().position(|s| s.name == helper)?;
        let sub = &source.sub_objects[index];
        let helper_asset = sub.mesh.as_ref()?;
        let mut mesh = helper_asset.mesh.clone()?;
        let seed = nearest_triangle(&mesh, sub.local_tm.inverse().transform_point3(local_point))?;
        let erased = IslandExtractor::global().erase_island(&mut mesh, seed)?;

        let updated_helper = self.assets.generated(helper_asset, mesh, None);
        let mut sub_objects = source.sub_objects.clone();
        sub_objects[index].mesh = Some(updated_helper);
        Some((self.assets.derived(source, sub_objects), erased))
    }

    // ------------------------------------------------------------------
    // Object state
    // ------------------------------------------------------------------

    /// Entity showing `key`: the entity itself or a static node's proxy
    pub(crate) fn target_entity(&self, key: ObjectKey) -> Option<EntityId> {
        match key {
            ObjectKey::Entity(e) => Some(e),
            ObjectKey::StaticNode(n) => self.proxies.get(&n).copied(),
        }
    }

    fn current_asset(&self, key: ObjectKey, slot: usize, host: &dyn BreakageHost) -> Option<Arc<MeshAsset>> {
        match (key, self.target_entity(key)) {
            (_, Some(entity)) => host.slot_asset(entity, slot),
            (ObjectKey::StaticNode(node), None) => host.static_node_asset(node),
            (ObjectKey::Entity(_), None) => None,
        }
    }

    fn object_transform(&self, key: ObjectKey, host: &dyn BreakageHost) -> Option<Mat4> {
        match (key, self.target_entity(key)) {
            (_, Some(entity)) => host.entity_params(entity).map(|p| p.world_tm * p.slot_tm),
            (ObjectKey::StaticNode(node), None) => host.static_node_transform(node),
            (ObjectKey::Entity(_), None) => None,
        }
    }

    fn set_object_asset(&mut self, key: ObjectKey, slot: usize, asset: Arc<MeshAsset>, host: &mut dyn BreakageHost) {
        match (key, self.target_entity(key)) {
            (_, Some(entity)) => host.set_slot_asset(entity, slot, Some(asset)),
            (ObjectKey::StaticNode(node), None) => host.set_static_node_asset(node, asset),
            (ObjectKey::Entity(_), None) => {}
        }
    }

    fn hide_whole(&mut self, key: ObjectKey, host: &mut dyn BreakageHost) {
        let tracked = self.tracked.entry(key).or_default();
        if tracked.state == TrackedState::Hidden {
            return;
        }
        tracked.state = TrackedState::Hidden;
        match (key, self.target_entity(key)) {
            (_, Some(entity)) => host.hide_entity(entity, true),
            (ObjectKey::StaticNode(node), None) => host.hide_static_node(node, true),
            (ObjectKey::Entity(_), None) => {}
        }
    }

    /// Record the first intact → broken transition of `key`
    fn mark_broken(&mut self, key: ObjectKey, slot: usize, original: &Arc<MeshAsset>) {
        let tracked = self.tracked.entry(key).or_default();
        if tracked.state != TrackedState::Intact {
            return;
        }
        tracked.state = TrackedState::PartiallyBroken;
        let (entity, source_node) = match key {
            ObjectKey::Entity(e) => (Some(e), None),
            ObjectKey::StaticNode(n) => (self.proxies.get(&n).copied(), Some(n)),
        };
        let appended = self.ledger.append(BrokenObjRec {
            entity,
            original: Arc::clone(original),
            source_node,
            slot,
        });
        if let Some(index) = appended {
            tracing::debug!("ledger record {} for {:?}", index, key);
        }
    }

    /// Hide the parts in `mask`, hiding the whole object once none remain
    ///
    /// `record` adds the first break to the ledger; replay clones pass false.
    pub(crate) fn remove_parts(
        &mut self,
        key: ObjectKey,
        mask: &PartMask,
        asset: &Arc<MeshAsset>,
        record: bool,
        host: &mut dyn BreakageHost,
    ) -> Result<()> {
        let part_count = asset.part_count();
        if self.state(key) == TrackedState::Hidden {
            return Ok(());
        }
        let entity = match key {
            ObjectKey::Entity(e) => Some(e),
            ObjectKey::StaticNode(n) if part_count > 1 => Some(self.ensure_proxy(n, host)?),
            ObjectKey::StaticNode(n) => self.proxies.get(&n).copied(),
        };

        let tracked = self.tracked.entry(key).or_default();
        let mut newly_hidden = Vec::new();
        for part in mask.iter().take_while(|&p| p < part_count) {
            if !tracked.hidden.get(part) {
                tracked.hidden.set(part);
                newly_hidden.push(part);
            }
        }
        if newly_hidden.is_empty() {
            return Ok(());
        }
        let visible = part_count - tracked.hidden.count_below(part_count);
        let remaining = (0..part_count).find(|&p| !tracked.hidden.get(p));

        if record {
            self.mark_broken(key, 0, asset);
        } else if let Some(tracked) = self.tracked.get_mut(&key) {
            tracked.state = TrackedState::PartiallyBroken;
        }
        if visible == 0 {
            self.hide_whole(key, host);
            return Ok(());
        }
        if let Some(entity) = entity {
            for &part in &newly_hidden {
                host.set_part_hidden(entity, part, true);
            }
        }
        if visible == 1 {
            let props = self.assets.piece_props(asset);
            let last = remaining.and_then(|p| props.get(p)).cloned().unwrap_or_default();
            if let (Some(entity), Some(_)) = (entity, last.timeout) {
                self.arm_debris_timer(entity, &last, false);
            }
        }
        Ok(())
    }

    /// Lightweight entity for a static node, created on first use
    pub(crate) fn ensure_proxy(&mut self, node: StaticNodeId, host: &mut dyn BreakageHost) -> Result<EntityId> {
        if let Some(&entity) = self.proxies.get(&node) {
            return Ok(entity);
        }
        let asset = host.static_node_asset(node).ok_or(BreakageError::UnknownOwner)?;
        let world_tm = host.static_node_transform(node).unwrap_or(Mat4::IDENTITY);
        let params = CreateParams {
            source_node: Some(node),
            ..CreateParams::at(world_tm)
        };
        let class = self.config.proxy_class.clone();
        let entity = self.spawn_checked(&class, asset, &params, host)?;
        host.hide_static_node(node, true);
        self.proxies.insert(node, entity);
        self.ledger.attach_entity(node, entity);
        tracing::debug!("proxy {:?} created for static node {:?}", entity, node);
        Ok(entity)
    }

    pub(crate) fn spawn_checked(
        &mut self,
        class: &str,
        asset: Arc<MeshAsset>,
        params: &CreateParams,
        host: &mut dyn BreakageHost,
    ) -> Result<EntityId> {
        if !host.has_class(class) {
            tracing::error!("entity class '{}' is not registered", class);
            return Err(BreakageError::MissingSpawnClass(class.to_string()));
        }
        host.spawn_entity(class, params, asset)
            .ok_or_else(|| BreakageError::MissingSpawnClass(class.to_string()))
    }

    fn apply_mesh(&mut self, key: ObjectKey, slot: usize, mesh: RenderMesh, host: &mut dyn BreakageHost) -> Result<()> {
        let original = self
            .current_asset(key, slot, host)
            .ok_or(BreakageError::UnknownOwner)?;
        let updated = self.assets.generated(&original, mesh, None);
        self.mark_broken(key, slot, &original);
        self.set_object_asset(key, slot, updated, host);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Debris timers
    // ------------------------------------------------------------------

    fn arm_debris_timer(&mut self, entity: EntityId, props: &PieceProps, generated: bool) {
        let timeout = match props.timeout {
            Some(t) => t,
            None if generated => self.config.debris_timeout,
            None => return,
        };
        if timeout <= 0.0 {
            return;
        }
        self.debris.retain(|t| t.entity != entity);
        self.debris.push(DebrisTimer {
            entity,
            remaining: timeout,
            rearm: props.lifetime_invisible.unwrap_or(timeout),
        });
    }

    fn update_debris_timers(&mut self, dt: f32, host: &mut dyn BreakageHost) {
        let mut expired = Vec::new();
        for timer in &mut self.debris {
            timer.remaining -= dt;
            if timer.remaining > 0.0 {
                continue;
            }
            if host.is_rendered(timer.entity) {
                timer.remaining = timer.rearm;
            } else {
                expired.push(timer.entity);
            }
        }
        if expired.is_empty() {
            return;
        }
        self.debris.retain(|t| !expired.contains(&t.entity));
        self.spawned.retain(|e| !expired.contains(e));
        for entity in expired {
            tracing::trace!("debris {:?} timed out", entity);
            host.remove_entity(entity);
        }
    }
}

/// Seed derived from a contact point and direction
///
/// Identical contacts give identical seeds, which keeps replays identical.
pub fn contact_seed(point: Vec3, normal: Vec3) -> u64 {
    let mut h = 0x9E37_79B9_7F4A_7C15u64;
    for v in [point.x, point.y, point.z, normal.x, normal.y, normal.z] {
        h ^= u64::from(v.to_bits());
        h = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
        h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 31;
    }
    h
}

/// Spawn `effect` with a scale and tilt varied by the contact seed
fn spawn_contact_effect(effect: &str, point: Vec3, normal: Vec3, host: &mut dyn BreakageHost) {
    let mut rng = StdRng::seed_from_u64(contact_seed(point, normal));
    let scale = 0.8 + 0.4 * rng.random::<f32>();
    let tilt = Vec3::new(rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>()) - 0.5;
    let normal = (normal.normalize_or(Vec3::Y) + tilt * 0.2).normalize_or(Vec3::Y);
    host.spawn_effect(effect, point, normal, scale);
}

fn debris_velocity(center: Vec3, params: &BreakageParams) -> Vec3 {
    let away = (center - params.impact_point).normalize_or_zero();
    (params.impact_impulse + away * params.explosion_impulse.length()) * IMPULSE_TO_VELOCITY
}

/// Random scale, rotation and offset of one generic piece
fn generic_transform(props: &PieceProps, extent: Vec3, rng: &mut StdRng) -> Mat4 {
    let size_var = props.size_var.unwrap_or(0.0);
    let scale = 1.0 + size_var * (rng.random::<f32>() * 2.0 - 1.0);
    let axes = props.rot_axes.unwrap_or_default();
    let mut rotation = Quat::IDENTITY;
    for (enabled, axis) in [(axes.x, Vec3::X), (axes.y, Vec3::Y), (axes.z, Vec3::Z)] {
        if enabled {
            rotation *= Quat::from_axis_angle(axis, rng.random::<f32>() * std::f32::consts::TAU);
        }
    }
    let jitter = Vec3::new(rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>()) - 0.5;
    Mat4::from_scale_rotation_translation(Vec3::splat(scale.max(0.05)), rotation, jitter * extent * 0.5)
}
