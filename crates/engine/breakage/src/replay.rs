//! Replay cloning
//!
//! During an event-window replay the recorded part removals are applied to
//! consequence-free clones instead of the live objects. The flow is:
//!
//! 1. [`BreakageManager::get_broken_object_indices_for_cloning`] resolves the
//!    recorded events to ledger records
//! 2. [`BreakageManager::clone_part_removed_entities_by_index`] spawns one
//!    clone per record and fills a [`CloneLookup`]
//! 3. [`BreakageManager::apply_part_break_to_cloned_object_from_event`]
//!    replays each event against its clone

use crate::config::verbose;
use crate::events::PartsRemoved;
use crate::orchestrator::{BreakageManager, TrackedObject};
use crate::types::{CreateParams, EntityId, ObjectKey, PartMask, TrackedState};
use crate::world::BreakageHost;
use std::collections::HashMap;
use std::sync::Arc;

/// Clone standing in for an original object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneTarget {
    pub entity: EntityId,
    /// Ledger record the clone was made from
    pub ledger_index: usize,
}

/// Original object → clone
pub type CloneLookup = HashMap<ObjectKey, CloneTarget>;

impl BreakageManager {
    /// Ledger records touched by a window of recorded removals
    ///
    /// Events for the same body count once. Each remaining event resolves to
    /// the most recent record of its owner; no index is returned twice.
    pub fn get_broken_object_indices_for_cloning(&self, events: &[PartsRemoved]) -> Vec<usize> {
        let mut indices = Vec::new();
        for (i, ev) in events.iter().enumerate() {
            if events[..i].iter().any(|earlier| earlier.body == ev.body) {
                continue;
            }
            let Some(key) = ev.owner.object_key() else {
                continue;
            };
            match self.ledger.find_latest(key) {
                Some(index) if !indices.contains(&index) => indices.push(index),
                Some(_) => {}
                None => verbose!(self.config, "no broken record for {:?}", key),
            }
        }
        indices
    }

    /// Spawn one clone per ledger record in `indices`
    ///
    /// Records whose keys appear in `exclude` are cloned elsewhere and are
    /// skipped. Every key of a record maps to its clone, so static-node
    /// records with a proxy entity produce two lookup entries. Returns the
    /// number of clones spawned.
    pub fn clone_part_removed_entities_by_index(
        &mut self,
        indices: &[usize],
        exclude: &[ObjectKey],
        lookup: &mut CloneLookup,
        host: &mut dyn BreakageHost,
    ) -> usize {
        let mut ordered = indices.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        ordered.dedup();

        let class = self.config.clone_class.clone();
        let mut spawned = 0;
        for index in ordered {
            let Some(record) = self.ledger.get(index).cloned() else {
                continue;
            };
            let keys: Vec<ObjectKey> = record.keys().collect();
            if keys.iter().any(|k| exclude.contains(k) || lookup.contains_key(k)) {
                continue;
            }

            let source = record.entity.and_then(|e| {
                host.entity_params(e)
                    .zip(host.slot_asset(e, record.slot))
            });
            let (params, asset) = match source {
                Some((params, asset)) => (params, asset),
                None => {
                    let world_tm = record
                        .source_node
                        .and_then(|n| host.static_node_transform(n))
                        .unwrap_or_default();
                    let params = CreateParams {
                        source_node: record.source_node,
                        ..CreateParams::at(world_tm)
                    };
                    // the node's current asset carries the broken geometry
                    let asset = record
                        .source_node
                        .and_then(|n| host.static_node_asset(n))
                        .unwrap_or_else(|| Arc::clone(&record.original));
                    (params, asset)
                }
            };

            let entity = match self.spawn_checked(&class, asset, &params, host) {
                Ok(entity) => entity,
                Err(e) => {
                    verbose!(self.config, "cannot clone record {}: {}", index, e);
                    continue;
                }
            };
            self.spawned.push(entity);
            spawned += 1;
            let target = CloneTarget {
                entity,
                ledger_index: index,
            };
            for key in keys {
                lookup.insert(key, target);
            }
        }
        tracing::debug!("spawned {} replay clones", spawned);
        spawned
    }

    /// Replay a recorded removal against the clone of its owner
    ///
    /// A clone that never lost a part starts with every part visible. Returns
    /// false when the owner has no clone.
    pub fn apply_part_break_to_cloned_object_from_event(
        &mut self,
        event: &PartsRemoved,
        lookup: &CloneLookup,
        host: &mut dyn BreakageHost,
    ) -> bool {
        let Some(target) = event.owner.object_key().and_then(|k| lookup.get(&k)).copied() else {
            return false;
        };
        let clone_key = ObjectKey::Entity(target.entity);
        let Some(asset) = host.slot_asset(target.entity, 0) else {
            verbose!(self.config, "clone {:?} has no geometry", target.entity);
            return false;
        };

        if !self.tracked.contains_key(&clone_key) {
            for part in 0..asset.part_count() {
                host.set_part_hidden(target.entity, part, false);
            }
            host.hide_entity(target.entity, false);
            self.tracked.insert(
                clone_key,
                TrackedObject {
                    state: TrackedState::Intact,
                    hidden: PartMask::new(),
                },
            );
        }

        let mask = PartMask::from_words(&event.part_mask, event.id_offset);
        match self.remove_parts(clone_key, &mask, &asset, false, host) {
            Ok(()) => true,
            Err(e) => {
                verbose!(self.config, "replaying removal on {:?} failed: {}", target.entity, e);
                false
            }
        }
    }
}
