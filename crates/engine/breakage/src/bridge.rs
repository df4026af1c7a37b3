//! Physics event bridge
//!
//! Receives notifications from the physics world, enforces event-id order
//! for structural events, discards events that arrive while physics is not
//! stepping, and forwards everything to the [`BreakageManager`] or to
//! entity notifications.

use crate::config::verbose;
use crate::error::BreakageError;
use crate::events::{EntityNotification, EventKind, PhysicsEvent};
use crate::orchestrator::BreakageManager;
use crate::types::BodyOwner;
use crate::world::{BreakageHost, PhysicsWorld};
use std::collections::{BTreeMap, VecDeque};

/// What happened to an event handed to [`EventBridge::handle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Processed (possibly along with held successors)
    Applied,
    /// Waiting for a predecessor id
    Held,
    /// Re-queued until resources free up
    Deferred,
    /// Dropped (spurious, or failed and recovered)
    Discarded,
}

/// Orders structural events by their ids
///
/// Ids are global and contiguous. An event whose id is ahead of the next
/// expected id is held until its predecessors have been applied. A held
/// event whose predecessor never shows up is released after
/// `max_dispatches` post-step ticks.
#[derive(Debug)]
pub struct EventSequencer {
    next_expected: u64,
    held: BTreeMap<u64, (PhysicsEvent, u32)>,
    max_dispatches: u32,
}

impl EventSequencer {
    pub fn new(max_dispatches: u32) -> Self {
        Self::starting_at(1, max_dispatches)
    }

    pub fn starting_at(first_id: u64, max_dispatches: u32) -> Self {
        Self {
            next_expected: first_id,
            held: BTreeMap::new(),
            max_dispatches,
        }
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Accept an event; returns the events now ready, in order
    ///
    /// An id already passed is late and is released immediately.
    pub fn push(&mut self, event: PhysicsEvent) -> Vec<PhysicsEvent> {
        let Some(id) = event.event_id() else {
            return vec![event];
        };
        if id < self.next_expected {
            tracing::debug!("late event {} (expecting {})", id, self.next_expected);
            return vec![event];
        }
        if id > self.next_expected {
            self.held.insert(id, (event, 0));
            return Vec::new();
        }
        self.next_expected = id + 1;
        let mut ready = vec![event];
        self.drain_into(&mut ready);
        ready
    }

    /// Age held events by one dispatch; returns events released as stale
    pub fn tick(&mut self) -> Vec<PhysicsEvent> {
        let mut stale = false;
        for (_, age) in self.held.values_mut() {
            *age += 1;
            stale |= *age >= self.max_dispatches;
        }
        let mut ready = Vec::new();
        if !stale {
            return ready;
        }
        if let Some((&first, _)) = self.held.iter().next() {
            tracing::warn!(
                "events {}..{} never arrived, releasing held event {}",
                self.next_expected,
                first,
                first
            );
            self.next_expected = first;
            self.drain_into(&mut ready);
        }
        ready
    }

    fn drain_into(&mut self, ready: &mut Vec<PhysicsEvent>) {
        while let Some((event, _)) = self.held.remove(&self.next_expected) {
            ready.push(event);
            self.next_expected += 1;
        }
    }
}

/// Entry point for physics notifications
#[derive(Debug)]
pub struct EventBridge {
    sequencer: EventSequencer,
    deferred: VecDeque<PhysicsEvent>,
}

impl EventBridge {
    pub fn new(manager: &BreakageManager) -> Self {
        Self {
            sequencer: EventSequencer::new(manager.config().held_event_max_dispatches),
            deferred: VecDeque::new(),
        }
    }

    /// Register every listener with the physics world
    pub fn register(&self, physics: &mut dyn PhysicsWorld) {
        for kind in EventKind::ALL {
            physics.register_listener(kind, kind.dispatch_point());
        }
    }

    pub fn sequencer(&self) -> &EventSequencer {
        &self.sequencer
    }

    /// Events waiting for a free job slot
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Handle one notification
    pub fn handle(
        &mut self,
        manager: &mut BreakageManager,
        host: &mut dyn BreakageHost,
        event: PhysicsEvent,
    ) -> DispatchOutcome {
        if event.is_structural() && !host.is_stepping() {
            verbose!(manager.config(), "{}: {:?}", BreakageError::SpuriousEvent, event.kind());
            if let PhysicsEvent::PartCreated(ev) = &event {
                host.destroy_body(ev.new_body);
            }
            return DispatchOutcome::Discarded;
        }

        if let PhysicsEvent::PostStep { dt } = event {
            manager.on_post_step(dt, host);
            while let Some(ev) = self.deferred.pop_front() {
                if self.apply(manager, host, &ev) == DispatchOutcome::Deferred {
                    self.deferred.push_front(ev);
                    break;
                }
            }
            let stale = self.sequencer.tick();
            self.dispatch_in_order(manager, host, stale, None);
            return DispatchOutcome::Applied;
        }

        let id = event.event_id();
        let ready = self.sequencer.push(event);
        if ready.is_empty() {
            tracing::trace!("holding event {:?}", id);
            return DispatchOutcome::Held;
        }
        self.dispatch_in_order(manager, host, ready, id)
    }

    /// Apply `events` in order; returns the outcome of the one with `current` id
    ///
    /// Once an event is deferred every later structural event queues behind
    /// it, so a retried event never lands on top of a newer one.
    fn dispatch_in_order(
        &mut self,
        manager: &mut BreakageManager,
        host: &mut dyn BreakageHost,
        events: Vec<PhysicsEvent>,
        current: Option<u64>,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::Applied;
        for ev in events {
            let is_current = ev.event_id() == current;
            let result = if !self.deferred.is_empty() && ev.is_structural() {
                tracing::trace!("queueing {:?} behind deferred work", ev.event_id());
                self.deferred.push_back(ev);
                DispatchOutcome::Deferred
            } else {
                let result = self.apply(manager, host, &ev);
                if result == DispatchOutcome::Deferred {
                    self.deferred.push_back(ev);
                }
                result
            };
            if is_current {
                outcome = result;
            }
        }
        outcome
    }

    fn apply(
        &mut self,
        manager: &mut BreakageManager,
        host: &mut dyn BreakageHost,
        event: &PhysicsEvent,
    ) -> DispatchOutcome {
        let result = match event {
            PhysicsEvent::PartCreated(ev) => manager.on_part_created(ev, host),
            PhysicsEvent::PartsRemoved(ev) => manager.on_parts_removed(ev, host),
            PhysicsEvent::PartRevealed(ev) => manager.on_part_revealed(ev, host),
            PhysicsEvent::MeshUpdated(ev) => manager.on_mesh_updated(ev, host),
            PhysicsEvent::JointBroken(ev) => {
                for owner in ev.owners {
                    if let BodyOwner::Entity(entity) = owner {
                        host.notify(
                            entity,
                            EntityNotification::JointBroken {
                                joint_id: ev.joint_id,
                                point: ev.break_point,
                                normal: ev.break_normal,
                            },
                        );
                    }
                }
                manager.on_joint_broken(ev, host)
            }
            PhysicsEvent::Collision(ev) => {
                for (i, owner) in ev.owners.iter().enumerate() {
                    if let BodyOwner::Entity(entity) = owner {
                        host.notify(
                            *entity,
                            EntityNotification::Collision {
                                other: ev.owners[1 - i],
                                point: ev.point,
                                normal: ev.normal,
                                impulse: ev.impulse,
                            },
                        );
                    }
                }
                Ok(())
            }
            PhysicsEvent::StateChange(ev) => {
                if let BodyOwner::Entity(entity) = ev.owner {
                    host.notify(entity, EntityNotification::Awake(ev.awake));
                }
                Ok(())
            }
            PhysicsEvent::PostStep { dt } => {
                manager.on_post_step(*dt, host);
                Ok(())
            }
        };

        match result {
            Ok(()) => DispatchOutcome::Applied,
            Err(BreakageError::ResourceExhausted) => {
                tracing::debug!("deferring {:?} until a job slot frees up", event.kind());
                DispatchOutcome::Deferred
            }
            Err(BreakageError::MissingSpawnClass(_)) => DispatchOutcome::Discarded,
            Err(e) => {
                verbose!(manager.config(), "dropping {:?}: {}", event.kind(), e);
                DispatchOutcome::Discarded
            }
        }
    }
}
