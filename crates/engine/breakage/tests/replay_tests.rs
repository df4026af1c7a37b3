//! Replay cloning tests

mod common;

use breakage::{
    AssetStore, BodyId, BodyOwner, BreakageConfig, BreakageManager, CloneLookup, MeshUpdateReason,
    MeshUpdated, ObjectKey, PartsRemoved,
};
use common::{box_mesh, compound_asset, cube_asset, MockHost};
use glam::{Mat4, Vec3};
use std::sync::Arc;

fn removal(owner: BodyOwner, body: u64, mask: u64) -> PartsRemoved {
    PartsRemoved {
        event_id: None,
        owner,
        body: BodyId(body),
        part_mask: vec![mask],
        id_offset: 0,
    }
}

#[test]
fn test_static_record_clone_has_two_lookup_keys() {
    let mut manager = BreakageManager::new(BreakageConfig::default());
    let mut host = MockHost::new();
    let node = host.add_static_node(7, Arc::new(compound_asset(10, 3)));
    let event = removal(BodyOwner::StaticNode(node), 1, 0b1);
    manager.on_parts_removed(&event, &mut host).unwrap();
    assert_eq!(manager.get_part_broken_objects().len(), 1);

    let indices = manager.get_broken_object_indices_for_cloning(std::slice::from_ref(&event));
    assert_eq!(indices, vec![0]);

    let mut lookup = CloneLookup::new();
    let spawned = manager.clone_part_removed_entities_by_index(&indices, &[], &mut lookup, &mut host);
    assert_eq!(spawned, 1);
    assert_eq!(host.spawned_of("ReplayClone").len(), 1, "exactly one clone entity");
    assert_eq!(lookup.len(), 2, "node and proxy entity both map to the clone");

    let clone = host.spawned_of("ReplayClone")[0];
    let proxy = manager.proxy_for(node).unwrap();
    assert_eq!(lookup[&ObjectKey::StaticNode(node)].entity, clone);
    assert_eq!(lookup[&ObjectKey::Entity(proxy)].entity, clone);
}

#[test]
fn test_static_clone_carries_broken_mesh() {
    let mut manager = BreakageManager::new(BreakageConfig::default());
    let mut host = MockHost::new();
    let original = Arc::new(cube_asset(3));
    let node = host.add_static_node(7, Arc::clone(&original));

    let deformed = box_mesh(Vec3::ZERO, Vec3::new(1.0, 0.6, 1.0));
    let event = MeshUpdated {
        event_id: None,
        owner: BodyOwner::StaticNode(node),
        body: BodyId(1),
        part_id: 0,
        deformed_mesh: Some(Arc::new(deformed)),
        reason: MeshUpdateReason::Deform,
        contact_point: Vec3::new(0.5, 1.0, 0.5),
        contact_normal: Vec3::Y,
        skinned: false,
    };
    manager.on_mesh_updated(&event, &mut host).unwrap();
    let broken = Arc::clone(&host.static_nodes[&node].asset);
    assert!(AssetStore::is_generated(broken.id));
    assert_eq!(manager.get_part_broken_objects().len(), 1);

    let removal = removal(BodyOwner::StaticNode(node), 1, 0b1);
    let indices = manager.get_broken_object_indices_for_cloning(std::slice::from_ref(&removal));
    let mut lookup = CloneLookup::new();
    assert_eq!(manager.clone_part_removed_entities_by_index(&indices, &[], &mut lookup, &mut host), 1);

    let clone = lookup[&ObjectKey::StaticNode(node)].entity;
    let cloned = host.slot(clone, 0).unwrap();
    assert_eq!(cloned.id, broken.id, "clone shows the deformed geometry, not the original");
    assert_ne!(cloned.id, original.id);
}

#[test]
fn test_duplicate_bodies_give_unique_indices() {
    let mut manager = BreakageManager::new(BreakageConfig::default());
    let mut host = MockHost::new();
    let a = host.add_entity(1, Arc::new(compound_asset(10, 3)), Mat4::IDENTITY);
    let b = host.add_entity(2, Arc::new(compound_asset(11, 3)), Mat4::IDENTITY);

    let events = vec![
        removal(BodyOwner::Entity(a), 100, 0b001),
        removal(BodyOwner::Entity(b), 200, 0b001),
        removal(BodyOwner::Entity(a), 100, 0b010),
        removal(BodyOwner::Entity(a), 101, 0b100),
    ];
    for ev in &events {
        manager.on_parts_removed(ev, &mut host).unwrap();
    }

    let indices = manager.get_broken_object_indices_for_cloning(&events);
    assert_eq!(indices, vec![0, 1], "one index per broken object");
}

#[test]
fn test_excluded_records_are_not_cloned() {
    let mut manager = BreakageManager::new(BreakageConfig::default());
    let mut host = MockHost::new();
    let a = host.add_entity(1, Arc::new(compound_asset(10, 3)), Mat4::IDENTITY);
    let b = host.add_entity(2, Arc::new(compound_asset(11, 3)), Mat4::IDENTITY);
    let events = vec![
        removal(BodyOwner::Entity(a), 100, 0b1),
        removal(BodyOwner::Entity(b), 200, 0b1),
    ];
    for ev in &events {
        manager.on_parts_removed(ev, &mut host).unwrap();
    }

    let indices = manager.get_broken_object_indices_for_cloning(&events);
    let mut lookup = CloneLookup::new();
    let spawned = manager.clone_part_removed_entities_by_index(
        &indices,
        &[ObjectKey::Entity(a)],
        &mut lookup,
        &mut host,
    );
    assert_eq!(spawned, 1);
    assert!(!lookup.contains_key(&ObjectKey::Entity(a)));
    assert!(lookup.contains_key(&ObjectKey::Entity(b)));
}

#[test]
fn test_replay_applies_to_clone_not_original() {
    let mut manager = BreakageManager::new(BreakageConfig::default());
    let mut host = MockHost::new();
    let original = host.add_entity(1, Arc::new(compound_asset(10, 3)), Mat4::IDENTITY);
    let first = removal(BodyOwner::Entity(original), 100, 0b001);
    manager.on_parts_removed(&first, &mut host).unwrap();

    let indices = manager.get_broken_object_indices_for_cloning(std::slice::from_ref(&first));
    let mut lookup = CloneLookup::new();
    manager.clone_part_removed_entities_by_index(&indices, &[], &mut lookup, &mut host);
    let clone = lookup[&ObjectKey::Entity(original)].entity;
    let records_before = manager.get_part_broken_objects().len();

    let second = removal(BodyOwner::Entity(original), 100, 0b010);
    assert!(manager.apply_part_break_to_cloned_object_from_event(&second, &lookup, &mut host));

    let clone_hidden: Vec<usize> = host.entities[&clone].hidden_parts.iter().copied().collect();
    assert_eq!(clone_hidden, vec![1], "clone starts fully revealed, then loses part 1");
    let original_hidden: Vec<usize> = host.entities[&original].hidden_parts.iter().copied().collect();
    assert_eq!(original_hidden, vec![0], "the live object is untouched");
    assert_eq!(
        manager.get_part_broken_objects().len(),
        records_before,
        "replay does not add ledger records"
    );

    let unknown = removal(BodyOwner::Entity(breakage::EntityId(999)), 5, 0b1);
    assert!(!manager.apply_part_break_to_cloned_object_from_event(&unknown, &lookup, &mut host));
}
