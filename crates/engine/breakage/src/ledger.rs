//! Broken-object ledger
//!
//! Append-only record of every object's first intact → broken transition.
//! Reset walks it to restore original assets; replay cloning searches it
//! most-recent-first.

use crate::types::{EntityId, ObjectKey, StaticNodeId};
use fracture::MeshAsset;
use std::sync::Arc;

/// One broken object
#[derive(Debug, Clone)]
pub struct BrokenObjRec {
    /// Entity showing the broken geometry (a proxy for static nodes)
    pub entity: Option<EntityId>,
    /// Asset at the moment of the first break
    pub original: Arc<MeshAsset>,
    /// Static node the object came from
    pub source_node: Option<StaticNodeId>,
    /// Slot the original asset lived in
    pub slot: usize,
}

impl BrokenObjRec {
    /// Keys this record can be looked up by
    pub fn keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.source_node
            .map(ObjectKey::StaticNode)
            .into_iter()
            .chain(self.entity.map(ObjectKey::Entity))
    }

    pub fn matches(&self, key: ObjectKey) -> bool {
        self.keys().any(|k| k == key)
    }
}

/// Append-only list of [`BrokenObjRec`]
#[derive(Debug, Default)]
pub struct BrokenObjectLedger {
    records: Vec<BrokenObjRec>,
}

impl BrokenObjectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[BrokenObjRec] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BrokenObjRec> {
        self.records.get(index)
    }

    /// Append a record unless one already exists for any of its keys
    ///
    /// Returns the index of the new record.
    pub fn append(&mut self, record: BrokenObjRec) -> Option<usize> {
        if record.keys().any(|k| self.find_latest(k).is_some()) {
            return None;
        }
        self.records.push(record);
        Some(self.records.len() - 1)
    }

    /// Most recent record for `key`
    pub fn find_latest(&self, key: ObjectKey) -> Option<usize> {
        self.records.iter().rposition(|r| r.matches(key))
    }

    /// Attach the proxy entity created for a static node after its record
    pub fn attach_entity(&mut self, node: StaticNodeId, entity: EntityId) {
        if let Some(index) = self.find_latest(ObjectKey::StaticNode(node)) {
            self.records[index].entity.get_or_insert(entity);
        }
    }

    /// Take every record, leaving the ledger empty
    pub fn take(&mut self) -> Vec<BrokenObjRec> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fracture::{AssetId, RenderMesh};

    fn asset() -> Arc<MeshAsset> {
        Arc::new(MeshAsset::new(AssetId(1), "a", RenderMesh::new()))
    }

    #[test]
    fn test_duplicate_suppressed() {
        let mut ledger = BrokenObjectLedger::new();
        let rec = BrokenObjRec {
            entity: Some(EntityId(4)),
            original: asset(),
            source_node: None,
            slot: 0,
        };
        assert_eq!(ledger.append(rec.clone()), Some(0));
        assert_eq!(ledger.append(rec), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_static_record_gains_entity_key() {
        let mut ledger = BrokenObjectLedger::new();
        ledger.append(BrokenObjRec {
            entity: None,
            original: asset(),
            source_node: Some(StaticNodeId(9)),
            slot: 0,
        });
        assert_eq!(ledger.find_latest(ObjectKey::Entity(EntityId(2))), None);
        ledger.attach_entity(StaticNodeId(9), EntityId(2));
        assert_eq!(ledger.find_latest(ObjectKey::Entity(EntityId(2))), Some(0));
        assert_eq!(ledger.records()[0].keys().count(), 2);
    }
}
