//! Identities and value types shared by the breakage system

use fracture::{AssetId, MaterialId};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Scene entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Free-standing static scenery (render node without an entity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaticNodeId(pub u64);

/// Rope owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RopeId(pub u64);

/// Physical body in the external physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Game-side owner of a physical body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyOwner {
    Entity(EntityId),
    StaticNode(StaticNodeId),
    Rope(RopeId),
}

impl BodyOwner {
    /// Key of a breakable owner; ropes never break
    pub fn object_key(&self) -> Option<ObjectKey> {
        match *self {
            BodyOwner::Entity(e) => Some(ObjectKey::Entity(e)),
            BodyOwner::StaticNode(n) => Some(ObjectKey::StaticNode(n)),
            BodyOwner::Rope(_) => None,
        }
    }
}

/// Identity of a breakable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKey {
    Entity(EntityId),
    StaticNode(StaticNodeId),
}

impl From<EntityId> for ObjectKey {
    fn from(id: EntityId) -> Self {
        ObjectKey::Entity(id)
    }
}

impl From<StaticNodeId> for ObjectKey {
    fn from(id: StaticNodeId) -> Self {
        ObjectKey::StaticNode(id)
    }
}

/// Behaviour switches of a break request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakageFlags {
    /// Spawn every fragment as an entity, never as a particle
    pub force_entity: bool,
    /// Play material and explosion effects
    pub material_effects: bool,
    /// Only spawn authored helper pieces, not the visible parts
    pub only_helper_pieces: bool,
}

/// Parameters of one break request
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BreakageParams {
    /// World-space impact point
    pub impact_point: Vec3,
    pub impact_impulse: Vec3,
    pub explosion_impulse: Vec3,
    /// Particle lifetime in seconds; zero uses the configured default
    pub particle_lifetime: f32,
    /// Generic piece count for sub-objects without `count=`
    pub generic_count: u32,
    pub flags: BreakageFlags,
}

/// What is breaking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomRef {
    /// A loaded asset, optionally with the body it is simulated by
    Asset { asset: AssetId, body: Option<BodyId> },
    /// The asset in an entity slot
    Slot { entity: EntityId, slot: usize },
}

/// Spawn parameters of a replacement entity or particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateParams {
    pub world_tm: Mat4,
    /// Slot transform relative to the entity
    pub slot_tm: Mat4,
    pub scale: Vec3,
    pub material: Option<MaterialId>,
    pub render_flags: u32,
    pub entity_flags: u32,
    /// Static node this object was created from
    pub source_node: Option<StaticNodeId>,
}

impl Default for CreateParams {
    fn default() -> Self {
        Self {
            world_tm: Mat4::IDENTITY,
            slot_tm: Mat4::IDENTITY,
            scale: Vec3::ONE,
            material: None,
            render_flags: 0,
            entity_flags: 0,
            source_node: None,
        }
    }
}

impl CreateParams {
    pub fn at(world_tm: Mat4) -> Self {
        Self {
            world_tm,
            ..Default::default()
        }
    }
}

/// Breakage state of a tracked object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackedState {
    #[default]
    Intact,
    PartiallyBroken,
    Hidden,
}

/// Growable bitset over sub-object indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartMask {
    words: Vec<u64>,
}

impl PartMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask with bits `0..count` set
    pub fn all(count: usize) -> Self {
        let mut mask = Self::new();
        for i in 0..count {
            mask.set(i);
        }
        mask
    }

    /// Decode a physics bitmask whose bit 0 is part `id_offset`
    pub fn from_words(words: &[u64], id_offset: u32) -> Self {
        let mut mask = Self::new();
        for (w, &word) in words.iter().enumerate() {
            for bit in 0..64 {
                if word & (1 << bit) != 0 {
                    mask.set(id_offset as usize + w * 64 + bit);
                }
            }
        }
        mask
    }

    pub fn set(&mut self, index: usize) {
        let (w, b) = (index / 64, index % 64);
        if self.words.len() <= w {
            self.words.resize(w + 1, 0);
        }
        self.words[w] |= 1 << b;
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / 64) {
            *word &= !(1 << (index % 64));
        }
    }

    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|w| w & (1 << (index % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Set bits below `limit`
    pub fn count_below(&self, limit: usize) -> usize {
        self.iter().take_while(|&i| i < limit).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            (0..64).filter(move |b| word & (1 << b) != 0).map(move |b| w * 64 + b)
        })
    }
}
