//! Asset store and fracture plane cache

use crate::metadata::PieceProps;
use fracture::{
    AssetId, BreakableMaterial, BreakablePlane, FractureError, GeometryId, MeshAsset,
    PhysGeometry, RenderMesh,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Ids of assets generated at runtime start here
const GENERATED_BASE: u64 = 1 << 48;

/// Loaded and generated mesh assets
#[derive(Debug)]
pub struct AssetStore {
    assets: HashMap<AssetId, Arc<MeshAsset>>,
    materials: HashMap<AssetId, BreakableMaterial>,
    props: HashMap<AssetId, Arc<[PieceProps]>>,
    next_generated: u64,
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
            materials: HashMap::new(),
            props: HashMap::new(),
            next_generated: GENERATED_BASE,
        }
    }

    /// Register a loaded asset with its breakable material
    pub fn insert(&mut self, asset: MeshAsset, material: BreakableMaterial) -> Arc<MeshAsset> {
        let id = asset.id;
        let asset = Arc::new(asset);
        self.props.remove(&id);
        self.materials.insert(id, material);
        self.assets.insert(id, Arc::clone(&asset));
        asset
    }

    pub fn get(&self, id: AssetId) -> Option<Arc<MeshAsset>> {
        self.assets.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Breakable material of an asset (default material when unknown)
    pub fn material(&self, id: AssetId) -> BreakableMaterial {
        self.materials.get(&id).cloned().unwrap_or_default()
    }

    /// Swap in a new version of a registered asset, keeping its material
    fn replace(&mut self, asset: MeshAsset) {
        if let Some(slot) = self.assets.get_mut(&asset.id) {
            *slot = Arc::new(asset);
        }
    }

    /// Parsed sub-object properties, cached per asset
    pub fn piece_props(&mut self, asset: &MeshAsset) -> Arc<[PieceProps]> {
        self.props
            .entry(asset.id)
            .or_insert_with(|| {
                asset
                    .sub_objects
                    .iter()
                    .map(|s| PieceProps::parse(&s.properties))
                    .collect()
            })
            .clone()
    }

    /// Register a mesh produced by breaking `source`
    pub fn generated(
        &mut self,
        source: &MeshAsset,
        mesh: RenderMesh,
        phys: Option<Arc<PhysGeometry>>,
    ) -> Arc<MeshAsset> {
        let id = AssetId(self.next_generated);
        self.next_generated += 1;
        let mut asset = MeshAsset::new(id, format!("{}#{}", source.name, id.0 - GENERATED_BASE), mesh);
        asset.phys = phys;
        asset.one_sided = source.one_sided;
        let material = self.material(source.id);
        self.insert(asset, material)
    }

    /// Register a copy of `source` with its sub-objects replaced
    pub fn derived(&mut self, source: &MeshAsset, sub_objects: Vec<fracture::SubObject>) -> Arc<MeshAsset> {
        let id = AssetId(self.next_generated);
        self.next_generated += 1;
        let mut asset = source.clone();
        asset.id = id;
        asset.sub_objects = sub_objects;
        let material = self.material(source.id);
        self.insert(asset, material)
    }

    /// Drop every runtime-generated asset
    ///
    /// Returns the physical geometry no remaining asset refers to, so its
    /// fracture planes can be released too.
    pub fn release_generated(&mut self) -> Vec<GeometryId> {
        let (released, kept): (Vec<_>, Vec<_>) = self
            .assets
            .drain()
            .partition(|(id, _)| Self::is_generated(*id));
        self.assets = kept.into_iter().collect();
        self.materials.retain(|id, _| id.0 < GENERATED_BASE);
        self.props.retain(|id, _| id.0 < GENERATED_BASE);

        let mut geometry: Vec<GeometryId> = released
            .iter()
            .map(|(_, asset)| PlaneCache::key(asset))
            .filter(|key| !self.assets.values().any(|a| PlaneCache::key(a) == *key))
            .collect();
        geometry.sort();
        geometry.dedup();
        geometry
    }

    pub fn is_generated(id: AssetId) -> bool {
        id.0 >= GENERATED_BASE
    }
}

/// Fracture planes keyed by physical-geometry identity
///
/// Planes are built on the first break of an asset and reused for every
/// later break. Assets that fail the planar checks are remembered too.
#[derive(Debug, Default)]
pub struct PlaneCache {
    planes: HashMap<GeometryId, Arc<BreakablePlane>>,
    rejected: HashMap<GeometryId, FractureError>,
}

impl PlaneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key of an asset
    pub fn key(asset: &MeshAsset) -> GeometryId {
        asset.geometry_id.unwrap_or(GeometryId(asset.id.0))
    }

    pub fn get(&self, asset: &MeshAsset) -> Option<&Arc<BreakablePlane>> {
        self.planes.get(&Self::key(asset))
    }

    /// Cached verdict for an asset: `Some(true)` built, `Some(false)` rejected
    pub fn verdict(&self, asset: &MeshAsset) -> Option<bool> {
        let key = Self::key(asset);
        if self.planes.contains_key(&key) {
            Some(true)
        } else if self.rejected.contains_key(&key) {
            Some(false)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    /// Geometry rejected by the planar checks
    pub fn rejected_len(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Plane for `asset`, building it on first use
    ///
    /// A successful build frees the render mesh of the stored asset.
    pub fn get_or_build(
        &mut self,
        store: &mut AssetStore,
        asset: &MeshAsset,
        static_mode: bool,
        seed: u64,
    ) -> fracture::Result<Arc<BreakablePlane>> {
        let key = Self::key(asset);
        if let Some(plane) = self.planes.get(&key) {
            return Ok(Arc::clone(plane));
        }
        if let Some(err) = self.rejected.get(&key) {
            return Err(*err);
        }

        let material = store.material(asset.id);
        let mut owned = asset.clone();
        match BreakablePlane::set_geometry(&mut owned, &material, static_mode, seed) {
            Ok(plane) => {
                let plane = Arc::new(plane);
                store.replace(owned);
                self.planes.insert(key, Arc::clone(&plane));
                Ok(plane)
            }
            Err(err) => {
                self.rejected.insert(key, err);
                Err(err)
            }
        }
    }

    /// Forget the plane of released physical geometry
    pub fn release(&mut self, geometry: GeometryId) {
        self.planes.remove(&geometry);
        self.rejected.remove(&geometry);
    }
}
