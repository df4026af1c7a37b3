//! Mesh assets and bounding volumes
//!
//! These are the engine-neutral data types the fracture engine reads and
//! produces. A [`MeshAsset`] is either simple (one [`RenderMesh`]) or compound
//! (named [`SubObject`]s that can be hidden or replaced independently).

use crate::phys::PhysGeometry;
use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Identity of a mesh asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

/// Identity of cached physical geometry (the key of the fracture plane cache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeometryId(pub u64);

/// Render material id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MaterialId(pub u16);

/// Axis-Aligned Bounding Box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Inverted box that any `extend` call replaces
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    /// Create a new AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points; `EMPTY` for no points
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.extend(p);
        }
        aabb
    }

    /// Grow the box to contain `point`
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Union of two boxes
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True when no point has been added
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Calculate the center point of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Calculate the size (extent) of the AABB
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Volume of the box, zero when empty
    pub fn volume(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Test intersection with another AABB
    ///
    /// Touching boxes count as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Transform the box by an affine matrix
    ///
    /// Computes a tight AABB around the transformed box (OBB → AABB), so the
    /// result may be larger than the source if the matrix rotates.
    pub fn transformed(&self, tm: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        Self::from_points(corners.into_iter().map(|c| tm.transform_point3(c)))
    }
}

/// A render vertex
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    /// xyz = tangent, w = bitangent sign
    pub tangent: Vec4,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
        }
    }
}

/// Indexed triangle mesh with one material id per triangle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Sub-material id of each triangle (`indices.len() / 3` entries)
    pub materials: Vec<u16>,
}

impl RenderMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex indices of triangle `tri`
    pub fn triangle(&self, tri: usize) -> [u32; 3] {
        let i = tri * 3;
        [self.indices[i], self.indices[i + 1], self.indices[i + 2]]
    }

    /// Positions of triangle `tri`
    pub fn triangle_positions(&self, tri: usize) -> [Vec3; 3] {
        self.triangle(tri)
            .map(|v| self.vertices[v as usize].position)
    }

    /// Material of triangle `tri` (0 when the material list is short)
    pub fn triangle_material(&self, tri: usize) -> u16 {
        self.materials.get(tri).copied().unwrap_or(0)
    }

    /// Bounds of all referenced vertices
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(
            self.indices
                .iter()
                .map(|&i| self.vertices[i as usize].position),
        )
    }

    /// Number of distinct sub-materials used by triangles
    pub fn material_count(&self) -> usize {
        (0..self.triangle_count())
            .map(|t| self.triangle_material(t))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Append a triangle with its own three vertices
    pub fn push_triangle(&mut self, vertices: [Vertex; 3], material: u16) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&vertices);
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
        self.materials.push(material);
    }

    /// Append all triangles of `other`
    pub fn append(&mut self, other: &RenderMesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        for t in 0..other.triangle_count() {
            self.materials.push(other.triangle_material(t));
        }
    }

    /// Copy of the mesh with positions, normals and tangents transformed
    pub fn transformed(&self, tm: &Mat4) -> RenderMesh {
        let normal_tm = tm.inverse().transpose();
        let vertices = self
            .vertices
            .iter()
            .map(|v| {
                let t = tm.transform_vector3(v.tangent.truncate()).normalize_or_zero();
                Vertex {
                    position: tm.transform_point3(v.position),
                    normal: normal_tm.transform_vector3(v.normal).normalize_or_zero(),
                    uv: v.uv,
                    tangent: t.extend(v.tangent.w),
                }
            })
            .collect();
        RenderMesh {
            vertices,
            indices: self.indices.clone(),
            materials: self.materials.clone(),
        }
    }

    /// Rebuild smooth normals and tangents from positions and UVs
    ///
    /// Used after skinning has moved vertices of a fractured mesh.
    pub fn recompute_normals_and_tangents(&mut self) {
        let n = self.vertices.len();
        let mut normals = vec![Vec3::ZERO; n];
        let mut tangents = vec![Vec3::ZERO; n];
        let mut bitangents = vec![Vec3::ZERO; n];

        for tri in 0..self.triangle_count() {
            let [a, b, c] = self.triangle(tri).map(|i| i as usize);
            let (pa, pb, pc) = (
                self.vertices[a].position,
                self.vertices[b].position,
                self.vertices[c].position,
            );
            let (ta, tb, tc) = (self.vertices[a].uv, self.vertices[b].uv, self.vertices[c].uv);
            let e1 = pb - pa;
            let e2 = pc - pa;
            let face_normal = e1.cross(e2);
            let d1 = tb - ta;
            let d2 = tc - ta;
            let det = d1.x * d2.y - d2.x * d1.y;
            let (t, bt) = if det.abs() > f32::EPSILON {
                let r = 1.0 / det;
                ((e1 * d2.y - e2 * d1.y) * r, (e2 * d1.x - e1 * d2.x) * r)
            } else {
                (Vec3::ZERO, Vec3::ZERO)
            };
            for v in [a, b, c] {
                normals[v] += face_normal;
                tangents[v] += t;
                bitangents[v] += bt;
            }
        }

        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            let normal = normals[i].normalize_or_zero();
            if normal == Vec3::ZERO {
                continue;
            }
            // Gram-Schmidt against the new normal
            let mut t = tangents[i] - normal * normal.dot(tangents[i]);
            if t.length_squared() < 1e-12 {
                t = normal.any_orthonormal_vector();
            }
            let t = t.normalize();
            let w = if normal.cross(t).dot(bitangents[i]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            vertex.normal = normal;
            vertex.tangent = t.extend(w);
        }
    }
}

/// A named, independently hideable part of a compound asset
#[derive(Debug, Clone)]
pub struct SubObject {
    pub name: String,
    /// Free-text `key=value` authoring properties
    pub properties: String,
    pub mesh: Option<Arc<MeshAsset>>,
    /// Helper sub-objects are authored break pieces rather than visible parts
    pub helper: bool,
    pub local_tm: Mat4,
}

impl SubObject {
    pub fn new(name: impl Into<String>, mesh: Option<Arc<MeshAsset>>) -> Self {
        Self {
            name: name.into(),
            properties: String::new(),
            mesh,
            helper: false,
            local_tm: Mat4::IDENTITY,
        }
    }

    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = properties.into();
        self
    }

    pub fn as_helper(mut self) -> Self {
        self.helper = true;
        self
    }
}

/// A loaded mesh asset
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub id: AssetId,
    pub name: String,
    /// Full-resolution render mesh; freed once a breakable plane has cached what it needs
    pub mesh: Option<RenderMesh>,
    pub phys: Option<Arc<PhysGeometry>>,
    pub geometry_id: Option<GeometryId>,
    pub sub_objects: Vec<SubObject>,
    /// Single-sided geometry gets no back face and no rim
    pub one_sided: bool,
}

impl MeshAsset {
    pub fn new(id: AssetId, name: impl Into<String>, mesh: RenderMesh) -> Self {
        Self {
            id,
            name: name.into(),
            mesh: Some(mesh),
            phys: None,
            geometry_id: None,
            sub_objects: Vec::new(),
            one_sided: false,
        }
    }

    /// Compound asset made of sub-objects only
    pub fn compound(id: AssetId, name: impl Into<String>, sub_objects: Vec<SubObject>) -> Self {
        Self {
            id,
            name: name.into(),
            mesh: None,
            phys: None,
            geometry_id: None,
            sub_objects,
            one_sided: false,
        }
    }

    pub fn with_geometry_id(mut self, id: GeometryId) -> Self {
        self.geometry_id = Some(id);
        self
    }

    pub fn is_compound(&self) -> bool {
        !self.sub_objects.is_empty()
    }

    /// Number of parts that can be hidden independently (1 for simple assets)
    pub fn part_count(&self) -> usize {
        self.sub_objects.len().max(1)
    }

    pub fn sub_object(&self, name: &str) -> Option<&SubObject> {
        self.sub_objects.iter().find(|s| s.name == name)
    }

    /// Render mesh bounds, falling back to physical geometry bounds
    pub fn aabb(&self) -> Aabb {
        match (&self.mesh, &self.phys) {
            (Some(mesh), _) => mesh.aabb(),
            (None, Some(phys)) => phys.aabb(),
            (None, None) => Aabb::EMPTY,
        }
    }
}

/// Render material with breakability parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakableMaterial {
    pub id: MaterialId,
    /// Target edge length of a fracture cell, in asset units
    pub cell_size: f32,
    /// UV units per asset unit along fractured rims
    pub rim_uv_scale: f32,
    /// Effect played along piece outlines
    pub crumble_effect: Option<String>,
}

impl Default for BreakableMaterial {
    fn default() -> Self {
        Self {
            id: MaterialId(0),
            cell_size: 0.1,
            rim_uv_scale: 1.0,
            crumble_effect: None,
        }
    }
}
