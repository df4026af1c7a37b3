//! Collision geometry attached to fragments
//!
//! Two shapes are produced:
//!
//! - **TriMesh**: welded triangle mesh, used for dynamic pieces and anything
//!   not aligned to the world axes.
//! - **Voxels**: axis-aligned boxes on a regular lattice, used for static
//!   chunks whose frame is aligned to the world axes.

use crate::mesh::{Aabb, RenderMesh};
use glam::{IVec3, Vec3};
use std::collections::HashMap;

/// Positions closer than this are merged when welding
pub const WELD_TOLERANCE: f32 = 1e-4;

/// Physical geometry in the local frame of its owner
#[derive(Debug, Clone, PartialEq)]
pub enum PhysGeometry {
    TriMesh {
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    },
    Voxels {
        origin: Vec3,
        cell_size: f32,
        cells: Vec<IVec3>,
    },
}

impl PhysGeometry {
    /// Welded triangle mesh built from a render mesh
    ///
    /// Duplicate positions (UV seams, hard edges) collapse into one vertex and
    /// triangles that become degenerate are dropped.
    pub fn trimesh_from_render(mesh: &RenderMesh) -> Self {
        let positions: Vec<Vec3> = mesh.vertices.iter().map(|v| v.position).collect();
        let triangles: Vec<[u32; 3]> = (0..mesh.triangle_count())
            .map(|t| mesh.triangle(t))
            .collect();
        weld_trimesh(&positions, &triangles, WELD_TOLERANCE)
    }

    /// Voxelize the region of `bounds` where `inside` holds for voxel centers
    pub fn voxels_from_fn(bounds: &Aabb, cell_size: f32, inside: impl Fn(Vec3) -> bool) -> Self {
        let mut cells = Vec::new();
        if bounds.is_empty() || cell_size <= 0.0 {
            return PhysGeometry::Voxels {
                origin: Vec3::ZERO,
                cell_size: cell_size.max(f32::EPSILON),
                cells,
            };
        }
        let dims = (bounds.size() / cell_size).ceil().max(Vec3::ONE).as_ivec3();
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let cell = IVec3::new(x, y, z);
                    let center = bounds.min + (cell.as_vec3() + 0.5) * cell_size;
                    if inside(center.min(bounds.max)) {
                        cells.push(cell);
                    }
                }
            }
        }
        PhysGeometry::Voxels {
            origin: bounds.min,
            cell_size,
            cells,
        }
    }

    /// Copy moved by `offset`
    pub fn translated(&self, offset: Vec3) -> Self {
        match self {
            PhysGeometry::TriMesh {
                vertices,
                triangles,
            } => PhysGeometry::TriMesh {
                vertices: vertices.iter().map(|v| *v + offset).collect(),
                triangles: triangles.clone(),
            },
            PhysGeometry::Voxels {
                origin,
                cell_size,
                cells,
            } => PhysGeometry::Voxels {
                origin: *origin + offset,
                cell_size: *cell_size,
                cells: cells.clone(),
            },
        }
    }

    pub fn is_voxels(&self) -> bool {
        matches!(self, PhysGeometry::Voxels { .. })
    }

    /// Number of primitives (triangles or voxels)
    pub fn primitive_count(&self) -> usize {
        match self {
            PhysGeometry::TriMesh { triangles, .. } => triangles.len(),
            PhysGeometry::Voxels { cells, .. } => cells.len(),
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self {
            PhysGeometry::TriMesh { vertices, .. } => Aabb::from_points(vertices.iter().copied()),
            PhysGeometry::Voxels {
                origin,
                cell_size,
                cells,
            } => {
                let mut aabb = Aabb::EMPTY;
                for c in cells {
                    let min = *origin + c.as_vec3() * *cell_size;
                    aabb.extend(min);
                    aabb.extend(min + Vec3::splat(*cell_size));
                }
                aabb
            }
        }
    }
}

/// Merge vertices within `tolerance` and drop collapsed triangles
pub fn weld_trimesh(positions: &[Vec3], triangles: &[[u32; 3]], tolerance: f32) -> PhysGeometry {
    let inv = 1.0 / tolerance.max(f32::EPSILON);
    let mut lookup: HashMap<IVec3, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut remap = Vec::with_capacity(positions.len());

    for p in positions {
        let key = (*p * inv).round().as_ivec3();
        let index = *lookup.entry(key).or_insert_with(|| {
            vertices.push(*p);
            (vertices.len() - 1) as u32
        });
        remap.push(index);
    }

    let triangles = triangles
        .iter()
        .map(|t| t.map(|i| remap[i as usize]))
        .filter(|[a, b, c]| a != b && b != c && a != c)
        .collect();

    PhysGeometry::TriMesh {
        vertices,
        triangles,
    }
}
