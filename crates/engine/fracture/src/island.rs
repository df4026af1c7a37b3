//! Mesh island extraction
//!
//! An island is the maximal set of triangles reachable from a seed triangle
//! across shared edges while staying on the seed's material. Adjacency is
//! built on welded positions, so UV seams and hard edges do not split an
//! island.
//!
//! All extraction goes through one [`IslandExtractor`]; its scratch buffers
//! sit behind a mutex, so at most one walk runs at a time.

use crate::mesh::{Aabb, RenderMesh};
use crate::phys::WELD_TOLERANCE;
use glam::{IVec3, Vec3};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};

/// Initial capacity of the flood-fill queue; growth past it is logged
pub const QUEUE_HINT: usize = 64;

static GLOBAL: OnceLock<IslandExtractor> = OnceLock::new();

#[derive(Debug, Default)]
struct Scratch {
    visited: Vec<bool>,
    queue: VecDeque<usize>,
}

/// Result of erasing an island in place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErasedIsland {
    pub bounds: Aabb,
    pub triangles: usize,
}

/// Flood-fill extractor with shared scratch state
#[derive(Debug)]
pub struct IslandExtractor {
    scratch: Mutex<Scratch>,
}

impl Default for IslandExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IslandExtractor {
    pub fn new() -> Self {
        Self {
            scratch: Mutex::new(Scratch {
                visited: Vec::new(),
                queue: VecDeque::with_capacity(QUEUE_HINT),
            }),
        }
    }

    /// Process-wide extractor
    pub fn global() -> &'static IslandExtractor {
        GLOBAL.get_or_init(IslandExtractor::new)
    }

    /// Sorted triangle indices of the island containing `seed_tri`
    ///
    /// Empty when `seed_tri` is out of range.
    pub fn island(&self, mesh: &RenderMesh, seed_tri: usize) -> Vec<usize> {
        let count = mesh.triangle_count();
        if seed_tri >= count {
            return Vec::new();
        }
        let adjacency = triangle_adjacency(mesh);
        let material = mesh.triangle_material(seed_tri);

        let mut scratch = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Scratch { visited, queue } = &mut *scratch;
        visited.clear();
        visited.resize(count, false);
        queue.clear();

        let mut island = Vec::new();
        let mut overflowed = false;
        visited[seed_tri] = true;
        queue.push_back(seed_tri);
        while let Some(tri) = queue.pop_front() {
            island.push(tri);
            for &next in &adjacency[tri] {
                if !visited[next] && mesh.triangle_material(next) == material {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
            if queue.len() > QUEUE_HINT && !overflowed {
                overflowed = true;
                tracing::debug!(
                    "island flood fill queue grew past {} entries ({} triangles in mesh)",
                    QUEUE_HINT,
                    count
                );
            }
        }
        island.sort_unstable();
        island
    }

    /// Copy the island into a standalone mesh with its own vertex buffer
    pub fn carve_island(&self, mesh: &RenderMesh, seed_tri: usize) -> Option<RenderMesh> {
        let island = self.island(mesh, seed_tri);
        if island.is_empty() {
            return None;
        }
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut out = RenderMesh::new();
        for &tri in &island {
            for v in mesh.triangle(tri) {
                let local = *remap.entry(v).or_insert_with(|| {
                    out.vertices.push(mesh.vertices[v as usize]);
                    (out.vertices.len() - 1) as u32
                });
                out.indices.push(local);
            }
            out.materials.push(mesh.triangle_material(tri));
        }
        Some(out)
    }

    /// Remove the island's triangles from `mesh` and report its bounds
    ///
    /// The vertex buffer and every other triangle's indices are unchanged.
    pub fn erase_island(&self, mesh: &mut RenderMesh, seed_tri: usize) -> Option<ErasedIsland> {
        let island = self.island(mesh, seed_tri);
        if island.is_empty() {
            return None;
        }
        let mut bounds = Aabb::EMPTY;
        let mut erase = vec![false; mesh.triangle_count()];
        for &tri in &island {
            erase[tri] = true;
            for p in mesh.triangle_positions(tri) {
                bounds.extend(p);
            }
        }

        let mut indices = Vec::with_capacity(mesh.indices.len() - island.len() * 3);
        let mut materials = Vec::with_capacity(mesh.triangle_count() - island.len());
        for (tri, &gone) in erase.iter().enumerate() {
            if !gone {
                indices.extend_from_slice(&mesh.triangle(tri));
                materials.push(mesh.triangle_material(tri));
            }
        }
        mesh.indices = indices;
        mesh.materials = materials;

        Some(ErasedIsland {
            bounds,
            triangles: island.len(),
        })
    }
}

/// Edge-adjacent triangles over welded positions
fn triangle_adjacency(mesh: &RenderMesh) -> Vec<Vec<usize>> {
    let inv = 1.0 / WELD_TOLERANCE;
    let mut weld: HashMap<IVec3, u32> = HashMap::new();
    let welded: Vec<u32> = mesh
        .vertices
        .iter()
        .map(|v| {
            let key = (v.position * inv).round().as_ivec3();
            let next = weld.len() as u32;
            *weld.entry(key).or_insert(next)
        })
        .collect();

    let mut by_edge: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for tri in 0..mesh.triangle_count() {
        let [a, b, c] = mesh.triangle(tri).map(|i| welded[i as usize]);
        for (x, y) in [(a, b), (b, c), (c, a)] {
            if x != y {
                by_edge.entry((x.min(y), x.max(y))).or_default().push(tri);
            }
        }
    }

    let mut adjacency = vec![Vec::new(); mesh.triangle_count()];
    for tris in by_edge.values() {
        for &a in tris {
            for &b in tris {
                if a != b && !adjacency[a].contains(&b) {
                    adjacency[a].push(b);
                }
            }
        }
    }
    adjacency
}

/// Triangle whose centroid is closest to `point`
pub fn nearest_triangle(mesh: &RenderMesh, point: Vec3) -> Option<usize> {
    (0..mesh.triangle_count())
        .map(|t| {
            let [a, b, c] = mesh.triangle_positions(t);
            (t, ((a + b + c) / 3.0).distance_squared(point))
        })
        .min_by(|x, y| x.1.total_cmp(&y.1))
        .map(|(t, _)| t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Vertex;
    use glam::Vec2;

    fn strip(count: usize, material: u16) -> RenderMesh {
        let mut mesh = RenderMesh::new();
        let v = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::ZERO);
        for i in 0..count {
            let x = i as f32;
            mesh.push_triangle([v(x, 0.0), v(x + 1.0, 0.0), v(x + 1.0, 1.0)], material);
            mesh.push_triangle([v(x, 0.0), v(x + 1.0, 1.0), v(x, 1.0)], material);
        }
        mesh
    }

    #[test]
    fn test_island_crosses_unwelded_seams() {
        let mesh = strip(3, 0);
        let island = IslandExtractor::new().island(&mesh, 0);
        assert_eq!(island.len(), 6, "whole strip is one island");
    }

    #[test]
    fn test_island_respects_material() {
        let mut mesh = strip(3, 0);
        mesh.materials[2] = 1;
        mesh.materials[3] = 1;
        let island = IslandExtractor::new().island(&mesh, 0);
        assert_eq!(island, vec![0, 1]);
    }

    #[test]
    fn test_out_of_range_seed() {
        let mesh = strip(1, 0);
        assert!(IslandExtractor::new().carve_island(&mesh, 10).is_none());
    }

    #[test]
    fn test_nearest_triangle() {
        let mesh = strip(4, 0);
        let t = nearest_triangle(&mesh, Vec3::new(3.7, 0.2, 0.0)).unwrap();
        assert_eq!(t, 6);
    }
}
