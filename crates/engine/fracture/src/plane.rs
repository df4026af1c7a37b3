//! Breakable planes
//!
//! A [`BreakablePlane`] is the fracture cache of one thin, single-material
//! asset. It is built once by [`BreakablePlane::set_geometry`] and then
//! answers every later break of that asset:
//!
//! 1. **Frame**: the thinnest bounding-box axis becomes the plane normal `w`;
//!    the other two axes (cyclic order, so the frame stays right-handed) span
//!    the plane coordinates `(u, v)`.
//! 2. **Reference triangles**: the largest front- and back-facing source
//!    triangles. Fragment UVs and tangents are barycentric blends against
//!    them, extrapolated across the whole plane.
//! 3. **Grid**: a [`FractureGrid`] over the projected bounds, trimmed to the
//!    projected front surface.
//!
//! Breaking selects grid cells inside the blast disc, merges sliver cells into
//! neighbours and writes the pieces to a [`ChunkStream`].

use crate::error::{BadGeometry, Result};
use crate::grid::{CellGenerator, FractureGrid, JitteredLattice, Rect, MAX_GRID_CELLS};
use crate::mesh::{BreakableMaterial, MeshAsset, RenderMesh};
use crate::phys::PhysGeometry;
use crate::polygon;
use crate::stream::ChunkStream;
use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Largest allowed ratio of the thinnest extent to the middle extent
pub const THIN_RATIO: f32 = 0.25;

/// Triangles whose normal has at least this component along the plane normal count as faces
const FACE_DOT: f32 = 0.7;

/// Blast radius jitter per cell, as a fraction of the radius
const RADIUS_JITTER: f32 = 0.3;

/// Bounding-box axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(i: usize) -> Self {
        match i % 3 {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Plane coordinate frame of an asset
///
/// Plane space is `(u, v, w)` with `w` along the plane normal. `basis` maps
/// plane space to asset space and is a signed axis permutation, so boxes stay
/// boxes in both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFrame {
    pub axis: Axis,
    pub basis: Mat4,
    pub inv_basis: Mat4,
    /// Projected bounds in plane coordinates
    pub rect: Rect,
    pub front_w: f32,
    pub back_w: f32,
}

impl PlaneFrame {
    fn new(axis: Axis, flipped: bool, bounds: &crate::mesh::Aabb) -> Self {
        let k = axis.index();
        let sign = if flipped { -1.0 } else { 1.0 };
        let e_u = Axis::from_index(k + 1).unit() * sign;
        let e_v = Axis::from_index(k + 2).unit();
        let e_w = axis.unit() * sign;
        let basis = Mat4::from_cols(
            e_u.extend(0.0),
            e_v.extend(0.0),
            e_w.extend(0.0),
            Vec4::W,
        );
        let inv_basis = basis.transpose();
        let local = bounds.transformed(&inv_basis);
        Self {
            axis,
            basis,
            inv_basis,
            rect: Rect::new(local.min.truncate(), local.max.truncate()),
            front_w: local.max.z,
            back_w: local.min.z,
        }
    }

    /// Asset space → plane space
    pub fn to_plane(&self, p: Vec3) -> Vec3 {
        self.inv_basis.transform_point3(p)
    }

    /// Plane space → asset space
    pub fn from_plane(&self, p: Vec3) -> Vec3 {
        self.basis.transform_point3(p)
    }

    /// Asset-space point projected to plane coordinates
    pub fn project(&self, p: Vec3) -> Vec2 {
        self.to_plane(p).truncate()
    }

    pub fn thickness(&self) -> f32 {
        self.front_w - self.back_w
    }

    pub fn normal(&self) -> Vec3 {
        self.basis.z_axis.truncate()
    }
}

/// Source triangle used to re-texture fragments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefTriangle {
    pub p: [Vec2; 3],
    pub uv: [Vec2; 3],
    /// Plane-space tangents, w = bitangent sign
    pub tangent: [Vec4; 3],
}

impl RefTriangle {
    fn from_mesh(frame: &PlaneFrame, mesh: &RenderMesh, tri: usize) -> Self {
        let idx = mesh.triangle(tri).map(|i| mesh.vertices[i as usize]);
        Self {
            p: idx.map(|v| frame.project(v.position)),
            uv: idx.map(|v| v.uv),
            tangent: idx.map(|v| {
                frame
                    .inv_basis
                    .transform_vector3(v.tangent.truncate())
                    .extend(v.tangent.w)
            }),
        }
    }

    /// Barycentric coordinates of `q`, extrapolated outside the triangle
    pub fn barycentric(&self, q: Vec2) -> Vec3 {
        let [a, b, c] = self.p;
        let v0 = b - a;
        let v1 = c - a;
        let v2 = q - a;
        let den = v0.perp_dot(v1);
        if den.abs() < 1e-12 {
            return Vec3::X;
        }
        let v = v2.perp_dot(v1) / den;
        let w = v0.perp_dot(v2) / den;
        Vec3::new(1.0 - v - w, v, w)
    }

    /// Blended UV and plane-space tangent at `q`
    pub fn sample(&self, q: Vec2) -> (Vec2, Vec4) {
        let b = self.barycentric(q);
        let uv = self.uv[0] * b.x + self.uv[1] * b.y + self.uv[2] * b.z;
        let t = (self.tangent[0].truncate() * b.x
            + self.tangent[1].truncate() * b.y
            + self.tangent[2].truncate() * b.z)
            .normalize_or(Vec3::X);
        (uv, t.extend(self.tangent[0].w))
    }
}

/// Front surface of a non-flat plane, sampled by vertical ray-casts
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSampler {
    triangles: Vec<[Vec3; 3]>,
}

impl SurfaceSampler {
    /// Height `w` of the surface under `p`, if a triangle covers it
    pub fn height_at(&self, p: Vec2) -> Option<f32> {
        const EPS: f32 = 1e-5;
        self.triangles.iter().find_map(|[a, b, c]| {
            let tri = RefTriangle {
                p: [a.truncate(), b.truncate(), c.truncate()],
                uv: [Vec2::ZERO; 3],
                tangent: [Vec4::ZERO; 3],
            };
            let bary = tri.barycentric(p);
            (bary.min_element() >= -EPS).then(|| a.z * bary.x + b.z * bary.y + c.z * bary.z)
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Check the breakable-plane preconditions without touching the asset
///
/// This is the pure half of [`BreakablePlane::set_geometry`]: same inputs
/// always give the same answer.
pub fn check_geometry(asset: &MeshAsset, material: &BreakableMaterial) -> Result<PlaneFrame> {
    check_geometry_with(asset, material, &JitteredLattice::default())
}

/// [`check_geometry`] with an explicit cell generator
pub fn check_geometry_with(
    asset: &MeshAsset,
    material: &BreakableMaterial,
    generator: &dyn CellGenerator,
) -> Result<PlaneFrame> {
    let mesh = asset.mesh.as_ref().ok_or(BadGeometry::MissingMesh)?;
    if mesh.is_empty() {
        return Err(BadGeometry::MissingMesh.into());
    }

    let count = mesh.material_count();
    if count > 1 {
        return Err(BadGeometry::MultipleMaterials { count }.into());
    }

    let bounds = mesh.aabb();
    let size = bounds.size().to_array();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| size[a].total_cmp(&size[b]));
    let (thin, mid) = (size[order[0]], size[order[1]]);
    let ratio = if mid > f32::EPSILON { thin / mid } else { 1.0 };
    if ratio > THIN_RATIO {
        return Err(BadGeometry::NotPlanar { ratio }.into());
    }

    let axis = Axis::from_index(order[0]);
    let facing = |sign: f32| {
        (0..mesh.triangle_count()).any(|t| {
            let [a, b, c] = mesh.triangle_positions(t);
            (b - a).cross(c - a).normalize_or_zero().dot(axis.unit() * sign) >= FACE_DOT
        })
    };
    let flipped = if facing(1.0) {
        false
    } else if facing(-1.0) {
        true
    } else {
        return Err(BadGeometry::NoFrontFace.into());
    };

    let frame = PlaneFrame::new(axis, flipped, &bounds);
    let cells = generator.estimate_cells(frame.rect, material.cell_size);
    if cells > MAX_GRID_CELLS {
        return Err(BadGeometry::TooManyCells {
            cells,
            cap: MAX_GRID_CELLS,
        }
        .into());
    }
    Ok(frame)
}

/// Fracture cache of one planar asset
#[derive(Debug, Clone)]
pub struct BreakablePlane {
    pub(crate) frame: PlaneFrame,
    pub(crate) grid: FractureGrid,
    pub(crate) front: RefTriangle,
    pub(crate) back: RefTriangle,
    pub(crate) material: BreakableMaterial,
    pub(crate) phys: Option<Arc<PhysGeometry>>,
    pub(crate) surface: Option<SurfaceSampler>,
    pub(crate) static_mode: bool,
    pub(crate) one_sided: bool,
}

impl BreakablePlane {
    /// Build the fracture cache for `asset`
    ///
    /// Fails with `BadGeometry` when the asset is not thin along one axis,
    /// uses more than one sub-material, or needs more than
    /// [`MAX_GRID_CELLS`] cells. On success the asset's physical geometry is
    /// cached (built from the render mesh if missing) and the full-resolution
    /// render mesh is freed.
    pub fn set_geometry(
        asset: &mut MeshAsset,
        material: &BreakableMaterial,
        static_mode: bool,
        seed: u64,
    ) -> Result<Self> {
        Self::set_geometry_with(asset, material, static_mode, seed, &JitteredLattice::default())
    }

    /// [`BreakablePlane::set_geometry`] with an explicit cell generator
    pub fn set_geometry_with(
        asset: &mut MeshAsset,
        material: &BreakableMaterial,
        static_mode: bool,
        seed: u64,
        generator: &dyn CellGenerator,
    ) -> Result<Self> {
        let frame = check_geometry_with(asset, material, generator)?;
        let mesh = asset.mesh.as_ref().ok_or(BadGeometry::MissingMesh)?;

        let facing = |tri: usize| {
            let [a, b, c] = mesh.triangle_positions(tri).map(|p| frame.to_plane(p));
            let n = (b - a).cross(c - a);
            (n.normalize_or_zero().z, n.length() * 0.5)
        };
        let largest = |front: bool| {
            (0..mesh.triangle_count())
                .filter_map(|t| {
                    let (dot, area) = facing(t);
                    let faces = if front { dot >= FACE_DOT } else { dot <= -FACE_DOT };
                    faces.then_some((t, area))
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(t, _)| t)
        };
        let front_tri = largest(true).ok_or(BadGeometry::NoFrontFace)?;
        let back_tri = largest(false);

        let front = RefTriangle::from_mesh(&frame, mesh, front_tri);
        let back = back_tri
            .map(|t| RefTriangle::from_mesh(&frame, mesh, t))
            .unwrap_or(front);
        let one_sided = asset.one_sided || back_tri.is_none() || frame.thickness() < 1e-5;

        let front_faces: Vec<[Vec3; 3]> = (0..mesh.triangle_count())
            .filter(|&t| facing(t).0 >= FACE_DOT)
            .map(|t| mesh.triangle_positions(t).map(|p| frame.to_plane(p)))
            .collect();

        let mut grid = generator.generate(frame.rect, material.cell_size, seed);
        let footprint = SurfaceSampler {
            triangles: front_faces.clone(),
        };
        let covered = grid
            .cells()
            .iter()
            .filter(|c| footprint.height_at(c.centroid).is_some())
            .count();
        if covered > 0 && covered < grid.cell_count() {
            grid.retain_cells(|c| footprint.height_at(c.centroid).is_some());
        }
        if grid.cell_count() > MAX_GRID_CELLS {
            return Err(BadGeometry::TooManyCells {
                cells: grid.cell_count(),
                cap: MAX_GRID_CELLS,
            }
            .into());
        }

        let flat_eps = 1e-4 + frame.thickness() * 0.01;
        let curved = front_faces
            .iter()
            .flatten()
            .any(|p| (p.z - frame.front_w).abs() > flat_eps);
        let surface = curved.then_some(footprint);

        if asset.phys.is_none() {
            asset.phys = Some(Arc::new(PhysGeometry::trimesh_from_render(mesh)));
        }
        let phys = asset.phys.clone();
        asset.mesh = None;

        tracing::debug!(
            "breakable plane for '{}': axis {:?}, {} cells, curved={}, one_sided={}",
            asset.name,
            frame.axis,
            grid.cell_count(),
            curved,
            one_sided
        );

        Ok(Self {
            frame,
            grid,
            front,
            back,
            material: material.clone(),
            phys,
            surface,
            static_mode,
            one_sided,
        })
    }

    pub fn frame(&self) -> &PlaneFrame {
        &self.frame
    }

    pub fn grid(&self) -> &FractureGrid {
        &self.grid
    }

    pub fn material(&self) -> &BreakableMaterial {
        &self.material
    }

    pub fn phys(&self) -> Option<&Arc<PhysGeometry>> {
        self.phys.as_ref()
    }

    pub fn surface(&self) -> Option<&SurfaceSampler> {
        self.surface.as_ref()
    }

    /// Static planes keep their remainder in place; dynamic planes release it
    pub fn is_static(&self) -> bool {
        self.static_mode
    }

    pub fn is_one_sided(&self) -> bool {
        self.one_sided
    }

    /// Decompose the plane around an impact
    ///
    /// Every cell touching the blast disc becomes a chunk. Chunks whose
    /// smallest interior angle is below `filter_angle` (radians) are merged
    /// into the largest selected neighbour. The cells outside the blast form
    /// the remainder, split into connected components; the largest component
    /// is the terminal piece. An impact that touches no cell yields an empty
    /// stream.
    pub fn break_at(
        &self,
        impact_local: Vec3,
        radius: f32,
        seed: u64,
        filter_angle: f32,
    ) -> ChunkStream {
        let center = self.frame.project(impact_local);
        let cells = self.grid.cells();
        let mut rng = StdRng::seed_from_u64(seed);

        let selected: Vec<bool> = (0..cells.len())
            .map(|i| {
                let jitter = 1.0 - RADIUS_JITTER * 0.5 + RADIUS_JITTER * rng.random::<f32>();
                let poly = self.grid.cell_polygon(i);
                polygon::circle_intersects_polygon(center, radius * jitter, &poly)
            })
            .collect();

        let mut stream = ChunkStream::new();
        if !selected.iter().any(|&s| s) {
            return stream.finish();
        }

        // Sliver merge
        let mut groups = UnionFind::new(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            if !selected[i] || cell.min_angle >= filter_angle {
                continue;
            }
            let target = self
                .grid
                .neighbors(i)
                .iter()
                .map(|&n| n as usize)
                .filter(|&n| selected[n])
                .max_by(|&a, &b| cells[a].area.total_cmp(&cells[b].area));
            if let Some(n) = target {
                groups.union(i, n);
            }
        }

        let mut chunk_groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of_root = std::collections::HashMap::new();
        for i in (0..cells.len()).filter(|&i| selected[i]) {
            let root = groups.find(i);
            let slot = *group_of_root.entry(root).or_insert_with(|| {
                chunk_groups.push(Vec::new());
                chunk_groups.len() - 1
            });
            chunk_groups[slot].push(i);
        }

        let remainder = self.remainder_components(&selected);
        for group in &chunk_groups {
            stream.push_piece(&self.piece_loops(group));
        }
        for component in &remainder {
            stream.push_piece(&self.piece_loops(component));
        }

        tracing::trace!(
            "break at {:?} r={}: {} chunks, {} remainder pieces",
            center,
            radius,
            chunk_groups.len(),
            remainder.len()
        );
        stream.finish()
    }

    /// Connected components of unselected cells, smallest first
    fn remainder_components(&self, selected: &[bool]) -> Vec<Vec<usize>> {
        let mut seen = vec![false; selected.len()];
        let mut components = Vec::new();
        for start in 0..selected.len() {
            if selected[start] || seen[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(c) = queue.pop_front() {
                component.push(c);
                for &n in self.grid.neighbors(c) {
                    let n = n as usize;
                    if !selected[n] && !seen[n] {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components.sort_by_key(|c| c.len());
        components
    }

    /// Loops of a group of cells: one simplified outline when the union is
    /// simply connected, otherwise the individual cells
    fn piece_loops(&self, cells: &[usize]) -> Vec<Vec<u32>> {
        let grid_cells = self.grid.cells();
        if cells.len() == 1 {
            return vec![grid_cells[cells[0]].corners.clone()];
        }
        let outline = polygon::boundary_loops(cells.iter().map(|&c| grid_cells[c].corners.as_slice()));
        if let [single] = outline.as_slice() {
            let unique: HashSet<u32> = single.iter().copied().collect();
            if unique.len() == single.len() {
                return vec![polygon::remove_collinear(self.grid.points(), single, 1e-4)];
            }
        }
        cells.iter().map(|&c| grid_cells[c].corners.clone()).collect()
    }
}

/// Disjoint-set over cell indices
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
