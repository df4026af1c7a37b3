//! Fracture grids
//!
//! A fracture grid is a precomputed 2D cellular decomposition of a plane.
//! Cells reference a shared point array, so neighbouring cells share edges
//! exactly and any group of cells can be merged by cancelling edges.
//!
//! Grids come from a [`CellGenerator`]. The default [`JitteredLattice`]
//! perturbs a regular lattice and randomly splits quads into triangles,
//! which reads as irregular cracking while staying cheap and deterministic
//! for a given seed.

use crate::polygon;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Upper bound on cells in a single grid
pub const MAX_GRID_CELLS: usize = 4000;

/// Axis-aligned rectangle in plane coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x <= self.max.x && p.y <= self.max.y
    }
}

/// One cell of a fracture grid
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Counter-clockwise corner indices into the grid points
    pub corners: Vec<u32>,
    pub centroid: Vec2,
    pub area: f32,
    /// Smallest interior angle, in radians
    pub min_angle: f32,
}

/// 2D cellular decomposition of a plane
#[derive(Debug, Clone, Default)]
pub struct FractureGrid {
    points: Vec<Vec2>,
    cells: Vec<GridCell>,
    neighbors: Vec<Vec<u32>>,
    bounds: Rect,
}

impl FractureGrid {
    /// Build a grid from index loops
    ///
    /// Loops are re-oriented counter-clockwise and loops with fewer than
    /// three corners are dropped.
    pub fn from_loops(points: Vec<Vec2>, loops: Vec<Vec<u32>>, bounds: Rect) -> Self {
        let cells = loops
            .into_iter()
            .filter(|l| l.len() >= 3)
            .map(|mut corners| {
                let mut poly = polygon::loop_points(&points, &corners);
                if polygon::signed_area(&poly) < 0.0 {
                    corners.reverse();
                    poly.reverse();
                }
                GridCell {
                    centroid: polygon::centroid(&poly),
                    area: polygon::signed_area(&poly),
                    min_angle: polygon::min_interior_angle(&poly),
                    corners,
                }
            })
            .collect();

        let mut grid = Self {
            points,
            cells,
            neighbors: Vec::new(),
            bounds,
        };
        grid.rebuild_neighbors();
        grid
    }

    fn rebuild_neighbors(&mut self) {
        let mut by_edge: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
        for (ci, cell) in self.cells.iter().enumerate() {
            let n = cell.corners.len();
            for i in 0..n {
                let (a, b) = (cell.corners[i], cell.corners[(i + 1) % n]);
                by_edge.entry((a.min(b), a.max(b))).or_default().push(ci as u32);
            }
        }
        let mut neighbors = vec![Vec::new(); self.cells.len()];
        for shared in by_edge.values() {
            for &a in shared {
                for &b in shared {
                    if a != b && !neighbors[a as usize].contains(&b) {
                        neighbors[a as usize].push(b);
                    }
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
        }
        self.neighbors = neighbors;
    }

    /// Keep only cells matching `keep`; points are left untouched
    pub fn retain_cells(&mut self, keep: impl Fn(&GridCell) -> bool) {
        self.cells.retain(|c| keep(c));
        self.rebuild_neighbors();
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells sharing an edge with `cell`
    pub fn neighbors(&self, cell: usize) -> &[u32] {
        &self.neighbors[cell]
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn cell_polygon(&self, cell: usize) -> Vec<Vec2> {
        polygon::loop_points(&self.points, &self.cells[cell].corners)
    }
}

/// Source of cellular decompositions
pub trait CellGenerator {
    /// Upper bound on the number of cells `generate` can produce
    fn estimate_cells(&self, bounds: Rect, cell_size: f32) -> usize;

    /// Decompose `bounds` into cells of roughly `cell_size`
    fn generate(&self, bounds: Rect, cell_size: f32, seed: u64) -> FractureGrid;
}

/// Jittered lattice with random diagonal splits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitteredLattice {
    /// Vertex displacement as a fraction of the lattice step (keep below 0.25
    /// so quads stay convex)
    pub jitter: f32,
    /// Probability of splitting a quad into two triangles
    pub split_chance: f32,
}

impl Default for JitteredLattice {
    fn default() -> Self {
        Self {
            jitter: 0.22,
            split_chance: 0.35,
        }
    }
}

impl JitteredLattice {
    fn lattice_dims(bounds: Rect, cell_size: f32) -> (usize, usize) {
        let size = bounds.size();
        let step = cell_size.max(f32::EPSILON);
        let nx = ((size.x / step).ceil() as usize).max(1);
        let ny = ((size.y / step).ceil() as usize).max(1);
        (nx, ny)
    }
}

impl CellGenerator for JitteredLattice {
    fn estimate_cells(&self, bounds: Rect, cell_size: f32) -> usize {
        let (nx, ny) = Self::lattice_dims(bounds, cell_size);
        // a split quad yields two cells
        let per_quad = if self.split_chance > 0.0 { 2 } else { 1 };
        nx.saturating_mul(ny).saturating_mul(per_quad)
    }

    fn generate(&self, bounds: Rect, cell_size: f32, seed: u64) -> FractureGrid {
        let (nx, ny) = Self::lattice_dims(bounds, cell_size);
        let size = bounds.size();
        let step = Vec2::new(size.x / nx as f32, size.y / ny as f32);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                let mut p = bounds.min + Vec2::new(i as f32, j as f32) * step;
                let jx = rng.random::<f32>() * 2.0 - 1.0;
                let jy = rng.random::<f32>() * 2.0 - 1.0;
                // Boundary points only slide along their edge
                if i != 0 && i != nx {
                    p.x += jx * self.jitter * step.x;
                }
                if j != 0 && j != ny {
                    p.y += jy * self.jitter * step.y;
                }
                points.push(p);
            }
        }

        let at = |i: usize, j: usize| (j * (nx + 1) + i) as u32;
        let mut loops = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let (a, b, c, d) = (at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1));
                if rng.random::<f32>() < self.split_chance {
                    if rng.random::<bool>() {
                        loops.push(vec![a, b, c]);
                        loops.push(vec![a, c, d]);
                    } else {
                        loops.push(vec![a, b, d]);
                        loops.push(vec![b, c, d]);
                    }
                } else {
                    loops.push(vec![a, b, c, d]);
                }
            }
        }

        FractureGrid::from_loops(points, loops, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_rect() -> Rect {
        Rect::new(Vec2::ZERO, Vec2::ONE)
    }

    #[test]
    fn test_lattice_covers_bounds() {
        let grid = JitteredLattice::default().generate(unit_rect(), 0.1, 7);
        let area: f32 = grid.cells().iter().map(|c| c.area).sum();
        assert!((area - 1.0).abs() < 1e-4, "cells should tile the rect, got {}", area);
        assert!(grid.cell_count() >= 100);
        assert!(grid.cells().iter().all(|c| c.corners.len() >= 3));
    }

    #[test]
    fn test_lattice_is_deterministic() {
        let gen = JitteredLattice::default();
        let a = gen.generate(unit_rect(), 0.2, 42);
        let b = gen.generate(unit_rect(), 0.2, 42);
        assert_eq!(a.points(), b.points());
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let grid = JitteredLattice::default().generate(unit_rect(), 0.25, 3);
        for c in 0..grid.cell_count() {
            assert!(!grid.neighbors(c).is_empty());
            for &n in grid.neighbors(c) {
                assert!(grid.neighbors(n as usize).contains(&(c as u32)));
            }
        }
    }

    #[test]
    fn test_estimate_matches_lattice() {
        let gen = JitteredLattice {
            jitter: 0.0,
            split_chance: 0.0,
        };
        let rect = Rect::new(Vec2::ZERO, Vec2::new(2.0, 1.0));
        assert_eq!(gen.estimate_cells(rect, 0.5), 8);
        assert_eq!(gen.generate(rect, 0.5, 0).cell_count(), 8);
    }

    #[test]
    fn test_estimate_bounds_split_lattice() {
        let gen = JitteredLattice {
            jitter: 0.0,
            split_chance: 1.0,
        };
        let rect = Rect::new(Vec2::ZERO, Vec2::new(2.0, 1.0));
        assert_eq!(gen.estimate_cells(rect, 0.5), 16);
        assert_eq!(gen.generate(rect, 0.5, 3).cell_count(), 16);

        let default = JitteredLattice::default();
        for seed in 0..4 {
            let cells = default.generate(rect, 0.1, seed).cell_count();
            assert!(cells <= default.estimate_cells(rect, 0.1), "seed {} gave {} cells", seed, cells);
        }
    }
}
