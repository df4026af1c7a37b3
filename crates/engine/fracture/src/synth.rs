//! Fragment mesh synthesis
//!
//! Turns pieces read off a [`ChunkStream`] into render meshes with collision
//! geometry. Each piece is built in plane space:
//!
//! - **Front** faces: ear-clipped loops at the front surface (`w = front_w`,
//!   or snapped onto the original surface for curved planes)
//! - **Back** faces: the same triangles mirrored to the back surface
//! - **Rim**: one quad per outline edge joining front and back
//!
//! and then moved into a piece-local frame centred on the piece.

use crate::error::FractureError;
use crate::mesh::{Aabb, RenderMesh, Vertex};
use crate::phys::{weld_trimesh, PhysGeometry, WELD_TOLERANCE};
use crate::plane::BreakablePlane;
use crate::polygon;
use crate::stream::{ChunkCursor, ChunkStream};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Loops with less area than this are treated as degenerate
const MIN_LOOP_AREA: f32 = 1e-8;

/// Upper bound on crumble effects spawned for one piece
const MAX_CRUMBLE_PER_PIECE: usize = 32;

/// Particle effect request produced while building a piece
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSpawn {
    pub effect: String,
    /// World position
    pub position: Vec3,
    /// World normal
    pub normal: Vec3,
    pub alpha: f32,
}

/// Options for [`BreakablePlane::create_flat_stat_obj`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatPieceParams<'a> {
    /// Crumble effect played along outline edges
    pub effect: Option<&'a str>,
    /// Skip collision geometry (particle debris)
    pub no_physics: bool,
    pub edge_alpha: f32,
    /// Distance between crumble effects; zero or less disables them
    pub crumble_spacing: f32,
}

/// One synthesized fragment
#[derive(Debug, Clone)]
pub struct FlatPiece {
    /// Mesh in the piece-local frame
    pub mesh: RenderMesh,
    pub phys: Option<PhysGeometry>,
    /// Piece-local bounds
    pub bounds: Aabb,
    /// Piece-local → asset-local
    pub local_tm: Mat4,
    /// Piece-local → world
    pub world_tm: Mat4,
    /// Front-face area in plane units
    pub area: f32,
    pub effects: Vec<EffectSpawn>,
    /// The remainder piece, which is never dropped
    pub terminal: bool,
}

impl FlatPiece {
    /// Volume of the piece bounds
    pub fn volume(&self) -> f32 {
        self.bounds.volume()
    }

    /// Mesh and collision geometry moved back into the asset-local frame
    ///
    /// Used when the piece replaces the source geometry in place.
    pub fn to_asset_frame(&self) -> (RenderMesh, Option<PhysGeometry>) {
        let offset = self.local_tm.w_axis.truncate();
        (
            self.mesh.transformed(&self.local_tm),
            self.phys.as_ref().map(|p| p.translated(offset)),
        )
    }

    /// World-space centre of the piece bounds
    pub fn world_center(&self) -> Vec3 {
        self.world_tm.transform_point3(self.bounds.center())
    }
}

impl BreakablePlane {
    /// Build the next piece of `cursor`
    ///
    /// # Arguments
    /// * `cursor` - Stream cursor, advanced by one piece
    /// * `world` - Asset-local → world transform of the broken object
    /// * `params` - Effect and physics options
    ///
    /// Returns `None` at the end of the stream, and for pieces whose loops are
    /// inverted or have no area. The terminal piece is always returned; its
    /// inverted loops are re-oriented instead.
    pub fn create_flat_stat_obj(
        &self,
        cursor: &mut ChunkCursor<'_>,
        world: &Mat4,
        params: &FlatPieceParams<'_>,
    ) -> Option<FlatPiece> {
        let piece = cursor.next_piece()?;
        let points = self.grid.points();

        let mut loops: Vec<Vec<Vec2>> = Vec::with_capacity(piece.loops.len());
        let mut index_loops: Vec<Vec<u32>> = Vec::with_capacity(piece.loops.len());
        for l in piece.loops.iter().filter(|l| l.len() >= 3) {
            let mut poly = polygon::loop_points(points, l);
            let mut indices = l.clone();
            let area = polygon::signed_area(&poly);
            if area.abs() < MIN_LOOP_AREA {
                continue;
            }
            if area < 0.0 {
                if !piece.terminal {
                    tracing::trace!("{}: inverted loop", FractureError::DegenerateFragment);
                    return None;
                }
                poly.reverse();
                indices.reverse();
            }
            loops.push(poly);
            index_loops.push(indices);
        }

        let area: f32 = loops.iter().map(|l| polygon::signed_area(l)).sum();
        if loops.is_empty() && !piece.terminal {
            tracing::trace!("{}: no loop with area", FractureError::DegenerateFragment);
            return None;
        }

        let mut center_2d = Vec2::ZERO;
        for l in &loops {
            center_2d += polygon::centroid(l) * polygon::signed_area(l);
        }
        center_2d = if area > 0.0 { center_2d / area } else { Vec2::ZERO };
        let frame = &self.frame;
        let mid_w = (frame.front_w + frame.back_w) * 0.5;
        let center = frame.from_plane(center_2d.extend(mid_w));

        let plane_mesh = self.build_plane_mesh(&loops, &index_loops);
        let to_piece = Mat4::from_translation(-center) * frame.basis;
        let mesh = plane_mesh.transformed(&to_piece);
        let bounds = mesh.aabb();
        let local_tm = Mat4::from_translation(center);
        let world_tm = *world * local_tm;

        let phys = if params.no_physics || mesh.is_empty() {
            None
        } else if self.static_mode && is_axis_aligned(world) {
            let from_piece = to_piece.inverse();
            let cell = (self.material.cell_size * 0.5).max(1e-3);
            Some(PhysGeometry::voxels_from_fn(&bounds, cell, |p| {
                let q = from_piece.transform_point3(p).truncate();
                loops.iter().any(|l| polygon::point_in_polygon(q, l))
            }))
        } else {
            let positions: Vec<Vec3> = mesh.vertices.iter().map(|v| v.position).collect();
            let triangles: Vec<[u32; 3]> = (0..mesh.triangle_count()).map(|t| mesh.triangle(t)).collect();
            Some(weld_trimesh(&positions, &triangles, WELD_TOLERANCE))
        };

        let effects = match params.effect {
            Some(effect) if params.crumble_spacing > 0.0 => {
                self.crumble_effects(&index_loops, world, effect, params)
            }
            _ => Vec::new(),
        };

        Some(FlatPiece {
            mesh,
            phys,
            bounds,
            local_tm,
            world_tm,
            area,
            effects,
            terminal: piece.terminal,
        })
    }

    /// Build every piece of `stream`, skipping degenerate ones
    pub fn synthesize(
        &self,
        stream: &ChunkStream,
        world: &Mat4,
        params: &FlatPieceParams<'_>,
    ) -> Vec<FlatPiece> {
        let mut cursor = stream.cursor();
        let mut pieces = Vec::new();
        while !cursor.is_finished() {
            if let Some(piece) = self.create_flat_stat_obj(&mut cursor, world, params) {
                pieces.push(piece);
            }
        }
        pieces
    }

    fn front_height(&self, p: Vec2) -> f32 {
        self.surface
            .as_ref()
            .and_then(|s| s.height_at(p))
            .unwrap_or(self.frame.front_w)
    }

    fn build_plane_mesh(&self, loops: &[Vec<Vec2>], index_loops: &[Vec<u32>]) -> RenderMesh {
        let mut mesh = RenderMesh::new();
        let material = self.material.id.0;
        let thickness = self.frame.thickness();

        for l in loops {
            let tris = polygon::triangulate(l);
            for [a, b, c] in tris {
                let front = [a, b, c].map(|i| {
                    let p = l[i];
                    let (uv, tangent) = self.front.sample(p);
                    Vertex {
                        position: p.extend(self.front_height(p)),
                        normal: Vec3::Z,
                        uv,
                        tangent,
                    }
                });
                mesh.push_triangle(front, material);

                if !self.one_sided {
                    let back = [a, c, b].map(|i| {
                        let p = l[i];
                        let (uv, tangent) = self.back.sample(p);
                        Vertex {
                            position: p.extend(self.front_height(p) - thickness),
                            normal: Vec3::NEG_Z,
                            uv,
                            tangent,
                        }
                    });
                    mesh.push_triangle(back, material);
                }
            }
        }

        if !self.one_sided {
            self.build_rim(&mut mesh, index_loops);
        }
        mesh
    }

    fn build_rim(&self, mesh: &mut RenderMesh, index_loops: &[Vec<u32>]) {
        let points = self.grid.points();
        let scale = self.material.rim_uv_scale;
        let thickness = self.frame.thickness();
        let material = self.material.id.0;
        let mut run = 0.0;

        for (a, b) in polygon::silhouette_edges(index_loops.iter().map(|l| l.as_slice())) {
            let (pa, pb) = (points[a as usize], points[b as usize]);
            let edge = pb - pa;
            let len = edge.length();
            if len <= f32::EPSILON {
                continue;
            }
            let dir = edge / len;
            let outward = Vec3::new(dir.y, -dir.x, 0.0);
            let tangent = dir.extend(0.0).extend(1.0);
            let (ha, hb) = (self.front_height(pa), self.front_height(pb));
            let v_back = thickness * scale;
            let vert = |p: Vec2, w: f32, uv: Vec2| Vertex {
                position: p.extend(w),
                normal: outward,
                uv,
                tangent,
            };
            let a_f = vert(pa, ha, Vec2::new(run * scale, 0.0));
            let a_b = vert(pa, ha - thickness, Vec2::new(run * scale, v_back));
            let b_b = vert(pb, hb - thickness, Vec2::new((run + len) * scale, v_back));
            let b_f = vert(pb, hb, Vec2::new((run + len) * scale, 0.0));
            mesh.push_triangle([a_f, a_b, b_b], material);
            mesh.push_triangle([a_f, b_b, b_f], material);
            run += len;
        }
    }

    fn crumble_effects(
        &self,
        index_loops: &[Vec<u32>],
        world: &Mat4,
        effect: &str,
        params: &FlatPieceParams<'_>,
    ) -> Vec<EffectSpawn> {
        let points = self.grid.points();
        let normal = world.transform_vector3(self.frame.normal()).normalize_or(Vec3::Y);
        let mut effects = Vec::new();
        'edges: for (a, b) in polygon::silhouette_edges(index_loops.iter().map(|l| l.as_slice())) {
            let (pa, pb) = (points[a as usize], points[b as usize]);
            let len = pa.distance(pb);
            let steps = (len / params.crumble_spacing).floor() as usize;
            for s in 0..steps {
                if effects.len() >= MAX_CRUMBLE_PER_PIECE {
                    break 'edges;
                }
                let t = (s as f32 + 0.5) / steps as f32;
                let p = pa.lerp(pb, t);
                let local = self.frame.from_plane(p.extend(self.front_height(p)));
                effects.push(EffectSpawn {
                    effect: effect.to_string(),
                    position: world.transform_point3(local),
                    normal,
                    alpha: params.edge_alpha,
                });
            }
        }
        effects
    }
}

/// True when the rotation part of `tm` maps axes onto axes
pub fn is_axis_aligned(tm: &Mat4) -> bool {
    const EPS: f32 = 1e-4;
    [tm.x_axis, tm.y_axis, tm.z_axis].iter().all(|col: &Vec4| {
        let c = col.truncate().abs();
        let big = c.max_element();
        big > EPS && (c.x + c.y + c.z - big) < EPS * big.max(1.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_axis_aligned_detection() {
        assert!(is_axis_aligned(&Mat4::IDENTITY));
        assert!(is_axis_aligned(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2)));
        assert!(is_axis_aligned(&Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::IDENTITY,
            Vec3::new(5.0, 1.0, 0.0),
        )));
        assert!(!is_axis_aligned(&Mat4::from_rotation_z(0.3)));
    }
}
