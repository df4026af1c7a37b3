//! Planar fracture engine
//!
//! Builds cached fracture grids for thin single-material assets, breaks them
//! into polygon pieces around an impact and synthesizes fragment meshes with
//! collision geometry. Also hosts the mesh island extractor used to carve or
//! erase contiguous same-material regions of compound meshes.

mod error;
pub mod grid;
pub mod island;
pub mod mesh;
pub mod phys;
pub mod plane;
pub mod polygon;
pub mod stream;
pub mod synth;

pub use error::{BadGeometry, FractureError, Result};
pub use grid::{CellGenerator, FractureGrid, GridCell, JitteredLattice, Rect, MAX_GRID_CELLS};
pub use island::{nearest_triangle, ErasedIsland, IslandExtractor};
pub use mesh::{
    Aabb, AssetId, BreakableMaterial, GeometryId, MaterialId, MeshAsset, RenderMesh, SubObject,
    Vertex,
};
pub use phys::PhysGeometry;
pub use plane::{check_geometry, check_geometry_with, Axis, BreakablePlane, PlaneFrame};
pub use stream::{ChunkCursor, ChunkStream, Piece, LOOP_END, PIECE_END, STREAM_END};
pub use synth::{EffectSpawn, FlatPiece, FlatPieceParams};

// Re-export for convenience
pub use glam;
