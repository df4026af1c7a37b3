//! Error types for the fracture engine

use thiserror::Error;

/// Reasons a mesh asset cannot be turned into a breakable plane.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BadGeometry {
    /// The asset has no render mesh to read (already freed or never loaded)
    #[error("asset has no render mesh")]
    MissingMesh,
    /// Thinnest extent divided by the middle extent is above the planarity limit
    #[error("asset is not planar (thickness ratio {ratio:.3})")]
    NotPlanar { ratio: f32 },
    /// More than one sub-material is referenced by the triangles
    #[error("asset uses {count} sub-materials, expected 1")]
    MultipleMaterials { count: usize },
    /// The fracture grid would exceed the cell cap
    #[error("fracture grid needs {cells} cells, cap is {cap}")]
    TooManyCells { cells: usize, cap: usize },
    /// No triangle faces along the dominant axis
    #[error("asset has no triangle facing the dominant axis")]
    NoFrontFace,
}

/// Errors produced by the fracture engine
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FractureError {
    #[error("bad geometry: {0}")]
    BadGeometry(#[from] BadGeometry),
    /// Zero-area or inverted output piece
    #[error("degenerate fragment")]
    DegenerateFragment,
}

/// Result type for fracture operations
pub type Result<T> = std::result::Result<T, FractureError>;
