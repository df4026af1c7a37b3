//! Error types for the breakage system

use fracture::{AssetId, FractureError};
use thiserror::Error;

/// Result type for breakage operations
pub type Result<T> = std::result::Result<T, BreakageError>;

/// Errors that can occur while processing breakage
///
/// Apart from `MissingSpawnClass` every variant is recovered locally: the
/// affected object keeps its current geometry and the event is dropped or
/// retried.
#[derive(Error, Debug)]
pub enum BreakageError {
    /// Structural event delivered while the physics world is not stepping
    #[error("structural event while physics is not stepping")]
    SpuriousEvent,

    /// Event owner cannot be resolved to an entity or static node
    #[error("event owner cannot be resolved")]
    UnknownOwner,

    /// Asset is not registered with the asset store
    #[error("unknown asset {0:?}")]
    UnknownAsset(AssetId),

    /// Required entity class is not registered (deployment error)
    #[error("spawn class '{0}' is not registered")]
    MissingSpawnClass(String),

    /// Deferred job pool has no free slot
    #[error("deferred job pool exhausted")]
    ResourceExhausted,

    /// Fracture engine error
    #[error("fracture error: {0}")]
    Fracture(#[from] FractureError),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config parse error
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config serialization error
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
