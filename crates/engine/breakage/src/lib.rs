//! Breakage orchestration
//!
//! Connects an external physics world to scene objects when things break:
//!
//! - [`EventBridge`] receives physics notifications, orders them by event id
//!   and drops the ones that arrive while physics is not stepping
//! - [`BreakageManager`] turns them (and gameplay break requests) into
//!   particles, spawned entities or in-place geometry updates
//! - the broken-object ledger backs full level reset and replay cloning
//!
//! Geometry work lives in the `fracture` crate.

mod error;

pub mod assets;
pub mod bridge;
pub mod budget;
pub mod config;
pub mod events;
pub mod jobs;
pub mod ledger;
pub mod metadata;
pub mod orchestrator;
pub mod part_id;
pub mod replay;
pub mod types;
pub mod world;

pub use assets::{AssetStore, PlaneCache};
pub use bridge::{DispatchOutcome, EventBridge, EventSequencer};
pub use budget::WorldBreakageBudget;
pub use config::{BreakageConfig, FractureConfig};
pub use error::{BreakageError, Result};
pub use events::{
    Collision, DispatchPoint, EntityNotification, EventKind, JointBroken, MeshUpdateReason,
    MeshUpdated, PartCreated, PartRevealed, PartsRemoved, PhysicsEvent, StateChange,
};
pub use jobs::{DeferredJobPool, JobKey, JOB_SLOTS};
pub use ledger::{BrokenObjRec, BrokenObjectLedger};
pub use metadata::{AxisMask, PieceProps};
pub use orchestrator::{contact_seed, BreakOutcome, BreakageManager, Representation};
pub use part_id::PartId;
pub use replay::{CloneLookup, CloneTarget};
pub use types::{
    BodyId, BodyOwner, BreakageFlags, BreakageParams, CreateParams, EntityId, GeomRef, ObjectKey,
    PartMask, RopeId, StaticNodeId, TrackedState,
};
pub use world::{BreakageHost, EffectSink, EntityWorld, PhysicsWorld};

// Re-export for convenience
pub use fracture;
