// tessly-core: Reconciliation engine between tessly-api and an object tree.
//
// REST snapshots and telemetry frames are flattened into signals, each
// signal is resolved to a type, a display profile, and a category, and
// the reconciler converges the host tree toward them with idempotent
// create-or-update calls. User actions run the other way, from writable
// points to vehicle commands.

pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod flatten;
pub mod ident;
pub mod model;
pub mod reconcile;
pub mod resolve;
pub mod store;
pub mod telemetry;
pub mod vehicle;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Action, CommandOutcome, CommandPlan};
pub use config::{ConfigSource, LinkTreePlacement, SharedConfig, VehicleConfig};
pub use discovery::{VehicleSummary, discover};
pub use error::{CoreError, StoreError};
pub use reconcile::{BatchReport, CleanupPolicy, LinkSet, Reconciler};
pub use store::{MemoryStore, ObjectId, ObjectInfo, ObjectKind, ObjectStore};
pub use telemetry::{TelemetryFrame, decode_frame};
pub use vehicle::{DispatchOutcome, FrameOutcome, UpdateOutcome, Vehicle};

// Re-export model types at the crate root for ergonomics.
pub use model::{Category, DataType, Origin, Profile, ProfileKind, Scalar, Signal};
