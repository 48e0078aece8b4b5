// ── Domain model ──
//
// Value, type, and placement vocabulary shared by the decoder, the
// resolver, and the reconciler.

pub mod point;
pub mod scalar;

pub use point::{Category, DataType, Profile, ProfileKind};
pub use scalar::{Origin, Scalar, Signal};
