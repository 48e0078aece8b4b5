// ── Object store abstraction ──
//
// The engine's view of the host tree: categories, typed points, and
// links addressed by `(parent, identifier)`. Create operations are
// idempotent on that pair. The engine never holds object handles across
// calls; it looks objects up by identifier every time.

mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;

pub use crate::error::StoreError;
use crate::model::{DataType, Scalar};

/// Opaque handle to a store object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The tree root every instance tree hangs from.
    pub const ROOT: Self = Self(0);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind-specific object state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObjectKind {
    Category,
    Point {
        data_type: DataType,
        profile: Option<String>,
        writable: bool,
        value: Option<Scalar>,
    },
    Link {
        target: Option<ObjectId>,
    },
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Point { .. } => "point",
            Self::Link { .. } => "link",
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Full description of one object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub parent: ObjectId,
    pub identifier: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: ObjectKind,
}

/// Host object tree used by the reconciler.
///
/// Implementations must make `create_*` idempotent on
/// `(parent, identifier)`: a second create with the same pair returns the
/// existing object instead of adding a sibling.
pub trait ObjectStore: Send + Sync {
    fn find_by_identifier(&self, parent: ObjectId, identifier: &str) -> Option<ObjectId>;

    fn create_category(&self, parent: ObjectId, identifier: &str) -> Result<ObjectId, StoreError>;

    fn create_point(
        &self,
        parent: ObjectId,
        identifier: &str,
        data_type: DataType,
    ) -> Result<ObjectId, StoreError>;

    fn create_link(&self, parent: ObjectId, identifier: &str) -> Result<ObjectId, StoreError>;

    fn set_name(&self, id: ObjectId, name: &str) -> Result<(), StoreError>;

    fn set_target(&self, link: ObjectId, target: ObjectId) -> Result<(), StoreError>;

    fn set_profile(&self, point: ObjectId, profile: Option<&str>) -> Result<(), StoreError>;

    fn set_writable(&self, point: ObjectId, writable: bool) -> Result<(), StoreError>;

    /// Store `value` in `point`. The value must already match the point's
    /// stored type.
    fn write_value(&self, point: ObjectId, value: &Scalar) -> Result<(), StoreError>;

    /// Delete an object and everything below it.
    fn delete_object(&self, id: ObjectId) -> Result<(), StoreError>;

    fn list_children(&self, parent: ObjectId) -> Vec<ObjectId>;

    fn describe(&self, id: ObjectId) -> Option<ObjectInfo>;
}

/// Every object below `root`, depth first, parents before children.
pub fn descendants(store: &dyn ObjectStore, root: ObjectId) -> Vec<ObjectInfo> {
    let mut out = Vec::new();
    let mut stack: Vec<ObjectId> = store.list_children(root).into_iter().rev().collect();
    while let Some(id) = stack.pop() {
        if let Some(info) = store.describe(id) {
            stack.extend(store.list_children(id).into_iter().rev());
            out.push(info);
        }
    }
    out
}
