// ── In-memory object store ──
//
// Lock-free concurrent tree with O(1) identifier lookups and a version
// counter bumped on every effective mutation.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{ObjectId, ObjectInfo, ObjectKind, ObjectStore, StoreError};
use crate::ident::MAX_IDENTIFIER_LEN;
use crate::model::{DataType, Scalar};

/// Reference [`ObjectStore`] used by the CLI and the test suite.
pub struct MemoryStore {
    /// Primary storage: id -> object.
    objects: DashMap<ObjectId, ObjectInfo>,

    /// Secondary index: (parent, identifier) -> id. Guarded through the
    /// entry API so concurrent creates of one pair yield one object.
    index: DashMap<(ObjectId, String), ObjectId>,

    /// Parent -> ordered child ids.
    children: DashMap<ObjectId, BTreeSet<ObjectId>>,

    next_id: AtomicU64,

    /// Version counter, bumped on every mutation.
    version: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            index: DashMap::new(),
            children: DashMap::new(),
            next_id: AtomicU64::new(1),
            version: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn create(
        &self,
        parent: ObjectId,
        identifier: &str,
        kind: ObjectKind,
    ) -> Result<ObjectId, StoreError> {
        validate_identifier(identifier)?;
        if parent != ObjectId::ROOT && !self.objects.contains_key(&parent) {
            return Err(StoreError::ParentNotFound { parent });
        }

        match self.index.entry((parent, identifier.to_owned())) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                let existing = self
                    .objects
                    .get(&id)
                    .map(|obj| obj.kind.clone())
                    .ok_or(StoreError::NotFound { id })?;
                if existing.same_kind(&kind) {
                    Ok(id)
                } else {
                    Err(StoreError::KindConflict {
                        identifier: identifier.to_owned(),
                        existing: existing.label(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
                self.objects.insert(
                    id,
                    ObjectInfo {
                        id,
                        parent,
                        identifier: identifier.to_owned(),
                        name: identifier.to_owned(),
                        kind,
                    },
                );
                self.children.entry(parent).or_default().insert(id);
                entry.insert(id);
                self.bump_version();
                Ok(id)
            }
        }
    }

    /// Apply `f` to an object; bump the version if it reports a change.
    fn modify(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut ObjectInfo) -> Result<bool, StoreError>,
    ) -> Result<(), StoreError> {
        let changed = {
            let mut obj = self
                .objects
                .get_mut(&id)
                .ok_or(StoreError::NotFound { id })?;
            f(obj.value_mut())?
        };
        if changed {
            self.bump_version();
        }
        Ok(())
    }

    fn subtree(&self, root: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(kids) = self.children.get(&id) {
                stack.extend(kids.iter().copied());
            }
            out.push(id);
        }
        out
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl ObjectStore for MemoryStore {
    fn find_by_identifier(&self, parent: ObjectId, identifier: &str) -> Option<ObjectId> {
        self.index
            .get(&(parent, identifier.to_owned()))
            .map(|r| *r.value())
    }

    fn create_category(&self, parent: ObjectId, identifier: &str) -> Result<ObjectId, StoreError> {
        self.create(parent, identifier, ObjectKind::Category)
    }

    fn create_point(
        &self,
        parent: ObjectId,
        identifier: &str,
        data_type: DataType,
    ) -> Result<ObjectId, StoreError> {
        self.create(
            parent,
            identifier,
            ObjectKind::Point {
                data_type,
                profile: None,
                writable: false,
                value: None,
            },
        )
    }

    fn create_link(&self, parent: ObjectId, identifier: &str) -> Result<ObjectId, StoreError> {
        self.create(parent, identifier, ObjectKind::Link { target: None })
    }

    fn set_name(&self, id: ObjectId, name: &str) -> Result<(), StoreError> {
        self.modify(id, |obj| {
            if obj.name == name {
                return Ok(false);
            }
            name.clone_into(&mut obj.name);
            Ok(true)
        })
    }

    fn set_target(&self, link: ObjectId, target: ObjectId) -> Result<(), StoreError> {
        if !self.objects.contains_key(&target) {
            return Err(StoreError::NotFound { id: target });
        }
        self.modify(link, |obj| match &mut obj.kind {
            ObjectKind::Link { target: current } => {
                let changed = *current != Some(target);
                *current = Some(target);
                Ok(changed)
            }
            _ => Err(StoreError::WrongKind {
                id: link,
                expected: "link",
            }),
        })
    }

    fn set_profile(&self, point: ObjectId, profile: Option<&str>) -> Result<(), StoreError> {
        self.modify(point, |obj| match &mut obj.kind {
            ObjectKind::Point { profile: current, .. } => {
                let changed = current.as_deref() != profile;
                *current = profile.map(str::to_owned);
                Ok(changed)
            }
            _ => Err(StoreError::WrongKind {
                id: point,
                expected: "point",
            }),
        })
    }

    fn set_writable(&self, point: ObjectId, writable: bool) -> Result<(), StoreError> {
        self.modify(point, |obj| match &mut obj.kind {
            ObjectKind::Point { writable: current, .. } => {
                let changed = *current != writable;
                *current = writable;
                Ok(changed)
            }
            _ => Err(StoreError::WrongKind {
                id: point,
                expected: "point",
            }),
        })
    }

    fn write_value(&self, point: ObjectId, value: &Scalar) -> Result<(), StoreError> {
        self.modify(point, |obj| match &mut obj.kind {
            ObjectKind::Point {
                data_type,
                value: current,
                ..
            } => {
                let offered = value.natural_type();
                if offered != *data_type {
                    return Err(StoreError::TypeMismatch {
                        id: point,
                        stored: *data_type,
                        offered,
                    });
                }
                let changed = current.as_ref() != Some(value);
                *current = Some(value.clone());
                Ok(changed)
            }
            _ => Err(StoreError::WrongKind {
                id: point,
                expected: "point",
            }),
        })
    }

    fn delete_object(&self, id: ObjectId) -> Result<(), StoreError> {
        if id == ObjectId::ROOT {
            return Err(StoreError::Rejected("the root cannot be deleted".into()));
        }
        let parent = self
            .objects
            .get(&id)
            .map(|obj| obj.parent)
            .ok_or(StoreError::NotFound { id })?;

        for doomed in self.subtree(id) {
            if let Some((_, obj)) = self.objects.remove(&doomed) {
                self.index.remove(&(obj.parent, obj.identifier));
            }
            self.children.remove(&doomed);
        }
        if let Some(mut siblings) = self.children.get_mut(&parent) {
            siblings.remove(&id);
        }

        self.bump_version();
        Ok(())
    }

    fn list_children(&self, parent: ObjectId) -> Vec<ObjectId> {
        self.children
            .get(&parent)
            .map(|kids| kids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn describe(&self, id: ObjectId) -> Option<ObjectInfo> {
        self.objects.get(&id).map(|obj| obj.value().clone())
    }
}

/// Host identifiers: 1..=64 chars of `[A-Za-z0-9_]`.
fn validate_identifier(identifier: &str) -> Result<(), StoreError> {
    let valid = !identifier.is_empty()
        && identifier.len() <= MAX_IDENTIFIER_LEN
        && identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier {
            identifier: identifier.to_owned(),
        })
    }
}
