// ── Link sets & tree placement ──
//
// A link set is the desired state of a curated tree: category name ->
// link key -> target. Reconciling makes the store match it and, when
// pruning is on, removes managed links the set no longer mentions.
// Only `LNK_` links inside `CAT_` categories are ever deleted.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Reconciler;
use crate::error::StoreError;
use crate::ident::{
    CATEGORY_PREFIX, LINK_PREFIX, LINK_TREE_MARKER, category_identifier, link_identifier,
};
use crate::model::{DataType, Scalar};
use crate::store::{ObjectId, ObjectKind};

/// One desired link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredLink {
    pub target: ObjectId,
    pub label: String,
}

/// Desired links grouped by category name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    categories: BTreeMap<String, BTreeMap<String, DesiredLink>>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the link `key` in `category`.
    pub fn insert(&mut self, category: &str, key: &str, target: ObjectId, label: &str) {
        self.categories.entry(category.to_owned()).or_default().insert(
            key.to_owned(),
            DesiredLink {
                target,
                label: label.to_owned(),
            },
        );
    }

    /// Register a category that should exist even without links.
    pub fn ensure_category(&mut self, category: &str) {
        self.categories.entry(category.to_owned()).or_default();
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&DesiredLink> {
        self.categories.get(category)?.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &DesiredLink)> {
        self.categories.iter().flat_map(|(category, links)| {
            links
                .iter()
                .map(move |(key, link)| (category.as_str(), key.as_str(), link))
        })
    }
}

/// Whether stale managed objects are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Remove stale managed links.
    pub prune: bool,
    /// Log what would be removed or relocated, change nothing.
    pub dry_run: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            prune: true,
            dry_run: false,
        }
    }
}

/// Outcome of reconciling one link set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkReport {
    pub ensured: usize,
    /// `category/link` names removed.
    pub deleted: Vec<String>,
    /// `category/link` names a dry run would have removed.
    pub would_delete: Vec<String>,
    pub failures: Vec<(String, StoreError)>,
}

/// Where the link tree ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub tree_root: ObjectId,
    /// Parent the previous tree was removed from.
    pub relocated_from: Option<ObjectId>,
}

impl Reconciler<'_> {
    /// Converge the managed categories below `tree_root` to `desired`.
    pub fn reconcile_link_set(
        &self,
        tree_root: ObjectId,
        desired: &LinkSet,
        policy: CleanupPolicy,
    ) -> LinkReport {
        let mut report = LinkReport::default();
        let mut keep: HashMap<ObjectId, HashSet<String>> = HashMap::new();

        for (category, links) in &desired.categories {
            let category_id = match self.ensure_category(tree_root, category) {
                Ok(id) => id,
                Err(error) => {
                    warn!(category, error = %error, "Failed to ensure link category");
                    report.failures.push((category.clone(), error));
                    continue;
                }
            };
            let kept = keep.entry(category_id).or_default();
            for (key, link) in links {
                // Kept even on failure so a flaky update never turns into a delete.
                kept.insert(link_identifier(key));
                match self.ensure_link(category_id, link.target, key, &link.label) {
                    Ok(_) => report.ensured += 1,
                    Err(error) => {
                        warn!(key, error = %error, "Failed to ensure link");
                        report.failures.push((key.clone(), error));
                    }
                }
            }
        }

        if policy.prune {
            self.prune_stale(tree_root, &keep, policy, &mut report);
        }
        report
    }

    fn prune_stale(
        &self,
        tree_root: ObjectId,
        keep: &HashMap<ObjectId, HashSet<String>>,
        policy: CleanupPolicy,
        report: &mut LinkReport,
    ) {
        for category_id in self.store.list_children(tree_root) {
            let Some(category) = self.store.describe(category_id) else {
                continue;
            };
            if category.kind != ObjectKind::Category
                || !category.identifier.starts_with(CATEGORY_PREFIX)
            {
                continue;
            }
            let kept = keep.get(&category_id);

            for link_id in self.store.list_children(category_id) {
                let Some(link) = self.store.describe(link_id) else {
                    continue;
                };
                if !matches!(link.kind, ObjectKind::Link { .. })
                    || !link.identifier.starts_with(LINK_PREFIX)
                    || kept.is_some_and(|k| k.contains(&link.identifier))
                {
                    continue;
                }

                let label = format!("{}/{}", category.name, link.name);
                if policy.dry_run {
                    info!(link = %label, "Dry run: would delete stale link");
                    report.would_delete.push(label);
                    continue;
                }
                match self.store.delete_object(link_id) {
                    Ok(()) => {
                        debug!(link = %label, "Deleted stale link");
                        report.deleted.push(label);
                    }
                    Err(error) => {
                        warn!(link = %label, error = %error, "Failed to delete stale link");
                        report.failures.push((label, error));
                    }
                }
            }
        }
    }

    // ── Placement ────────────────────────────────────────────────────

    /// Ensure the tree category `name` under `parent`. If a marker shows
    /// the tree previously lived under another parent, the old tree is
    /// deleted (or only reported, on a dry run).
    pub fn place_link_tree(
        &self,
        parent: ObjectId,
        name: &str,
        policy: CleanupPolicy,
    ) -> Result<Placement, StoreError> {
        let marker = self.ensure_marker()?;
        let previous = self.marker_value(marker);

        let mut relocated_from = None;
        let mut defer_marker = false;
        if let Some(old_parent) = previous.filter(|p| *p != parent) {
            if let Some(old_root) = self.find_tree(old_parent, name) {
                if policy.dry_run {
                    info!(from = %old_parent, to = %parent, "Dry run: would relocate link tree");
                    defer_marker = true;
                } else {
                    info!(from = %old_parent, to = %parent, "Relocating link tree");
                    self.store.delete_object(old_root)?;
                    relocated_from = Some(old_parent);
                }
            }
        }

        let tree_root = self.ensure_category(parent, name)?;
        if !defer_marker && previous != Some(parent) {
            let raw = i64::try_from(parent.0)
                .map_err(|_| StoreError::Rejected(format!("object id {parent} out of range")))?;
            self.store.write_value(marker, &Scalar::Int(raw))?;
        }

        Ok(Placement {
            tree_root,
            relocated_from,
        })
    }

    fn ensure_marker(&self) -> Result<ObjectId, StoreError> {
        if let Some(id) = self.store.find_by_identifier(self.root, LINK_TREE_MARKER) {
            return Ok(id);
        }
        let id = self
            .store
            .create_point(self.root, LINK_TREE_MARKER, DataType::Integer)?;
        self.store.set_name(id, "Link tree parent")?;
        Ok(id)
    }

    fn marker_value(&self, marker: ObjectId) -> Option<ObjectId> {
        match self.store.describe(marker)?.kind {
            ObjectKind::Point {
                value: Some(Scalar::Int(raw)),
                ..
            } => u64::try_from(raw).ok().map(ObjectId),
            _ => None,
        }
    }

    fn find_tree(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        let parent_identifier = if parent == ObjectId::ROOT {
            String::new()
        } else {
            // Parent gone means its subtree went with it.
            self.store.describe(parent)?.identifier
        };
        self.store
            .find_by_identifier(parent, &category_identifier(&parent_identifier, name))
    }
}
