// ── Object tree reconciliation ──
//
// Converges the host tree toward the observed signals: one point per
// signal path under the instance root, one category per resolved
// category, one link per point inside its category. Every operation
// looks objects up by identifier first, so re-running a batch never
// creates duplicates.

mod links;
mod overview;

use tracing::{debug, warn};

pub use links::{CleanupPolicy, DesiredLink, LinkReport, LinkSet, Placement};
pub use overview::{OVERVIEW_NAME, OverviewReport, desired_overview, sync_overview};

use crate::command::Action;
use crate::error::StoreError;
use crate::ident::{category_identifier, link_identifier, make_identifier};
use crate::model::{Category, DataType, Scalar};
use crate::resolve::{Resolved, resolve};
use crate::store::{ObjectId, ObjectKind, ObjectStore};

/// Result of applying one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub point: ObjectId,
    pub created: bool,
}

/// A signal that could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    pub path: String,
    pub error: StoreError,
}

/// Outcome of one batch. Failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub applied: usize,
    pub created: usize,
    pub failures: Vec<PointFailure>,
}

/// Reconciler bound to one instance root.
pub struct Reconciler<'a> {
    store: &'a dyn ObjectStore,
    root: ObjectId,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn ObjectStore, root: ObjectId) -> Self {
        Self { store, root }
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn store(&self) -> &'a dyn ObjectStore {
        self.store
    }

    // ── Points ───────────────────────────────────────────────────────

    /// Apply every signal; failures are logged, recorded, and skipped.
    pub fn apply_signals<I>(&self, signals: I) -> BatchReport
    where
        I: IntoIterator<Item = (String, Scalar)>,
    {
        let mut report = BatchReport::default();
        for (path, value) in signals {
            match self.upsert_point(&path, &value) {
                Ok(upserted) => {
                    report.applied += 1;
                    if upserted.created {
                        report.created += 1;
                    }
                }
                Err(error) => {
                    warn!(path, error = %error, "Failed to apply signal");
                    report.failures.push(PointFailure { path, error });
                }
            }
        }
        report
    }

    /// Ensure the point, its category, and its link exist, then store the
    /// value coerced to the point's stored type.
    pub fn upsert_point(&self, path: &str, value: &Scalar) -> Result<Upserted, StoreError> {
        let resolved = resolve(path, value);
        let identifier = make_identifier(path);

        let (point, stored_type, created) = self.ensure_point(&identifier, path, &resolved)?;
        let category = self.ensure_category(self.root, resolved.category.as_ref())?;
        self.ensure_link(category, point, path, path)?;
        self.store.write_value(point, &value.coerce(stored_type))?;

        Ok(Upserted { point, created })
    }

    fn ensure_point(
        &self,
        identifier: &str,
        label: &str,
        resolved: &Resolved,
    ) -> Result<(ObjectId, DataType, bool), StoreError> {
        if let Some(id) = self.store.find_by_identifier(self.root, identifier) {
            let (data_type, profile) = self.point_meta(id, identifier)?;
            if data_type != resolved.data_type {
                warn!(
                    identifier,
                    stored = %data_type,
                    observed = %resolved.data_type,
                    "Point keeps its first stored type"
                );
            } else if profile.is_none() {
                if let Some(p) = resolved.profile {
                    self.store.set_profile(id, Some(p.name))?;
                }
            }
            return Ok((id, data_type, false));
        }

        let id = self
            .store
            .create_point(self.root, identifier, resolved.data_type)?;
        self.store.set_name(id, label)?;
        if let Some(p) = resolved.profile {
            self.store.set_profile(id, Some(p.name))?;
        }
        // A concurrent writer may have won the create with another type.
        let (data_type, _) = self.point_meta(id, identifier)?;
        debug!(identifier, data_type = %data_type, "Created point");
        Ok((id, data_type, true))
    }

    fn point_meta(
        &self,
        id: ObjectId,
        identifier: &str,
    ) -> Result<(DataType, Option<String>), StoreError> {
        let info = self.store.describe(id).ok_or(StoreError::NotFound { id })?;
        match info.kind {
            ObjectKind::Point {
                data_type, profile, ..
            } => Ok((data_type, profile)),
            other => Err(StoreError::KindConflict {
                identifier: identifier.to_owned(),
                existing: other.label(),
            }),
        }
    }

    // ── Categories & links ───────────────────────────────────────────

    /// Find or create the managed category `name` under `parent`.
    pub fn ensure_category(&self, parent: ObjectId, name: &str) -> Result<ObjectId, StoreError> {
        let parent_identifier = if parent == ObjectId::ROOT {
            String::new()
        } else {
            self.store
                .describe(parent)
                .ok_or(StoreError::ParentNotFound { parent })?
                .identifier
        };
        let identifier = category_identifier(&parent_identifier, name);

        let id = match self.store.find_by_identifier(parent, &identifier) {
            Some(id) => id,
            None => self.store.create_category(parent, &identifier)?,
        };
        self.store.set_name(id, name)?;
        Ok(id)
    }

    /// Find or create the managed link keyed by `key` under `parent`;
    /// name and target are refreshed every time.
    pub fn ensure_link(
        &self,
        parent: ObjectId,
        target: ObjectId,
        key: &str,
        label: &str,
    ) -> Result<ObjectId, StoreError> {
        let identifier = link_identifier(key);
        let id = match self.store.find_by_identifier(parent, &identifier) {
            Some(id) => id,
            None => self.store.create_link(parent, &identifier)?,
        };
        self.store.set_name(id, label)?;
        self.store.set_target(id, target)?;
        Ok(id)
    }

    // ── Action points ────────────────────────────────────────────────

    /// Ensure the writable point backing `action` and its link under
    /// the Actions category.
    pub fn ensure_action_point(&self, action: Action) -> Result<ObjectId, StoreError> {
        let id = match self.store.find_by_identifier(self.root, action.ident()) {
            Some(id) => id,
            None => self
                .store
                .create_point(self.root, action.ident(), action.data_type())?,
        };
        self.store.set_name(id, action.label())?;
        self.store.set_profile(id, Some(action.profile().name))?;
        self.store.set_writable(id, true)?;

        let category = self.ensure_category(self.root, Category::Actions.as_ref())?;
        self.ensure_link(category, id, &action.path(), action.label())?;
        Ok(id)
    }

    /// Store `value` in the action point, creating it if needed.
    pub fn write_action(&self, action: Action, value: &Scalar) -> Result<(), StoreError> {
        let id = match self.store.find_by_identifier(self.root, action.ident()) {
            Some(id) => id,
            None => self.ensure_action_point(action)?,
        };
        let (data_type, _) = self.point_meta(id, action.ident())?;
        self.store.write_value(id, &value.coerce(data_type))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::model::Profile;
    use crate::store::{MemoryStore, ObjectInfo, descendants};

    fn setup() -> (MemoryStore, ObjectId) {
        let store = MemoryStore::new();
        let root = store.create_category(ObjectId::ROOT, "INSTANCE").unwrap();
        (store, root)
    }

    fn point_value(store: &MemoryStore, id: ObjectId) -> Option<Scalar> {
        match store.describe(id).unwrap().kind {
            ObjectKind::Point { value, .. } => value,
            _ => None,
        }
    }

    fn all(store: &MemoryStore, root: ObjectId) -> Vec<ObjectInfo> {
        descendants(store, root)
    }

    #[test]
    fn upsert_builds_point_category_and_link() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);

        let up = rec
            .upsert_point("rest.charge_state.battery_level", &Scalar::Int(80))
            .unwrap();
        assert!(up.created);

        let info = store.describe(up.point).unwrap();
        assert_eq!(info.name, "rest.charge_state.battery_level");
        assert_eq!(
            info.kind,
            ObjectKind::Point {
                data_type: DataType::Integer,
                profile: Some(Profile::PERCENT.name.to_owned()),
                writable: false,
                value: Some(Scalar::Int(80)),
            }
        );

        let category = store
            .find_by_identifier(root, &category_identifier("INSTANCE", "Charging"))
            .unwrap();
        let link = store
            .find_by_identifier(category, &link_identifier("rest.charge_state.battery_level"))
            .unwrap();
        assert_eq!(
            store.describe(link).unwrap().kind,
            ObjectKind::Link { target: Some(up.point) }
        );
    }

    #[test]
    fn repeated_batches_converge() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);
        let batch = vec![
            ("rest.charge_state.battery_level".to_owned(), Scalar::Int(80)),
            ("rest.vehicle_state.locked".to_owned(), Scalar::Bool(true)),
            ("rest.vin".to_owned(), Scalar::Str("5YJ3".into())),
        ];

        let first = rec.apply_signals(batch.clone());
        assert_eq!(first.created, 3);
        let count = all(&store, root).len();

        let second = rec.apply_signals(batch);
        assert_eq!(second.applied, 3);
        assert_eq!(second.created, 0);
        assert_eq!(all(&store, root).len(), count);
    }

    #[test]
    fn first_stored_type_wins() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);

        let up = rec.upsert_point("telemetry.Odometer", &Scalar::Int(1000)).unwrap();
        rec.upsert_point("telemetry.Odometer", &Scalar::Float(1000.7)).unwrap();

        assert_eq!(point_value(&store, up.point), Some(Scalar::Int(1000)));
    }

    #[test]
    fn numeric_rest_strings_become_numbers() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);

        let power = rec
            .upsert_point("rest.charge_state.charger_power", &Scalar::Str("7.2".into()))
            .unwrap();
        assert_eq!(
            store.describe(power.point).unwrap().kind,
            ObjectKind::Point {
                data_type: DataType::Float,
                profile: Some(Profile::KILOWATT.name.to_owned()),
                writable: false,
                value: Some(Scalar::Float(7.2)),
            }
        );

        let stamp = rec
            .upsert_point(
                "rest.drive_state.gps_as_of_timestamp",
                &Scalar::Str("1700000000.5".into()),
            )
            .unwrap();
        assert_eq!(point_value(&store, stamp.point), Some(Scalar::Int(1_700_000_000)));
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let (store, root) = setup();
        // Squat the identifier the signal would need with a category.
        store
            .create_category(root, &make_identifier("rest.display_name"))
            .unwrap();
        let rec = Reconciler::new(&store, root);

        let report = rec.apply_signals(vec![
            ("rest.display_name".to_owned(), Scalar::Str("Roadrunner".into())),
            ("rest.charge_state.battery_level".to_owned(), Scalar::Int(55)),
        ]);

        assert_eq!(report.applied, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "rest.display_name");
    }

    #[test]
    fn action_points_are_writable_and_linked() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);

        for action in Action::iter() {
            rec.ensure_action_point(action).unwrap();
        }
        let before = all(&store, root).len();
        for action in Action::iter() {
            rec.ensure_action_point(action).unwrap();
        }
        assert_eq!(all(&store, root).len(), before);

        let id = store.find_by_identifier(root, "act_charge_limit").unwrap();
        let info = store.describe(id).unwrap();
        assert!(matches!(
            info.kind,
            ObjectKind::Point { data_type: DataType::Integer, writable: true, .. }
        ));

        let actions = store
            .find_by_identifier(root, &category_identifier("INSTANCE", "Actions"))
            .unwrap();
        assert_eq!(store.list_children(actions).len(), 7);
    }

    #[test]
    fn write_action_coerces() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);
        rec.write_action(Action::ChargeLimit, &Scalar::Float(79.6)).unwrap();
        let id = store.find_by_identifier(root, "act_charge_limit").unwrap();
        assert_eq!(point_value(&store, id), Some(Scalar::Int(79)));
    }

    #[test]
    fn ensure_category_requires_existing_parent() {
        let (store, root) = setup();
        let rec = Reconciler::new(&store, root);
        assert_eq!(
            rec.ensure_category(ObjectId(999), "Charging").unwrap_err(),
            StoreError::ParentNotFound { parent: ObjectId(999) }
        );
    }
}
