// ── Overview tree ──
//
// A curated, human-friendly view: a handful of sub-categories, each
// linking to the most useful points. Every entry lists candidate
// sources in preference order; the first one that exists wins, so the
// tree fills in as REST and telemetry data arrive.

use tracing::debug;

use super::{CleanupPolicy, LinkReport, LinkSet, Reconciler};
use crate::command::Action;
use crate::error::StoreError;
use crate::ident::make_identifier;
use crate::model::Category;
use crate::store::{ObjectId, ObjectStore};

/// Name of the overview tree category.
pub const OVERVIEW_NAME: &str = "Overview";

#[derive(Debug, Clone, Copy)]
enum Source {
    Path(&'static str),
    Action(Action),
}

struct Entry {
    category: Category,
    key: &'static str,
    label: &'static str,
    sources: &'static [Source],
}

const BATTERY_LEVEL: &[Source] = &[
    Source::Path("rest.charge_state.battery_level"),
    Source::Path("rest.charge_state.usable_battery_level"),
    Source::Path("telemetry.Soc"),
    Source::Path("telemetry.BatteryLevel"),
];
const RANGE: &[Source] = &[
    Source::Path("rest.charge_state.battery_range"),
    Source::Path("rest.charge_state.est_battery_range"),
    Source::Path("telemetry.RatedRange"),
    Source::Path("telemetry.EstBatteryRange"),
];
const LOCKED: &[Source] = &[
    Source::Action(Action::Locked),
    Source::Path("rest.vehicle_state.locked"),
    Source::Path("telemetry.Locked"),
];
const INSIDE_TEMP: &[Source] = &[
    Source::Path("rest.climate_state.inside_temp"),
    Source::Path("telemetry.InsideTemp"),
];
const ODOMETER: &[Source] = &[
    Source::Path("rest.vehicle_state.odometer"),
    Source::Path("telemetry.Odometer"),
];

const OVERVIEW: &[Entry] = &[
    // Status
    Entry {
        category: Category::Status,
        key: "state",
        label: "Vehicle state",
        sources: &[Source::Path("rest.state")],
    },
    Entry {
        category: Category::Status,
        key: "battery_level",
        label: "Battery level",
        sources: BATTERY_LEVEL,
    },
    Entry {
        category: Category::Status,
        key: "range",
        label: "Range",
        sources: RANGE,
    },
    Entry {
        category: Category::Status,
        key: "locked",
        label: "Locked",
        sources: LOCKED,
    },
    Entry {
        category: Category::Status,
        key: "inside_temp",
        label: "Inside temperature",
        sources: INSIDE_TEMP,
    },
    Entry {
        category: Category::Status,
        key: "odometer",
        label: "Odometer",
        sources: ODOMETER,
    },
    // Charging
    Entry {
        category: Category::Charging,
        key: "battery_level",
        label: "Battery level",
        sources: BATTERY_LEVEL,
    },
    Entry {
        category: Category::Charging,
        key: "charging_state",
        label: "Charging state",
        sources: &[
            Source::Path("rest.charge_state.charging_state"),
            Source::Path("telemetry.DetailedChargeState"),
        ],
    },
    Entry {
        category: Category::Charging,
        key: "charger_power",
        label: "Charger power",
        sources: &[
            Source::Path("rest.charge_state.charger_power"),
            Source::Path("telemetry.ACChargingPower"),
            Source::Path("telemetry.DCChargingPower"),
        ],
    },
    Entry {
        category: Category::Charging,
        key: "time_to_full",
        label: "Time to full",
        sources: &[
            Source::Path("rest.charge_state.time_to_full_charge"),
            Source::Path("telemetry.TimeToFullCharge"),
        ],
    },
    Entry {
        category: Category::Charging,
        key: "charging",
        label: "Charging",
        sources: &[Source::Action(Action::Charging)],
    },
    Entry {
        category: Category::Charging,
        key: "charge_limit",
        label: "Charge limit",
        sources: &[Source::Action(Action::ChargeLimit)],
    },
    Entry {
        category: Category::Charging,
        key: "charging_amps",
        label: "Charging current",
        sources: &[Source::Action(Action::ChargingAmps)],
    },
    // Climate
    Entry {
        category: Category::Climate,
        key: "inside_temp",
        label: "Inside temperature",
        sources: INSIDE_TEMP,
    },
    Entry {
        category: Category::Climate,
        key: "outside_temp",
        label: "Outside temperature",
        sources: &[
            Source::Path("rest.climate_state.outside_temp"),
            Source::Path("telemetry.OutsideTemp"),
        ],
    },
    Entry {
        category: Category::Climate,
        key: "climate",
        label: "Climate",
        sources: &[Source::Action(Action::Climate)],
    },
    // Security
    Entry {
        category: Category::Security,
        key: "locked",
        label: "Locked",
        sources: LOCKED,
    },
    Entry {
        category: Category::Security,
        key: "sentry_mode",
        label: "Sentry mode",
        sources: &[
            Source::Path("rest.vehicle_state.sentry_mode"),
            Source::Path("telemetry.SentryMode"),
        ],
    },
    Entry {
        category: Category::Security,
        key: "flash",
        label: "Flash lights",
        sources: &[Source::Action(Action::Flash)],
    },
    Entry {
        category: Category::Security,
        key: "honk",
        label: "Honk",
        sources: &[Source::Action(Action::Honk)],
    },
    // Driving
    Entry {
        category: Category::Driving,
        key: "odometer",
        label: "Odometer",
        sources: ODOMETER,
    },
    Entry {
        category: Category::Driving,
        key: "speed",
        label: "Speed",
        sources: &[
            Source::Path("rest.drive_state.speed"),
            Source::Path("telemetry.VehicleSpeed"),
        ],
    },
    Entry {
        category: Category::Driving,
        key: "shift_state",
        label: "Gear",
        sources: &[
            Source::Path("rest.drive_state.shift_state"),
            Source::Path("telemetry.Gear"),
        ],
    },
    Entry {
        category: Category::Driving,
        key: "latitude",
        label: "Latitude",
        sources: &[
            Source::Path("rest.drive_state.latitude"),
            Source::Path("telemetry.Location.latitude"),
        ],
    },
    Entry {
        category: Category::Driving,
        key: "longitude",
        label: "Longitude",
        sources: &[
            Source::Path("rest.drive_state.longitude"),
            Source::Path("telemetry.Location.longitude"),
        ],
    },
];

const OVERVIEW_CATEGORIES: [Category; 5] = [
    Category::Status,
    Category::Charging,
    Category::Climate,
    Category::Security,
    Category::Driving,
];

/// Summary of one overview sync.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewReport {
    pub tree_root: ObjectId,
    pub relocated_from: Option<ObjectId>,
    pub links: LinkReport,
}

/// Desired overview links, resolved against the points that currently
/// exist under `instance_root`.
pub fn desired_overview(store: &dyn ObjectStore, instance_root: ObjectId) -> LinkSet {
    let mut desired = LinkSet::new();
    for category in OVERVIEW_CATEGORIES {
        desired.ensure_category(category.as_ref());
    }

    for entry in OVERVIEW {
        let target = entry.sources.iter().find_map(|source| {
            let identifier = match source {
                Source::Path(path) => make_identifier(path),
                Source::Action(action) => action.ident().to_owned(),
            };
            store.find_by_identifier(instance_root, &identifier)
        });
        let Some(target) = target else {
            continue;
        };
        let category = entry.category.as_ref();
        let key = format!("overview.{}.{}", category.to_ascii_lowercase(), entry.key);
        desired.insert(category, &key, target, entry.label);
    }
    desired
}

/// Place the overview tree under `parent` and converge its links.
pub fn sync_overview(
    reconciler: &Reconciler<'_>,
    parent: ObjectId,
    policy: CleanupPolicy,
) -> Result<OverviewReport, StoreError> {
    let placement = reconciler.place_link_tree(parent, OVERVIEW_NAME, policy)?;
    let desired = desired_overview(reconciler.store(), reconciler.root());
    let links = reconciler.reconcile_link_set(placement.tree_root, &desired, policy);
    debug!(
        ensured = links.ensured,
        deleted = links.deleted.len(),
        "Overview synchronized"
    );
    Ok(OverviewReport {
        tree_root: placement.tree_root,
        relocated_from: placement.relocated_from,
        links,
    })
}
