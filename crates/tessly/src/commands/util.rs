//! Shared helpers for command handlers.

use std::sync::Arc;

use tabled::Tabled;

use tessly_core::{
    CoreError, MemoryStore, ObjectId, ObjectInfo, ObjectKind, ObjectStore, Profile, ProfileKind,
    Scalar, SharedConfig, Vehicle, VehicleConfig,
};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

// ── Vehicle construction ────────────────────────────────────────────

/// Fail with a usage error unless a token and a VIN are configured.
pub fn require_credentials(config: &VehicleConfig, profile: &str) -> Result<String, CliError> {
    if config.token().is_none() {
        return Err(CliError::NoCredentials {
            profile: profile.into(),
        });
    }
    config
        .vin()
        .map(str::to_owned)
        .ok_or_else(|| CliError::NoVin {
            profile: profile.into(),
        })
}

/// Instance category identifier for a VIN: `TESSIE_` plus its
/// alphanumeric characters, uppercased.
pub fn instance_identifier(vin: &str) -> String {
    let clean: String = vin
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("TESSIE_{clean}")
}

/// Bind a vehicle to a fresh in-memory tree.
pub fn build_vehicle(config: VehicleConfig, profile: &str) -> Result<Vehicle, CliError> {
    let vin = require_credentials(&config, profile)?;

    let store = Arc::new(MemoryStore::new());
    let root = store
        .create_category(ObjectId::ROOT, &instance_identifier(&vin))
        .map_err(CoreError::from)?;
    store.set_name(root, &vin).map_err(CoreError::from)?;

    Ok(Vehicle::new(
        Arc::new(SharedConfig::new(config)),
        store,
        root,
    ))
}

// ── Point rendering ─────────────────────────────────────────────────

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    data_type: String,
    #[tabled(rename = "RW")]
    writable: &'static str,
    #[tabled(rename = "Identifier")]
    identifier: String,
}

fn point_row(info: &ObjectInfo) -> PointRow {
    let (data_type, writable) = match &info.kind {
        ObjectKind::Point {
            data_type,
            writable,
            ..
        } => (data_type.to_string(), *writable),
        other => (other.label().to_owned(), false),
    };
    PointRow {
        name: info.name.clone(),
        value: display_value(&info.kind),
        data_type,
        writable: if writable { "yes" } else { "" },
        identifier: info.identifier.clone(),
    }
}

/// Render a point value through its display profile.
pub fn display_value(kind: &ObjectKind) -> String {
    let ObjectKind::Point {
        value: Some(value),
        profile,
        ..
    } = kind
    else {
        return "-".into();
    };

    match profile.as_deref().and_then(Profile::by_name) {
        Some(p) if p.kind == ProfileKind::Lock => {
            String::from(if value.as_bool() { "locked" } else { "unlocked" })
        }
        Some(p) if p.kind == ProfileKind::Switch => {
            String::from(if value.as_bool() { "on" } else { "off" })
        }
        Some(p) if p.integral => format!("{}{}", value.as_i64(), p.suffix),
        Some(p) => match value {
            Scalar::Str(_) => value.to_string(),
            _ => format!("{}{}", value.as_f64(), p.suffix),
        },
        None => value.to_string(),
    }
}

/// Keep points whose name or identifier contains `filter`, case-insensitively.
pub fn filter_points(points: Vec<ObjectInfo>, filter: Option<&str>) -> Vec<ObjectInfo> {
    let Some(filter) = filter.map(str::to_lowercase) else {
        return points;
    };
    points
        .into_iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&filter)
                || p.identifier.to_lowercase().contains(&filter)
        })
        .collect()
}

pub fn render_points(points: &[ObjectInfo], format: &OutputFormat) -> String {
    output::render_list(format, points, point_row, |p| {
        format!("{}={}", p.name, display_value(&p.kind))
    })
}
