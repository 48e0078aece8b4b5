// ── Type & category resolution ──
//
// Pure mapping from (path, value) to storage type, optional display
// profile, and category. All decisions read the path with any origin
// prefix ("rest.", "telemetry.", "action.") stripped.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{Category, DataType, Origin, Profile, Scalar};

/// Resolution result for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolved {
    pub data_type: DataType,
    pub profile: Option<Profile>,
    pub category: Category,
}

static TIMESTAMP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(timestamp|time|_at)$").expect("static regex"));

// Numeric profile rules, first match wins.
static PROFILE_RULES: LazyLock<Vec<(Regex, Profile)>> = LazyLock::new(|| {
    [
        (r"soc|percent|battery_level|charge_limit", Profile::PERCENT),
        (r"odometer|range|distance", Profile::KILOMETER),
        (r"temp", Profile::CELSIUS),
        (r"pressure|tpms", Profile::BAR),
        (r"speed", Profile::SPEED),
        (r"power", Profile::KILOWATT),
    ]
    .into_iter()
    .map(|(pattern, profile)| (Regex::new(pattern).expect("static regex"), profile))
    .collect()
});

// Keyword routing, first match wins.
static CATEGORY_RULES: LazyLock<Vec<(Regex, Category)>> = LazyLock::new(|| {
    [
        (r"soc|charge|battery|energy|range|charger", Category::Charging),
        (r"temp|hvac|climate|defrost|seat|heater|wiper", Category::Climate),
        (r"speed|gps|heading|location|odometer|route|gear", Category::Driving),
        (SECURITY_KEYWORDS, Category::Security),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(pattern).expect("static regex"), category))
    .collect()
});

const SECURITY_KEYWORDS: &str = r"lock|sentry|valet|pin|door|trunk";

static SECURITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SECURITY_KEYWORDS).expect("static regex"));

/// Resolve storage type, profile, and category for a signal.
pub fn resolve(path: &str, value: &Scalar) -> Resolved {
    let (origin, key) = Origin::split(path);
    let lower = key.to_ascii_lowercase();

    let data_type = data_type_for(&lower, value);
    let profile = profile_for(&lower, data_type);
    let category = if origin == Some(Origin::Action) {
        Category::Actions
    } else {
        category_for(&lower)
    };

    Resolved {
        data_type,
        profile,
        category,
    }
}

fn data_type_for(lower: &str, value: &Scalar) -> DataType {
    match value {
        Scalar::Bool(_) => DataType::Boolean,
        _ if is_identifier_path(lower) => DataType::String,
        Scalar::Int(_) => DataType::Integer,
        Scalar::Float(_) => DataType::Float,
        Scalar::Str(s) if is_numeric(s) => {
            if TIMESTAMP_SUFFIX.is_match(lower) {
                DataType::Integer
            } else {
                DataType::Float
            }
        }
        Scalar::Str(_) => DataType::String,
    }
}

fn profile_for(lower: &str, data_type: DataType) -> Option<Profile> {
    match data_type {
        DataType::Boolean => Some(if lower.contains("locked") {
            Profile::LOCK
        } else {
            Profile::SWITCH
        }),
        DataType::Integer | DataType::Float => PROFILE_RULES
            .iter()
            .find(|(re, _)| re.is_match(lower))
            .map(|(_, profile)| *profile),
        DataType::String => None,
    }
}

fn category_for(lower: &str) -> Category {
    let root = lower.split('.').next().unwrap_or_default();
    match root {
        "charge_state" => Category::Charging,
        "climate_state" => Category::Climate,
        "drive_state" => Category::Driving,
        "vehicle_state" => {
            if SECURITY.is_match(lower) {
                Category::Security
            } else {
                Category::General
            }
        }
        "vehicle_config" | "gui_settings" => Category::General,
        _ => CATEGORY_RULES
            .iter()
            .find(|(re, _)| re.is_match(lower))
            .map_or(Category::General, |(_, category)| *category),
    }
}

/// Any segment naming an identifier: `id`, `id_s`, `vin`, `*_id`, `*_id_s`.
pub(crate) fn is_identifier_path(lower: &str) -> bool {
    lower.split('.').any(|segment| {
        matches!(segment, "id" | "id_s" | "vin")
            || segment.ends_with("_id")
            || segment.ends_with("_id_s")
            || segment.ends_with("vehicleid")
    })
}

fn is_numeric(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn battery_level_is_percent_integer() {
        let r = resolve("charge_state.battery_level", &Scalar::Int(80));
        assert_eq!(r.data_type, DataType::Integer);
        assert_eq!(r.profile, Some(Profile::PERCENT));
        assert_eq!(r.category, Category::Charging);
    }

    #[test]
    fn locked_is_security_boolean() {
        let r = resolve("vehicle_state.locked", &Scalar::Bool(true));
        assert_eq!(r.data_type, DataType::Boolean);
        assert_eq!(r.profile, Some(Profile::LOCK));
        assert_eq!(r.category, Category::Security);
    }

    #[test]
    fn identifiers_are_strings_even_when_numeric() {
        let r = resolve("vin", &Scalar::Int(12_345));
        assert_eq!(r.data_type, DataType::String);
        assert_eq!(r.profile, None);
        assert_eq!(r.category, Category::General);

        for path in ["rest.id", "rest.id_s", "rest.vehicle_id", "rest.user_id", "telemetry.VehicleId"] {
            assert_eq!(resolve(path, &Scalar::Int(1)).data_type, DataType::String, "{path}");
        }
    }

    #[test]
    fn numeric_timestamp_strings_are_integers() {
        let r = resolve("drive_state.gps_as_of_timestamp", &Scalar::Str("1700000000".into()));
        assert_eq!(r.data_type, DataType::Integer);
        let r = resolve("charge_state.updated_at", &Scalar::Str("1700000000".into()));
        assert_eq!(r.data_type, DataType::Integer);
        let r = resolve("charge_state.updated_at", &Scalar::Str("yesterday".into()));
        assert_eq!(r.data_type, DataType::String);
        let r = resolve(
            "rest.drive_state.gps_as_of_timestamp",
            &Scalar::Str("1700000000.5".into()),
        );
        assert_eq!(r.data_type, DataType::Integer);
    }

    #[test]
    fn numeric_strings_are_floats() {
        let r = resolve("rest.charge_state.est_battery_range", &Scalar::Str("312.4".into()));
        assert_eq!(r.data_type, DataType::Float);
        assert_eq!(r.profile, Some(Profile::KILOMETER));

        let r = resolve("rest.charge_state.charger_power", &Scalar::Str("7".into()));
        assert_eq!(r.data_type, DataType::Float);
        assert_eq!(r.profile, Some(Profile::KILOWATT));

        for text in ["NaN", "inf", "2024.44.6", ""] {
            let r = resolve("rest.vehicle_state.car_version", &Scalar::Str(text.into()));
            assert_eq!(r.data_type, DataType::String, "{text:?}");
        }
    }

    #[test]
    fn booleans_win_over_identifier_paths() {
        let r = resolve("rest.vehicle_state.id", &Scalar::Bool(true));
        assert_eq!(r.data_type, DataType::Boolean);
        assert_eq!(r.profile, Some(Profile::SWITCH));
        assert_eq!(
            resolve("rest.vehicle_id", &Scalar::Str("0012345".into())).data_type,
            DataType::String
        );
    }

    #[test]
    fn charge_limit_is_percent() {
        let r = resolve("charge_state.charge_limit_soc", &Scalar::Int(90));
        assert_eq!(r.data_type, DataType::Integer);
        assert_eq!(r.profile, Some(Profile::PERCENT));
        assert_eq!(r.category, Category::Charging);
    }

    #[test]
    fn origin_prefix_is_ignored() {
        assert_eq!(
            resolve("rest.charge_state.battery_level", &Scalar::Int(80)),
            resolve("charge_state.battery_level", &Scalar::Int(80))
        );
    }

    #[test]
    fn numeric_profiles() {
        let cases = [
            ("vehicle_state.odometer", Scalar::Float(12_345.6), Some(Profile::KILOMETER)),
            ("climate_state.inside_temp", Scalar::Float(21.5), Some(Profile::CELSIUS)),
            ("vehicle_state.tpms_pressure_fl", Scalar::Float(2.9), Some(Profile::BAR)),
            ("drive_state.speed", Scalar::Int(88), Some(Profile::SPEED)),
            ("drive_state.power", Scalar::Int(-3), Some(Profile::KILOWATT)),
            ("charge_state.charge_rate", Scalar::Float(0.0), None),
        ];
        for (path, value, expected) in cases {
            assert_eq!(resolve(path, &value).profile, expected, "{path}");
        }
    }

    #[test]
    fn switch_profile_for_other_booleans() {
        let r = resolve("climate_state.is_climate_on", &Scalar::Bool(false));
        assert_eq!(r.profile, Some(Profile::SWITCH));
        assert_eq!(r.category, Category::Climate);
    }

    #[test]
    fn strings_have_no_profile() {
        let r = resolve("charge_state.charging_state", &Scalar::Str("Charging".into()));
        assert_eq!(r.data_type, DataType::String);
        assert_eq!(r.profile, None);
    }

    fn category_of(path: &str) -> Category {
        resolve(path, &Scalar::Str(String::new())).category
    }

    #[test]
    fn state_roots_route_categories() {
        assert_eq!(category_of("rest.drive_state.shift_state"), Category::Driving);
        assert_eq!(category_of("rest.vehicle_state.sentry_mode"), Category::Security);
        assert_eq!(category_of("rest.vehicle_state.car_version"), Category::General);
        assert_eq!(category_of("rest.gui_settings.gui_range_display"), Category::General);
        assert_eq!(category_of("rest.vehicle_config.car_type"), Category::General);
    }

    #[test]
    fn telemetry_keywords_route_categories() {
        assert_eq!(category_of("telemetry.Soc"), Category::Charging);
        assert_eq!(category_of("telemetry.HvacPower"), Category::Climate);
        assert_eq!(category_of("telemetry.VehicleSpeed"), Category::Driving);
        assert_eq!(category_of("telemetry.SentryMode"), Category::Security);
        assert_eq!(category_of("telemetry.Version"), Category::General);
    }

    #[test]
    fn unlisted_keywords_fall_through_to_general() {
        assert_eq!(category_of("telemetry.ShiftState"), Category::General);
        assert_eq!(category_of("telemetry.FdWindow"), Category::General);
        assert_eq!(category_of("telemetry.RdWindow"), Category::General);
    }

    #[test]
    fn action_paths_are_actions() {
        assert_eq!(category_of("action.locked"), Category::Actions);
        assert_eq!(resolve("action.charge_limit", &Scalar::Int(80)).category, Category::Actions);
    }
}
