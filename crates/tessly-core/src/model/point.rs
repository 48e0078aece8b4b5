// ── Point types, display profiles, categories ──

use serde::{Deserialize, Serialize};

/// Stored type of a point. Fixed at creation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
}

/// Top-level grouping a point is linked under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Category {
    Charging,
    Climate,
    Driving,
    Security,
    General,
    Actions,
    Status,
}

// ── Profiles ─────────────────────────────────────────────────────────

/// How a profile renders its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Numeric with unit suffix and range.
    Numeric,
    /// Boolean rendered as locked / unlocked.
    Lock,
    /// Boolean rendered as on / off.
    Switch,
}

/// Named display hint: unit, range, step. Never affects storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Profile {
    pub name: &'static str,
    pub kind: ProfileKind,
    pub suffix: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Integer profiles render without decimals.
    pub integral: bool,
}

impl Profile {
    pub const PERCENT: Self = Self::numeric("Tessly.Percent", "%", 0.0, 100.0, 1.0, true);
    pub const KILOMETER: Self = Self::numeric("Tessly.Kilometer", " km", 0.0, 1_000_000.0, 0.1, false);
    pub const CELSIUS: Self = Self::numeric("Tessly.Celsius", " °C", -50.0, 100.0, 0.1, false);
    pub const BAR: Self = Self::numeric("Tessly.Bar", " bar", 0.0, 6.0, 0.01, false);
    pub const SPEED: Self = Self::numeric("Tessly.Kmh", " km/h", 0.0, 300.0, 0.1, false);
    pub const KILOWATT: Self = Self::numeric("Tessly.kW", " kW", -500.0, 500.0, 0.1, false);
    pub const PERCENT_SETPOINT: Self =
        Self::numeric("Tessly.PercentInt", " %", 0.0, 100.0, 1.0, true);
    pub const AMPS: Self = Self::numeric("Tessly.Amps", " A", 0.0, 48.0, 1.0, true);
    pub const LOCK: Self = Self::boolean("Tessly.Lock", ProfileKind::Lock);
    pub const SWITCH: Self = Self::boolean("Tessly.Switch", ProfileKind::Switch);

    /// Every profile the engine can assign, in registration order.
    pub const ALL: [Self; 10] = [
        Self::PERCENT,
        Self::KILOMETER,
        Self::CELSIUS,
        Self::BAR,
        Self::SPEED,
        Self::KILOWATT,
        Self::PERCENT_SETPOINT,
        Self::AMPS,
        Self::LOCK,
        Self::SWITCH,
    ];

    const fn numeric(
        name: &'static str,
        suffix: &'static str,
        min: f64,
        max: f64,
        step: f64,
        integral: bool,
    ) -> Self {
        Self {
            name,
            kind: ProfileKind::Numeric,
            suffix,
            min,
            max,
            step,
            integral,
        }
    }

    const fn boolean(name: &'static str, kind: ProfileKind) -> Self {
        Self {
            name,
            kind,
            suffix: "",
            min: 0.0,
            max: 1.0,
            step: 1.0,
            integral: true,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name == name)
    }
}
