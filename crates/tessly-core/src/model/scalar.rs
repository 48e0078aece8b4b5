// ── Scalar values and signals ──

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::point::DataType;

/// A leaf value carried by a signal or stored in a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Integers that fit in `i64` stay integral; everything else is float.
    pub fn from_number(n: &serde_json::Number) -> Self {
        match n.as_i64() {
            Some(i) => Self::Int(i),
            None => Self::Float(n.as_f64().unwrap_or_default()),
        }
    }

    /// The type this value would get with no other context.
    pub fn natural_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Boolean,
            Self::Int(_) => DataType::Integer,
            Self::Float(_) => DataType::Float,
            Self::Str(_) => DataType::String,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Bool(b) => i64::from(*b),
            Self::Int(i) => *i,
            // `as` saturates and maps NaN to 0
            Self::Float(f) => f.trunc() as i64,
            Self::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                    .unwrap_or_default()
            }
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Str(s) => s.trim().parse::<f64>().unwrap_or_default(),
        }
    }

    /// Convert to the stored type of a point.
    pub fn coerce(&self, data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Self::Bool(self.as_bool()),
            DataType::Integer => Self::Int(self.as_i64()),
            DataType::Float => Self::Float(self.as_f64()),
            DataType::String => match self {
                Self::Str(s) => Self::Str(s.clone()),
                other => Self::Str(other.to_string()),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Loose parse used for command-line input: booleans, then integers,
/// then finite floats, else the raw string.
impl FromStr for Scalar {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" => Self::Bool(true),
            "false" | "off" | "no" => Self::Bool(false),
            _ => {
                if let Ok(i) = trimmed.parse::<i64>() {
                    Self::Int(i)
                } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
                    Self::Float(f)
                } else {
                    Self::Str(s.to_owned())
                }
            }
        })
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

// ── Origin ───────────────────────────────────────────────────────────

/// Which source produced a signal. Used as the leading path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Origin {
    Rest,
    Telemetry,
    Action,
}

impl Origin {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Telemetry => "telemetry",
            Self::Action => "action",
        }
    }

    /// Split a known origin prefix off a path.
    pub fn split(path: &str) -> (Option<Self>, &str) {
        for origin in [Self::Rest, Self::Telemetry, Self::Action] {
            if let Some(rest) = path
                .strip_prefix(origin.prefix())
                .and_then(|r| r.strip_prefix('.'))
            {
                return (Some(origin), rest);
            }
        }
        (None, path)
    }
}

// ── Signal ───────────────────────────────────────────────────────────

/// One (path, value) observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub origin: Origin,
    pub key: String,
    pub value: Scalar,
}

impl Signal {
    pub fn new(origin: Origin, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            origin,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Full dotted path including the origin prefix.
    pub fn path(&self) -> String {
        format!("{}.{}", self.origin.prefix(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn coerce_between_types() {
        assert_eq!(Scalar::Str("1".into()).coerce(DataType::Boolean), Scalar::Bool(true));
        assert_eq!(Scalar::Str("0".into()).coerce(DataType::Boolean), Scalar::Bool(false));
        assert_eq!(Scalar::Float(79.9).coerce(DataType::Integer), Scalar::Int(79));
        assert_eq!(Scalar::Bool(true).coerce(DataType::Float), Scalar::Float(1.0));
        assert_eq!(Scalar::Int(7).coerce(DataType::String), Scalar::Str("7".into()));
        assert_eq!(Scalar::Str("abc".into()).coerce(DataType::Integer), Scalar::Int(0));
    }

    #[test]
    fn float_to_int_saturates() {
        assert_eq!(Scalar::Float(f64::NAN).as_i64(), 0);
        assert_eq!(Scalar::Float(1e30).as_i64(), i64::MAX);
    }

    #[test]
    fn loose_parse() {
        assert_eq!("true".parse::<Scalar>(), Ok(Scalar::Bool(true)));
        assert_eq!("off".parse::<Scalar>(), Ok(Scalar::Bool(false)));
        assert_eq!("80".parse::<Scalar>(), Ok(Scalar::Int(80)));
        assert_eq!("12.5".parse::<Scalar>(), Ok(Scalar::Float(12.5)));
        assert_eq!("inf".parse::<Scalar>(), Ok(Scalar::Str("inf".into())));
        assert_eq!("Roadrunner".parse::<Scalar>(), Ok(Scalar::Str("Roadrunner".into())));
    }

    #[test]
    fn number_conversion() {
        let n = serde_json::Number::from(u64::MAX);
        assert_eq!(Scalar::from_number(&n), Scalar::Float(1.844_674_407_370_955_2e19));
        let n = serde_json::Number::from(-3);
        assert_eq!(Scalar::from_number(&n), Scalar::Int(-3));
    }

    #[test]
    fn origin_split() {
        assert_eq!(Origin::split("rest.charge_state.soc"), (Some(Origin::Rest), "charge_state.soc"));
        assert_eq!(Origin::split("telemetry.Soc"), (Some(Origin::Telemetry), "Soc"));
        assert_eq!(Origin::split("restless.key"), (None, "restless.key"));
        assert_eq!(Origin::split("vin"), (None, "vin"));
    }

    #[test]
    fn signal_path() {
        let signal = Signal::new(Origin::Telemetry, "VehicleSpeed", 42_i64);
        assert_eq!(signal.path(), "telemetry.VehicleSpeed");
    }
}
