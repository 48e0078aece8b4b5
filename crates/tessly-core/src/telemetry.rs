// ── Streaming frame decoding ──
//
// Turns one raw streaming frame into a list of signals. Three envelope
// shapes are accepted:
//
//   {"DataID": "...", "Buffer": "<base64 JSON>"}   (host relay envelope)
//   {"data": [...], "vin": ..., "createdAt": ...}   (bare telemetry object)
//   {"Payload": {...} | "<JSON>"} / {"Data": ...}   (wrapped payload)
//
// Anything else, and every out-of-band message (errors, connectivity
// status, alerts), yields no signals.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::flatten::flatten;
use crate::model::Scalar;
use crate::resolve::is_identifier_path;

/// Metadata key for the frame's creation time.
pub const CREATED_AT_KEY: &str = "_createdAt";
/// Metadata key for the frame's resend flag.
pub const IS_RESEND_KEY: &str = "_isResend";

static INTEGRAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:timestamp|time|_at)$|[a-z]At$").expect("static regex"));

/// A decoded telemetry frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub vin: Option<String>,
    pub created_at: Option<String>,
    pub is_resend: Option<bool>,
    /// Signal keys without the `telemetry.` origin prefix, in frame order.
    pub signals: Vec<(String, Scalar)>,
}

impl TelemetryFrame {
    /// `true` if the frame names a different vehicle than `vin`.
    /// Frames without a VIN are accepted.
    pub fn is_for_other_vehicle(&self, vin: &str) -> bool {
        self.vin
            .as_deref()
            .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case(vin))
    }

    /// Signals plus the `_createdAt` / `_isResend` metadata entries.
    pub fn into_signals_with_metadata(self) -> Vec<(String, Scalar)> {
        let mut out = self.signals;
        if let Some(created_at) = self.created_at {
            out.push((CREATED_AT_KEY.to_owned(), Scalar::Str(created_at)));
        }
        if let Some(is_resend) = self.is_resend {
            out.push((IS_RESEND_KEY.to_owned(), Scalar::Bool(is_resend)));
        }
        out
    }
}

/// Decode one raw frame. Returns `None` when the frame carries nothing
/// to apply.
pub fn decode_frame(raw: &[u8]) -> Option<TelemetryFrame> {
    let envelope: Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Discarding non-JSON frame");
            return None;
        }
    };

    let payload = unwrap_envelope(envelope)?;

    if is_out_of_band(&payload) {
        return None;
    }

    let Some(entries) = payload.get("data").and_then(Value::as_array) else {
        tracing::trace!("Frame has no data list");
        return None;
    };

    let mut signals = Vec::with_capacity(entries.len());
    for entry in entries {
        decode_entry(entry, &mut signals);
    }

    Some(TelemetryFrame {
        vin: payload.get("vin").and_then(Value::as_str).map(str::to_owned),
        created_at: payload
            .get("createdAt")
            .and_then(Value::as_str)
            .map(str::to_owned),
        is_resend: payload.get("isResend").and_then(Value::as_bool),
        signals,
    })
}

// ── Envelope shapes ──────────────────────────────────────────────────

fn unwrap_envelope(envelope: Value) -> Option<Map<String, Value>> {
    let Value::Object(mut outer) = envelope else {
        tracing::trace!("Discarding non-object frame");
        return None;
    };

    if outer.contains_key("DataID") {
        let buffer = outer.get("Buffer").and_then(Value::as_str)?;
        let decoded = match general_purpose::STANDARD.decode(buffer.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding frame with invalid base64 buffer");
                return None;
            }
        };
        return match serde_json::from_slice(&decoded) {
            Ok(Value::Object(inner)) => Some(inner),
            // Keep-alives and non-JSON buffers
            _ => None,
        };
    }

    if ["data", "errors", "alerts", "connectionId"]
        .iter()
        .any(|key| outer.contains_key(*key))
    {
        return Some(outer);
    }

    for wrapper in ["Payload", "Data"] {
        match outer.remove(wrapper) {
            Some(Value::Object(inner)) => return Some(inner),
            Some(Value::String(text)) => {
                return match serde_json::from_str(&text) {
                    Ok(Value::Object(inner)) => Some(inner),
                    _ => None,
                };
            }
            _ => {}
        }
    }

    None
}

fn is_out_of_band(payload: &Map<String, Value>) -> bool {
    if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            tracing::warn!(errors = %serde_json::Value::Array(errors.clone()), "Telemetry stream reported errors");
            return true;
        }
    }

    if payload.contains_key("connectionId") && payload.contains_key("status") {
        tracing::info!(
            status = %payload.get("status").unwrap_or(&serde_json::Value::Null),
            "Vehicle connectivity changed"
        );
        return true;
    }

    if payload.contains_key("alerts") && !payload.contains_key("data") {
        tracing::debug!("Ignoring alerts frame");
        return true;
    }

    false
}

// ── Entries ──────────────────────────────────────────────────────────

/// Decode a single `{key, value: {<kind>Value: ..}}` entry. Malformed
/// entries are skipped on their own; the rest of the frame still applies.
fn decode_entry(entry: &Value, out: &mut Vec<(String, Scalar)>) {
    let Some(key) = entry.get("key").and_then(Value::as_str).filter(|k| !k.is_empty()) else {
        tracing::trace!("Skipping entry without key");
        return;
    };
    let Some(wrapper) = entry.get("value").and_then(Value::as_object) else {
        tracing::trace!(key, "Skipping entry without value object");
        return;
    };
    if wrapper.get("invalid").and_then(Value::as_bool) == Some(true) {
        return;
    }
    let Some(value) = wrapper
        .iter()
        .find(|(field, _)| field.as_str() != "invalid")
        .map(|(_, v)| v)
    else {
        return;
    };

    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((key.to_owned(), Scalar::Bool(*b))),
        Value::Number(n) => out.push((key.to_owned(), Scalar::from_number(n))),
        Value::String(s) => out.push((key.to_owned(), coerce_string(key, s))),
        // locationValue and friends: one signal per leaf
        Value::Object(_) | Value::Array(_) => out.extend(flatten(value, key)),
    }
}

/// Numeric-looking strings become numbers: integers under time keys,
/// floats elsewhere. Identifier keys keep their exact text.
fn coerce_string(key: &str, raw: &str) -> Scalar {
    let s = raw.trim();
    if !looks_numeric(s) || is_identifier_key(key) {
        return Scalar::Str(raw.to_owned());
    }

    if INTEGRAL_SUFFIX.is_match(key) {
        let as_int = s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| Scalar::Float(f).as_i64()));
        if let Some(i) = as_int {
            return Scalar::Int(i);
        }
    }

    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map_or_else(|| Scalar::Str(raw.to_owned()), Scalar::Float)
}

fn is_identifier_key(key: &str) -> bool {
    key.ends_with("Id") || is_identifier_path(&key.to_ascii_lowercase())
}

fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    body.bytes().any(|b| b.is_ascii_digit())
        && body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'-' | b'+'))
}
