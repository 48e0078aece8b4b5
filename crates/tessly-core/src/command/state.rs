// ── Action state sync ──
//
// Mirrors observed vehicle state into the action points so a switch shows
// what the car reports, not just what was last requested.

use serde_json::Value;

use super::Action;
use crate::model::Scalar;

/// Action values found in a REST snapshot (already unwrapped from
/// `response`).
pub fn action_state_from_rest(payload: &Value) -> Vec<(Action, Scalar)> {
    let mut out = Vec::new();

    if let Some(locked) = payload.pointer("/vehicle_state/locked").and_then(Value::as_bool) {
        out.push((Action::Locked, Scalar::Bool(locked)));
    }
    if let Some(on) = payload
        .pointer("/climate_state/is_climate_on")
        .and_then(Value::as_bool)
    {
        out.push((Action::Climate, Scalar::Bool(on)));
    }
    if let Some(state) = payload
        .pointer("/charge_state/charging_state")
        .and_then(Value::as_str)
    {
        out.push((Action::Charging, Scalar::Bool(state.eq_ignore_ascii_case("charging"))));
    }
    if let Some(limit) = payload.pointer("/charge_state/charge_limit_soc").and_then(integer) {
        out.push((Action::ChargeLimit, Scalar::Int(limit)));
    }
    if let Some(amps) = payload
        .pointer("/charge_state/charge_current_request")
        .and_then(integer)
    {
        out.push((Action::ChargingAmps, Scalar::Int(amps)));
    }

    out
}

/// Action values found in decoded telemetry signals (keys without the
/// `telemetry.` prefix).
pub fn action_state_from_telemetry(signals: &[(String, Scalar)]) -> Vec<(Action, Scalar)> {
    signals
        .iter()
        .filter_map(|(key, value)| match (key.as_str(), value) {
            ("Locked", Scalar::Bool(locked)) => Some((Action::Locked, Scalar::Bool(*locked))),
            ("HvacPower", Scalar::Str(state)) => {
                let lower = state.to_ascii_lowercase();
                let on = lower.contains("on") && !lower.ends_with("off");
                Some((Action::Climate, Scalar::Bool(on)))
            }
            ("DetailedChargeState", Scalar::Str(state)) => Some((
                Action::Charging,
                Scalar::Bool(state.to_ascii_lowercase().ends_with("charging")),
            )),
            ("ChargeLimitSoc", v) => numeric(v).map(|n| (Action::ChargeLimit, Scalar::Int(n))),
            ("ChargeCurrentRequest", v) => {
                numeric(v).map(|n| (Action::ChargingAmps, Scalar::Int(n)))
            }
            _ => None,
        })
        .collect()
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => Some(Scalar::from_number(n).as_i64()),
        Value::String(s) => numeric(&Scalar::Str(s.clone())),
        _ => None,
    }
}

fn numeric(value: &Scalar) -> Option<i64> {
    match value {
        Scalar::Int(_) | Scalar::Float(_) => Some(value.as_i64()),
        Scalar::Str(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
            Some(value.as_i64())
        }
        _ => None,
    }
}
