// ── Fleet discovery ──
//
// Lists the vehicles on an account so a profile can be created per car.

use serde::Serialize;
use serde_json::Value;
use tessly_api::TessieClient;
use tracing::debug;
use url::Url;

use crate::error::CoreError;

/// Default streaming endpoint.
pub const DEFAULT_STREAMING_BASE: &str = "wss://streaming.tessie.com";

/// One vehicle on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleSummary {
    pub vin: String,
    pub display_name: String,
}

/// Extract vehicles from a list payload. Accepts a bare list, or a list
/// under `vehicles` / `results`, optionally wrapped in `response`.
/// Entries without a VIN are skipped.
pub fn parse_vehicle_list(payload: &Value) -> Vec<VehicleSummary> {
    let payload = payload.get("response").unwrap_or(payload);
    let list = payload
        .as_array()
        .or_else(|| payload.get("vehicles").and_then(Value::as_array))
        .or_else(|| payload.get("results").and_then(Value::as_array));
    let Some(list) = list else {
        debug!("Vehicle list payload has no recognizable list");
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            let vin = non_empty(entry.get("vin"))?;
            let display_name = non_empty(entry.get("display_name"))
                .or_else(|| non_empty(entry.get("name")))
                .or_else(|| non_empty(entry.pointer("/last_state/display_name")))
                .unwrap_or_else(|| vin.clone());
            Some(VehicleSummary { vin, display_name })
        })
        .collect()
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Streaming URL for one vehicle: `{base}/{vin}?access_token={token}`.
pub fn streaming_url(base: &str, vin: &str, token: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(base).map_err(|e| CoreError::Config {
        message: format!("invalid streaming base {base:?}: {e}"),
    })?;
    url.path_segments_mut()
        .map_err(|()| CoreError::Config {
            message: format!("streaming base {base:?} cannot carry a path"),
        })?
        .pop_if_empty()
        .push(vin);
    url.query_pairs_mut().append_pair("access_token", token);
    Ok(url)
}

/// Fetch and parse the account's vehicles.
pub async fn discover(client: &TessieClient) -> Result<Vec<VehicleSummary>, CoreError> {
    let payload = client.list_vehicles().await?;
    let vehicles = parse_vehicle_list(&payload);
    debug!(count = vehicles.len(), "Discovered vehicles");
    Ok(vehicles)
}
