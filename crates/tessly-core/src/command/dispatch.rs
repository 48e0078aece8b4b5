// ── Command dispatch ──
//
// Sends one planned command to Tessie and judges the response. Failures
// are logged and reported in the outcome, never raised: the caller still
// has to write momentary resets.

use serde::Serialize;
use serde_json::Value;
use tessly_api::TessieClient;
use tracing::{debug, info, warn};

use super::CommandCall;

/// Result of one remote command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub command: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A command succeeded iff `result` (top level, or under `response`) is
/// `true`. Anything else, including an empty body, is failure.
pub fn command_succeeded(response: &Value) -> bool {
    response
        .get("result")
        .and_then(Value::as_bool)
        .or_else(|| response.pointer("/response/result").and_then(Value::as_bool))
        .unwrap_or(false)
}

pub(crate) async fn send_command(
    client: &TessieClient,
    vin: &str,
    call: &CommandCall,
    wait_for_completion: bool,
    wake_first: bool,
) -> CommandOutcome {
    if wake_first {
        ensure_awake(client, vin).await;
    }

    match client
        .command(vin, call.name, call.params.as_ref(), wait_for_completion)
        .await
    {
        Ok(response) => {
            let success = command_succeeded(&response);
            if success {
                info!(command = call.name, "Command accepted");
            } else {
                warn!(command = call.name, response = %response, "Command failed");
            }
            CommandOutcome {
                command: call.name,
                success,
                response: Some(response),
                error: None,
            }
        }
        Err(e) => {
            warn!(command = call.name, error = %e, "Command request failed");
            CommandOutcome {
                command: call.name,
                success: false,
                response: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Wake the vehicle unless it already reports `awake`.
async fn ensure_awake(client: &TessieClient, vin: &str) {
    match client.vehicle_status(vin).await {
        Ok(status) if status.get("status").and_then(Value::as_str) == Some("awake") => return,
        Ok(status) => debug!(status = %status, "Vehicle not awake, waking"),
        Err(e) => debug!(error = %e, "Status check failed, waking anyway"),
    }

    if let Err(e) = client.wake(vin).await {
        warn!(error = %e, "Wake request failed");
    }
}
