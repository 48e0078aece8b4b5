// ── Vehicle actions ──
//
// The closed set of user-triggerable actions, each backed by a writable
// point. `plan()` turns a requested value into the Tessie command to
// send plus the values to write back; it performs no I/O, which keeps
// clamping and momentary semantics testable on their own.

mod dispatch;
mod state;

use serde::Serialize;
use serde_json::{Value, json};

pub use dispatch::{CommandOutcome, command_succeeded};
pub(crate) use dispatch::send_command;
pub use state::{action_state_from_rest, action_state_from_telemetry};

use crate::model::{DataType, Profile, Scalar};

/// Charge limit bounds, percent.
pub const CHARGE_LIMIT_RANGE: (i64, i64) = (0, 100);
/// Charging current bounds, amps.
pub const CHARGING_AMPS_RANGE: (i64, i64) = (1, 48);

/// A writable vehicle action.
///
/// Parses from the point identifier (`act_locked`) or from the command
/// vocabulary (`lock`, `set_charge_limit`, `flash`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(into = "String")]
pub enum Action {
    #[strum(to_string = "act_locked", serialize = "lock", serialize = "locked")]
    Locked,
    #[strum(to_string = "act_climate", serialize = "climate")]
    Climate,
    #[strum(to_string = "act_charging", serialize = "charging")]
    Charging,
    #[strum(
        to_string = "act_charge_limit",
        serialize = "set_charge_limit",
        serialize = "charge_limit"
    )]
    ChargeLimit,
    #[strum(
        to_string = "act_charging_amps",
        serialize = "set_charging_amps",
        serialize = "charging_amps"
    )]
    ChargingAmps,
    #[strum(to_string = "act_flash", serialize = "flash", serialize = "flash_lights")]
    Flash,
    #[strum(to_string = "act_honk", serialize = "honk")]
    Honk,
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

impl Action {
    /// Identifier of the backing point.
    pub fn ident(self) -> &'static str {
        match self {
            Self::Locked => "act_locked",
            Self::Climate => "act_climate",
            Self::Charging => "act_charging",
            Self::ChargeLimit => "act_charge_limit",
            Self::ChargingAmps => "act_charging_amps",
            Self::Flash => "act_flash",
            Self::Honk => "act_honk",
        }
    }

    /// Signal path used for link keys (`action.<name>`).
    pub fn path(self) -> String {
        format!("action.{}", self.ident().trim_start_matches("act_"))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Locked => "Locked",
            Self::Climate => "Climate",
            Self::Charging => "Charging",
            Self::ChargeLimit => "Charge limit (%)",
            Self::ChargingAmps => "Charging current (A)",
            Self::Flash => "Flash lights",
            Self::Honk => "Honk",
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            Self::ChargeLimit | Self::ChargingAmps => DataType::Integer,
            _ => DataType::Boolean,
        }
    }

    pub fn profile(self) -> Profile {
        match self {
            Self::Locked => Profile::LOCK,
            Self::ChargeLimit => Profile::PERCENT_SETPOINT,
            Self::ChargingAmps => Profile::AMPS,
            Self::Climate | Self::Charging | Self::Flash | Self::Honk => Profile::SWITCH,
        }
    }

    /// Momentary actions snap back to `false` after dispatch.
    pub fn is_momentary(self) -> bool {
        matches!(self, Self::Flash | Self::Honk)
    }
}

// ── Planning ─────────────────────────────────────────────────────────

/// One remote command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandCall {
    pub name: &'static str,
    pub params: Option<Value>,
}

/// What a request turns into: the command (if any), the value written to
/// the action point before dispatch, and the value written afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPlan {
    pub action: Action,
    pub command: Option<CommandCall>,
    pub optimistic: Scalar,
    pub reset: Option<Scalar>,
}

/// Plan the command for `action` with the requested value.
pub fn plan(action: Action, requested: &Scalar) -> CommandPlan {
    let toggle = |on: &'static str, off: &'static str| {
        let value = requested.as_bool();
        (
            Some(CommandCall {
                name: if value { on } else { off },
                params: None,
            }),
            Scalar::Bool(value),
        )
    };

    let (command, optimistic) = match action {
        Action::Locked => toggle("lock", "unlock"),
        Action::Climate => toggle("start_climate", "stop_climate"),
        Action::Charging => toggle("start_charging", "stop_charging"),
        Action::ChargeLimit => {
            let percent = requested
                .as_i64()
                .clamp(CHARGE_LIMIT_RANGE.0, CHARGE_LIMIT_RANGE.1);
            (
                Some(CommandCall {
                    name: "set_charge_limit",
                    params: Some(json!({ "percent": percent })),
                }),
                Scalar::Int(percent),
            )
        }
        Action::ChargingAmps => {
            let amps = requested
                .as_i64()
                .clamp(CHARGING_AMPS_RANGE.0, CHARGING_AMPS_RANGE.1);
            (
                Some(CommandCall {
                    name: "set_charging_amps",
                    params: Some(json!({ "amps": amps })),
                }),
                Scalar::Int(amps),
            )
        }
        Action::Flash | Action::Honk => {
            let pressed = requested.as_bool();
            let name = if action == Action::Flash {
                "flash_lights"
            } else {
                "honk"
            };
            (
                pressed.then_some(CommandCall { name, params: None }),
                Scalar::Bool(pressed),
            )
        }
    };

    CommandPlan {
        action,
        command,
        optimistic,
        reset: action.is_momentary().then_some(Scalar::Bool(false)),
    }
}
