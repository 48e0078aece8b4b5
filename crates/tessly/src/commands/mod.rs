//! Command dispatch: bridges CLI args -> core Vehicle -> output formatting.

pub mod action;
pub mod config_cmd;
pub mod poll;
pub mod profiles;
pub mod util;
pub mod vehicles;
pub mod watch;

use tessly_core::VehicleConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a vehicle-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: VehicleConfig,
    profile: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Poll(args) => {
            let vehicle = util::build_vehicle(config, profile)?;
            poll::handle(&vehicle, &args, global).await
        }
        Command::Watch(args) => watch::handle(config, &args, profile, global).await,
        Command::Action(args) => {
            let vehicle = util::build_vehicle(config, profile)?;
            action::handle(&vehicle, &args, global).await
        }
        Command::Vehicles => vehicles::handle(&config, profile, global).await,
        // Profiles, Config and Completions are handled before dispatch
        Command::Profiles | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
