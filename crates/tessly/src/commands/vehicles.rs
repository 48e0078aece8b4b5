//! `tessly vehicles`: list the vehicles on the account.

use tabled::Tabled;

use tessly_api::TessieClient;
use tessly_core::{VehicleConfig, VehicleSummary, discover};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct VehicleRow {
    #[tabled(rename = "VIN")]
    vin: String,
    #[tabled(rename = "Name")]
    name: String,
}

fn row(v: &VehicleSummary) -> VehicleRow {
    VehicleRow {
        vin: v.vin.clone(),
        name: v.display_name.clone(),
    }
}

pub async fn handle(
    config: &VehicleConfig,
    profile: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let token = config.token().ok_or_else(|| CliError::NoCredentials {
        profile: profile.into(),
    })?;
    let client = TessieClient::new(&config.api_base, token, &config.transport())?;
    let vehicles = discover(&client).await?;

    let rendered = output::render_list(&global.output, &vehicles, row, |v| v.vin.clone());
    output::print_output(&rendered, global.quiet);
    Ok(())
}
