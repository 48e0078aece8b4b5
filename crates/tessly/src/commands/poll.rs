//! `tessly poll`: one REST update, then the point table.

use tracing::{debug, warn};

use tessly_core::{UpdateOutcome, Vehicle};

use crate::cli::{GlobalOpts, PollArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(vehicle: &Vehicle, args: &PollArgs, global: &GlobalOpts) -> Result<(), CliError> {
    vehicle.apply_changes()?;

    let vin = vehicle.config().vin().unwrap_or_default().to_owned();
    match vehicle.update().await {
        UpdateOutcome::Applied { batch, overview } => {
            for failure in &batch.failures {
                warn!(path = %failure.path, error = %failure.error, "Point not reconciled");
            }
            debug!(
                applied = batch.applied,
                created = batch.created,
                overview_links = overview.map_or(0, |o| o.links.ensured),
                "Poll applied"
            );
        }
        UpdateOutcome::TransportFailed(reason) => return Err(CliError::PollFailed { vin, reason }),
        UpdateOutcome::EmptyPayload => {
            return Err(CliError::PollFailed {
                vin,
                reason: "the response held no vehicle data".into(),
            });
        }
        UpdateOutcome::NotConfigured => {
            return Err(CliError::NoCredentials {
                profile: "current".into(),
            });
        }
    }

    let points = util::filter_points(vehicle.points_snapshot(), args.filter.as_deref());
    output::print_output(&util::render_points(&points, &global.output), global.quiet);
    Ok(())
}
