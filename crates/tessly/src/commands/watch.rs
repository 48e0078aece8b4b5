//! `tessly watch`: run the refresh timer and the telemetry stream until
//! Ctrl-C, then print what the tree looks like.

use std::time::Duration;

use tracing::{debug, info};

use tessly_core::VehicleConfig;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    mut config: VehicleConfig,
    args: &WatchArgs,
    profile: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    if args.no_stream {
        config.telemetry_enabled = false;
    }

    let vehicle = util::build_vehicle(config, profile)?;
    let mut updates = vehicle.subscribe_updates();
    vehicle.start().await?;

    if !global.quiet {
        eprintln!("Watching {} (Ctrl-C to stop)", vehicle.config().vin().unwrap_or_default());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut applied: u64 = 0;

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                info!("Interrupted, shutting down");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                applied += 1;
                if let Some(at) = *updates.borrow_and_update() {
                    debug!(at = %at, applied, "Tree updated");
                }
            }
        }
    }

    vehicle.shutdown().await;

    let points = util::filter_points(vehicle.points_snapshot(), args.filter.as_deref());
    output::print_output(&util::render_points(&points, &global.output), global.quiet);
    if !global.quiet {
        let last = vehicle
            .last_update()
            .map_or_else(|| "never".into(), |t| t.to_rfc3339());
        eprintln!("{applied} updates, {} points, last update {last}", points.len());
    }
    Ok(())
}
