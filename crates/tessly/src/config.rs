//! CLI configuration: thin wrapper around `tessly_config` shared types.
//!
//! Adds CLI-specific resolution that respects `GlobalOpts` flag overrides
//! (--vin, --token, --api-base, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use tessly_core::VehicleConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use tessly_config::{Config, Profile, config_path, load_config_or_default, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    tessly_config::active_profile_name(config, global.profile.as_deref())
}

/// Build a `VehicleConfig` from the config file, profile, and CLI overrides.
///
/// A profile that was asked for explicitly must exist; the implicit
/// default profile may be absent, in which case flags and environment
/// variables carry everything.
pub fn resolve_vehicle_config(global: &GlobalOpts) -> Result<(String, VehicleConfig), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let profile = match tessly_config::find_profile(&cfg, &profile_name) {
        Ok(profile) => profile.clone(),
        Err(e) if global.profile.is_some() => return Err(e.into()),
        Err(_) => Profile::default(),
    };
    let mut config =
        tessly_config::profile_to_vehicle_config(&profile, &profile_name, &cfg.defaults)?;

    apply_overrides(&mut config, global)?;
    Ok((profile_name, config))
}

/// CLI flag overrides take priority over profile values.
fn apply_overrides(config: &mut VehicleConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref token) = global.token {
        config.token = Some(SecretString::from(token.clone()));
    }
    if let Some(ref vin) = global.vin {
        config.vin = Some(vin.clone());
    }
    if let Some(ref base) = global.api_base {
        url::Url::parse(base).map_err(|e| CliError::Validation {
            field: "api-base".into(),
            reason: format!("invalid URL '{base}': {e}"),
        })?;
        config.api_base.clone_from(base);
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(())
}
