//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

/// Replace every secret in the config with a mask.
fn masked(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
        if profile.telemetry_token.is_some() {
            profile.telemetry_token = Some(MASK.into());
        }
    }
    cfg
}

fn init(args: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let profile_name = global.profile.clone().unwrap_or_else(|| "default".into());
    let mut cfg = config::load_config_or_default();
    let first_profile = cfg.profiles.is_empty();

    let mut profile = cfg.profiles.remove(&profile_name).unwrap_or_default();
    match global.vin.as_deref().or(profile.vin.as_deref()) {
        Some(vin) => profile.vin = Some(vin.to_owned()),
        None => {
            return Err(CliError::NoVin {
                profile: profile_name,
            });
        }
    }
    if let Some(ref base) = global.api_base {
        profile.api_base = Some(base.clone());
    }
    if let Some(ref env) = args.token_env {
        profile.token_env = Some(env.clone());
    }
    if let Some(ref token) = global.token {
        if args.plaintext {
            profile.token = Some(token.clone());
        } else {
            tessly_config::store_token(&profile_name, token)?;
            if !global.quiet {
                eprintln!("Token stored in system keyring");
            }
        }
    }
    if args.no_telemetry {
        profile.telemetry = Some(false);
    }
    if args.wake {
        profile.wake_before_commands = Some(true);
    }

    cfg.profiles.insert(profile_name.clone(), profile);
    if args.default || first_profile {
        cfg.default_profile = Some(profile_name.clone());
    }

    let path = config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!("Saved profile '{profile_name}' to {}", path.display());
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = masked(config::load_config_or_default());
            let rendered = match global.output {
                OutputFormat::Json => output::render_json(&cfg, false),
                OutputFormat::JsonCompact => output::render_json(&cfg, true),
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init_args) => init(init_args, global),
    }
}

#[cfg(test)]
mod tests {
    use tessly_config::Profile;

    use super::*;

    #[test]
    fn secrets_are_masked() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "car".into(),
            Profile {
                token: Some("secret".into()),
                token_env: Some("TESSIE_TOKEN".into()),
                ..Profile::default()
            },
        );
        let shown = masked(cfg);
        let car = &shown.profiles["car"];
        assert_eq!(car.token.as_deref(), Some(MASK));
        assert_eq!(car.token_env.as_deref(), Some("TESSIE_TOKEN"));
        assert!(car.telemetry_token.is_none());
    }
}
