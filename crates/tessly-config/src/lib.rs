//! Shared configuration for tessly.
//!
//! TOML profiles (one per vehicle), token resolution (env + keyring +
//! plaintext), and translation to `tessly_core::VehicleConfig`. The core
//! never reads files; the binary loads a profile here and hands the
//! result in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tessly_core::config::{DEFAULT_API_BASE, DEFAULT_POLL_INTERVAL};
use tessly_core::discovery::DEFAULT_STREAMING_BASE;
use tessly_core::{CleanupPolicy, LinkTreePlacement, VehicleConfig};

/// Keyring service name; entries are keyed `<profile>/token`.
pub const KEYRING_SERVICE: &str = "tessly";

/// Environment prefix merged over the config file. Nested keys use `__`
/// (`TESSLY_DEFAULTS__POLL_INTERVAL=60`).
pub const ENV_PREFIX: &str = "TESSLY_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named vehicle profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Seconds between REST polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            api_base: default_api_base(),
            poll_interval: default_poll_interval(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}

/// A named vehicle profile. Unset fields fall back to [`Defaults`].
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    pub vin: Option<String>,

    /// Human-readable name, informational only.
    pub display_name: Option<String>,

    /// REST base URL override.
    pub api_base: Option<String>,

    /// API token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,

    /// Accept streaming telemetry (default: on).
    pub telemetry: Option<bool>,

    pub streaming_base: Option<String>,

    /// Dedicated streaming token, if it differs from `token`.
    pub telemetry_token: Option<String>,

    pub poll_interval: Option<u64>,

    pub wake_before_commands: Option<bool>,

    pub wait_for_completion: Option<bool>,

    /// Overview tree placement: "instance" (default) or "disabled".
    pub link_tree: Option<String>,

    /// Prune stale overview links (default: on).
    pub cleanup: Option<bool>,

    /// Log cleanup instead of deleting.
    pub dry_run: Option<bool>,

    pub timeout: Option<u64>,

    pub connect_timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tessly", "tessly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tessly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is
/// not an error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

/// Active profile name: explicit request, else `default_profile`, else
/// "default".
pub fn active_profile_name(config: &Config, requested: Option<&str>) -> String {
    requested
        .map(str::to_owned)
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Look up a profile by name.
pub fn find_profile<'a>(config: &'a Config, name: &str) -> Result<&'a Profile, ConfigError> {
    config
        .profiles
        .get(name)
        .ok_or_else(|| ConfigError::ProfileNotFound {
            name: name.into(),
            available: config.profiles.keys().cloned().collect(),
        })
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the API token: profile `token_env` → system keyring →
/// plaintext in config.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .map_err(|e| ConfigError::Keyring(e.to_string()))?;
    entry
        .set_password(token)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

// ── Translation to core ─────────────────────────────────────────────

/// Build a `VehicleConfig` from a profile and the global defaults.
///
/// A missing token is not an error here: the core skips polls without
/// one and rejects actions, so the caller decides how strict to be.
pub fn profile_to_vehicle_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<VehicleConfig, ConfigError> {
    let api_base = profile
        .api_base
        .clone()
        .unwrap_or_else(|| defaults.api_base.clone());
    validate_url("api_base", &api_base)?;

    let streaming_base = profile
        .streaming_base
        .clone()
        .unwrap_or_else(|| DEFAULT_STREAMING_BASE.into());
    validate_url("streaming_base", &streaming_base)?;

    let link_tree = match profile.link_tree.as_deref().map(str::to_ascii_lowercase) {
        None => LinkTreePlacement::InstanceRoot,
        Some(mode) => match mode.as_str() {
            "instance" | "root" => LinkTreePlacement::InstanceRoot,
            "disabled" | "none" | "off" => LinkTreePlacement::Disabled,
            other => {
                return Err(ConfigError::Validation {
                    field: "link_tree".into(),
                    reason: format!("expected 'instance' or 'disabled', got '{other}'"),
                });
            }
        },
    };

    let token = match resolve_token(profile, profile_name) {
        Ok(token) => Some(token),
        Err(e) => {
            debug!(profile = profile_name, error = %e, "No token resolved");
            None
        }
    };

    Ok(VehicleConfig {
        api_base,
        token,
        vin: profile.vin.clone(),
        poll_interval: Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval)),
        telemetry_enabled: profile.telemetry.unwrap_or(true),
        streaming_base,
        telemetry_token: profile.telemetry_token.clone().map(SecretString::from),
        wake_before_commands: profile.wake_before_commands.unwrap_or(false),
        wait_for_completion: profile.wait_for_completion.unwrap_or(true),
        link_tree,
        cleanup: CleanupPolicy {
            prune: profile.cleanup.unwrap_or(true),
            dry_run: profile.dry_run.unwrap_or(false),
        },
        connect_timeout: Duration::from_secs(
            profile.connect_timeout.unwrap_or(defaults.connect_timeout),
        ),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    })
}

fn validate_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| ConfigError::Validation {
            field: field.into(),
            reason: format!("invalid URL '{raw}': {e}"),
        })
}
