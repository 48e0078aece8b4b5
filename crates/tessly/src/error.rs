//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tessly_config::ConfigError;
use tessly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach Tessie at {url}")]
    #[diagnostic(
        code(tessly::connection_failed),
        help(
            "Check network access to the API.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Vehicle data request for {vin} failed: {reason}")]
    #[diagnostic(
        code(tessly::poll_failed),
        help("The vehicle may be asleep or the token may lack access to it.")
    )]
    PollFailed { vin: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(tessly::auth_failed),
        help(
            "Verify your Tessie API token.\n\
             Run: tessly config init --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(tessly::no_credentials),
        help(
            "Configure a token with: tessly config init --token <TOKEN>\n\
             Or set the TESSLY_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("No VIN configured for profile '{profile}'")]
    #[diagnostic(
        code(tessly::no_vin),
        help(
            "Pass --vin, set TESSLY_VIN, or add `vin` to the profile.\n\
             Run: tessly vehicles to list the VINs on your account"
        )
    )]
    NoVin { profile: String },

    // ── Actions ──────────────────────────────────────────────────────

    #[error("Unknown action '{ident}'")]
    #[diagnostic(code(tessly::unknown_action), help("Available actions: {available}"))]
    UnknownAction { ident: String, available: String },

    #[error("Command '{command}' was not confirmed by the vehicle")]
    #[diagnostic(
        code(tessly::command_failed),
        help("{reason}\nThe action point keeps the requested value until the next poll.")
    )]
    CommandFailed { command: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(tessly::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tessly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tessly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: tessly config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(tessly::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(tessly::timeout),
        help("Increase timeout with --timeout or wake the vehicle first.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::PollFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::UnknownAction { .. } | Self::NoVin { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::UnknownAction { ident } => CliError::UnknownAction {
                ident,
                available: crate::commands::action::available_actions(),
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Store(e) => CliError::ApiError {
                code: "store".into(),
                message: e.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<tessly_api::Error> for CliError {
    fn from(err: tessly_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
