//! Clap derive structures for the `tessly` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tessly -- mirror Tessie vehicle data into an object tree
#[derive(Debug, Parser)]
#[command(
    name = "tessly",
    version,
    about = "Mirror Tessie vehicle data and send vehicle commands",
    long_about = "Polls the Tessie REST API and the streaming telemetry feed,\n\
        reconciles every signal into a typed point tree, and maps writes on\n\
        action points back to vehicle commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Vehicle profile to use
    #[arg(long, short = 'p', env = "TESSLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Vehicle identification number (overrides profile)
    #[arg(long, env = "TESSLY_VIN", global = true)]
    pub vin: Option<String>,

    /// Tessie API token
    #[arg(long, env = "TESSLY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// REST base URL (overrides profile)
    #[arg(long, env = "TESSLY_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TESSLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TESSLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the vehicle snapshot once and print the point table
    Poll(PollArgs),

    /// Keep polling and streaming until Ctrl-C
    Watch(WatchArgs),

    /// Send one vehicle action
    #[command(alias = "act")]
    Action(ActionArgs),

    /// List the vehicles on the account
    #[command(alias = "ls")]
    Vehicles,

    /// List the display profiles points can carry
    Profiles,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Poll / Watch ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PollArgs {
    /// Only show points whose name or identifier contains this text
    #[arg(long, short = 'f')]
    pub filter: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// REST poll interval in seconds (0 disables polling)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Do not open the telemetry stream
    #[arg(long)]
    pub no_stream: bool,

    /// Only show points whose name or identifier contains this text
    #[arg(long, short = 'f')]
    pub filter: Option<String>,
}

// ── Action ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ActionArgs {
    /// Action identifier (act_locked, lock, set_charge_limit, honk, ...)
    pub ident: String,

    /// Requested value (true/false, on/off, or a number)
    #[arg(default_value = "true")]
    pub value: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the current configuration (secrets masked)
    Show,

    /// Create or update a vehicle profile
    Init(ConfigInitArgs),
}

/// Profile name comes from --profile, the VIN from --vin and the token
/// from --token (stored in the system keyring unless --plaintext).
#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Environment variable holding the API token
    #[arg(long)]
    pub token_env: Option<String>,

    /// Write the token into the config file instead of the keyring
    #[arg(long)]
    pub plaintext: bool,

    /// Disable the telemetry stream for this profile
    #[arg(long)]
    pub no_telemetry: bool,

    /// Wake the vehicle before each command
    #[arg(long)]
    pub wake: bool,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
