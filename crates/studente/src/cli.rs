//! Clap derive structures for the `studente` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// studente -- terminal dashboard for a Studente activity tracker
#[derive(Debug, Parser)]
#[command(
    name = "studente",
    version,
    about = "Watch and control a Studente activity tracker from the command line",
    long_about = "Watch and control a Studente activity tracker from the command line.\n\n\
        Connects to the tracker's WebSocket endpoint, streams activity and\n\
        AWS resource updates, and sends refresh, test and instance requests.",
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
    /// Tracker profile to use
    #[arg(long, short = 'p', env = "STUDENTE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Tracker host (overrides profile)
    #[arg(long, short = 'H', env = "STUDENTE_HOST", global = true)]
    pub host: Option<String>,

    /// Tracker WebSocket port (overrides profile)
    #[arg(long, short = 'P', env = "STUDENTE_PORT", global = true)]
    pub port: Option<u16>,

    /// AWS region for instance actions and refreshes
    #[arg(long, short = 'r', env = "STUDENTE_REGION", global = true)]
    pub region: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "STUDENTE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "STUDENTE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the tracker (connect and replies)
    #[arg(long, short = 't', env = "STUDENTE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream tracker updates and connection changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Ask the tracker to re-poll an AWS service
    Refresh(RefreshArgs),

    /// Connect and send a test probe
    Ping,

    /// Log in to the tracker (or set its initial password)
    Login(LoginArgs),

    /// One-shot snapshot of resources, activity and session timer
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Start or stop an EC2 instance
    #[command(alias = "i")]
    Instance(InstanceArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Print every raw inbound message as JSON instead of a summary
    #[arg(long)]
    pub raw: bool,

    /// Stop at the first disconnect instead of reconnecting
    #[arg(long)]
    pub no_reconnect: bool,
}

// ── Refresh ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Service to refresh
    #[arg(value_enum, default_value = "all")]
    pub service: ServiceArg,

    /// Return as soon as the request is sent
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceArg {
    Ec2,
    Ecs,
    Eks,
    All,
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Set the tracker's initial password instead of logging in
    #[arg(long)]
    pub create: bool,

    /// Store the password in the system keyring after a successful login
    #[arg(long)]
    pub save: bool,
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Seconds to collect updates before printing
    #[arg(long, short = 'w', default_value = "2")]
    pub wait: u64,

    /// Only show running instances
    #[arg(long)]
    pub running: bool,

    /// Skip login even when a password is configured
    #[arg(long)]
    pub no_login: bool,
}

// ── Instance ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InstanceArgs {
    #[command(subcommand)]
    pub command: InstanceCommand,
}

#[derive(Debug, Subcommand)]
pub enum InstanceCommand {
    /// Start a stopped instance
    Start {
        /// EC2 instance ID (e.g. i-0123456789abcdef0)
        id: String,
    },

    /// Stop a running instance
    Stop {
        /// EC2 instance ID
        id: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
