//! Clap derive structures for the `unwire` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unwire -- keep Android devices reachable after the USB cable comes out
#[derive(Debug, Parser)]
#[command(
    name = "unwire",
    version,
    about = "Promote USB-attached Android devices to wireless adb connections",
    long_about = "Tracks devices visible to adb and, for each device known only over USB,\n\
        switches its daemon to TCPIP mode and connects over the peer-to-peer\n\
        group-owner address or the WLAN address, remembering where it was\n\
        last reached so it can be reconnected after a bridge restart.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Registry state file (overrides [state] path)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// adb executable (overrides [adb] path)
    #[arg(long, global = true)]
    pub adb: Option<PathBuf>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
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
    /// Track devices and keep promoting them until interrupted
    #[command(alias = "w")]
    Watch,

    /// Promote every attached device once, then exit
    #[command(alias = "p")]
    Promote(PromoteArgs),

    /// Show remembered devices
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Drop remembered devices from the state file
    Forget(ForgetArgs),

    /// Manage the config file
    Config(ConfigArgs),
}

// ── Promote ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PromoteArgs {
    /// Output format for the outcome list
    #[arg(long, short = 'o')]
    pub output: Option<OutputFormat>,
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Output format
    #[arg(long, short = 'o')]
    pub output: Option<OutputFormat>,
}

// ── Forget ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["stable_id", "all"])))]
pub struct ForgetArgs {
    /// Stable id of the device to forget
    pub stable_id: Option<String>,

    /// Forget every device and the last-connected hint
    #[arg(long)]
    pub all: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config and state file locations
    Path,

    /// Print the effective configuration as TOML
    Show,

    /// Write a config file populated with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
