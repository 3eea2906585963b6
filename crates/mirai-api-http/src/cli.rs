use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mah_core::{MessageCategory, OutputFormat};

#[derive(Parser)]
#[command(name = "mah")]
#[command(about = "mirai-api-http: gateway setting and webhook delivery tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Setting file (defaults to $MAH_CONFIG, then the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the gateway setting file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Send heartbeat pings until Ctrl-C, following setting file edits
    Heartbeat {
        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },

    /// Push one payload through the report policy
    Report {
        /// Message category (group, friend, temp, event)
        category: MessageCategory,

        /// JSON payload; a small test message is sent if omitted
        #[arg(long)]
        payload: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved setting file path
    Path,
    /// Show the effective setting
    Show {
        /// Print the auth key instead of masking it
        #[arg(long)]
        reveal: bool,
    },
    /// Validate the setting file without modifying it
    Validate,
    /// Write a commented default setting file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Replace the auth key with a freshly generated one
    RotateKey,
}
