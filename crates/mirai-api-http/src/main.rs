use std::time::Duration;

use anyhow::Result;
use clap::Parser;

mod cli;
mod config_cmds;
mod heartbeat_cmd;
mod report_cmd;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let path = mah_config::paths::resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Path => config_cmds::handle_config_path(&path),
            ConfigCommands::Show { reveal } => {
                config_cmds::handle_config_show(&path, cli.format, reveal)
            }
            ConfigCommands::Validate => config_cmds::handle_config_validate(&path),
            ConfigCommands::Init { force } => config_cmds::handle_config_init(&path, force),
            ConfigCommands::RotateKey => config_cmds::handle_config_rotate_key(&path, cli.format),
        },
        Commands::Heartbeat { timeout_secs } => {
            heartbeat_cmd::handle_heartbeat(&path, Duration::from_secs(timeout_secs)).await
        }
        Commands::Report {
            category,
            payload,
            timeout_secs,
        } => {
            report_cmd::handle_report(
                &path,
                category,
                payload,
                Duration::from_secs(timeout_secs),
                cli.format,
            )
            .await
        }
    }
}
