use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mind_config::{ConfigOverrides, MindConfig};
use mind_memory::{FrameFileBackend, MindHandle};
use tracing_subscriber::EnvFilter;

mod cli;
mod git_changes;
mod hook_cmd;
mod query_cmd;
mod render;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = MindConfig::load(&ConfigOverrides::default());

    // Hooks write their response to stdout, so logs go to stderr and stay
    // at warn unless debugging is requested.
    let debug = config.as_ref().is_ok_and(|config| config.debug);
    let default_directive = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .try_init()
        .ok();

    match cli.command {
        Commands::Hook { event } => {
            let output = match config {
                Ok(config) => {
                    let handle =
                        MindHandle::with_backend(config.clone(), Arc::new(FrameFileBackend));
                    hook_cmd::run(event, &handle, &config).await
                }
                Err(error) => {
                    tracing::debug!(error = %format!("{error:#}"), "configuration unavailable; hook skipped");
                    hook_cmd::HookOutput::proceed()
                }
            };
            println!("{}", serde_json::to_string(&output)?);
            Ok(())
        }
        command => {
            let config = config.context("failed to resolve mind configuration")?;
            let handle = MindHandle::with_backend(config, Arc::new(FrameFileBackend));
            query_cmd::handle_query_command(command, &handle, cli.format).await
        }
    }
}
