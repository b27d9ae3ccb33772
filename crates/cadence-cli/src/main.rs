//! Cadence CLI Application
//!
//! Command-line front end for the cadence orchestration engine. Plans are
//! generated by a router command and their steps run by a step command, both
//! configured through global flags or `CADENCE_*` environment variables.

mod adapters;
mod args;
mod cli;
mod renderer;

use std::{sync::Arc, time::Duration};

use adapters::{CommandRouter, CommandStepRunner};
use anyhow::{Context, Result};
use args::{Args, Commands};
use cadence_core::ManagerBuilder;
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        workers,
        router_command,
        step_command,
        poll_interval_ms,
        no_color,
        command,
    } = Args::parse();

    let manager = ManagerBuilder::new()
        .with_database_path(database_file)
        .with_max_workers(workers)
        .with_router(Arc::new(CommandRouter::new(router_command)))
        .with_step_runner(Arc::new(CommandStepRunner::new(step_command)))
        .build()
        .await
        .context("Failed to initialize plan manager")?;

    info!("Cadence started with {workers} workers");

    let cli = Cli::new(
        manager.clone(),
        TerminalRenderer::new(!no_color),
        Duration::from_millis(poll_interval_ms),
    );
    let outcome = match command {
        Some(Plan { command }) => cli.handle_plan_command(command).await,
        Some(Task { command }) => cli.handle_task_command(command).await,
        None => cli.list_active_plans().await,
    };

    manager
        .shutdown()
        .await
        .context("Failed to shut down plan manager")?;
    outcome
}
