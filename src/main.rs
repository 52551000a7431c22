// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! agentflow - Multi-Agent Task Orchestrator
//!
//! Run dependent AI units concurrently, with resumable checkpoints.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentflow::cli::{run::RunArgs, Cli, Commands, Context};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries run output
    let default_filter = if cli.verbose { "agentflow=debug" } else { "agentflow=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let ctx = Context::load(cli.verbose, cli.checkpoint_dir)?;

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            plan,
            max_concurrent,
            continue_on_failure,
            no_checkpoint,
            dry_run,
            format,
        } => {
            agentflow::cli::run::run(
                &ctx,
                RunArgs {
                    plan,
                    max_concurrent,
                    continue_on_failure,
                    no_checkpoint,
                    dry_run,
                    format,
                },
            )
            .await
        }
        Commands::Resume { run_id, format } => agentflow::cli::resume::run(&ctx, run_id, format).await,
        Commands::Graph { plan, format } => agentflow::cli::graph::run(plan, format).await,
        Commands::Validate { plan } => agentflow::cli::validate::run(plan, ctx.verbose).await,
        Commands::Runs { action } => agentflow::cli::runs::run(&ctx, action).await,
    }
}
