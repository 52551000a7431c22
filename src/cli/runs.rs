// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Runs command - inspect and manage checkpointed runs

use chrono::Utc;
use colored::Colorize;
use miette::Result;
use std::io::{self, Write};

use super::{report, Context, RunsAction};
use crate::checkpoint::{CheckpointStore, RunFilter};
use crate::utils::{create_spinner, format_age, format_duration, node_status, run_status};

/// Run the runs command
pub async fn run(ctx: &Context, action: RunsAction) -> Result<()> {
    let store = ctx.store();

    match action {
        RunsAction::List {
            status,
            agent,
            limit,
        } => {
            let runs = store
                .list_metadata(&RunFilter {
                    status,
                    agent,
                    limit,
                })
                .await
                .map_err(report)?;

            if runs.is_empty() {
                println!("{}", "No runs found.".dimmed());
                return Ok(());
            }

            let now = Utc::now();
            println!(
                "{:<36}  {:<11}  {:>9}  {:<10}  {}",
                "RUN ID".bold(),
                "STATUS".bold(),
                "PROGRESS".bold(),
                "UPDATED".bold(),
                "AGENT / TASK".bold()
            );
            for run in runs {
                println!(
                    "{:<36}  {:<11}  {:>9}  {:<10}  {} {}",
                    run.run_id,
                    run_status(run.status),
                    format!("{}/{}", run.completed_stages, run.total_stages),
                    format_age(run.updated_at, now),
                    run.agent,
                    run.task.dimmed()
                );
            }

            Ok(())
        }

        RunsAction::Show {
            run_id,
            stages,
            artifacts,
        } => {
            let checkpoint = store.load(&run_id).await.map_err(report)?;
            let metadata = checkpoint.metadata();

            println!("{}", format!("Run {}", checkpoint.run_id).bold());
            println!("{}", "═".repeat(50));
            println!("  Agent:     {}", checkpoint.agent);
            println!("  Task:      {}", checkpoint.task);
            println!("  Status:    {}", run_status(metadata.status));
            println!(
                "  Progress:  {}/{} stages",
                metadata.completed_stages, metadata.total_stages
            );
            println!("  Created:   {}", checkpoint.created_at.to_rfc3339());
            println!("  Updated:   {}", checkpoint.updated_at.to_rfc3339());
            println!(
                "  Mode:      max concurrent {}{}{}",
                checkpoint
                    .mode
                    .max_concurrent
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unbounded".into()),
                if checkpoint.mode.continue_on_failure { ", continue on failure" } else { "" },
                if checkpoint.mode.resumed { ", resumed" } else { "" }
            );

            if stages {
                println!();
                println!("{}:", "Stages".bold());
                for state in &checkpoint.node_states {
                    let detail = match &state.result {
                        Some(result) if !result.success => {
                            result.error.clone().unwrap_or_default()
                        }
                        Some(result) => format_duration(result.duration_ms),
                        None => String::new(),
                    };
                    let retries = if state.retries > 0 {
                        format!(" (retries: {})", state.retries)
                    } else {
                        String::new()
                    };
                    println!(
                        "  {:>3}. {:<24} {:<10} {}{}",
                        state.index,
                        state.name,
                        node_status(state.status),
                        detail.dimmed(),
                        retries
                    );
                }
            }

            if artifacts {
                let names = store.list_artifacts(&run_id).await.map_err(report)?;
                println!();
                println!("{}:", "Artifacts".bold());
                if names.is_empty() {
                    println!("  {}", "(none)".dimmed());
                }
                for name in names {
                    println!("  {}", name);
                }
            }

            Ok(())
        }

        RunsAction::Delete { run_id, yes } => {
            // Validates the id and confirms the run exists before prompting
            let metadata = store.load_metadata(&run_id).await.map_err(report)?;

            if !yes {
                print!(
                    "Delete run {} ({}, {}/{} stages)? [y/N] ",
                    metadata.run_id, metadata.status, metadata.completed_stages, metadata.total_stages
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            store.delete(&run_id).await.map_err(report)?;
            println!("{}", format!("Deleted run {}.", metadata.run_id).green());
            Ok(())
        }

        RunsAction::Cleanup { days } => {
            let days = days.unwrap_or(ctx.config.checkpoint.cleanup_after_days);

            let spinner = create_spinner(&format!("Removing runs older than {} days...", days));
            let removed = store.cleanup(days).await;
            spinner.finish_and_clear();

            let removed = removed.map_err(report)?;
            if removed == 0 {
                println!("{}", "No expired runs.".dimmed());
            } else {
                println!(
                    "{}",
                    format!(
                        "Removed {} run{} not updated in {} days.",
                        removed,
                        if removed == 1 { "" } else { "s" },
                        days
                    )
                    .green()
                );
            }
            Ok(())
        }
    }
}
