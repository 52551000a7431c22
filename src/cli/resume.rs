// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Resume command - continue a checkpointed run

use colored::Colorize;
use miette::Result;
use std::sync::Arc;

use super::run::{available_provider, execute, Attempt};
use super::{report, Context, OutputFormat};
use crate::checkpoint::{CheckpointRecorder, CheckpointStore, RunStatus};
use crate::plan::DependencyGraph;

/// Resume a run from its checkpoint
pub async fn run(ctx: &Context, run_id: String, format: OutputFormat) -> Result<()> {
    let store = Arc::new(ctx.store());
    let checkpoint = store.load(&run_id).await.map_err(report)?;

    if checkpoint.status() == RunStatus::Completed {
        println!(
            "{}",
            format!("Run {} already completed; nothing to resume.", checkpoint.run_id).green()
        );
        return Ok(());
    }

    let plan = checkpoint.plan().map_err(report)?;
    let graph = DependencyGraph::from_plan(&plan).map_err(report)?;
    let prior_results = checkpoint.recorded_results();
    let mut mode = checkpoint.mode.clone();
    mode.resumed = true;

    tracing::info!(
        run_id = %checkpoint.run_id,
        recorded = prior_results.len(),
        "resuming from checkpoint"
    );

    let provider = available_provider(ctx).await?;
    let recorder = CheckpointRecorder::resume(store, checkpoint)
        .await
        .map_err(report)?;

    execute(
        ctx,
        Attempt {
            plan: &plan,
            graph: &graph,
            provider,
            mode,
            recorder: Some(Arc::new(recorder)),
            prior_results,
            format,
        },
    )
    .await
}
