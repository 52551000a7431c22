// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Checkpoint recorder
//!
//! Persists a run as the engine reports results: node state, an artifact per
//! successful output and a line in the run log.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Checkpoint, CheckpointSink, CheckpointStore, FilesystemCheckpointStore, RunId, RunMode};
use crate::engine::ExecutionResult;
use crate::errors::AgentflowError;
use crate::plan::PlanDefinition;

/// [`CheckpointSink`] backed by a filesystem store
pub struct CheckpointRecorder {
    store: Arc<FilesystemCheckpointStore>,
    run_id: RunId,
    checkpoint: Mutex<Checkpoint>,
}

impl CheckpointRecorder {
    /// Write the initial checkpoint for a new run
    pub async fn begin(
        store: Arc<FilesystemCheckpointStore>,
        run_id: RunId,
        plan: &PlanDefinition,
        mode: RunMode,
    ) -> Result<Self, AgentflowError> {
        let mut checkpoint = Checkpoint::new(
            &run_id,
            plan.label(),
            &plan.task,
            mode,
            plan.units.iter().map(|unit| unit.name.clone()),
        );
        checkpoint.set_plan(plan)?;

        store.save(&mut checkpoint).await?;
        store
            .append_log(run_id.as_str(), &format!("run started ({} units)", plan.units.len()))
            .await?;

        tracing::info!(run_id = %run_id, agent = %checkpoint.agent, "checkpointing run");
        Ok(Self {
            store,
            run_id,
            checkpoint: Mutex::new(checkpoint),
        })
    }

    /// Reopen an existing checkpoint for a resumed run
    pub async fn resume(
        store: Arc<FilesystemCheckpointStore>,
        mut checkpoint: Checkpoint,
    ) -> Result<Self, AgentflowError> {
        let run_id = RunId::parse(&checkpoint.run_id)?;
        checkpoint.mode.resumed = true;

        store.save(&mut checkpoint).await?;
        store.append_log(run_id.as_str(), "run resumed").await?;

        tracing::info!(run_id = %run_id, "resuming run");
        Ok(Self {
            store,
            run_id,
            checkpoint: Mutex::new(checkpoint),
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Snapshot of the checkpoint as last saved
    pub async fn checkpoint(&self) -> Checkpoint {
        self.checkpoint.lock().await.clone()
    }
}

#[async_trait]
impl CheckpointSink for CheckpointRecorder {
    async fn record(&self, result: &ExecutionResult) -> Result<(), AgentflowError> {
        let mut checkpoint = self.checkpoint.lock().await;
        checkpoint.record(result, Utc::now());

        if result.success && !result.skipped {
            let name = artifact_name(result.index, &result.name);
            self.store
                .write_artifact(self.run_id.as_str(), &name, result.output.as_bytes())
                .await?;
        }

        let line = match &result.error {
            Some(error) => format!("{} failed after {}ms: {}", result.name, result.duration_ms, error),
            None if result.skipped => format!("{} skipped", result.name),
            None => format!("{} completed in {}ms", result.name, result.duration_ms),
        };
        self.store.append_log(self.run_id.as_str(), &line).await?;

        self.store.save(&mut checkpoint).await?;
        tracing::debug!(run_id = %self.run_id, node = %result.name, "checkpoint updated");
        Ok(())
    }
}

/// `{index:03}-{name}.md` with anything outside `[A-Za-z0-9_-]` replaced
fn artifact_name(index: usize, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{:03}-{}.md", index, safe)
}
