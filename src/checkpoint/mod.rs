// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Durable run checkpoints
//!
//! Each run lives in `<root>/<run id>/` with `checkpoint.json`, a
//! `metadata.json` summary for fast listing, and `artifacts/` and `logs/`
//! directories.

mod filesystem;
mod integrity;
mod recorder;
mod run_id;

pub use filesystem::FilesystemCheckpointStore;
pub use integrity::{checksum_of, CURRENT_SCHEMA_VERSION, MIN_SUPPORTED_SCHEMA_VERSION, REQUIRED_FIELDS};
pub use recorder::CheckpointRecorder;
pub use run_id::RunId;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::engine::ExecutionResult;
use crate::errors::AgentflowError;
use crate::plan::PlanDefinition;

/// Key under `sharedData` holding the plan a run was started with
pub const PLAN_KEY: &str = "plan";

/// Trait for checkpoint stores
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Sign and persist a checkpoint, returning the path of `checkpoint.json`.
    ///
    /// `updatedAt` and `checksum` are refreshed on the passed checkpoint.
    async fn save(&self, checkpoint: &mut Checkpoint) -> Result<PathBuf, AgentflowError>;

    /// Load and verify a checkpoint
    async fn load(&self, run_id: &str) -> Result<Checkpoint, AgentflowError>;

    /// Whether a checkpoint exists for the run
    async fn exists(&self, run_id: &str) -> Result<bool, AgentflowError>;

    /// All readable checkpoints, most recently updated first
    async fn list(&self) -> Result<Vec<Checkpoint>, AgentflowError>;

    /// Delete a run and everything stored under it
    async fn delete(&self, run_id: &str) -> Result<(), AgentflowError>;

    /// Delete runs not updated within `retention_days`; returns how many were removed
    async fn cleanup(&self, retention_days: u32) -> Result<usize, AgentflowError>;
}

/// Receives each result as soon as the engine records it
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn record(&self, result: &ExecutionResult) -> Result<(), AgentflowError>;
}

/// Durable snapshot of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub schema_version: u64,

    #[serde(default)]
    pub checksum: String,

    pub run_id: String,

    /// Agent or plan label
    pub agent: String,

    pub task: String,

    pub mode: RunMode,

    #[serde(rename = "stages")]
    pub node_states: Vec<NodeState>,

    #[serde(default)]
    pub last_completed_index: Option<usize>,

    /// Successful outputs in completion order
    #[serde(default)]
    pub previous_outputs: Vec<String>,

    #[serde(default)]
    pub shared_data: BTreeMap<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Execution flags a run was started with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMode {
    /// At least one unit was parallel-eligible
    #[serde(default)]
    pub parallel: bool,

    #[serde(default)]
    pub continue_on_failure: bool,

    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// The run has been resumed at least once
    #[serde(default)]
    pub resumed: bool,
}

/// Progress of one unit within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub name: String,
    pub index: usize,
    pub status: NodeStatus,

    /// Times the unit was run again after failing
    #[serde(default)]
    pub retries: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

impl NodeStatus {
    fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Overall run status derived from node states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in_progress" | "in-progress" | "running" => Ok(Self::InProgress),
            "completed" | "complete" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!(
                "unknown run status '{}' (expected in_progress, completed or failed)",
                other
            )),
        }
    }
}

/// Denormalized run summary stored in `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: String,
    pub agent: String,
    pub task: String,
    pub total_stages: usize,
    pub completed_stages: usize,
    pub status: RunStatus,
    pub updated_at: DateTime<Utc>,
}

/// Filter for run listings
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub agent: Option<String>,
    pub limit: Option<usize>,
}

impl RunFilter {
    pub fn matches(&self, metadata: &RunMetadata) -> bool {
        if let Some(status) = self.status {
            if metadata.status != status {
                return false;
            }
        }
        if let Some(agent) = &self.agent {
            if &metadata.agent != agent {
                return false;
            }
        }
        true
    }
}

impl Checkpoint {
    /// Start a checkpoint with every unit pending
    pub fn new<I>(run_id: &RunId, agent: &str, task: &str, mode: RunMode, units: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let now = Utc::now();
        let node_states = units
            .into_iter()
            .enumerate()
            .map(|(index, name)| NodeState {
                name,
                index,
                status: NodeStatus::Pending,
                retries: 0,
                result: None,
                completed_at: None,
            })
            .collect();

        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            checksum: String::new(),
            run_id: run_id.to_string(),
            agent: agent.to_string(),
            task: task.to_string(),
            mode,
            node_states,
            last_completed_index: None,
            previous_outputs: Vec::new(),
            shared_data: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one execution result to the matching unit state
    pub fn record(&mut self, result: &ExecutionResult, at: DateTime<Utc>) {
        let status = if result.skipped {
            NodeStatus::Skipped
        } else if result.success {
            NodeStatus::Completed
        } else {
            NodeStatus::Failed
        };

        let position = self
            .node_states
            .iter()
            .position(|state| state.name == result.name);

        let state = match position {
            Some(position) => &mut self.node_states[position],
            None => {
                self.node_states.push(NodeState {
                    name: result.name.clone(),
                    index: result.index,
                    status: NodeStatus::Pending,
                    retries: 0,
                    result: None,
                    completed_at: None,
                });
                let last = self.node_states.len() - 1;
                &mut self.node_states[last]
            }
        };

        if state.status == NodeStatus::Failed {
            state.retries += 1;
        }
        state.status = status;
        state.result = Some(result.clone());
        state.completed_at = Some(at);

        if result.success && !result.skipped {
            self.last_completed_index = Some(result.index);
            self.previous_outputs.push(result.output.clone());
        }
    }

    /// Recorded results ordered by completion time
    pub fn recorded_results(&self) -> Vec<ExecutionResult> {
        let mut states: Vec<&NodeState> = self
            .node_states
            .iter()
            .filter(|state| state.result.is_some())
            .collect();
        states.sort_by_key(|state| (state.completed_at, state.index));

        states
            .into_iter()
            .filter_map(|state| state.result.clone())
            .collect()
    }

    /// Derived run status
    pub fn status(&self) -> RunStatus {
        if self
            .node_states
            .iter()
            .any(|state| state.status == NodeStatus::Failed)
        {
            RunStatus::Failed
        } else if self.node_states.iter().all(|state| state.status.is_done()) {
            RunStatus::Completed
        } else {
            RunStatus::InProgress
        }
    }

    /// Summary written alongside the checkpoint
    pub fn metadata(&self) -> RunMetadata {
        RunMetadata {
            run_id: self.run_id.clone(),
            agent: self.agent.clone(),
            task: self.task.clone(),
            total_stages: self.node_states.len(),
            completed_stages: self
                .node_states
                .iter()
                .filter(|state| state.status.is_done())
                .count(),
            status: self.status(),
            updated_at: self.updated_at,
        }
    }

    /// Store the plan so the run can be resumed from its id alone
    pub fn set_plan(&mut self, plan: &PlanDefinition) -> Result<(), AgentflowError> {
        self.shared_data
            .insert(PLAN_KEY.to_string(), serde_json::to_value(plan)?);
        Ok(())
    }

    /// The plan stored by [`Checkpoint::set_plan`]
    pub fn plan(&self) -> Result<PlanDefinition, AgentflowError> {
        let value = self
            .shared_data
            .get(PLAN_KEY)
            .ok_or_else(|| AgentflowError::CorruptCheckpoint {
                run_id: self.run_id.clone(),
                reason: "no plan stored in sharedData".into(),
            })?;

        serde_json::from_value(value.clone()).map_err(|e| AgentflowError::CorruptCheckpoint {
            run_id: self.run_id.clone(),
            reason: format!("stored plan is unreadable: {}", e),
        })
    }
}
