// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Error recovery suggestions
//!
//! Provides actionable next steps for fatal graph and checkpoint errors.

use super::AgentflowError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &AgentflowError) -> Option<Self> {
        match error {
            AgentflowError::CyclicDependency { cycle_nodes, .. } => {
                Some(Self::fix_cyclic_dependency(cycle_nodes))
            }
            AgentflowError::ChecksumMismatch { run_id, .. }
            | AgentflowError::CorruptCheckpoint { run_id, .. }
            | AgentflowError::MissingCheckpointField { run_id, .. } => {
                Some(Self::discard_damaged_checkpoint(run_id))
            }
            AgentflowError::IncompatibleSchemaVersion { found, .. } => {
                Some(Self::upgrade_for_schema(*found))
            }
            AgentflowError::PlanNotFound { .. } => Some(Self::create_plan()),
            _ => None,
        }
    }

    /// Suggest fixing a dependency cycle
    pub fn fix_cyclic_dependency(nodes: &[String]) -> Self {
        Self {
            action: "Remove the dependency cycle".into(),
            steps: vec![
                format!("Units closing a cycle: {}", nodes.join(", ")),
                "Every unit must be reachable from a unit with no dependencies".into(),
            ],
            commands: vec![
                "# Visualise the plan:".into(),
                "agentflow graph --format mermaid".into(),
            ],
        }
    }

    /// Suggest discarding a checkpoint that failed validation
    pub fn discard_damaged_checkpoint(run_id: &str) -> Self {
        Self {
            action: "Discard the damaged checkpoint".into(),
            steps: vec![
                "The stored snapshot was modified or truncated after it was written".into(),
                "It cannot be resumed safely; start the plan again".into(),
            ],
            commands: vec![
                format!("agentflow runs delete {} --yes", run_id),
                "agentflow run".into(),
            ],
        }
    }

    /// Suggest upgrading when a checkpoint was written by a newer release
    pub fn upgrade_for_schema(found: u64) -> Self {
        Self {
            action: "Upgrade agentflow".into(),
            steps: vec![format!(
                "This checkpoint uses schema version {}, written by a newer release",
                found
            )],
            commands: vec![],
        }
    }

    /// Suggest creating a plan file
    pub fn create_plan() -> Self {
        Self {
            action: "Create a plan file".into(),
            steps: vec![
                "No agentflow.yaml found in the current directory".into(),
                "Declare units with names, prompts and dependencies".into(),
            ],
            commands: vec![
                "# Check the plan once written:".into(),
                "agentflow validate agentflow.yaml".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
