// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Plan definition structures
//!
//! Defines the schema for agentflow.yaml files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::AgentflowError;

/// Plan definition from agentflow.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDefinition {
    /// Plan version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Plan name
    pub name: String,

    /// Agent (or unit group) label recorded in checkpoints
    #[serde(default)]
    pub agent: Option<String>,

    /// Task handed to every unit alongside its own prompt
    #[serde(default)]
    pub task: String,

    /// Plan description
    #[serde(default)]
    pub description: Option<String>,

    /// Execution policy
    #[serde(default)]
    pub execution: ExecutionSettings,

    /// Units of work, in declaration order
    #[serde(alias = "stages", alias = "agents")]
    pub units: Vec<UnitSpec>,
}

fn default_version() -> String {
    "1".to_string()
}

impl PlanDefinition {
    /// Load a plan from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, AgentflowError> {
        if !path.exists() {
            return Err(AgentflowError::PlanNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| AgentflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse a plan from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, AgentflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize the plan to YAML
    pub fn to_yaml(&self) -> Result<String, AgentflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Label used for checkpoints and listings
    pub fn label(&self) -> &str {
        self.agent.as_deref().unwrap_or(&self.name)
    }

    /// Get a unit by name
    pub fn get_unit(&self, name: &str) -> Option<&UnitSpec> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Execution policy declared by a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Keep running independent branches after a failure
    #[serde(default)]
    pub continue_on_failure: bool,

    /// Upper bound on concurrently running units (unbounded when unset)
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

/// A single unit of work: a stage within one agent, or an agent within a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Unit name (must be unique within the plan)
    pub name: String,

    /// Unit description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Prompt sent to the provider
    #[serde(default)]
    pub prompt: String,

    /// System prompt sent to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Completion token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Units that must succeed before this one starts
    #[serde(default, alias = "depends_on")]
    pub dependencies: Vec<String>,

    /// May run concurrently with other units of the same level
    #[serde(default)]
    pub parallel: bool,

    /// Run condition (`previous.success` or `<unit>.success`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl UnitSpec {
    /// Create a unit with a name and prompt
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Add dependencies
    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Mark as parallel-eligible
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Set the run condition
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}
