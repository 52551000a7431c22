// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Unit runners
//!
//! The engine only knows how to schedule; a `UnitRunner` decides what running
//! a unit means.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::AgentflowError;
use crate::plan::Node;
use crate::provider::{Provider, ProviderRequest};

/// Output of a direct dependency handed to a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyOutput {
    pub name: String,
    pub output: String,
}

/// What a runner produced for one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOutput {
    pub content: String,
    pub tokens_used: u64,
    pub model: Option<String>,
}

/// Trait for running a single unit
#[async_trait]
pub trait UnitRunner: Send + Sync {
    /// Run `node` with the outputs of its direct dependencies.
    ///
    /// An `Err` fails the unit; its display text becomes the recorded error.
    async fn run_unit(
        &self,
        node: &Node,
        dependencies: &[DependencyOutput],
        cancel: CancellationToken,
    ) -> Result<UnitOutput, AgentflowError>;
}

/// Runs units by sending a prompt to a provider
pub struct ProviderUnitRunner {
    provider: Arc<dyn Provider>,
    task: String,
}

impl ProviderUnitRunner {
    pub fn new(provider: Arc<dyn Provider>, task: impl Into<String>) -> Self {
        Self {
            provider,
            task: task.into(),
        }
    }

    /// Unit prompt, then the run task, then each dependency output under its own header
    pub fn build_prompt(&self, node: &Node, dependencies: &[DependencyOutput]) -> String {
        let mut sections = vec![node.unit.prompt.trim_end().to_string()];

        if !self.task.is_empty() {
            sections.push(format!("Task: {}", self.task));
        }

        for dep in dependencies {
            sections.push(format!("## Output from {}\n\n{}", dep.name, dep.output));
        }

        sections.retain(|s| !s.is_empty());
        sections.join("\n\n")
    }
}

#[async_trait]
impl UnitRunner for ProviderUnitRunner {
    async fn run_unit(
        &self,
        node: &Node,
        dependencies: &[DependencyOutput],
        cancel: CancellationToken,
    ) -> Result<UnitOutput, AgentflowError> {
        let request = ProviderRequest {
            prompt: self.build_prompt(node, dependencies),
            system_prompt: node.unit.system_prompt.clone(),
            model: node.unit.model.clone(),
            temperature: node.unit.temperature,
            max_tokens: node.unit.max_tokens,
        };

        tracing::debug!(node = node.name(), provider = self.provider.name(), "calling provider");
        let response = self.provider.execute(&request, cancel).await?;

        Ok(UnitOutput {
            content: response.content,
            tokens_used: response.tokens_used.total,
            model: response.model,
        })
    }
}
