// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Execution results

use serde::{Deserialize, Serialize};

use super::Timeline;
use crate::plan::{Node, SKIPPED_SENTINEL};

/// Outcome of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub name: String,
    pub index: usize,
    pub output: String,
    pub duration_ms: u64,
    pub tokens_used: u64,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Skipped because its condition was false
    #[serde(default)]
    pub skipped: bool,
}

impl ExecutionResult {
    /// Result for a unit whose condition evaluated to false
    pub fn skipped(node: &Node) -> Self {
        Self {
            name: node.name().to_string(),
            index: node.index,
            output: SKIPPED_SENTINEL.to_string(),
            duration_ms: 0,
            tokens_used: 0,
            success: true,
            error: None,
            model: None,
            skipped: true,
        }
    }

    /// Failed result without output
    pub fn failed(node: &Node, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: node.name().to_string(),
            index: node.index,
            output: String::new(),
            duration_ms,
            tokens_used: 0,
            success: false,
            error: Some(error.into()),
            model: None,
            skipped: false,
        }
    }

    /// Output that may be handed to dependents
    pub fn usable_output(&self) -> Option<&str> {
        (self.success && !self.skipped && self.output != SKIPPED_SENTINEL).then_some(self.output.as_str())
    }
}

/// Aggregate result of executing a plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    /// Results in completion order
    pub results: Vec<ExecutionResult>,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
    /// Every non-skipped result succeeded and the run was not cancelled
    pub success: bool,
    /// Declaration index of the first unit to fail
    pub first_failed_index: Option<usize>,
    pub final_output: String,
    pub cancelled: bool,
    pub timeline: Timeline,
}

impl PlanResult {
    pub fn result(&self, name: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Names in completion order
    pub fn completion_order(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// `## <name>` sections for every usable output, in completion order
pub(crate) fn assemble_final_output(results: &[ExecutionResult]) -> String {
    results
        .iter()
        .filter_map(|r| r.usable_output().map(|output| format!("## {}\n\n{}", r.name, output)))
        .collect::<Vec<_>>()
        .join("\n\n")
}
