// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Error types
//!
//! Graph-build and checkpoint-integrity errors are fatal for the operation
//! that raised them. Per-unit failures never surface here; the engine records
//! them in the unit's result instead.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for agentflow operations
pub type AgentflowResult<T> = Result<T, AgentflowError>;

/// Main error type for agentflow
#[derive(Error, Debug, Diagnostic)]
pub enum AgentflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Plan / Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Plan file not found: {path}")]
    #[diagnostic(
        code(agentflow::plan_not_found),
        help("Pass a plan file explicitly or create agentflow.yaml in the current directory")
    )]
    PlanNotFound { path: PathBuf },

    #[error("Plan has no units")]
    #[diagnostic(
        code(agentflow::empty_plan),
        help("Declare at least one entry under 'units'")
    )]
    EmptyPlan,

    #[error("Unit #{index} is invalid: {reason}")]
    #[diagnostic(code(agentflow::invalid_node))]
    InvalidNode { index: usize, reason: String },

    #[error("Duplicate unit name '{name}'")]
    #[diagnostic(
        code(agentflow::duplicate_node_name),
        help("Unit names must be unique within a plan")
    )]
    DuplicateNodeName { name: String },

    #[error("Unit '{node}' depends on unknown unit '{dependency}'")]
    #[diagnostic(
        code(agentflow::unknown_dependency),
        help("Check that '{dependency}' is declared in the same plan")
    )]
    UnknownDependency { node: String, dependency: String },

    #[error("Cyclic dependency detected at unit '{node}'")]
    #[diagnostic(
        code(agentflow::cyclic_dependency),
        help("Review unit dependencies; run 'agentflow graph' to visualise them")
    )]
    CyclicDependency {
        node: String,
        /// Every unit that closed a cycle during the full traversal
        cycle_nodes: Vec<String>,
    },

    #[error("Unit '{node}' has an invalid condition '{condition}'")]
    #[diagnostic(
        code(agentflow::invalid_condition),
        help("Supported conditions: 'previous.success' or '<unit>.success'")
    )]
    InvalidCondition { node: String, condition: String },

    #[error("Unit '{node}' has a condition on unknown unit '{target}'")]
    #[diagnostic(code(agentflow::unknown_condition_target))]
    UnknownConditionTarget { node: String, target: String },

    #[error("Graph invariant violated: {message}")]
    #[diagnostic(code(agentflow::graph_invariant))]
    GraphInvariant { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoint Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid run id format: '{run_id}'")]
    #[diagnostic(
        code(agentflow::invalid_run_id),
        help("Run ids are canonical UUIDs, e.g. 3f2b8c1e-7d4a-4e0b-9c6f-2a1d5e8b7c90")
    )]
    InvalidRunIdFormat { run_id: String },

    #[error("No checkpoint found for run '{run_id}'")]
    #[diagnostic(
        code(agentflow::checkpoint_not_found),
        help("List available runs with 'agentflow runs list'")
    )]
    CheckpointNotFound { run_id: String },

    #[error("Checkpoint for run '{run_id}' failed its integrity check")]
    #[diagnostic(code(agentflow::checksum_mismatch))]
    ChecksumMismatch {
        run_id: String,
        expected: String,
        actual: String,
    },

    #[error("Checkpoint for run '{run_id}' uses schema version {found}, supported: {supported}")]
    #[diagnostic(code(agentflow::incompatible_schema_version))]
    IncompatibleSchemaVersion {
        run_id: String,
        found: u64,
        supported: String,
    },

    #[error("Checkpoint for run '{run_id}' is missing required field '{field}'")]
    #[diagnostic(code(agentflow::missing_checkpoint_field))]
    MissingCheckpointField { run_id: String, field: String },

    #[error("Checkpoint for run '{run_id}' is corrupt: {reason}")]
    #[diagnostic(code(agentflow::corrupt_checkpoint))]
    CorruptCheckpoint { run_id: String, reason: String },

    #[error("Invalid artifact name '{name}'")]
    #[diagnostic(
        code(agentflow::invalid_artifact_name),
        help("Artifact names may not contain path separators or '..'")
    )]
    InvalidArtifactName { name: String },

    #[error("Checkpoint store error: {message}")]
    #[diagnostic(code(agentflow::checkpoint_io))]
    CheckpointIo { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Provider Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Displays the provider's message unchanged so unit results keep it verbatim
    #[error("{message}")]
    #[diagnostic(code(agentflow::provider_failed))]
    ProviderFailed { provider: String, message: String },

    #[error("Provider '{provider}' timed out after {seconds}s")]
    #[diagnostic(code(agentflow::provider_timeout))]
    ProviderTimeout { provider: String, seconds: u64 },

    #[error("Provider '{provider}' is not available: {reason}")]
    #[diagnostic(code(agentflow::provider_unavailable))]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Execution cancelled")]
    #[diagnostic(code(agentflow::cancelled))]
    Cancelled,

    #[error("Unit task did not complete: {message}")]
    #[diagnostic(code(agentflow::unit_task_failed))]
    UnitTaskFailed { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Config / IO Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration in '{path}': {message}")]
    #[diagnostic(code(agentflow::config_error))]
    Config { path: PathBuf, message: String },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(agentflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(agentflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(agentflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(agentflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(agentflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for AgentflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for AgentflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for AgentflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for AgentflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl AgentflowError {
    /// Wrap a filesystem failure from the checkpoint store with context
    pub fn checkpoint_io(context: &str, err: impl std::fmt::Display) -> Self {
        Self::CheckpointIo {
            message: format!("{}: {}", context, err),
        }
    }
}
