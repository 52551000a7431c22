// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! # agentflow - Multi-Agent Task Orchestrator
//!
//! `agentflow` runs units of AI work (stages of one agent, or agents of a
//! multi-agent run) in dependency order, concurrently where allowed, and keeps
//! integrity-checked checkpoints so a run can be inspected or resumed.
//!
//! ## Features
//!
//! - **Dependency graph** - Cycle detection and diagnostic levels before anything runs
//! - **Bounded concurrency** - Parallel units share a counting semaphore per level
//! - **Failure containment** - Abort on first failure, or keep independent branches going
//! - **Checkpoints** - Checksummed, versioned snapshots with atomic writes
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a plan
//! agentflow validate agentflow.yaml
//!
//! # Run it, two units at a time
//! agentflow run --max-concurrent 2
//!
//! # Pick up where a failed run stopped
//! agentflow resume <RUN_ID>
//! ```

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod plan;
pub mod provider;
pub mod utils;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, CheckpointStore, FilesystemCheckpointStore, RunId};
pub use engine::{ExecutionEngine, ExecutionOptions, ExecutionResult, PlanResult, UnitRunner};
pub use errors::{AgentflowError, AgentflowResult};
pub use plan::{DependencyGraph, PlanDefinition, UnitSpec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
