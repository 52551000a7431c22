// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for agentflow.

pub mod graph;
pub mod resume;
pub mod run;
pub mod runs;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::checkpoint::{FilesystemCheckpointStore, RunStatus};
use crate::config::AgentflowConfig;
use crate::errors::{AgentflowError, RecoverySuggestion};
use crate::plan::{DependencyGraph, PlanDefinition};

/// Default plan file name
pub const DEFAULT_PLAN: &str = "agentflow.yaml";

/// Multi-agent task orchestrator
///
/// Run dependent AI units concurrently, with checkpoints you can resume.
#[derive(Parser, Debug)]
#[clap(
    name = "agentflow",
    version,
    about = "Dependency-aware orchestrator for multi-agent AI tasks",
    long_about = None,
    after_help = "Examples:\n\
        agentflow validate              Check agentflow.yaml\n\
        agentflow run --max-concurrent 2\n\
        agentflow runs list --status failed\n\
        agentflow resume <RUN_ID>       Continue a failed or interrupted run\n\n\
        See 'agentflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Checkpoint root (overrides agentflow.toml)
    #[clap(long, global = true, value_name = "DIR", env = "AGENTFLOW_CHECKPOINT_DIR")]
    pub checkpoint_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a plan
    Run {
        /// Plan file
        #[clap(default_value = DEFAULT_PLAN)]
        plan: PathBuf,

        /// Maximum units running at once within a level
        #[clap(long, value_name = "N")]
        max_concurrent: Option<usize>,

        /// Keep running independent units after a failure
        #[clap(long)]
        continue_on_failure: bool,

        /// Do not write a checkpoint for this run
        #[clap(long)]
        no_checkpoint: bool,

        /// Show the execution plan without running anything
        #[clap(long)]
        dry_run: bool,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Resume a checkpointed run
    Resume {
        /// Run id printed when the run started
        run_id: String,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a plan as a graph
    Graph {
        /// Plan file
        #[clap(default_value = DEFAULT_PLAN)]
        plan: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Validate a plan
    Validate {
        /// Plan file to validate
        #[clap(default_value = DEFAULT_PLAN)]
        plan: PathBuf,
    },

    /// Inspect and manage checkpointed runs
    Runs {
        #[clap(subcommand)]
        action: RunsAction,
    },
}

/// Run management actions
#[derive(Subcommand, Debug, Clone)]
pub enum RunsAction {
    /// List runs, most recently updated first
    List {
        /// Only runs with this status (in_progress, completed, failed)
        #[clap(short, long)]
        status: Option<RunStatus>,

        /// Only runs of this agent
        #[clap(short, long)]
        agent: Option<String>,

        /// Show at most N runs
        #[clap(short, long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Show one run
    Show {
        run_id: String,

        /// List every stage with its status
        #[clap(long)]
        stages: bool,

        /// List stored artifacts
        #[clap(long)]
        artifacts: bool,
    },

    /// Delete a run
    Delete {
        run_id: String,

        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },

    /// Delete runs not updated recently
    Cleanup {
        /// Retention in days (defaults to checkpoint.cleanup_after_days)
        #[clap(long)]
        days: Option<u32>,
    },
}

/// Output format for run results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Settings shared by every command
pub struct Context {
    pub verbose: bool,
    pub project_dir: PathBuf,
    pub config: AgentflowConfig,
    pub checkpoint_root: PathBuf,
}

impl Context {
    /// Load configuration for the current directory
    pub fn load(verbose: bool, checkpoint_dir: Option<PathBuf>) -> miette::Result<Self> {
        let project_dir = std::env::current_dir()
            .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
        let config = AgentflowConfig::load(&project_dir)?;

        let checkpoint_root = match checkpoint_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => project_dir.join(dir),
            None => config.checkpoint_root(&project_dir),
        };

        Ok(Self {
            verbose,
            project_dir,
            config,
            checkpoint_root,
        })
    }

    /// Checkpoint store at the configured root
    pub fn store(&self) -> FilesystemCheckpointStore {
        FilesystemCheckpointStore::new(&self.checkpoint_root)
    }
}

/// Print any recovery hint for an error, then convert it for `main`
pub fn report(err: AgentflowError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&err) {
        eprintln!("{}", suggestion);
    }
    err.into()
}

/// Load a plan and build its graph
pub fn load_plan(path: &Path) -> miette::Result<(PlanDefinition, DependencyGraph)> {
    let plan = PlanDefinition::from_file(path).map_err(report)?;
    let graph = DependencyGraph::from_plan(&plan).map_err(report)?;
    Ok((plan, graph))
}
