// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Configuration loading
//!
//! Load project or user configuration from agentflow.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::AgentflowError;

/// Configuration file name
pub const CONFIG_FILE: &str = "agentflow.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentflowConfig {
    /// Checkpoint settings
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Default execution policy
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Checkpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Write checkpoints for runs
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Checkpoint root directory
    #[serde(default = "default_checkpoint_dir")]
    pub directory: PathBuf,

    /// Retention for the cleanup sweep, measured from a run's last update
    #[serde(default = "default_cleanup_after_days")]
    pub cleanup_after_days: u32,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_checkpoint_dir(),
            cleanup_after_days: default_cleanup_after_days(),
        }
    }
}

/// Default execution policy, overridden by the plan and then by CLI flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    #[serde(default)]
    pub continue_on_failure: bool,
}

/// Provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Command that reads a prompt on stdin and writes the completion to stdout
    #[serde(default = "default_provider_command")]
    pub command: String,

    /// Shell used to run the command
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Per-call timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Default model passed to the command
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: default_provider_command(),
            shell: default_shell(),
            timeout_secs: None,
            model: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".agentflow/checkpoints")
}

fn default_cleanup_after_days() -> u32 {
    7
}

fn default_provider_command() -> String {
    "cat".to_string()
}

fn default_shell() -> String {
    "bash".to_string()
}

impl AgentflowConfig {
    /// Load configuration for a project directory.
    ///
    /// Looks for `agentflow.toml` in the directory, then in the user config
    /// directory; falls back to defaults.
    pub fn load(project_dir: &Path) -> Result<Self, AgentflowError> {
        let project_file = project_dir.join(CONFIG_FILE);
        if project_file.exists() {
            return Self::from_file(&project_file);
        }

        if let Some(user_file) = Self::user_config_path() {
            if user_file.exists() {
                return Self::from_file(&user_file);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self, AgentflowError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AgentflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        let config: Self = toml::from_str(&content).map_err(|e| AgentflowError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Location of the per-user configuration file
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "agentflow")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Resolve the checkpoint root against a project directory
    pub fn checkpoint_root(&self, project_dir: &Path) -> PathBuf {
        if self.checkpoint.directory.is_absolute() {
            self.checkpoint.directory.clone()
        } else {
            project_dir.join(&self.checkpoint.directory)
        }
    }

    fn validate(&self, path: &Path) -> Result<(), AgentflowError> {
        if self.execution.max_concurrent == Some(0) {
            return Err(AgentflowError::Config {
                path: path.to_path_buf(),
                message: "execution.max_concurrent must be at least 1".into(),
            });
        }

        if self.provider.command.trim().is_empty() {
            return Err(AgentflowError::Config {
                path: path.to_path_buf(),
                message: "provider.command is empty".into(),
            });
        }

        Ok(())
    }
}
