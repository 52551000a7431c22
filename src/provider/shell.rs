// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Shell provider
//!
//! Runs a configured command through a shell, writing the prompt to its stdin
//! and reading the completion from its stdout.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::{estimate_tokens, FinishReason, Provider, ProviderRequest, ProviderResponse, TokenUsage};
use crate::config::ProviderConfig;
use crate::errors::AgentflowError;

/// Shell provider
pub struct ShellProvider {
    command: String,
    shell: String,
    timeout: Option<Duration>,
    default_model: Option<String>,
}

impl ShellProvider {
    /// Create a provider running `command` through `bash`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: "bash".to_string(),
            timeout: None,
            default_model: None,
        }
    }

    /// Create a provider from configuration
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            command: config.command.clone(),
            shell: config.shell.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
            default_model: config.model.clone(),
        }
    }

    /// Set a per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_command(&self, request: &ProviderRequest) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(model) = request.model.as_ref().or(self.default_model.as_ref()) {
            cmd.env("AGENTFLOW_MODEL", model);
        }
        if let Some(system) = &request.system_prompt {
            cmd.env("AGENTFLOW_SYSTEM_PROMPT", system);
        }
        if let Some(temperature) = request.temperature {
            cmd.env("AGENTFLOW_TEMPERATURE", temperature.to_string());
        }
        if let Some(max_tokens) = request.max_tokens {
            cmd.env("AGENTFLOW_MAX_TOKENS", max_tokens.to_string());
        }

        cmd
    }

    async fn wait(&self, child: Child) -> Result<Output, AgentflowError> {
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| AgentflowError::ProviderTimeout {
                    provider: self.name().to_string(),
                    seconds: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        };

        output.map_err(|e| AgentflowError::ProviderFailed {
            provider: self.name().to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Provider for ShellProvider {
    fn name(&self) -> &str {
        "shell"
    }

    async fn execute(
        &self,
        request: &ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, AgentflowError> {
        let start = Instant::now();

        let mut child = self
            .build_command(request)
            .spawn()
            .map_err(|e| AgentflowError::ProviderUnavailable {
                provider: self.name().to_string(),
                reason: format!("failed to start '{}': {}", self.shell, e),
            })?;

        // Feed stdin from a separate task so a chatty child cannot deadlock us
        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.prompt.clone().into_bytes();
            tokio::spawn(async move {
                let _ = stdin.write_all(&prompt).await;
                let _ = stdin.shutdown().await;
            });
        }

        // Dropping the wait future kills the child (kill_on_drop)
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(command = %self.command, "provider call cancelled");
                return Err(AgentflowError::Cancelled);
            }
            output = self.wait(child) => output?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let message = if stderr.is_empty() {
                match output.status.code() {
                    Some(code) => format!("command exited with status {}", code),
                    None => "command terminated by signal".to_string(),
                }
            } else {
                stderr
            };

            return Err(AgentflowError::ProviderFailed {
                provider: self.name().to_string(),
                message,
            });
        }

        let content = stdout.trim_end().to_string();
        let tokens_used = TokenUsage::new(estimate_tokens(&request.prompt), estimate_tokens(&content));

        Ok(ProviderResponse {
            content,
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
            finish_reason: FinishReason::Stop,
            model: request.model.clone().or_else(|| self.default_model.clone()),
        })
    }

    async fn check_available(&self) -> Result<bool, AgentflowError> {
        if which::which(&self.shell).is_err() {
            return Ok(false);
        }

        let program = self.command.split_whitespace().next().unwrap_or_default();
        if program.is_empty() {
            return Ok(false);
        }

        // Shell builtins and paths are left to the shell to resolve
        Ok(program.contains('/') || which::which(program).is_ok() || is_builtin(program))
    }
}

fn is_builtin(program: &str) -> bool {
    matches!(program, "echo" | "printf" | "exit" | "read" | "true" | "false" | ":")
}
