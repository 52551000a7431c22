// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Provider boundary
//!
//! A provider turns a prompt into a completion. The engine never talks to a
//! provider directly; `ProviderUnitRunner` closes over one and is handed to
//! the engine, so no provider state is global.

mod shell;

pub use shell::ShellProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::AgentflowError;

/// A single completion request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Token accounting for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

/// Why a completion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Cancelled,
}

/// A completed provider call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content: String,
    pub tokens_used: TokenUsage,
    pub latency_ms: u64,
    pub finish_reason: FinishReason,
    /// Model that actually served the request, when known
    pub model: Option<String>,
}

/// Trait for completion providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name used in errors and logs
    fn name(&self) -> &str;

    /// Execute a request; an `Err` marks the unit as failed with its message
    async fn execute(
        &self,
        request: &ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, AgentflowError>;

    /// Check whether the provider can be reached
    async fn check_available(&self) -> Result<bool, AgentflowError>;
}

/// Rough token estimate (4 characters per token) for providers that do not
/// report usage
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
