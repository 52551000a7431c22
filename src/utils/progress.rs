// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Progress reporting
//!
//! A progress bar that doubles as a checkpoint sink, so every recorded
//! result both advances the bar and reaches the checkpoint.

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use super::format::status_line;
use crate::checkpoint::CheckpointSink;
use crate::engine::ExecutionResult;
use crate::errors::AgentflowError;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a progress bar counting finished units
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .expect("Invalid progress bar template")
            .progress_chars("█▓░"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Prints each result above a progress bar, then forwards it
pub struct ProgressSink {
    bar: ProgressBar,
    echo: bool,
    inner: Option<Arc<dyn CheckpointSink>>,
}

impl ProgressSink {
    pub fn new(bar: ProgressBar, inner: Option<Arc<dyn CheckpointSink>>) -> Self {
        Self {
            bar,
            echo: true,
            inner,
        }
    }

    /// A sink that draws nothing, for machine-readable output
    pub fn hidden(inner: Option<Arc<dyn CheckpointSink>>) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            echo: false,
            inner,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[async_trait]
impl CheckpointSink for ProgressSink {
    async fn record(&self, result: &ExecutionResult) -> Result<(), AgentflowError> {
        let line = match (&result.error, result.skipped) {
            (Some(error), _) => format!("  {} {} - {}", "✗".red(), result.name.bold(), error.dimmed()),
            (None, true) => format!("  {} {} (skipped)", "○".dimmed(), result.name.dimmed()),
            (None, false) => format!(
                "  {} {} {}",
                "✓".green(),
                result.name.bold(),
                format!("({})", status_line(result.duration_ms, result.tokens_used)).dimmed()
            ),
        };
        if self.echo {
            // A bar with no terminal to draw on drops its println output
            if self.bar.is_hidden() {
                println!("{}", line);
            } else {
                self.bar.println(line);
            }
        }
        self.bar.inc(1);

        match &self.inner {
            Some(inner) => inner.record(result).await,
            None => Ok(()),
        }
    }
}
