// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Utility modules
//!
//! Terminal helpers for the agentflow CLI.

pub mod format;
pub mod progress;

pub use format::*;
pub use progress::*;
