// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Plan definitions and dependency graph
//!
//! A plan is an ordered list of units (stages within one agent, or agents
//! within a multi-agent run) with declared dependencies, parallel eligibility
//! and optional run conditions.

mod condition;
mod definition;
mod graph;
mod validation;

pub use condition::{Condition, SKIPPED_SENTINEL};
pub use definition::*;
pub use graph::{DependencyGraph, Node};
pub use validation::{PlanValidator, ValidationResult};
