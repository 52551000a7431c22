// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Plan validation
//!
//! Collects every problem in a plan up front instead of stopping at the first
//! fatal graph error, and adds advisory warnings.

use std::collections::HashSet;

use crate::errors::AgentflowError;
use crate::plan::{Condition, DependencyGraph, PlanDefinition};

/// Plan validator
pub struct PlanValidator;

impl PlanValidator {
    /// Validate a plan definition
    pub fn validate(plan: &PlanDefinition) -> ValidationResult {
        let mut result = ValidationResult::new();

        if plan.units.is_empty() {
            result.add_error("Plan has no units defined");
            return result;
        }

        if plan.execution.max_concurrent == Some(0) {
            result.add_error("execution.max_concurrent must be at least 1");
        }

        let names: HashSet<&str> = plan.units.iter().map(|u| u.name.as_str()).collect();

        let mut seen = HashSet::new();
        for (idx, unit) in plan.units.iter().enumerate() {
            if unit.name.trim().is_empty() {
                result.add_error(&format!("Unit #{} has an empty name", idx + 1));
                continue;
            }

            if !seen.insert(unit.name.as_str()) {
                result.add_error(&format!("Duplicate unit name: '{}'", unit.name));
            }

            for dep in &unit.dependencies {
                if *dep == unit.name {
                    result.add_error(&format!("Unit '{}' depends on itself", unit.name));
                } else if !names.contains(dep.as_str()) {
                    result.add_error(&format!(
                        "Unit '{}' depends on unknown unit '{}'",
                        unit.name, dep
                    ));
                }
            }

            if unit.prompt.trim().is_empty() {
                result.add_warning(&format!("Unit '{}': prompt is empty", unit.name));
            }

            if let Some(raw) = &unit.condition {
                match Condition::parse(raw) {
                    None => result.add_error(&format!(
                        "Unit '{}': unsupported condition '{}'",
                        unit.name, raw
                    )),
                    Some(Condition::NodeSuccess(target)) if !names.contains(target.as_str()) => {
                        result.add_error(&format!(
                            "Unit '{}': condition refers to unknown unit '{}'",
                            unit.name, target
                        ))
                    }
                    Some(Condition::NodeSuccess(target)) if !unit.dependencies.contains(&target) => {
                        result.add_warning(&format!(
                            "Unit '{}': condition refers to '{}' which is not a dependency; \
                             its result may not exist yet when the condition is evaluated",
                            unit.name, target
                        ))
                    }
                    Some(Condition::PreviousSuccess) if unit.dependencies.is_empty() => result
                        .add_warning(&format!(
                            "Unit '{}': 'previous.success' on a unit without dependencies \
                             is true when nothing has run yet",
                            unit.name
                        )),
                    _ => {}
                }
            }
        }

        if !result.is_valid() {
            return result;
        }

        match DependencyGraph::from_plan(plan) {
            Ok(graph) => Self::check_parallel_siblings(&graph, &mut result),
            Err(AgentflowError::CyclicDependency { cycle_nodes, .. }) => {
                result.add_error(&format!(
                    "Cyclic dependency closed at: {}",
                    cycle_nodes.join(", ")
                ));
            }
            Err(e) => result.add_error(&format!("Graph validation error: {}", e)),
        }

        result
    }

    /// Warn about parallel units that have nothing to run alongside
    fn check_parallel_siblings(graph: &DependencyGraph, result: &mut ValidationResult) {
        for level in graph.levels() {
            let parallel: Vec<_> = level.iter().filter(|n| n.is_parallel()).collect();
            if parallel.len() == 1 {
                result.add_warning(&format!(
                    "Unit '{}' is marked parallel but has no parallel siblings at level {}",
                    parallel[0].name(),
                    parallel[0].level
                ));
            }
        }
    }
}

/// Result of plan validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
