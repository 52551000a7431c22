// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Validate command - check a plan without running it

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::plan::{DependencyGraph, PlanDefinition, PlanValidator};

/// Run the validate command
pub async fn run(plan_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating plan...".bold());
    println!();

    if !plan_path.exists() {
        return Err(miette::miette!(
            "Plan file not found: {}",
            plan_path.display()
        ));
    }

    let plan = match PlanDefinition::from_file(&plan_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to parse plan", "✗".red());
            eprintln!();
            return Err(miette::miette!("Parse error: {}", e));
        }
    };

    println!("  {} Plan file is valid YAML", "✓".green());

    let validation = PlanValidator::validate(&plan);

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose && validation.is_valid() {
        if let Ok(graph) = DependencyGraph::from_plan(&plan) {
            println!();
            println!("{}:", "Plan summary".bold());
            println!("  Name: {}", plan.label());
            println!("  Units: {}", graph.len());
            println!("  Levels: {}", graph.max_level() + 1);
            for line in graph.to_text().lines() {
                println!("    {}", line.dimmed());
            }
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Plan validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Plan is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Plan is valid!".green().bold());
    }
    Ok(())
}
