// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Graph command - visualize a plan's dependency graph

use miette::Result;
use std::path::PathBuf;

use super::{load_plan, GraphFormat};

/// Run the graph command
pub async fn run(plan_path: PathBuf, format: GraphFormat) -> Result<()> {
    if !plan_path.exists() {
        return Err(miette::miette!(
            "Plan file not found: {}",
            plan_path.display()
        ));
    }

    let (_, graph) = load_plan(&plan_path)?;

    let output = match format {
        GraphFormat::Text => graph.to_text(),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }

    Ok(())
}
