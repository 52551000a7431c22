// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Dependency graph for plan units
//!
//! Validates declared dependencies, detects every cycle before anything runs
//! and assigns each unit a diagnostic level (longest path from a root).

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use crate::errors::AgentflowError;
use crate::plan::{Condition, PlanDefinition, UnitSpec};

/// A schedulable unit with its computed level
#[derive(Debug, Clone)]
pub struct Node {
    /// Position in the declared unit list
    pub index: usize,
    /// `0` without dependencies, else `1 + max(level of dependencies)`
    pub level: usize,
    /// Parsed run condition
    pub condition: Option<Condition>,
    /// The declared unit
    pub unit: UnitSpec,
}

impl Node {
    /// Unit name
    pub fn name(&self) -> &str {
        &self.unit.name
    }

    /// Direct dependencies, in declaration order without duplicates
    pub fn dependencies(&self) -> &[String] {
        &self.unit.dependencies
    }

    /// Whether the engine may run this unit alongside its level siblings
    pub fn is_parallel(&self) -> bool {
        self.unit.parallel
    }
}

/// Validated, levelled dependency graph
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph from a plan definition
    pub fn from_plan(plan: &PlanDefinition) -> Result<Self, AgentflowError> {
        Self::build(&plan.units)
    }

    /// Build a graph from declared units
    pub fn build(units: &[UnitSpec]) -> Result<Self, AgentflowError> {
        if units.is_empty() {
            return Err(AgentflowError::EmptyPlan);
        }

        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();

        for (idx, unit) in units.iter().enumerate() {
            if unit.name.trim().is_empty() {
                return Err(AgentflowError::InvalidNode {
                    index: idx,
                    reason: "name is empty".into(),
                });
            }

            let node = graph.add_node(idx);
            if name_to_index.insert(unit.name.clone(), node).is_some() {
                return Err(AgentflowError::DuplicateNodeName {
                    name: unit.name.clone(),
                });
            }
        }

        let mut nodes = Vec::with_capacity(units.len());
        let mut deps_by_index: Vec<Vec<usize>> = Vec::with_capacity(units.len());

        for (idx, unit) in units.iter().enumerate() {
            let mut seen = HashSet::new();
            let mut unit = unit.clone();
            unit.dependencies.retain(|d| seen.insert(d.clone()));

            let mut dep_indices = Vec::with_capacity(unit.dependencies.len());
            for dep in &unit.dependencies {
                let dep_node = name_to_index.get(dep).ok_or_else(|| {
                    AgentflowError::UnknownDependency {
                        node: unit.name.clone(),
                        dependency: dep.clone(),
                    }
                })?;

                graph.add_edge(*dep_node, name_to_index[&unit.name], ());
                dep_indices.push(graph[*dep_node]);
            }

            let condition = match &unit.condition {
                Some(raw) => Some(Self::parse_condition(&unit.name, raw, &name_to_index)?),
                None => None,
            };

            deps_by_index.push(dep_indices);
            nodes.push(Node {
                index: idx,
                level: 0,
                condition,
                unit,
            });
        }

        Self::detect_cycles(&nodes, &deps_by_index)?;
        Self::assign_levels(&mut nodes, &deps_by_index)?;

        Ok(Self {
            nodes,
            graph,
            name_to_index,
        })
    }

    fn parse_condition(
        node: &str,
        raw: &str,
        names: &HashMap<String, NodeIndex>,
    ) -> Result<Condition, AgentflowError> {
        let condition = Condition::parse(raw).ok_or_else(|| AgentflowError::InvalidCondition {
            node: node.to_string(),
            condition: raw.to_string(),
        })?;

        if let Some(target) = condition.target() {
            if target == node {
                return Err(AgentflowError::InvalidCondition {
                    node: node.to_string(),
                    condition: raw.to_string(),
                });
            }
            if !names.contains_key(target) {
                return Err(AgentflowError::UnknownConditionTarget {
                    node: node.to_string(),
                    target: target.to_string(),
                });
            }
        }

        Ok(condition)
    }

    /// Depth-first search from every node with `visiting`/`visited` sets.
    ///
    /// Uses an explicit stack so deep chains cannot exhaust the call stack.
    /// The traversal always runs to completion and reports every node that
    /// closed a cycle.
    fn detect_cycles(nodes: &[Node], deps: &[Vec<usize>]) -> Result<(), AgentflowError> {
        let mut visiting = vec![false; nodes.len()];
        let mut visited = vec![false; nodes.len()];
        let mut closers: Vec<usize> = Vec::new();

        for start in 0..nodes.len() {
            if visited[start] {
                continue;
            }

            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            visiting[start] = true;

            while let Some((current, next_child)) = stack.last_mut() {
                let current = *current;

                if let Some(&child) = deps[current].get(*next_child) {
                    *next_child += 1;

                    if visiting[child] {
                        if !closers.contains(&child) {
                            closers.push(child);
                        }
                    } else if !visited[child] {
                        visiting[child] = true;
                        stack.push((child, 0));
                    }
                } else {
                    visiting[current] = false;
                    visited[current] = true;
                    stack.pop();
                }
            }
        }

        match closers.first() {
            None => Ok(()),
            Some(&first) => Err(AgentflowError::CyclicDependency {
                node: nodes[first].name().to_string(),
                cycle_nodes: closers
                    .iter()
                    .map(|&i| nodes[i].name().to_string())
                    .collect(),
            }),
        }
    }

    /// Fixed-point relaxation bounded by `|nodes|` passes
    fn assign_levels(nodes: &mut [Node], deps: &[Vec<usize>]) -> Result<(), AgentflowError> {
        let mut levels = vec![0usize; nodes.len()];

        for _ in 0..nodes.len() {
            let mut changed = false;

            for (idx, node_deps) in deps.iter().enumerate() {
                let level = node_deps
                    .iter()
                    .map(|&d| levels[d] + 1)
                    .max()
                    .unwrap_or(0);

                if level != levels[idx] {
                    levels[idx] = level;
                    changed = true;
                }
            }

            if !changed {
                for (node, level) in nodes.iter_mut().zip(levels) {
                    node.level = level;
                }
                return Ok(());
            }
        }

        Err(AgentflowError::GraphInvariant {
            message: format!(
                "levels did not converge within {} passes",
                nodes.len()
            ),
        })
    }

    /// All nodes in declaration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes (never the case for a built graph)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.name_to_index
            .get(name)
            .map(|idx| &self.nodes[self.graph[*idx]])
    }

    /// Highest assigned level
    pub fn max_level(&self) -> usize {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }

    /// Nodes grouped by level, ascending; each group in declaration order
    pub fn levels(&self) -> Vec<Vec<&Node>> {
        let mut levels: Vec<Vec<&Node>> = vec![Vec::new(); self.max_level() + 1];
        for node in &self.nodes {
            levels[node.level].push(node);
        }
        levels
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, name: &str) -> Option<Vec<String>> {
        self.node(name).map(|n| n.dependencies().to_vec())
    }

    /// Nodes that directly depend on the given node, in declaration order
    pub fn dependents(&self, name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(name)?;
        let mut indices: Vec<usize> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        indices.sort_unstable();
        indices.dedup();

        Some(
            indices
                .into_iter()
                .map(|i| self.nodes[i].name().to_string())
                .collect(),
        )
    }

    /// Check if node A depends (directly or transitively) on node B
    pub fn depends_on(&self, node_a: &str, node_b: &str) -> bool {
        let Some(a) = self.name_to_index.get(node_a) else {
            return false;
        };
        let Some(b) = self.name_to_index.get(node_b) else {
            return false;
        };

        a != b && petgraph::algo::has_path_connecting(&self.graph, *b, *a, None)
    }

    /// Generate Mermaid diagram of the graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for node in &self.nodes {
            out.push_str(&format!("    {}[{}]\n", node.name(), node.name()));
        }

        for node in &self.nodes {
            for dep in node.dependencies() {
                out.push_str(&format!("    {} --> {}\n", dep, node.name()));
            }
        }

        out
    }

    /// Generate DOT diagram of the graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph plan {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in &self.nodes {
            for dep in node.dependencies() {
                out.push_str(&format!("    \"{}\" -> \"{}\";\n", dep, node.name()));
            }
        }

        for node in &self.nodes {
            let idx = self.name_to_index[node.name()];
            if self.graph.neighbors_undirected(idx).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", node.name()));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation ordered by level
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (i, node) in self.levels().into_iter().flatten().enumerate() {
            out.push_str(&format!("{}. {} (level {})", i + 1, node.name(), node.level));

            if !node.dependencies().is_empty() {
                out.push_str(&format!(" [depends: {}]", node.dependencies().join(", ")));
            }
            if node.is_parallel() {
                out.push_str(" [parallel]");
            }
            if let Some(condition) = &node.condition {
                out.push_str(&format!(" [when: {}]", condition));
            }

            out.push('\n');
        }

        out
    }
}
