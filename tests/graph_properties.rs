// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

use proptest::prelude::*;

use agentflow::plan::{DependencyGraph, UnitSpec};
use agentflow::AgentflowError;

// Acyclic by construction: unit N may only depend on units 0..N-1. The
// declaration order is then shuffled so dependents often precede their
// dependencies.
fn acyclic_units(max_units: usize) -> impl Strategy<Value = Vec<UnitSpec>> {
    (1..=max_units).prop_flat_map(|count| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), count), count)
            .prop_map(move |adjacency| {
                (0..count)
                    .map(|i| {
                        let deps = (0..i)
                            .filter(|&j| adjacency[i][j])
                            .map(|j| format!("unit_{}", j));
                        UnitSpec::new(format!("unit_{}", i), "go").after(deps)
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    })
}

proptest! {
    #[test]
    fn levels_follow_longest_dependency_path(units in acyclic_units(12)) {
        let graph = DependencyGraph::build(&units).unwrap();
        prop_assert_eq!(graph.len(), units.len());

        for node in graph.nodes() {
            let expected = node
                .dependencies()
                .iter()
                .map(|dep| graph.node(dep).unwrap().level + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(node.level, expected, "level of {}", node.name());
            prop_assert!(node.level < units.len());
        }
    }

    #[test]
    fn levels_partition_every_node_once(units in acyclic_units(12)) {
        let graph = DependencyGraph::build(&units).unwrap();
        let levels = graph.levels();

        let total: usize = levels.iter().map(|level| level.len()).sum();
        prop_assert_eq!(total, graph.len());
        prop_assert_eq!(levels.len(), graph.max_level() + 1);

        for (depth, level) in levels.iter().enumerate() {
            prop_assert!(!level.is_empty());
            for node in level {
                prop_assert_eq!(node.level, depth);
            }
            let indices: Vec<usize> = level.iter().map(|n| n.index).collect();
            let mut sorted = indices.clone();
            sorted.sort_unstable();
            prop_assert_eq!(indices, sorted);
        }
    }

    #[test]
    fn back_edge_is_reported_as_cycle(count in 1usize..12) {
        let mut units: Vec<UnitSpec> = (0..count)
            .map(|i| {
                let unit = UnitSpec::new(format!("unit_{}", i), "go");
                if i == 0 {
                    unit
                } else {
                    unit.after([format!("unit_{}", i - 1)])
                }
            })
            .collect();
        units[0] = units[0].clone().after([format!("unit_{}", count - 1)]);

        match DependencyGraph::build(&units) {
            Err(AgentflowError::CyclicDependency { cycle_nodes, .. }) => {
                prop_assert!(!cycle_nodes.is_empty());
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|g| g.len())),
        }
    }
}
