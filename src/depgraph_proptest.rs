//! Property-based tests for the variant dependency graph.

#[cfg(test)]
mod proptest_tests {
    use crate::depgraph::DepGraph;
    use crate::error::Error;
    use proptest::prelude::*;

    fn node(index: usize) -> String {
        format!("n{}", index)
    }

    /// Edges that only point from higher to lower indices, which can never
    /// form a cycle.
    fn acyclic_graph(edges: &[(usize, usize)]) -> DepGraph {
        let mut graph = DepGraph::new();
        for (from, to) in edges {
            if from > to {
                graph.add_edge(&node(*from), &node(*to));
            }
        }
        graph
    }

    proptest! {
        /// Property: dependencies are listed before everything that depends on them
        #[test]
        fn deps_precede_dependents(edges in prop::collection::vec((0usize..8, 0usize..8), 0..20)) {
            let graph = acyclic_graph(&edges);
            for root in 0..8 {
                let order = graph.get_deps(&node(root)).unwrap();
                for (position, name) in order.iter().enumerate() {
                    for dep in graph.direct_deps(name) {
                        let dep_position = order.iter().position(|n| n == dep);
                        prop_assert!(dep_position.is_some_and(|p| p < position));
                    }
                }
            }
        }

        /// Property: the root is never part of its own dependency list and no
        /// name appears twice
        #[test]
        fn deps_exclude_root_and_are_unique(edges in prop::collection::vec((0usize..8, 0usize..8), 0..20)) {
            let graph = acyclic_graph(&edges);
            for root in 0..8 {
                let order = graph.get_deps(&node(root)).unwrap();
                prop_assert!(!order.contains(&node(root)));

                let mut sorted = order.clone();
                sorted.sort();
                sorted.dedup();
                prop_assert_eq!(sorted.len(), order.len());
            }
        }

        /// Property: repeated queries return identical results
        #[test]
        fn get_deps_is_deterministic(edges in prop::collection::vec((0usize..8, 0usize..8), 0..20)) {
            let graph = acyclic_graph(&edges);
            for root in 0..8 {
                prop_assert_eq!(graph.get_deps(&node(root)).unwrap(), graph.get_deps(&node(root)).unwrap());
            }
        }

        /// Property: closing a chain back onto its start is always reported as a cycle
        #[test]
        fn closed_chain_is_a_cycle(length in 1usize..8) {
            let mut graph = DepGraph::new();
            for index in 0..length {
                graph.add_edge(&node(index), &node((index + 1) % length));
            }

            match graph.get_deps(&node(0)) {
                Err(Error::CycleDetected { cycle }) => {
                    prop_assert!(cycle.starts_with("n0 -> "));
                    prop_assert!(cycle.ends_with(" -> n0"));
                }
                other => prop_assert!(false, "Expected CycleDetected, got {:?}", other),
            }
        }
    }
}
