//! # Variant Dependency Graph
//!
//! A small directed graph keyed by variant name. Two independent instances
//! are kept per configuration: one for `includes` (configuration
//! inheritance) and one for data dependencies (`copies`, requirements and
//! mounts that reference another variant's output).
//!
//! ## Ordering
//!
//! [`DepGraph::get_deps`] performs a depth-first, post-order traversal from
//! the requested root. Dependencies are visited in the order their edges were
//! added, and each node is emitted after all of its own dependencies. The
//! result therefore lists dependencies before dependents, never contains the
//! root itself, and is identical for repeated calls.
//!
//! ## Cycles
//!
//! The traversal keeps the current path on a stack. Reaching a node that is
//! already on the path fails immediately with [`Error::CycleDetected`], whose
//! message shows the offending chain (e.g. `a -> b -> a`).

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};

/// Directed graph of variant names to the names they depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `from` depends on `to`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let deps = self.edges.entry(from.to_string()).or_default();
        if !deps.iter().any(|dep| dep == to) {
            deps.push(to.to_string());
        }
    }

    /// Direct dependencies of `node`, in insertion order.
    pub fn direct_deps(&self, node: &str) -> &[String] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the transitive dependencies of `root`, dependencies first.
    pub fn get_deps(&self, root: &str) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        self.visit(root, &mut path, &mut visited, &mut order)?;

        // The root is emitted last by the post-order walk
        order.pop();
        Ok(order)
    }

    fn visit(
        &self,
        node: &str,
        path: &mut Vec<String>,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(start) = path.iter().position(|entry| entry == node) {
            let mut cycle = path[start..].to_vec();
            cycle.push(node.to_string());
            return Err(Error::CycleDetected {
                cycle: cycle.join(" -> "),
            });
        }

        if visited.contains(node) {
            return Ok(());
        }

        path.push(node.to_string());
        for dep in self.direct_deps(node) {
            self.visit(dep, path, visited, order)?;
        }
        path.pop();

        visited.insert(node.to_string());
        order.push(node.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_deps_linear_chain() {
        let mut graph = DepGraph::new();
        graph.add_edge("prod", "test");
        graph.add_edge("test", "build");

        assert_eq!(graph.get_deps("prod").unwrap(), vec!["build", "test"]);
        assert_eq!(graph.get_deps("test").unwrap(), vec!["build"]);
        assert!(graph.get_deps("build").unwrap().is_empty());
    }

    #[test]
    fn test_get_deps_unknown_root_is_empty() {
        let graph = DepGraph::new();
        assert!(graph.get_deps("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_get_deps_diamond_visits_shared_dep_once() {
        let mut graph = DepGraph::new();
        graph.add_edge("app", "left");
        graph.add_edge("app", "right");
        graph.add_edge("left", "base");
        graph.add_edge("right", "base");

        assert_eq!(
            graph.get_deps("app").unwrap(),
            vec!["base", "left", "right"]
        );
    }

    #[test]
    fn test_get_deps_excludes_unreachable_nodes() {
        let mut graph = DepGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("x", "y");

        assert_eq!(graph.get_deps("a").unwrap(), vec!["b"]);
    }

    #[test]
    fn test_get_deps_follows_insertion_order() {
        let mut graph = DepGraph::new();
        graph.add_edge("root", "zeta");
        graph.add_edge("root", "alpha");
        graph.add_edge("root", "zeta");

        assert_eq!(graph.direct_deps("root"), ["zeta", "alpha"]);
        assert_eq!(graph.get_deps("root").unwrap(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_cycle_reports_chain() {
        let mut graph = DepGraph::new();
        graph.add_edge("foo", "bar");
        graph.add_edge("bar", "baz");
        graph.add_edge("baz", "foo");

        match graph.get_deps("foo") {
            Err(Error::CycleDetected { cycle }) => {
                assert_eq!(cycle, "foo -> bar -> baz -> foo");
            }
            other => panic!("Expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut graph = DepGraph::new();
        graph.add_edge("prod", "prod");

        match graph.get_deps("prod") {
            Err(Error::CycleDetected { cycle }) => assert_eq!(cycle, "prod -> prod"),
            other => panic!("Expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_below_root_is_detected() {
        let mut graph = DepGraph::new();
        graph.add_edge("root", "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");

        match graph.get_deps("root") {
            Err(Error::CycleDetected { cycle }) => assert_eq!(cycle, "a -> b -> a"),
            other => panic!("Expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_get_deps_is_repeatable() {
        let mut graph = DepGraph::new();
        graph.add_edge("prod", "build");
        graph.add_edge("prod", "assets");
        graph.add_edge("assets", "build");

        let first = graph.get_deps("prod").unwrap();
        let second = graph.get_deps("prod").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["build", "assets"]);
    }
}
