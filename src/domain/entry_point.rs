//! Entry Point Detection Module
//!
//! Selects the root set used to bound whole-graph output by distance from
//! program entry points.

use crate::domain::callgraph::CallGraph;
use petgraph::graph::NodeIndex;

/// A detected entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub node: NodeIndex,
    pub kind: EntryPointKind,
}

/// Classification of entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointKind {
    /// Declared by the graph builder.
    Declared,
    /// Free function named `main`.
    Main,
    /// Module initializer (`init`, `init#N`).
    Initializer,
    /// No incoming edges; used only when nothing else is found.
    Orphan,
}

/// Root set selection over a built graph.
pub struct EntryPointDetector;

impl EntryPointDetector {
    /// Declared roots win; otherwise detected entry points; otherwise every
    /// node nobody calls.
    pub fn detect(graph: &CallGraph) -> Vec<EntryPoint> {
        let declared: Vec<EntryPoint> = graph
            .declared_roots()
            .iter()
            .map(|&node| EntryPoint { node, kind: EntryPointKind::Declared })
            .collect();
        if !declared.is_empty() {
            return declared;
        }

        let detected: Vec<EntryPoint> = graph
            .nodes()
            .filter(|(_, n)| n.receiver_type.is_none() && !n.synthetic && !n.is_std)
            .filter_map(|(idx, n)| {
                let kind = if n.name == "main" {
                    EntryPointKind::Main
                } else if is_initializer(&n.name) {
                    EntryPointKind::Initializer
                } else {
                    return None;
                };
                Some(EntryPoint { node: idx, kind })
            })
            .collect();
        if !detected.is_empty() {
            return detected;
        }

        graph
            .nodes()
            .filter(|(idx, _)| graph.in_degree(*idx) == 0)
            .map(|(node, _)| EntryPoint { node, kind: EntryPointKind::Orphan })
            .collect()
    }
}

fn is_initializer(name: &str) -> bool {
    name == "init"
        || name
            .strip_prefix("init#")
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::{CallEdge, CallNode};

    #[test]
    fn test_detect_main_and_initializers() {
        let mut g = CallGraph::new();
        let main = g.add_node(CallNode::new("main.main", "main").in_module("main"));
        let init = g.add_node(CallNode::new("main.init#1", "init#1").in_module("main"));
        let m = g.add_node(CallNode::new("main.T.main", "main").in_module("main").receiver("T"));
        g.add_node(CallNode::new("main.initialize", "initialize").in_module("main"));

        let roots = EntryPointDetector::detect(&g);
        assert_eq!(
            roots,
            vec![
                EntryPoint { node: main, kind: EntryPointKind::Main },
                EntryPoint { node: init, kind: EntryPointKind::Initializer },
            ]
        );
        assert!(roots.iter().all(|r| r.node != m));
    }

    #[test]
    fn test_declared_roots_take_precedence() {
        let mut g = CallGraph::new();
        g.add_node(CallNode::new("main", "main").in_module("app"));
        let handler = g.add_node(CallNode::new("app::handle", "handle").in_module("app"));
        g.declare_root(handler);
        let roots = EntryPointDetector::detect(&g);
        assert_eq!(roots, vec![EntryPoint { node: handler, kind: EntryPointKind::Declared }]);
    }

    #[test]
    fn test_fallback_to_uncalled_nodes() {
        let mut g = CallGraph::new();
        let a = g.add_node(CallNode::new("lib::a", "a").in_module("lib"));
        let b = g.add_node(CallNode::new("lib::b", "b").in_module("lib"));
        g.add_edge(a, b, CallEdge::default());
        let roots = EntryPointDetector::detect(&g);
        assert_eq!(roots, vec![EntryPoint { node: a, kind: EntryPointKind::Orphan }]);
    }
}
