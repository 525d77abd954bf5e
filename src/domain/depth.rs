//! Shortest hop distance from the root set, bounded by a maximum depth.

use crate::domain::callgraph::{CallGraph, EdgeView};
use crate::domain::context::QueryContext;
use crate::error::Result;
use petgraph::graph::NodeIndex;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct DepthMap {
    depths: Vec<Option<u32>>,
    max_depth: u32,
}

impl DepthMap {
    /// Breadth-first expansion from `roots`. Nodes are never expanded past
    /// `max_depth`, so anything further away keeps no depth.
    pub fn compute(graph: &CallGraph, roots: &[NodeIndex], max_depth: u32, ctx: &QueryContext) -> Result<Self> {
        let mut depths = vec![None; graph.node_count()];
        let mut queue = VecDeque::with_capacity(roots.len());
        for &root in roots {
            if graph.contains(root) && depths[root.index()].is_none() {
                depths[root.index()] = Some(0);
                queue.push_back((root, 0u32));
            }
        }

        while let Some((node, depth)) = queue.pop_front() {
            ctx.interrupt.check()?;
            if depth >= max_depth {
                continue;
            }
            for edge in graph.outgoing(node) {
                let slot = &mut depths[edge.callee.index()];
                if slot.is_none() {
                    *slot = Some(depth + 1);
                    queue.push_back((edge.callee, depth + 1));
                }
            }
        }

        let reached = depths.iter().filter(|d| d.is_some()).count();
        ctx.log.step(format_args!(
            "depth bound {}: {} of {} nodes within reach of {} roots",
            max_depth,
            reached,
            graph.node_count(),
            roots.len()
        ));
        Ok(Self { depths, max_depth })
    }

    pub fn depth(&self, node: NodeIndex) -> Option<u32> {
        self.depths.get(node.index()).copied().flatten()
    }

    /// Both endpoints lie within the bound.
    pub fn admits(&self, edge: &EdgeView<'_>) -> bool {
        let within = |n| self.depth(n).map(|d| d <= self.max_depth).unwrap_or(false);
        within(edge.caller) && within(edge.callee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::{CallEdge, CallNode};

    fn chain(len: usize) -> (CallGraph, Vec<NodeIndex>) {
        let mut g = CallGraph::new();
        let nodes: Vec<_> = (0..len)
            .map(|i| g.add_node(CallNode::new(format!("n{i}"), format!("n{i}")).in_module("m")))
            .collect();
        for pair in nodes.windows(2) {
            g.add_edge(pair[0], pair[1], CallEdge::default());
        }
        (g, nodes)
    }

    #[test]
    fn test_depth_stops_at_bound() {
        let (g, n) = chain(5);
        let map = DepthMap::compute(&g, &[n[0]], 2, &QueryContext::default()).unwrap();
        assert_eq!(map.depth(n[0]), Some(0));
        assert_eq!(map.depth(n[2]), Some(2));
        assert_eq!(map.depth(n[3]), None);

        let edge_in = g.outgoing(n[1]).next().unwrap();
        let edge_out = g.outgoing(n[2]).next().unwrap();
        assert!(map.admits(&edge_in));
        assert!(!map.admits(&edge_out));
    }

    #[test]
    fn test_shortest_distance_wins_with_cycles() {
        let (mut g, n) = chain(4);
        // shortcut n0 -> n3 and a back edge n3 -> n0
        g.add_edge(n[0], n[3], CallEdge::default());
        g.add_edge(n[3], n[0], CallEdge::default());
        let map = DepthMap::compute(&g, &[n[0]], 10, &QueryContext::default()).unwrap();
        assert_eq!(map.depth(n[3]), Some(1));
        assert_eq!(map.depth(n[0]), Some(0));
    }

    #[test]
    fn test_unreachable_nodes_have_no_depth() {
        let mut g = CallGraph::new();
        let a = g.add_node(CallNode::new("a", "a").in_module("m"));
        let island = g.add_node(CallNode::new("b", "b").in_module("m"));
        let map = DepthMap::compute(&g, &[a], 3, &QueryContext::default()).unwrap();
        assert_eq!(map.depth(island), None);
    }
}
