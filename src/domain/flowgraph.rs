//! FlowGraph Data Structure
//!
//! The derived node/edge selection a query hands to the renderer. Edges are
//! de-duplicated by their (caller, callee) pair; nodes are exactly the
//! endpoints of selected edges.

use crate::domain::callgraph::{CallGraph, EdgeView};
use crate::domain::context::QueryContext;
use crate::domain::depth::DepthMap;
use crate::domain::filter::{DropReason, EdgeFilter};
use crate::error::Result;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGraph {
    nodes: BTreeSet<NodeIndex>,
    edges: BTreeMap<(NodeIndex, NodeIndex), EdgeIndex>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge and its endpoints. Returns false for a repeated pair; the
    /// earliest added edge of a pair stays the representative.
    pub fn insert(&mut self, edge: &EdgeView<'_>) -> bool {
        self.nodes.insert(edge.caller);
        self.nodes.insert(edge.callee);
        match self.edges.entry((edge.caller, edge.callee)) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(edge.id);
                true
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                if edge.id < *slot.get() {
                    slot.insert(edge.id);
                }
                false
            }
        }
    }

    pub fn contains_node(&self, node: NodeIndex) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_edge(&self, caller: NodeIndex, callee: NodeIndex) -> bool {
        self.edges.contains_key(&(caller, callee))
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes.iter().copied()
    }

    /// `(caller, callee, representative edge)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, EdgeIndex)> + '_ {
        self.edges.iter().map(|(&(from, to), &id)| (from, to, id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Union of two selections over the same graph; the earliest added edge
    /// of a pair is kept.
    pub fn union(mut self, other: FlowGraph) -> FlowGraph {
        self.nodes.extend(other.nodes);
        for (pair, id) in other.edges {
            let kept = self.edges.entry(pair).or_insert(id);
            if id < *kept {
                *kept = id;
            }
        }
        self
    }

    /// Whole-graph selection: every edge that passes the filter pipeline and,
    /// when a depth map is given, lies within its bound.
    pub fn select_whole(
        graph: &CallGraph,
        filter: &EdgeFilter<'_>,
        depth: Option<&DepthMap>,
        ctx: &QueryContext,
    ) -> Result<FlowGraph> {
        let mut flow = FlowGraph::new();
        let mut dropped: BTreeMap<DropReason, usize> = BTreeMap::new();
        let mut beyond_depth = 0usize;

        for (idx, _) in graph.nodes() {
            ctx.interrupt.check()?;
            for edge in graph.outgoing(idx) {
                if let Err(reason) = filter.evaluate(&edge) {
                    *dropped.entry(reason).or_default() += 1;
                    continue;
                }
                if let Some(depth) = depth {
                    if !depth.admits(&edge) {
                        beyond_depth += 1;
                        continue;
                    }
                }
                flow.insert(&edge);
            }
        }

        ctx.log.step(format_args!(
            "selected {} edges over {} nodes (dropped {:?}, beyond depth {})",
            flow.edge_count(),
            flow.node_count(),
            dropped,
            beyond_depth
        ));
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::{CallEdge, CallNode};
    use crate::domain::filter::FilterConfig;

    #[test]
    fn test_parallel_edges_collapse() {
        let mut g = CallGraph::new();
        let a = g.add_node(CallNode::new("a", "a").in_module("m"));
        let b = g.add_node(CallNode::new("b", "b").in_module("m"));
        g.add_edge(a, b, CallEdge::at("m.rs", 3));
        g.add_edge(a, b, CallEdge::at("m.rs", 9));

        let cfg = FilterConfig::default();
        let filter = EdgeFilter::new(&g, &cfg);
        let flow = FlowGraph::select_whole(&g, &filter, None, &QueryContext::default()).unwrap();
        assert_eq!(flow.edge_count(), 1);
        assert_eq!(flow.node_count(), 2);
        let (_, _, kept) = flow.edges().next().unwrap();
        assert_eq!(g.edge(kept).unwrap().edge.site.as_ref().map(|s| s.line), Some(3));
    }

    #[test]
    fn test_union_keeps_earliest_call_site() {
        let mut g = CallGraph::new();
        let a = g.add_node(CallNode::new("a", "a").in_module("m"));
        let b = g.add_node(CallNode::new("b", "b").in_module("m"));
        let first = g.add_edge(a, b, CallEdge::at("m.rs", 3));
        let second = g.add_edge(a, b, CallEdge::at("m.rs", 9));

        let mut late = FlowGraph::new();
        assert!(late.insert(&g.edge(second).unwrap()));
        let mut early = FlowGraph::new();
        early.insert(&g.edge(first).unwrap());

        let merged = late.clone().union(early.clone());
        assert_eq!(merged.edges().next().map(|(_, _, id)| id), Some(first));
        let merged = early.union(late.clone());
        assert_eq!(merged.edges().next().map(|(_, _, id)| id), Some(first));

        assert!(!late.insert(&g.edge(first).unwrap()));
        assert_eq!(late.edges().next().map(|(_, _, id)| id), Some(first));
    }

    #[test]
    fn test_depth_map_restricts_selection() {
        let mut g = CallGraph::new();
        let a = g.add_node(CallNode::new("a", "a").in_module("m"));
        let b = g.add_node(CallNode::new("b", "b").in_module("m"));
        let c = g.add_node(CallNode::new("c", "c").in_module("m"));
        g.add_edge(a, b, CallEdge::default());
        g.add_edge(b, c, CallEdge::default());

        let ctx = QueryContext::default();
        let cfg = FilterConfig::default();
        let filter = EdgeFilter::new(&g, &cfg);
        let depth = DepthMap::compute(&g, &[a], 1, &ctx).unwrap();
        let flow = FlowGraph::select_whole(&g, &filter, Some(&depth), &ctx).unwrap();
        assert!(flow.contains_edge(a, b));
        assert!(!flow.contains_edge(b, c));
        assert!(!flow.contains_node(c));
    }
}
