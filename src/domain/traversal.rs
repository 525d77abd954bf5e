//! Symbol-anchored reachability.
//!
//! Walks callees (downstream), callers (upstream) or both from a start node,
//! following only edges that pass the filter pipeline. The walk is a queue
//! with an index-addressed visited set, so every node is expanded at most
//! once however the graph recurses, and the first visit is also the shortest
//! hop count from the start.

use crate::domain::callgraph::{CallGraph, EdgeView};
use crate::domain::context::QueryContext;
use crate::domain::filter::EdgeFilter;
use crate::domain::flowgraph::FlowGraph;
use crate::domain::query::Direction;
use crate::error::Result;
use petgraph::graph::NodeIndex;
use std::collections::VecDeque;

pub struct Traversal<'a, 'g> {
    graph: &'g CallGraph,
    filter: &'a EdgeFilter<'g>,
    /// Hop bound from the start node; 0 is unbounded.
    max_depth: u32,
    ctx: &'a QueryContext,
}

impl<'a, 'g> Traversal<'a, 'g> {
    pub fn new(graph: &'g CallGraph, filter: &'a EdgeFilter<'g>, max_depth: u32, ctx: &'a QueryContext) -> Self {
        Self { graph, filter, max_depth, ctx }
    }

    pub fn run(&self, start: NodeIndex, direction: Direction) -> Result<FlowGraph> {
        let flow = match direction {
            Direction::Downstream => self.walk(start, true)?,
            Direction::Upstream => self.walk(start, false)?,
            // separate passes: visited state is not shared
            Direction::Both => self.walk(start, true)?.union(self.walk(start, false)?),
        };
        self.ctx.log.step(format_args!(
            "{} traversal from {}: {} nodes, {} edges",
            direction,
            self.graph.node(start).id,
            flow.node_count(),
            flow.edge_count()
        ));
        Ok(flow)
    }

    pub fn downstream(&self, start: NodeIndex) -> Result<FlowGraph> {
        self.walk(start, true)
    }

    pub fn upstream(&self, start: NodeIndex) -> Result<FlowGraph> {
        self.walk(start, false)
    }

    fn walk(&self, start: NodeIndex, forward: bool) -> Result<FlowGraph> {
        let mut flow = FlowGraph::new();
        if !self.graph.contains(start) {
            return Ok(flow);
        }
        let mut visited = vec![false; self.graph.node_count()];
        let mut queue = VecDeque::new();
        visited[start.index()] = true;
        queue.push_back((start, 0u32));

        while let Some((node, depth)) = queue.pop_front() {
            self.ctx.interrupt.check()?;
            if self.max_depth > 0 && depth >= self.max_depth {
                continue;
            }
            let edges: Box<dyn Iterator<Item = EdgeView<'g>> + 'g> = if forward {
                Box::new(self.graph.outgoing(node))
            } else {
                Box::new(self.graph.incoming(node))
            };
            for edge in edges {
                if !self.filter.passes(&edge) {
                    continue;
                }
                flow.insert(&edge);
                let next = if forward { edge.callee } else { edge.caller };
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    queue.push_back((next, depth + 1));
                }
            }
        }
        Ok(flow)
    }
}
