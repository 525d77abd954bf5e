//! Call graph model.
//!
//! Callable symbols and call sites, as handed over by a graph builder.
//! Node ids are interned once into dense `NodeIndex` values so every later
//! stage can track visited/depth state in index-addressed vectors. The graph
//! is treated as read-only once built; query stages derive new node/edge sets.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Best-effort source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self { file: file.into(), line }
    }

    /// File name without directories, as shown in diagram labels.
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file)
    }
}

/// A callable symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    /// Unique per symbol instance (fully qualified name).
    pub id: String,
    /// Unqualified symbol name.
    pub name: String,
    /// Defining module; `None` when the builder could not resolve it.
    pub module_path: Option<String>,
    pub module_name: Option<String>,
    pub location: Option<Location>,
    pub is_std: bool,
    pub exported: bool,
    /// Receiving type for methods.
    pub receiver_type: Option<String>,
    /// Inserted by the builder, not present in source.
    pub synthetic: bool,
}

impl CallNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            module_path: None,
            module_name: None,
            location: None,
            is_std: false,
            exported: false,
            receiver_type: None,
            synthetic: false,
        }
    }

    /// Sets the module path; the display name defaults to its last segment.
    pub fn in_module(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.module_name = Some(last_segment(&path).to_string());
        self.module_path = Some(path);
        self
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: usize) -> Self {
        self.location = Some(Location::new(file, line));
        self
    }

    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn std(mut self, is_std: bool) -> Self {
        self.is_std = is_std;
        self
    }

    pub fn receiver(mut self, ty: impl Into<String>) -> Self {
        self.receiver_type = Some(ty.into());
        self
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or(path)
}

/// One call relationship.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallEdge {
    /// Call-site location.
    pub site: Option<Location>,
    /// No literal call in source (dispatch thunks, runtime hooks).
    pub synthetic: bool,
}

impl CallEdge {
    pub fn at(file: impl Into<String>, line: usize) -> Self {
        Self {
            site: Some(Location::new(file, line)),
            synthetic: false,
        }
    }
}

/// Borrowed view of one edge with its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'g> {
    pub id: EdgeIndex,
    pub caller: NodeIndex,
    pub callee: NodeIndex,
    pub edge: &'g CallEdge,
}

/// The call graph itself.
#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<CallNode, CallEdge>,
    ids: HashMap<String, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a node. Ids are never reused: a duplicate id returns the
    /// index of the node already registered.
    pub fn add_node(&mut self, node: CallNode) -> NodeIndex {
        if let Some(&existing) = self.ids.get(&node.id) {
            log::warn!("duplicate node id {}, keeping the first definition", node.id);
            return existing;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.ids.insert(id, idx);
        idx
    }

    pub fn add_edge(&mut self, caller: NodeIndex, callee: NodeIndex, edge: CallEdge) -> EdgeIndex {
        self.graph.add_edge(caller, callee, edge)
    }

    /// Adds an edge between two registered ids. Dangling edges are skipped.
    pub fn add_edge_by_id(&mut self, caller: &str, callee: &str, edge: CallEdge) -> Option<EdgeIndex> {
        match (self.find(caller), self.find(callee)) {
            (Some(from), Some(to)) => Some(self.add_edge(from, to, edge)),
            _ => {
                log::warn!("skipping edge {} -> {}: unknown endpoint", caller, callee);
                None
            }
        }
    }

    /// Marks a node as a program entry point known to the builder.
    pub fn declare_root(&mut self, idx: NodeIndex) {
        if !self.roots.contains(&idx) {
            self.roots.push(idx);
        }
    }

    pub fn declared_roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn find(&self, id: &str) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &CallNode {
        &self.graph[idx]
    }

    pub fn contains(&self, idx: NodeIndex) -> bool {
        idx.index() < self.graph.node_count()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &CallNode)> {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    pub fn outgoing(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeView<'_>> {
        self.edges_directed(idx, Direction::Outgoing)
    }

    pub fn incoming(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeView<'_>> {
        self.edges_directed(idx, Direction::Incoming)
    }

    /// Edges in the order they were added.
    fn edges_directed(&self, idx: NodeIndex, dir: Direction) -> impl Iterator<Item = EdgeView<'_>> {
        let mut edges: Vec<EdgeView<'_>> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| EdgeView {
                id: e.id(),
                caller: e.source(),
                callee: e.target(),
                edge: e.weight(),
            })
            .collect();
        edges.sort_by_key(|e| e.id);
        edges.into_iter()
    }

    pub fn edge(&self, id: EdgeIndex) -> Option<EdgeView<'_>> {
        let (caller, callee) = self.graph.edge_endpoints(id)?;
        Some(EdgeView {
            id,
            caller,
            callee,
            edge: &self.graph[id],
        })
    }

    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Derives a graph without synthetic nodes. A chain
    /// `caller -> synthetic.. -> callee` becomes a direct `caller -> callee`
    /// edge carrying the site of the first hop.
    pub fn without_synthetic_nodes(&self) -> CallGraph {
        let mut out = CallGraph::new();
        let mut remap: Vec<Option<NodeIndex>> = vec![None; self.graph.node_count()];

        for (idx, node) in self.nodes() {
            if !node.synthetic {
                remap[idx.index()] = Some(out.add_node(node.clone()));
            }
        }

        for idx in self.graph.node_indices() {
            let Some(from) = remap[idx.index()] else { continue };
            for first in self.outgoing(idx) {
                if let Some(to) = remap[first.callee.index()] {
                    out.add_edge(from, to, first.edge.clone());
                    continue;
                }
                // Walk through the synthetic chain.
                let mut seen = vec![false; self.graph.node_count()];
                let mut stack = vec![first.callee];
                while let Some(current) = stack.pop() {
                    if std::mem::replace(&mut seen[current.index()], true) {
                        continue;
                    }
                    for hop in self.outgoing(current) {
                        match remap[hop.callee.index()] {
                            Some(to) => {
                                out.add_edge(from, to, first.edge.clone());
                            }
                            None => stack.push(hop.callee),
                        }
                    }
                }
            }
        }

        for root in &self.roots {
            if let Some(mapped) = remap[root.index()] {
                out.declare_root(mapped);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> CallNode {
        CallNode::new(id, id).in_module("app")
    }

    #[test]
    fn test_duplicate_ids_are_not_reused() {
        let mut graph = CallGraph::new();
        let a = graph.add_node(node("a"));
        let again = graph.add_node(node("a"));
        assert_eq!(a, again);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_dangling_edge_is_skipped() {
        let mut graph = CallGraph::new();
        graph.add_node(node("a"));
        assert!(graph.add_edge_by_id("a", "missing", CallEdge::default()).is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_incoming_and_outgoing_report_true_direction() {
        let mut graph = CallGraph::new();
        let a = graph.add_node(node("a"));
        let b = graph.add_node(node("b"));
        graph.add_edge(a, b, CallEdge::at("a.rs", 3));

        let out: Vec<_> = graph.outgoing(a).collect();
        let inc: Vec<_> = graph.incoming(b).collect();
        assert_eq!((out[0].caller, out[0].callee), (a, b));
        assert_eq!((inc[0].caller, inc[0].callee), (a, b));
        assert_eq!(graph.in_degree(a), 0);
    }

    #[test]
    fn test_edges_come_back_in_insertion_order() {
        let mut graph = CallGraph::new();
        let a = graph.add_node(node("a"));
        let b = graph.add_node(node("b"));
        let c = graph.add_node(node("c"));
        graph.add_edge(a, b, CallEdge::at("a.rs", 3));
        graph.add_edge(a, c, CallEdge::at("a.rs", 5));
        graph.add_edge(a, b, CallEdge::at("a.rs", 9));
        graph.add_edge(c, b, CallEdge::at("c.rs", 1));

        let lines: Vec<_> = graph.outgoing(a).map(|e| e.edge.site.as_ref().map(|s| s.line)).collect();
        assert_eq!(lines, vec![Some(3), Some(5), Some(9)]);
        let callers: Vec<_> = graph.incoming(b).map(|e| e.caller).collect();
        assert_eq!(callers, vec![a, a, c]);
    }

    #[test]
    fn test_module_name_is_last_segment() {
        let n = CallNode::new("x", "x").in_module("github.com/acme/tool/util");
        assert_eq!(n.module_name.as_deref(), Some("util"));
        let n = CallNode::new("x", "x").in_module("my_crate::net::codec");
        assert_eq!(n.module_name.as_deref(), Some("codec"));
    }

    #[test]
    fn test_without_synthetic_nodes_bridges_chains() {
        let mut graph = CallGraph::new();
        let a = graph.add_node(node("a"));
        let thunk = graph.add_node(node("thunk").synthetic(true));
        let wrap = graph.add_node(node("wrap").synthetic(true));
        let b = graph.add_node(node("b"));
        graph.add_edge(a, thunk, CallEdge::at("a.rs", 7));
        graph.add_edge(thunk, wrap, CallEdge::default());
        graph.add_edge(wrap, b, CallEdge::default());
        graph.add_edge(wrap, thunk, CallEdge::default());
        graph.declare_root(a);

        let stripped = graph.without_synthetic_nodes();
        assert_eq!(stripped.node_count(), 2);
        assert_eq!(stripped.edge_count(), 1);
        let a2 = stripped.find("a").unwrap();
        let edge = stripped.outgoing(a2).next().unwrap();
        assert_eq!(stripped.node(edge.callee).id, "b");
        assert_eq!(edge.edge.site, Some(Location::new("a.rs", 7)));
        assert_eq!(stripped.declared_roots(), &[a2]);
    }
}
