use crate::domain::callgraph::CallGraph;
use crate::domain::flowgraph::FlowGraph;
use crate::domain::query::{Algorithm, GroupMode};
use std::path::PathBuf;

pub mod flowchart_exporter;

/// What a graph builder needs to know about the program to analyze.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub module_args: Vec<String>,
    /// Working directory module arguments are relative to.
    pub dir: Option<PathBuf>,
    pub algorithm: Algorithm,
    pub include_tests: bool,
    /// Enabled cfg features.
    pub tags: Vec<String>,
}

/// Constructs the call graph a query runs on. Implementations are
/// interchangeable as long as they honour the `CallGraph` model.
pub trait CallGraphBuilder {
    fn build_call_graph(&self, request: &BuildRequest) -> anyhow::Result<CallGraph>;
}

/// Serializes a selection into diagram text.
pub trait FlowRenderer {
    fn render(&self, graph: &CallGraph, flow: &FlowGraph, group: GroupMode) -> String;
}
