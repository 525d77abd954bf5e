use crate::api::dto::GraphDocument;
use crate::domain::callgraph::CallGraph;
use crate::ports::{BuildRequest, CallGraphBuilder};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Reads call graphs produced by an external analyzer as JSON graph
/// documents. Several documents are merged into one graph.
pub struct ImportCallGraphBuilder;

impl CallGraphBuilder for ImportCallGraphBuilder {
    fn build_call_graph(&self, request: &BuildRequest) -> Result<CallGraph> {
        let base = request.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut graph = CallGraph::new();
        for arg in &request.module_args {
            let path = base.join(arg);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read graph document {}", path.display()))?;
            let doc: GraphDocument = serde_json::from_str(&text)
                .with_context(|| format!("Invalid graph document {}", path.display()))?;
            log::debug!(
                "importing {}: {} nodes, {} edges",
                path.display(),
                doc.nodes.len(),
                doc.edges.len()
            );
            doc.merge_into(&mut graph);
        }
        Ok(graph)
    }
}
