// Collaborators: call graph builders and what they need.

pub mod concurrency;
pub mod import_builder;
pub mod project_loader;
pub mod source_builder;
pub mod source_facts;
pub mod symbol_index;

use crate::domain::callgraph::CallGraph;
use crate::domain::query::Algorithm;
use crate::ports::{BuildRequest, CallGraphBuilder};

pub use import_builder::ImportCallGraphBuilder;
pub use source_builder::SourceCallGraphBuilder;

/// The builder that implements an algorithm.
pub fn builder_for(algorithm: Algorithm) -> &'static dyn CallGraphBuilder {
    match algorithm {
        Algorithm::Import => &ImportCallGraphBuilder,
        Algorithm::Static | Algorithm::Cha | Algorithm::Rta => &SourceCallGraphBuilder,
    }
}

/// Dispatches on the request's algorithm.
pub struct AutoCallGraphBuilder;

impl CallGraphBuilder for AutoCallGraphBuilder {
    fn build_call_graph(&self, request: &BuildRequest) -> anyhow::Result<CallGraph> {
        builder_for(request.algorithm).build_call_graph(request)
    }
}
