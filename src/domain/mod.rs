// Query core: graph model, filter pipeline, depth bound, traversal.

pub mod callgraph;
pub mod context;
pub mod depth;
pub mod entry_point;
pub mod filter;
pub mod flowgraph;
pub mod query;
pub mod resolver;
pub mod stdlib;
pub mod traversal;
