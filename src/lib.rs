// Main library entry point for callflow.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use api::dto::{GraphDocument, QueryRequest, QueryResponse};
pub use application::QueryUsecase;
pub use domain::callgraph::{CallEdge, CallGraph, CallNode};
pub use error::QueryError;
