//! Textual symbol reference to graph node.

use crate::domain::callgraph::{CallGraph, CallNode};
use crate::error::{QueryError, Result};
use petgraph::graph::NodeIndex;

const SEPARATORS: [&str; 2] = ["::", "."];

/// `reference` is `<qualifier><sep><name>` for one of the accepted separators.
fn qualified_by(reference: &str, qualifier: &str, name: &str) -> bool {
    reference
        .strip_suffix(name)
        .map(|head| {
            SEPARATORS
                .iter()
                .any(|sep| head.strip_suffix(sep) == Some(qualifier))
        })
        .unwrap_or(false)
}

type Rule = fn(&CallNode, &str) -> bool;

fn by_id(n: &CallNode, r: &str) -> bool {
    n.id == r
}

fn by_name(n: &CallNode, r: &str) -> bool {
    n.name == r
}

fn by_module_name(n: &CallNode, r: &str) -> bool {
    n.module_name
        .as_deref()
        .map(|m| qualified_by(r, m, &n.name))
        .unwrap_or(false)
}

fn by_module_path(n: &CallNode, r: &str) -> bool {
    n.module_path
        .as_deref()
        .map(|m| qualified_by(r, m, &n.name))
        .unwrap_or(false)
}

fn by_receiver(n: &CallNode, r: &str) -> bool {
    n.receiver_type
        .as_deref()
        .map(|t| qualified_by(r, t, &n.name))
        .unwrap_or(false)
}

/// Match rules, highest priority first.
const RULES: [Rule; 5] = [by_id, by_name, by_module_name, by_module_path, by_receiver];

/// Finds the node a reference names. The highest-priority rule that matches
/// anything wins; ties go to the first node in graph order.
pub fn resolve_symbol(graph: &CallGraph, reference: &str) -> Result<NodeIndex> {
    let reference = reference.trim();
    if !reference.is_empty() {
        for rule in RULES {
            if let Some((idx, _)) = graph.nodes().find(|(_, n)| rule(n, reference)) {
                return Ok(idx);
            }
        }
    }
    Err(QueryError::SymbolNotFound(reference.to_string()))
}
