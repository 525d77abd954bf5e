//! Edge filter pipeline.
//!
//! Decides, edge by edge, whether a call relationship belongs to the result
//! subgraph. Stages run in a fixed order and the first failing stage drops the
//! edge: synthetic → standard library → unexported → include prefixes →
//! limit keywords → ignore keywords → focus module.

use crate::domain::callgraph::{CallGraph, CallNode, EdgeView};
use crate::domain::query::EndpointMatch;
use crate::domain::stdlib::{is_internal_module_path, is_std_module_path};

/// Filter options. `Default` filters nothing beyond the always-on
/// synthetic exclusion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    pub exclude_std: bool,
    pub exclude_unexported: bool,
    /// Module path prefixes; empty disables the stage.
    pub include_prefixes: Vec<String>,
    /// Module path substrings; empty disables the stage.
    pub limit_keywords: Vec<String>,
    /// Module path substrings dropped wherever they appear.
    pub ignore: Vec<String>,
    /// Module path or display name to focus on.
    pub focus: Option<String>,
    pub endpoint_match: EndpointMatch,
}

/// Why an edge was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    Dangling,
    Synthetic,
    StandardLibrary,
    Unexported,
    NotIncluded,
    OutsideLimit,
    Ignored,
    OutOfFocus,
}

/// Edge is synthetic or touches a synthetic or module-less node.
pub fn is_synthetic_edge(graph: &CallGraph, edge: &EdgeView<'_>) -> bool {
    let caller = graph.node(edge.caller);
    let callee = graph.node(edge.callee);
    edge.edge.synthetic
        || caller.synthetic
        || callee.synthetic
        || caller.module_path.is_none()
        || callee.module_path.is_none()
}

fn is_std_node(node: &CallNode) -> bool {
    node.is_std || node.module_path.as_deref().map(is_std_module_path).unwrap_or(false)
}

/// Resolves a focus string to a module path: exact path first, then the
/// first module whose display name matches.
pub fn resolve_focus(graph: &CallGraph, focus: &str) -> Option<String> {
    let focus = focus.trim();
    if focus.is_empty() {
        return None;
    }
    let by_path = graph
        .nodes()
        .find(|(_, n)| n.module_path.as_deref() == Some(focus));
    let found = by_path.or_else(|| {
        graph
            .nodes()
            .find(|(_, n)| n.module_name.as_deref() == Some(focus) && n.module_path.is_some())
    });
    found.and_then(|(_, n)| n.module_path.clone())
}

/// The filter pipeline bound to one graph.
pub struct EdgeFilter<'g> {
    graph: &'g CallGraph,
    config: &'g FilterConfig,
    focus: Option<String>,
}

impl<'g> EdgeFilter<'g> {
    pub fn new(graph: &'g CallGraph, config: &'g FilterConfig) -> Self {
        let focus = config.focus.as_deref().and_then(|f| {
            let resolved = resolve_focus(graph, f);
            if resolved.is_none() {
                log::warn!("focus module {} not found in graph, ignoring focus", f);
            }
            resolved
        });
        Self { graph, config, focus }
    }

    pub fn focus_module(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn passes(&self, edge: &EdgeView<'_>) -> bool {
        self.evaluate(edge).is_ok()
    }

    pub fn evaluate(&self, edge: &EdgeView<'_>) -> Result<(), DropReason> {
        if !self.graph.contains(edge.caller) || !self.graph.contains(edge.callee) {
            return Err(DropReason::Dangling);
        }
        if is_synthetic_edge(self.graph, edge) {
            return Err(DropReason::Synthetic);
        }
        let caller = self.graph.node(edge.caller);
        let callee = self.graph.node(edge.callee);
        let (Some(caller_path), Some(callee_path)) =
            (caller.module_path.as_deref(), callee.module_path.as_deref())
        else {
            return Err(DropReason::Synthetic);
        };
        let cfg = self.config;

        if cfg.exclude_std {
            if is_std_node(caller) || is_std_node(callee) {
                return Err(DropReason::StandardLibrary);
            }
            if is_internal_module_path(caller_path) || is_internal_module_path(callee_path) {
                return Err(DropReason::StandardLibrary);
            }
        }

        if cfg.exclude_unexported && !(caller.exported && callee.exported) {
            return Err(DropReason::Unexported);
        }

        if !cfg.include_prefixes.is_empty() {
            let matches = |path: &str| cfg.include_prefixes.iter().any(|p| path.starts_with(p.as_str()));
            if !cfg.endpoint_match.combine(matches(caller_path), matches(callee_path)) {
                return Err(DropReason::NotIncluded);
            }
        }

        if !cfg.limit_keywords.is_empty() {
            let matches = |path: &str| cfg.limit_keywords.iter().any(|k| path.contains(k.as_str()));
            if !cfg.endpoint_match.combine(matches(caller_path), matches(callee_path)) {
                return Err(DropReason::OutsideLimit);
            }
        }

        if !cfg.ignore.is_empty() {
            let matches = |path: &str| cfg.ignore.iter().any(|k| path.contains(k.as_str()));
            if matches(caller_path) || matches(callee_path) {
                return Err(DropReason::Ignored);
            }
        }

        if let Some(focus) = self.focus.as_deref() {
            if !self.relevant_to_focus(edge, caller_path, callee_path, focus) {
                return Err(DropReason::OutOfFocus);
            }
        }

        Ok(())
    }

    /// Touches the focus module, or bridges a caller reached from focus to a
    /// callee that calls back into focus.
    fn relevant_to_focus(&self, edge: &EdgeView<'_>, caller_path: &str, callee_path: &str, focus: &str) -> bool {
        if caller_path == focus || callee_path == focus {
            return true;
        }
        let in_focus = |idx| self.graph.node(idx).module_path.as_deref() == Some(focus);
        let from_focus = self
            .graph
            .incoming(edge.caller)
            .any(|e| !is_synthetic_edge(self.graph, &e) && in_focus(e.caller));
        if !from_focus {
            return false;
        }
        self.graph
            .outgoing(edge.callee)
            .any(|e| !is_synthetic_edge(self.graph, &e) && in_focus(e.callee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::{CallEdge, CallNode};
    use petgraph::graph::NodeIndex;

    fn f(graph: &mut CallGraph, module: &str, name: &str) -> NodeIndex {
        graph.add_node(
            CallNode::new(format!("{module}::{name}"), name)
                .in_module(module)
                .exported(true),
        )
    }

    fn verdict(graph: &CallGraph, config: &FilterConfig, from: NodeIndex, to: NodeIndex) -> Result<(), DropReason> {
        let filter = EdgeFilter::new(graph, config);
        let edge = graph.outgoing(from).find(|e| e.callee == to).unwrap();
        filter.evaluate(&edge)
    }

    #[test]
    fn test_synthetic_short_circuits() {
        let mut g = CallGraph::new();
        let a = f(&mut g, "app", "a");
        let b = f(&mut g, "app", "b");
        let thunk = g.add_node(CallNode::new("app::thunk", "thunk").in_module("app").synthetic(true));
        let orphan = g.add_node(CallNode::new("?::x", "x"));
        g.add_edge(a, b, CallEdge { site: None, synthetic: true });
        g.add_edge(a, thunk, CallEdge::default());
        g.add_edge(a, orphan, CallEdge::default());
        let cfg = FilterConfig::default();
        assert_eq!(verdict(&g, &cfg, a, b), Err(DropReason::Synthetic));
        assert_eq!(verdict(&g, &cfg, a, thunk), Err(DropReason::Synthetic));
        assert_eq!(verdict(&g, &cfg, a, orphan), Err(DropReason::Synthetic));
    }

    #[test]
    fn test_std_and_internal_exclusion() {
        let mut g = CallGraph::new();
        let a = f(&mut g, "app", "a");
        let print = g.add_node(CallNode::new("std::io::_print", "_print").in_module("std::io").std(true));
        let private = f(&mut g, "serde::__private", "de");
        g.add_edge(a, print, CallEdge::default());
        g.add_edge(a, private, CallEdge::default());

        let on = FilterConfig { exclude_std: true, ..Default::default() };
        assert_eq!(verdict(&g, &on, a, print), Err(DropReason::StandardLibrary));
        assert_eq!(verdict(&g, &on, a, private), Err(DropReason::StandardLibrary));
        let off = FilterConfig::default();
        assert!(verdict(&g, &off, a, print).is_ok());
    }

    #[test]
    fn test_unexported_requires_both_endpoints_public() {
        let mut g = CallGraph::new();
        let a = f(&mut g, "app", "a");
        let hidden = g.add_node(CallNode::new("app::hidden", "hidden").in_module("app"));
        g.add_edge(a, hidden, CallEdge::default());
        let cfg = FilterConfig { exclude_unexported: true, ..Default::default() };
        assert_eq!(verdict(&g, &cfg, a, hidden), Err(DropReason::Unexported));
    }

    #[test]
    fn test_include_and_limit_need_both_endpoints_by_default() {
        let mut g = CallGraph::new();
        let a = f(&mut g, "acme/api", "serve");
        let b = f(&mut g, "acme/db", "query");
        let c = f(&mut g, "vendor/log", "write");
        g.add_edge(a, b, CallEdge::default());
        g.add_edge(a, c, CallEdge::default());

        let include = FilterConfig { include_prefixes: vec!["acme/".into()], ..Default::default() };
        assert!(verdict(&g, &include, a, b).is_ok());
        assert_eq!(verdict(&g, &include, a, c), Err(DropReason::NotIncluded));

        let limit = FilterConfig { limit_keywords: vec!["api".into()], ..Default::default() };
        assert_eq!(verdict(&g, &limit, a, b), Err(DropReason::OutsideLimit));

        let either = FilterConfig {
            limit_keywords: vec!["api".into()],
            endpoint_match: EndpointMatch::Either,
            ..Default::default()
        };
        assert!(verdict(&g, &either, a, b).is_ok());
    }

    #[test]
    fn test_ignore_drops_either_endpoint() {
        let mut g = CallGraph::new();
        let a = f(&mut g, "acme/api", "serve");
        let c = f(&mut g, "vendor/log", "write");
        g.add_edge(a, c, CallEdge::default());
        let cfg = FilterConfig { ignore: vec!["vendor".into()], ..Default::default() };
        assert_eq!(verdict(&g, &cfg, a, c), Err(DropReason::Ignored));
    }

    #[test]
    fn test_focus_keeps_touching_and_bridge_edges() {
        // core::run -> util::prep -> util::finish -> core::done
        let mut g = CallGraph::new();
        let run = f(&mut g, "core", "run");
        let prep = f(&mut g, "util", "prep");
        let finish = f(&mut g, "util", "finish");
        let done = f(&mut g, "core", "done");
        let other = f(&mut g, "util", "other");
        g.add_edge(run, prep, CallEdge::default());
        g.add_edge(prep, finish, CallEdge::default());
        g.add_edge(finish, done, CallEdge::default());
        g.add_edge(prep, other, CallEdge::default());

        let cfg = FilterConfig { focus: Some("core".into()), ..Default::default() };
        assert!(verdict(&g, &cfg, run, prep).is_ok());
        assert!(verdict(&g, &cfg, finish, done).is_ok());
        assert!(verdict(&g, &cfg, prep, finish).is_ok(), "bridge edge");
        assert_eq!(verdict(&g, &cfg, prep, other), Err(DropReason::OutOfFocus));
    }

    #[test]
    fn test_unknown_focus_is_ignored() {
        let mut g = CallGraph::new();
        let a = f(&mut g, "app", "a");
        let b = f(&mut g, "app", "b");
        g.add_edge(a, b, CallEdge::default());
        let cfg = FilterConfig { focus: Some("nowhere".into()), ..Default::default() };
        let filter = EdgeFilter::new(&g, &cfg);
        assert!(filter.focus_module().is_none());
        assert!(verdict(&g, &cfg, a, b).is_ok());
    }

    #[test]
    fn test_focus_resolves_display_name() {
        let mut g = CallGraph::new();
        f(&mut g, "github.com/acme/tool/util", "a");
        assert_eq!(resolve_focus(&g, "util").as_deref(), Some("github.com/acme/tool/util"));
    }
}
