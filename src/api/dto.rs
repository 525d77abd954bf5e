use crate::domain::callgraph::{CallEdge, CallGraph, CallNode, Location};
use crate::domain::filter::FilterConfig;
use crate::domain::flowgraph::FlowGraph;
use crate::domain::query::{Algorithm, Direction, EndpointMatch, GroupMode, OutputFormat};
use crate::error::{QueryError, Result};
use crate::ports::BuildRequest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default hop bound from entry points in whole-graph mode.
pub const DEFAULT_GRAPH_DEPTH: u32 = 4;
/// Default hop bound from the start symbol in symbol mode.
pub const DEFAULT_SYMBOL_DEPTH: u32 = 7;

fn default_true() -> bool {
    true
}

fn default_algo() -> String {
    Algorithm::default().name().to_string()
}

fn default_direction() -> String {
    Direction::default().name().to_string()
}

fn default_group() -> Vec<String> {
    vec!["pkg".to_string()]
}

fn default_format() -> String {
    OutputFormat::default().name().to_string()
}

fn default_endpoint_match() -> String {
    EndpointMatch::default().name().to_string()
}

/// A call graph query as received from the command line, a config file or
/// the server. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub module_args: Vec<String>,
    pub dir: Option<PathBuf>,
    #[serde(default = "default_algo")]
    pub algo: String,
    pub symbol: Option<String>,
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_group")]
    pub group: Vec<String>,
    #[serde(default = "default_true")]
    pub exclude_std: bool,
    #[serde(default = "default_true")]
    pub exclude_unexported: bool,
    pub limit_prefix: Vec<String>,
    pub limit_keyword: Vec<String>,
    pub ignore: Vec<String>,
    pub focus: Option<String>,
    /// 0 disables the bound; absent picks the mode's default.
    pub max_depth: Option<u32>,
    pub tests: bool,
    pub tags: Vec<String>,
    pub debug: bool,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_endpoint_match")]
    pub endpoint_match: String,
    pub timeout_ms: Option<u64>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            module_args: Vec::new(),
            dir: None,
            algo: default_algo(),
            symbol: None,
            direction: default_direction(),
            group: default_group(),
            exclude_std: true,
            exclude_unexported: true,
            limit_prefix: Vec::new(),
            limit_keyword: Vec::new(),
            ignore: Vec::new(),
            focus: None,
            max_depth: None,
            tests: false,
            tags: Vec::new(),
            debug: false,
            format: default_format(),
            endpoint_match: default_endpoint_match(),
            timeout_ms: None,
        }
    }
}

/// Trims entries, drops blanks, splits comma-joined values.
fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_opt(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn invalid(what: &str, value: &str) -> QueryError {
    QueryError::InvalidConfiguration(format!("unknown {} value {:?}", what, value))
}

impl QueryRequest {
    /// Checks the request and resolves it into typed settings.
    pub fn validate(&self) -> Result<QueryPlan> {
        let module_args = clean_list(&self.module_args);
        if module_args.is_empty() {
            return Err(QueryError::MissingRequiredInput(
                "at least one module argument is required".to_string(),
            ));
        }
        let algorithm = Algorithm::parse(&self.algo).ok_or_else(|| invalid("algorithm", &self.algo))?;
        let direction = Direction::parse(&self.direction).ok_or_else(|| invalid("direction", &self.direction))?;
        let format = OutputFormat::parse(&self.format).ok_or_else(|| invalid("format", &self.format))?;
        let endpoint_match =
            EndpointMatch::parse(&self.endpoint_match).ok_or_else(|| invalid("endpoint match", &self.endpoint_match))?;
        let group = GroupMode::from_keys(&clean_list(&self.group)).map_err(QueryError::InvalidConfiguration)?;

        let symbol = clean_opt(&self.symbol);
        let max_depth = self.max_depth.unwrap_or(if symbol.is_some() {
            DEFAULT_SYMBOL_DEPTH
        } else {
            DEFAULT_GRAPH_DEPTH
        });

        Ok(QueryPlan {
            build: BuildRequest {
                module_args,
                dir: self.dir.clone(),
                algorithm,
                include_tests: self.tests,
                tags: clean_list(&self.tags),
            },
            symbol,
            direction,
            group,
            filter: FilterConfig {
                exclude_std: self.exclude_std,
                exclude_unexported: self.exclude_unexported,
                include_prefixes: clean_list(&self.limit_prefix),
                limit_keywords: clean_list(&self.limit_keyword),
                ignore: clean_list(&self.ignore),
                focus: clean_opt(&self.focus),
                endpoint_match,
            },
            max_depth,
            format,
            debug: self.debug,
            timeout: self.timeout_ms.map(Duration::from_millis),
        })
    }
}

/// A validated query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub build: BuildRequest,
    pub symbol: Option<String>,
    pub direction: Direction,
    pub group: GroupMode,
    pub filter: FilterConfig,
    /// Effective bound; 0 is unbounded.
    pub max_depth: u32,
    pub format: OutputFormat,
    pub debug: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub node_count: usize,
    pub edge_count: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub format: String,
    pub body: String,
    pub stats: Stats,
}

/// Structured failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: String,
    pub message: String,
}

impl From<&QueryError> for ErrorResponse {
    fn from(err: &QueryError) -> Self {
        Self {
            status: "error".to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Interchange form of a call graph: what the `import` builder reads and the
/// `json` renderer writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub edges: Vec<EdgeDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default)]
    pub is_std: bool,
    #[serde(default)]
    pub exported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_type: Option<String>,
    #[serde(default)]
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDto {
    pub caller: String,
    pub callee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default)]
    pub synthetic: bool,
}

impl From<&CallNode> for NodeDto {
    fn from(n: &CallNode) -> Self {
        NodeDto {
            id: n.id.clone(),
            name: n.name.clone(),
            module_path: n.module_path.clone(),
            module_name: n.module_name.clone(),
            file: n.location.as_ref().map(|l| l.file.clone()),
            line: n.location.as_ref().map(|l| l.line),
            is_std: n.is_std,
            exported: n.exported,
            receiver_type: n.receiver_type.clone(),
            synthetic: n.synthetic,
        }
    }
}

impl From<NodeDto> for CallNode {
    fn from(dto: NodeDto) -> Self {
        let location = dto.file.map(|file| Location::new(file, dto.line.unwrap_or(0)));
        CallNode {
            id: dto.id,
            name: dto.name,
            module_path: dto.module_path,
            module_name: dto.module_name,
            location,
            is_std: dto.is_std,
            exported: dto.exported,
            receiver_type: dto.receiver_type,
            synthetic: dto.synthetic,
        }
    }
}

impl EdgeDto {
    fn new(graph: &CallGraph, caller: petgraph::graph::NodeIndex, callee: petgraph::graph::NodeIndex, edge: &CallEdge) -> Self {
        EdgeDto {
            caller: graph.node(caller).id.clone(),
            callee: graph.node(callee).id.clone(),
            file: edge.site.as_ref().map(|s| s.file.clone()),
            line: edge.site.as_ref().map(|s| s.line),
            synthetic: edge.synthetic,
        }
    }

    fn into_edge(self) -> CallEdge {
        CallEdge {
            site: self.file.map(|file| Location::new(file, self.line.unwrap_or(0))),
            synthetic: self.synthetic,
        }
    }
}

impl GraphDocument {
    /// Every node, edge and declared root of a graph.
    pub fn from_graph(graph: &CallGraph) -> Self {
        let nodes = graph.nodes().map(|(_, n)| NodeDto::from(n)).collect();
        let edges = graph
            .nodes()
            .flat_map(|(idx, _)| graph.outgoing(idx))
            .map(|e| EdgeDto::new(graph, e.caller, e.callee, e.edge))
            .collect();
        let roots = graph
            .declared_roots()
            .iter()
            .map(|&r| graph.node(r).id.clone())
            .collect();
        GraphDocument { nodes, edges, roots }
    }

    /// The nodes and edges of a selection, sorted by id.
    pub fn from_selection(graph: &CallGraph, flow: &FlowGraph) -> Self {
        let mut nodes: Vec<NodeDto> = flow.nodes().map(|idx| NodeDto::from(graph.node(idx))).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<EdgeDto> = flow
            .edges()
            .filter_map(|(_, _, id)| graph.edge(id))
            .map(|e| EdgeDto::new(graph, e.caller, e.callee, e.edge))
            .collect();
        edges.sort_by(|a, b| (&a.caller, &a.callee).cmp(&(&b.caller, &b.callee)));
        GraphDocument {
            nodes,
            edges,
            roots: Vec::new(),
        }
    }

    /// Adds this document to a graph. Duplicate nodes keep their first
    /// definition; dangling edges and unknown roots are skipped.
    pub fn merge_into(self, graph: &mut CallGraph) {
        for node in self.nodes {
            graph.add_node(node.into());
        }
        for edge in self.edges {
            let (caller, callee) = (edge.caller.clone(), edge.callee.clone());
            graph.add_edge_by_id(&caller, &callee, edge.into_edge());
        }
        for root in self.roots {
            match graph.find(&root) {
                Some(idx) => graph.declare_root(idx),
                None => log::warn!("skipping unknown root {}", root),
            }
        }
    }

    pub fn into_graph(self) -> CallGraph {
        let mut graph = CallGraph::new();
        self.merge_into(&mut graph);
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(args: &[&str]) -> QueryRequest {
        QueryRequest {
            module_args: args.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_from_empty_json() {
        let req: QueryRequest = serde_json::from_str(r#"{"module_args": ["./app"]}"#).unwrap();
        assert_eq!(req, request(&["./app"]));
        let plan = req.validate().unwrap();
        assert_eq!(plan.build.algorithm, Algorithm::Rta);
        assert_eq!(plan.direction, Direction::Downstream);
        assert_eq!(plan.group, GroupMode::Module);
        assert_eq!(plan.format, OutputFormat::Mermaid);
        assert!(plan.filter.exclude_std && plan.filter.exclude_unexported);
        assert_eq!(plan.max_depth, DEFAULT_GRAPH_DEPTH);
    }

    #[test]
    fn test_symbol_mode_depth_default() {
        let mut req = request(&["./app"]);
        req.symbol = Some("main.main".to_string());
        assert_eq!(req.validate().unwrap().max_depth, DEFAULT_SYMBOL_DEPTH);
        req.max_depth = Some(0);
        assert_eq!(req.validate().unwrap().max_depth, 0);
    }

    #[test]
    fn test_missing_module_args() {
        let err = request(&["  "]).validate().unwrap_err();
        assert_eq!(err.kind(), "missing_required_input");
    }

    #[test]
    fn test_invalid_settings() {
        let mut req = request(&["./app"]);
        req.group = vec!["pkg".to_string(), "color".to_string()];
        assert_eq!(req.validate().unwrap_err().kind(), "invalid_configuration");

        let mut req = request(&["./app"]);
        req.algo = "vta".to_string();
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("vta"));

        let mut req = request(&["./app"]);
        req.direction = "sideways".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_lists_are_cleaned() {
        let mut req = request(&["./app"]);
        req.limit_keyword = vec![" net ".to_string(), "".to_string(), "db,cache".to_string()];
        req.focus = Some("   ".to_string());
        let plan = req.validate().unwrap();
        assert_eq!(plan.filter.limit_keywords, vec!["net", "db", "cache"]);
        assert_eq!(plan.filter.focus, None);
    }

    #[test]
    fn test_error_response_shape() {
        let err = QueryError::SymbolNotFound("nope".to_string());
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "symbol_not_found");
    }

    #[test]
    fn test_document_to_graph() {
        let doc: GraphDocument = serde_json::from_str(
            r#"{
                "nodes": [
                    {"id": "app::main", "name": "main", "module_path": "app", "file": "src/main.rs", "line": 3, "exported": true},
                    {"id": "app::run", "name": "run", "module_path": "app", "exported": true}
                ],
                "edges": [
                    {"caller": "app::main", "callee": "app::run", "file": "src/main.rs", "line": 4},
                    {"caller": "app::main", "callee": "app::gone"}
                ],
                "roots": ["app::main"]
            }"#,
        )
        .unwrap();
        let graph = doc.into_graph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.declared_roots().len(), 1);
        let main = graph.find("app::main").unwrap();
        assert_eq!(graph.node(main).location.as_ref().map(|l| l.line), Some(3));

        let back = GraphDocument::from_graph(&graph);
        assert_eq!(back.edges.len(), 1);
        assert_eq!(back.roots, vec!["app::main"]);
    }
}
