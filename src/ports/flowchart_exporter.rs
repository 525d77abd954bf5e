//! Flowchart Exporters
//!
//! Serialize a selected subgraph as Mermaid flowchart text (default),
//! Graphviz DOT, or a JSON graph document. Output is deterministic: groups
//! are sorted by key, nodes by (module, receiver, name, id), edges by the
//! compact ids of their endpoints.

use crate::api::dto::GraphDocument;
use crate::domain::callgraph::{CallGraph, CallNode};
use crate::domain::flowgraph::FlowGraph;
use crate::domain::query::{GroupMode, OutputFormat};
use crate::ports::FlowRenderer;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, HashMap};

/// Group for free functions when grouping by receiver type.
const FREE_FUNCTION_GROUP: &str = "function";

/// Node id -> sequential compact identifier, allocated on first encounter.
/// One allocator per render call.
#[derive(Debug)]
pub struct CompactIds {
    prefix: &'static str,
    index: HashMap<NodeIndex, usize>,
    next: usize,
}

impl CompactIds {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            index: HashMap::new(),
            next: 1,
        }
    }

    pub fn number(&mut self, node: NodeIndex) -> usize {
        let next = &mut self.next;
        *self.index.entry(node).or_insert_with(|| {
            let id = *next;
            *next += 1;
            id
        })
    }

    pub fn resolve(&mut self, node: NodeIndex) -> String {
        let n = self.number(node);
        format!("{}{}", self.prefix, n)
    }
}

/// Node declarations in emission order.
#[derive(Debug, Clone, PartialEq)]
enum Section {
    Node(NodeIndex),
    Group { title: String, sections: Vec<Section> },
}

fn module_key(node: &CallNode) -> String {
    node.module_path.clone().unwrap_or_else(|| "?".to_string())
}

fn type_key(node: &CallNode) -> String {
    match node.receiver_type.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => FREE_FUNCTION_GROUP.to_string(),
    }
}

fn sorted_nodes(graph: &CallGraph, flow: &FlowGraph) -> Vec<NodeIndex> {
    let mut nodes: Vec<NodeIndex> = flow.nodes().collect();
    nodes.sort_by(|&a, &b| {
        let (x, y) = (graph.node(a), graph.node(b));
        (&x.module_path, &x.receiver_type, &x.name, &x.id).cmp(&(&y.module_path, &y.receiver_type, &y.name, &y.id))
    });
    nodes
}

fn groups_of(members: BTreeMap<String, Vec<NodeIndex>>, tag: &str) -> Vec<Section> {
    members
        .into_iter()
        .map(|(key, nodes)| Section::Group {
            title: format!("{tag}:{key}"),
            sections: nodes.into_iter().map(Section::Node).collect(),
        })
        .collect()
}

fn layout(graph: &CallGraph, flow: &FlowGraph, mode: GroupMode) -> Vec<Section> {
    let nodes = sorted_nodes(graph, flow);
    match mode {
        GroupMode::None => nodes.into_iter().map(Section::Node).collect(),
        GroupMode::Module => {
            let mut by_module: BTreeMap<String, Vec<NodeIndex>> = BTreeMap::new();
            for idx in nodes {
                by_module.entry(module_key(graph.node(idx))).or_default().push(idx);
            }
            groups_of(by_module, "pkg")
        }
        GroupMode::Type => {
            let mut by_type: BTreeMap<String, Vec<NodeIndex>> = BTreeMap::new();
            for idx in nodes {
                by_type.entry(type_key(graph.node(idx))).or_default().push(idx);
            }
            groups_of(by_type, "type")
        }
        GroupMode::ModuleType => {
            let mut nested: BTreeMap<String, BTreeMap<String, Vec<NodeIndex>>> = BTreeMap::new();
            for idx in nodes {
                let node = graph.node(idx);
                nested
                    .entry(module_key(node))
                    .or_default()
                    .entry(type_key(node))
                    .or_default()
                    .push(idx);
            }
            nested
                .into_iter()
                .map(|(module, types)| Section::Group {
                    title: format!("pkg:{module}"),
                    sections: groups_of(types, "type"),
                })
                .collect()
        }
    }
}

/// Edges as compact-id pairs, sorted. Call after all nodes were numbered.
fn sorted_edges(flow: &FlowGraph, ids: &mut CompactIds) -> Vec<(usize, usize)> {
    let mut edges: Vec<(usize, usize)> = flow
        .edges()
        .map(|(from, to, _)| (ids.number(from), ids.number(to)))
        .collect();
    edges.sort_unstable();
    edges
}

fn location_text(node: &CallNode) -> (String, usize) {
    match &node.location {
        Some(loc) => (loc.file_name().to_string(), loc.line),
        None => ("?".to_string(), 0),
    }
}

/// Mermaid `flowchart LR` output.
pub struct MermaidExporter;

impl MermaidExporter {
    fn escape(text: &str) -> String {
        text.replace('"', "#quot;")
            .replace('<', "#lt;")
            .replace('>', "#gt;")
    }

    fn label(node: &CallNode) -> String {
        let (file, line) = location_text(node);
        format!("{}<br/>{}:{}", Self::escape(&node.name), Self::escape(&file), line)
    }

    fn write_sections(
        sections: &[Section],
        graph: &CallGraph,
        ids: &mut CompactIds,
        groups: &mut usize,
        lines: &mut Vec<String>,
    ) {
        for section in sections {
            match section {
                Section::Node(idx) => {
                    let id = ids.resolve(*idx);
                    lines.push(format!("{}[\"{}\"]", id, Self::label(graph.node(*idx))));
                }
                Section::Group { title, sections } => {
                    *groups += 1;
                    lines.push(format!("subgraph G{}[\"{}\"]", groups, Self::escape(title)));
                    Self::write_sections(sections, graph, ids, groups, lines);
                    lines.push("end".to_string());
                }
            }
        }
    }
}

impl FlowRenderer for MermaidExporter {
    fn render(&self, graph: &CallGraph, flow: &FlowGraph, group: GroupMode) -> String {
        let mut ids = CompactIds::new("N");
        let mut groups = 0;
        let mut lines = vec!["flowchart LR".to_string()];
        Self::write_sections(&layout(graph, flow, group), graph, &mut ids, &mut groups, &mut lines);
        for (from, to) in sorted_edges(flow, &mut ids) {
            lines.push(format!("N{from} --> N{to}"));
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Graphviz DOT output, groups as clusters.
pub struct DotExporter;

impl DotExporter {
    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }

    fn node_style(node: &CallNode) -> (&'static str, &'static str) {
        if node.is_std {
            ("#6c7086", "filled,dashed") // Gray
        } else if node.exported {
            ("#89b4fa", "filled") // Blue
        } else {
            ("#cdd6f4", "filled") // Light
        }
    }

    fn write_sections(
        sections: &[Section],
        graph: &CallGraph,
        ids: &mut CompactIds,
        clusters: &mut usize,
        indent: usize,
        lines: &mut Vec<String>,
    ) {
        let pad = "    ".repeat(indent);
        for section in sections {
            match section {
                Section::Node(idx) => {
                    let node = graph.node(*idx);
                    let (file, line) = location_text(node);
                    let (color, style) = Self::node_style(node);
                    lines.push(format!(
                        "{}{} [label=\"{}\", style=\"{}\", fillcolor=\"{}\"];",
                        pad,
                        ids.resolve(*idx),
                        Self::escape_label(&format!("{}\n{}:{}", node.name, file, line)),
                        style,
                        color
                    ));
                }
                Section::Group { title, sections } => {
                    *clusters += 1;
                    lines.push(format!("{}subgraph cluster_{} {{", pad, clusters));
                    lines.push(format!("{}    label=\"{}\";", pad, Self::escape_label(title)));
                    Self::write_sections(sections, graph, ids, clusters, indent + 1, lines);
                    lines.push(format!("{}}}", pad));
                }
            }
        }
    }
}

impl FlowRenderer for DotExporter {
    fn render(&self, graph: &CallGraph, flow: &FlowGraph, group: GroupMode) -> String {
        let mut ids = CompactIds::new("N");
        let mut clusters = 0;
        let mut lines = vec![
            "digraph callgraph {".to_string(),
            "    rankdir=LR;".to_string(),
            "    node [shape=box, fontname=\"Helvetica\", fontsize=12];".to_string(),
            "    edge [fontname=\"Helvetica\", fontsize=10];".to_string(),
            String::new(),
        ];
        Self::write_sections(&layout(graph, flow, group), graph, &mut ids, &mut clusters, 1, &mut lines);
        lines.push(String::new());
        for (from, to) in sorted_edges(flow, &mut ids) {
            lines.push(format!("    N{from} -> N{to};"));
        }
        lines.push("}".to_string());
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// JSON graph document of the selection. Grouping does not apply.
pub struct JsonExporter;

impl FlowRenderer for JsonExporter {
    fn render(&self, graph: &CallGraph, flow: &FlowGraph, _group: GroupMode) -> String {
        let doc = GraphDocument::from_selection(graph, flow);
        // A document of plain strings and numbers always serializes.
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Renderer for an output format.
pub fn renderer_for(format: OutputFormat) -> Box<dyn FlowRenderer> {
    match format {
        OutputFormat::Mermaid => Box::new(MermaidExporter),
        OutputFormat::Dot => Box::new(DotExporter),
        OutputFormat::Json => Box::new(JsonExporter),
    }
}
