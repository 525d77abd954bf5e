//! Benchmarks for the query stages over synthetic layered graphs.
//!
//! Run with: `cargo bench`

use callflow::domain::context::QueryContext;
use callflow::domain::filter::{EdgeFilter, FilterConfig};
use callflow::domain::flowgraph::FlowGraph;
use callflow::domain::query::{Direction, GroupMode};
use callflow::domain::traversal::Traversal;
use callflow::ports::flowchart_exporter::MermaidExporter;
use callflow::ports::FlowRenderer;
use callflow::{CallEdge, CallGraph, CallNode};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// `layers` rows of `width` functions; each calls three functions of the
/// next row, and every tenth calls back into the first row.
fn layered_graph(layers: usize, width: usize) -> CallGraph {
    let mut g = CallGraph::new();
    let mut rows = Vec::with_capacity(layers);
    for layer in 0..layers {
        let module = format!("app::layer{}", layer);
        let row: Vec<_> = (0..width)
            .map(|i| {
                g.add_node(
                    CallNode::new(format!("{module}::f{i}"), format!("f{i}"))
                        .in_module(module.as_str())
                        .at(format!("layer{layer}.rs"), i + 1)
                        .exported(i % 4 != 0),
                )
            })
            .collect();
        rows.push(row);
    }
    for layer in 0..layers.saturating_sub(1) {
        for i in 0..width {
            for k in 0..3 {
                let callee = rows[layer + 1][(i * 7 + k) % width];
                g.add_edge(rows[layer][i], callee, CallEdge::at(format!("layer{layer}.rs"), i + 1));
            }
            if i % 10 == 0 {
                g.add_edge(rows[layer + 1][i], rows[0][i], CallEdge::default());
            }
        }
    }
    g
}

fn bench_whole_graph_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("whole_graph_filter");
    let ctx = QueryContext::default();
    let config = FilterConfig {
        exclude_std: true,
        exclude_unexported: true,
        limit_keywords: vec!["layer".to_string()],
        ignore: vec!["layer3".to_string()],
        ..Default::default()
    };

    for &width in [100usize, 1_000].iter() {
        let g = layered_graph(8, width);
        group.throughput(Throughput::Elements(g.edge_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &g, |b, g| {
            b.iter(|| {
                let filter = EdgeFilter::new(g, &config);
                black_box(FlowGraph::select_whole(g, &filter, None, &ctx).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");
    let ctx = QueryContext::default();
    let config = FilterConfig::default();
    let g = layered_graph(12, 1_000);
    let filter = EdgeFilter::new(&g, &config);
    let start = g.find("app::layer6::f0").unwrap();

    for direction in [Direction::Downstream, Direction::Upstream, Direction::Both] {
        group.bench_function(direction.name(), |b| {
            b.iter(|| black_box(Traversal::new(&g, &filter, 0, &ctx).run(start, direction).unwrap()))
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let ctx = QueryContext::default();
    let config = FilterConfig::default();
    let g = layered_graph(6, 500);
    let filter = EdgeFilter::new(&g, &config);
    let flow = FlowGraph::select_whole(&g, &filter, None, &ctx).unwrap();

    c.bench_function("mermaid_grouped", |b| {
        b.iter(|| black_box(MermaidExporter.render(&g, &flow, GroupMode::Module)))
    });
}

criterion_group!(benches, bench_whole_graph_filter, bench_traversal, bench_render);
criterion_main!(benches);
