use crate::api::dto::{QueryPlan, QueryRequest, QueryResponse, Stats};
use crate::domain::callgraph::CallGraph;
use crate::domain::context::{Interrupt, QueryContext};
use crate::domain::depth::DepthMap;
use crate::domain::entry_point::EntryPointDetector;
use crate::domain::filter::EdgeFilter;
use crate::domain::flowgraph::FlowGraph;
use crate::domain::resolver::resolve_symbol;
use crate::domain::traversal::Traversal;
use crate::error::{QueryError, Result};
use crate::ports::flowchart_exporter::renderer_for;
use crate::ports::CallGraphBuilder;
use std::time::Instant;

/// Selected subgraph plus the graph it indexes into.
pub struct Selection {
    pub graph: CallGraph,
    pub flow: FlowGraph,
}

pub struct QueryUsecase<'a> {
    pub callgraph_builder: &'a dyn CallGraphBuilder,
    pub interrupt: Interrupt,
}

impl<'a> QueryUsecase<'a> {
    pub fn new(callgraph_builder: &'a dyn CallGraphBuilder) -> Self {
        Self {
            callgraph_builder,
            interrupt: Interrupt::none(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// validate → build → select → render.
    pub fn run(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();
        let plan = request.validate()?;
        let mut interrupt = self.interrupt.clone();
        if let Some(timeout) = plan.timeout {
            interrupt = interrupt.with_timeout(timeout);
        }
        let ctx = QueryContext::new(plan.debug, interrupt);

        let graph = self
            .callgraph_builder
            .build_call_graph(&plan.build)
            .map_err(QueryError::CollaboratorFailure)?;
        ctx.log.step(format_args!(
            "{} builder produced {} nodes, {} edges",
            plan.build.algorithm,
            graph.node_count(),
            graph.edge_count()
        ));

        let selection = select(graph, &plan, &ctx)?;
        let body = renderer_for(plan.format).render(&selection.graph, &selection.flow, plan.group);
        let duration_ms = started.elapsed().as_millis() as u64;
        ctx.log.step(format_args!("query finished in {} ms", duration_ms));

        Ok(QueryResponse {
            format: plan.format.name().to_string(),
            body,
            stats: Stats {
                node_count: selection.flow.node_count(),
                edge_count: selection.flow.edge_count(),
                duration_ms,
            },
        })
    }
}

/// Runs the selection stages of a validated plan on an already built graph.
/// Symbol mode walks from the resolved symbol; otherwise the whole graph is
/// filtered, with synthetic nodes stripped and output bounded by distance
/// from the entry points.
pub fn select(graph: CallGraph, plan: &QueryPlan, ctx: &QueryContext) -> Result<Selection> {
    match plan.symbol.as_deref() {
        Some(symbol) => {
            let start = resolve_symbol(&graph, symbol)?;
            let flow = {
                let filter = EdgeFilter::new(&graph, &plan.filter);
                Traversal::new(&graph, &filter, plan.max_depth, ctx).run(start, plan.direction)?
            };
            Ok(Selection { graph, flow })
        }
        None => {
            let graph = graph.without_synthetic_nodes();
            let flow = {
                let filter = EdgeFilter::new(&graph, &plan.filter);
                let depth = if plan.max_depth > 0 {
                    let roots: Vec<_> = EntryPointDetector::detect(&graph).into_iter().map(|e| e.node).collect();
                    Some(DepthMap::compute(&graph, &roots, plan.max_depth, ctx)?)
                } else {
                    None
                };
                FlowGraph::select_whole(&graph, &filter, depth.as_ref(), ctx)?
            };
            Ok(Selection { graph, flow })
        }
    }
}
