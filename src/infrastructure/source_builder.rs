//! Call graph construction from Rust sources.
//!
//! `static` links only calls with a single possible target, `cha` fans
//! method calls out to every method of that name, and `rta` does the same
//! restricted to code reachable from `main` and to receiver types that
//! reachable code constructs, iterated until nothing new becomes reachable.

use crate::domain::callgraph::{CallEdge, CallGraph, CallNode};
use crate::domain::query::Algorithm;
use crate::infrastructure::project_loader::ProjectLoader;
use crate::infrastructure::source_facts::CfgEnv;
use crate::infrastructure::symbol_index::{ForeignFn, SymbolIndex, Target};
use crate::ports::{BuildRequest, CallGraphBuilder};
use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;
use std::collections::{HashSet, VecDeque};

pub struct SourceCallGraphBuilder;

impl CallGraphBuilder for SourceCallGraphBuilder {
    fn build_call_graph(&self, request: &BuildRequest) -> Result<CallGraph> {
        let files = ProjectLoader::load(request).context("loading sources")?;
        if files.is_empty() {
            anyhow::bail!("no Rust sources found in {}", request.module_args.join(", "));
        }
        let env = CfgEnv {
            include_tests: request.include_tests,
            tags: &request.tags,
        };
        let index = SymbolIndex::build(&files, env);
        let mut assembler = Assembler::new(&index, request.algorithm);
        match request.algorithm {
            Algorithm::Static | Algorithm::Cha => assembler.everything(),
            Algorithm::Rta => assembler
                .reachable(request.include_tests)
                .context("rta analysis")?,
            Algorithm::Import => anyhow::bail!("graph documents are read by the import builder"),
        }
        Ok(assembler.graph)
    }
}

struct Assembler<'a> {
    index: &'a SymbolIndex,
    algorithm: Algorithm,
    graph: CallGraph,
    local: Vec<Option<NodeIndex>>,
}

impl<'a> Assembler<'a> {
    fn new(index: &'a SymbolIndex, algorithm: Algorithm) -> Self {
        Self {
            index,
            algorithm,
            graph: CallGraph::new(),
            local: vec![None; index.defs.len()],
        }
    }

    fn everything(&mut self) {
        for i in 0..self.index.defs.len() {
            self.local_node(i);
        }
        for i in 0..self.index.defs.len() {
            self.link(i, None);
        }
    }

    fn reachable(&mut self, include_tests: bool) -> Result<()> {
        let index = self.index;
        let roots = index.entry_points(include_tests);
        if roots.is_empty() {
            anyhow::bail!("no main function");
        }

        let mut reachable = vec![false; index.defs.len()];
        let mut instantiated: HashSet<String> = HashSet::new();
        loop {
            let before = (reachable.iter().filter(|r| **r).count(), instantiated.len());
            let mut seen = vec![false; index.defs.len()];
            let mut queue: VecDeque<usize> = roots.iter().copied().collect();
            for &r in &roots {
                seen[r] = true;
                reachable[r] = true;
            }
            while let Some(i) = queue.pop_front() {
                let def = &index.defs[i];
                instantiated.extend(def.constructs.iter().cloned());
                for call in &def.calls {
                    for target in index.resolve_call(def, call, self.algorithm, Some(&instantiated)) {
                        if let Target::Local(j) = target {
                            reachable[j] = true;
                            if !seen[j] {
                                seen[j] = true;
                                queue.push_back(j);
                            }
                        }
                    }
                }
            }
            let after = (reachable.iter().filter(|r| **r).count(), instantiated.len());
            if after == before {
                break;
            }
        }
        log::debug!(
            "rta: {} of {} functions reachable, {} types instantiated",
            reachable.iter().filter(|r| **r).count(),
            index.defs.len(),
            instantiated.len()
        );

        for i in (0..index.defs.len()).filter(|&i| reachable[i]) {
            self.local_node(i);
        }
        for i in (0..index.defs.len()).filter(|&i| reachable[i]) {
            self.link(i, Some(&instantiated));
        }
        for &r in &roots {
            let idx = self.local_node(r);
            self.graph.declare_root(idx);
        }
        Ok(())
    }

    fn link(&mut self, i: usize, instantiated: Option<&HashSet<String>>) {
        let index = self.index;
        let def = &index.defs[i];
        let from = self.local_node(i);
        for call in &def.calls {
            for target in index.resolve_call(def, call, self.algorithm, instantiated) {
                let to = self.target_node(&target);
                self.graph.add_edge(from, to, CallEdge::at(def.file.as_str(), call.line));
            }
        }
    }

    fn local_node(&mut self, i: usize) -> NodeIndex {
        if let Some(idx) = self.local[i] {
            return idx;
        }
        let def = &self.index.defs[i];
        let mut node = CallNode::new(def.id.as_str(), def.name.as_str())
            .in_module(def.module_path.as_str())
            .at(def.file.as_str(), def.line)
            .exported(def.exported);
        if let Some(receiver) = &def.receiver {
            node = node.receiver(receiver.as_str());
        }
        let idx = self.graph.add_node(node);
        self.local[i] = Some(idx);
        idx
    }

    fn foreign_node(&mut self, f: &ForeignFn, is_std: bool) -> NodeIndex {
        let id = f.id();
        if let Some(idx) = self.graph.find(&id) {
            return idx;
        }
        let mut node = CallNode::new(id, f.name())
            .in_module(f.module_path())
            .std(is_std)
            .exported(true);
        if let Some(receiver) = f.receiver() {
            node = node.receiver(receiver);
        }
        self.graph.add_node(node)
    }

    fn target_node(&mut self, target: &Target) -> NodeIndex {
        match target {
            Target::Local(i) => self.local_node(*i),
            Target::Std(f) => self.foreign_node(f, true),
            Target::External(f) => self.foreign_node(f, false),
            Target::Unresolved(text) => {
                let id = format!("?{text}");
                if let Some(idx) = self.graph.find(&id) {
                    return idx;
                }
                let name = text
                    .rsplit(|c| c == ':' || c == '.')
                    .find(|s| !s.is_empty())
                    .unwrap_or(text)
                    .to_string();
                self.graph.add_node(CallNode::new(id, name))
            }
        }
    }
}
