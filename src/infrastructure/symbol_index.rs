use crate::domain::query::Algorithm;
use crate::infrastructure::project_loader::SourceFile;
use crate::infrastructure::source_facts::{extract, CallKind, CfgEnv, FileFacts, FnDef, Import, RawCall};
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Platform crates; paths into them produce std nodes.
const STD_CRATES: [&str; 3] = ["std", "core", "alloc"];

/// Macros the standard library exports at the crate root.
const STD_MACROS: [&str; 22] = [
    "println",
    "print",
    "eprintln",
    "eprint",
    "format",
    "format_args",
    "write",
    "writeln",
    "vec",
    "panic",
    "assert",
    "assert_eq",
    "assert_ne",
    "debug_assert",
    "debug_assert_eq",
    "debug_assert_ne",
    "dbg",
    "todo",
    "unimplemented",
    "unreachable",
    "matches",
    "concat",
];

/// Prelude names and where they live.
const PRELUDE: [(&str, &str); 9] = [
    ("Box", "std::boxed::Box"),
    ("Vec", "std::vec::Vec"),
    ("String", "std::string::String"),
    ("Option", "std::option::Option"),
    ("Result", "std::result::Result"),
    ("Some", "std::option::Option::Some"),
    ("Ok", "std::result::Result::Ok"),
    ("Err", "std::result::Result::Err"),
    ("drop", "std::mem::drop"),
];

/// A function outside the analyzed sources, by full path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignFn {
    pub path: Vec<String>,
}

impl ForeignFn {
    pub fn id(&self) -> String {
        self.path.join("::")
    }

    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// Type segment right before the name, if it looks like one.
    pub fn receiver(&self) -> Option<&str> {
        let n = self.path.len();
        (n >= 3)
            .then(|| self.path[n - 2].as_str())
            .filter(|s| s.starts_with(|c: char| c.is_ascii_uppercase()))
    }

    pub fn module_path(&self) -> String {
        let keep = self.path.len().saturating_sub(if self.receiver().is_some() { 2 } else { 1 });
        self.path[..keep.max(1)].join("::")
    }
}

/// What a call site refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Index into `SymbolIndex::defs`.
    Local(usize),
    Std(ForeignFn),
    External(ForeignFn),
    /// Text of a reference nothing matched.
    Unresolved(String),
}

/// Rewrites a leading `crate`, `self` or `super` relative to `module`.
pub fn absolutize(segs: &[String], module: &str) -> Vec<String> {
    let mut base: Vec<String> = module.split("::").map(str::to_string).collect();
    let mut rest = segs;
    match rest.first().map(String::as_str) {
        Some("crate") => {
            base.truncate(1);
            rest = &rest[1..];
        }
        Some("self") => rest = &rest[1..],
        Some("super") => {
            while rest.first().map(|s| s == "super").unwrap_or(false) {
                if base.len() > 1 {
                    base.pop();
                }
                rest = &rest[1..];
            }
        }
        _ => return segs.to_vec(),
    }
    base.extend(rest.iter().cloned());
    base
}

fn parent(module: &str) -> &str {
    module.rsplit_once("::").map(|(head, _)| head).unwrap_or(module)
}

/// Definitions of the analyzed sources, indexed for call resolution.
/// Built from files parsed in parallel.
pub struct SymbolIndex {
    pub defs: Vec<FnDef>,
    // Key: module::name of free functions
    functions: DashMap<String, usize>,
    // Key: bare name of free functions
    by_name: DashMap<String, Vec<usize>>,
    // Key: (TypeName, MethodName)
    type_methods: DashMap<(String, String), Vec<usize>>,
    // Key: method name
    methods: DashMap<String, Vec<usize>>,
    // trait -> implementing types
    implementors: DashMap<String, Vec<String>>,
    // module -> alias -> absolute path
    imports: DashMap<String, HashMap<String, Vec<String>>>,
    modules: DashSet<String>,
}

impl SymbolIndex {
    /// Parse and index all sources. Files that fail to parse are skipped
    /// with a warning.
    pub fn build(sources: &[SourceFile], env: CfgEnv<'_>) -> Self {
        let facts: Vec<FileFacts> = sources
            .par_iter()
            .filter_map(|file| match extract(file, env) {
                Ok(facts) => Some(facts),
                Err(e) => {
                    log::warn!("failed to parse {}: {}", file.display_path(), e);
                    None
                }
            })
            .collect();

        let mut defs = Vec::new();
        let mut imports: Vec<Import> = Vec::new();
        let mut trait_impls = Vec::new();
        for f in facts {
            defs.extend(f.defs);
            imports.extend(f.imports);
            trait_impls.extend(f.trait_impls);
        }
        let index = SymbolIndex {
            defs,
            functions: DashMap::new(),
            by_name: DashMap::new(),
            type_methods: DashMap::new(),
            methods: DashMap::new(),
            implementors: DashMap::new(),
            imports: DashMap::new(),
            modules: DashSet::new(),
        };
        for file in sources {
            index.add_module(&file.module_path);
        }

        index.defs.par_iter().enumerate().for_each(|(i, def)| {
            index.add_module(&def.module_path);
            match &def.receiver {
                None => {
                    // duplicate ids keep the first definition
                    index
                        .functions
                        .entry(def.id.clone())
                        .and_modify(|first| *first = (*first).min(i))
                        .or_insert(i);
                    index.by_name.entry(def.name.clone()).or_default().push(i);
                }
                Some(ty) => {
                    index
                        .type_methods
                        .entry((ty.clone(), def.name.clone()))
                        .or_default()
                        .push(i);
                    index.methods.entry(def.name.clone()).or_default().push(i);
                }
            }
        });
        // parallel pushes land in any order
        index.by_name.iter_mut().for_each(|mut e| e.value_mut().sort_unstable());
        index.type_methods.iter_mut().for_each(|mut e| e.value_mut().sort_unstable());
        index.methods.iter_mut().for_each(|mut e| e.value_mut().sort_unstable());

        for (tr, ty) in trait_impls {
            index.implementors.entry(tr).or_default().push(ty);
        }

        for import in imports {
            let path = absolutize(&import.path, &import.module);
            index
                .imports
                .entry(import.module)
                .or_default()
                .insert(import.alias, path);
        }

        log::debug!(
            "symbol index: {} definitions, {} modules",
            index.defs.len(),
            index.modules.len()
        );
        index
    }

    fn add_module(&self, module: &str) {
        let mut current = module;
        loop {
            if !self.modules.insert(current.to_string()) {
                break;
            }
            let up = parent(current);
            if up == current {
                break;
            }
            current = up;
        }
    }

    /// Free `main` functions at crate roots, plus `#[test]` functions when
    /// tests are included.
    pub fn entry_points(&self, include_tests: bool) -> Vec<usize> {
        self.defs
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                let is_main = d.name == "main" && d.receiver.is_none() && !d.module_path.contains("::");
                is_main || (include_tests && d.is_test)
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn resolve_call(
        &self,
        def: &FnDef,
        call: &RawCall,
        algorithm: Algorithm,
        instantiated: Option<&HashSet<String>>,
    ) -> Vec<Target> {
        let self_type = def.receiver.as_deref();
        match &call.kind {
            CallKind::Path(segs) => self.resolve_path(segs, def, self_type),
            CallKind::FnRef(segs) => self
                .resolve_path(segs, def, self_type)
                .into_iter()
                .filter(|t| matches!(t, Target::Local(_)))
                .collect(),
            CallKind::Macro(segs) => vec![self.resolve_macro(segs, &def.module_path)],
            CallKind::Method { name, on_self } => {
                self.resolve_method(name, *on_self, self_type, algorithm, instantiated)
            }
        }
    }

    fn expand_import(&self, segs: &[String], module: &str) -> Vec<String> {
        let Some(first) = segs.first() else {
            return Vec::new();
        };
        let imported = self
            .imports
            .get(module)
            .and_then(|aliases| aliases.get(first).cloned());
        match imported {
            Some(mut path) => {
                path.extend(segs[1..].iter().cloned());
                path
            }
            None => absolutize(segs, module),
        }
    }

    fn methods_of(&self, ty: &str, name: &str) -> Vec<Target> {
        self.type_methods
            .get(&(ty.to_string(), name.to_string()))
            .map(|ids| ids.iter().map(|&i| Target::Local(i)).collect())
            .unwrap_or_default()
    }

    fn resolve_path(&self, segs: &[String], def: &FnDef, self_type: Option<&str>) -> Vec<Target> {
        let unresolved = || vec![Target::Unresolved(segs.join("::"))];
        if segs.is_empty() {
            return unresolved();
        }
        if segs[0] == "Self" {
            return match (self_type, segs.len()) {
                (Some(ty), 2) => {
                    let found = self.methods_of(ty, &segs[1]);
                    if found.is_empty() {
                        unresolved()
                    } else {
                        found
                    }
                }
                _ => unresolved(),
            };
        }

        let module = def.module_path.as_str();
        let crate_name = def.crate_name();
        let path = self.expand_import(segs, module);
        if path.is_empty() {
            return unresolved();
        }
        if STD_CRATES.contains(&path[0].as_str()) {
            return vec![Target::Std(ForeignFn { path })];
        }

        // as written, then relative to the module, then to the crate root
        let joined = path.join("::");
        let candidates = [
            joined.clone(),
            format!("{module}::{joined}"),
            format!("{crate_name}::{joined}"),
        ];
        for candidate in &candidates {
            if let Some(i) = self.functions.get(candidate) {
                return vec![Target::Local(*i)];
            }
        }

        if path.len() == 1 {
            if let Some(found) = self.unique_by_name(&path[0], crate_name) {
                return vec![Target::Local(found)];
            }
        } else {
            let n = path.len();
            let found = self.methods_of(&path[n - 2], &path[n - 1]);
            if !found.is_empty() {
                return found;
            }
        }

        if let Some((_, full)) = PRELUDE.iter().find(|(name, _)| *name == path[0]) {
            let mut expanded: Vec<String> = full.split("::").map(str::to_string).collect();
            expanded.extend(path[1..].iter().cloned());
            return vec![Target::Std(ForeignFn { path: expanded })];
        }

        let local_module = candidates.iter().any(|c| {
            let head = c.rsplit_once("::").map(|(h, _)| h).unwrap_or(c);
            self.modules.contains(head) && head != module && head != crate_name
        }) || self.modules.contains(&path[0]);
        let looks_external = path.len() >= 2 && path[0].starts_with(|c: char| c.is_ascii_lowercase());
        if looks_external && !local_module {
            return vec![Target::External(ForeignFn { path })];
        }
        unresolved()
    }

    /// Bare name: current crate first, then a unique workspace match.
    fn unique_by_name(&self, name: &str, crate_name: &str) -> Option<usize> {
        let ids = self.by_name.get(name)?;
        let in_crate: Vec<usize> = ids
            .iter()
            .copied()
            .filter(|&i| self.defs[i].crate_name() == crate_name)
            .collect();
        match (in_crate.as_slice(), ids.as_slice()) {
            ([only], _) => Some(*only),
            ([], [only]) => Some(*only),
            _ => None,
        }
    }

    fn resolve_macro(&self, segs: &[String], module: &str) -> Target {
        let bang = |mut path: Vec<String>| {
            if let Some(last) = path.last_mut() {
                last.push('!');
            }
            ForeignFn { path }
        };
        match segs {
            [] => Target::Unresolved(String::new()),
            [single] if STD_MACROS.contains(&single.as_str()) => {
                Target::Std(bang(vec!["std".to_string(), single.clone()]))
            }
            [single] => Target::Unresolved(format!("{single}!")),
            _ => {
                let path = self.expand_import(segs, module);
                if STD_CRATES.contains(&path[0].as_str()) {
                    Target::Std(bang(path))
                } else {
                    Target::External(bang(path))
                }
            }
        }
    }

    /// A default method counts once any implementor of its trait is built.
    fn receiver_instantiated(&self, def: &FnDef, instantiated: &HashSet<String>) -> bool {
        let receiver = def.receiver.as_deref().unwrap_or("");
        if !def.trait_default {
            return instantiated.contains(receiver);
        }
        self.implementors
            .get(receiver)
            .map(|types| types.iter().any(|ty| instantiated.contains(ty)))
            .unwrap_or(false)
    }

    fn resolve_method(
        &self,
        name: &str,
        on_self: bool,
        self_type: Option<&str>,
        algorithm: Algorithm,
        instantiated: Option<&HashSet<String>>,
    ) -> Vec<Target> {
        if let (true, Some(ty)) = (on_self, self_type) {
            let found = self.methods_of(ty, name);
            if !found.is_empty() {
                return found;
            }
        }
        let candidates: Vec<usize> = self
            .methods
            .get(name)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        let chosen: Vec<usize> = match algorithm {
            Algorithm::Static | Algorithm::Import => {
                if candidates.len() == 1 {
                    candidates
                } else {
                    Vec::new()
                }
            }
            Algorithm::Cha => candidates,
            Algorithm::Rta => candidates
                .into_iter()
                .filter(|&i| match instantiated {
                    Some(set) => self.receiver_instantiated(&self.defs[i], set),
                    None => true,
                })
                .collect(),
        };
        if chosen.is_empty() {
            vec![Target::Unresolved(format!(".{name}"))]
        } else {
            chosen.into_iter().map(Target::Local).collect()
        }
    }
}
