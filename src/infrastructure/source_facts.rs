//! Per-file extraction: function definitions, their call sites, and the
//! `use` imports of every module. Everything produced here is owned so files
//! can be parsed on worker threads.

use crate::infrastructure::project_loader::SourceFile;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Attribute, Block, Expr, ImplItem, Item, Meta, Signature, Token, TraitItem, UseTree, Visibility};

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    /// `a::b(..)`
    Path(Vec<String>),
    /// `recv.name(..)`
    Method { name: String, on_self: bool },
    /// `name!(..)`
    Macro(Vec<String>),
    /// A function path passed as an argument, e.g. `spawn(worker)`.
    FnRef(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    pub kind: CallKind,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct FnDef {
    pub id: String,
    pub name: String,
    pub module_path: String,
    /// Self type of an impl, or the trait of a default method.
    pub receiver: Option<String>,
    /// Default method body of a trait; `receiver` names the trait.
    pub trait_default: bool,
    pub exported: bool,
    pub file: String,
    pub line: usize,
    pub is_test: bool,
    pub calls: Vec<RawCall>,
    /// Type names constructed in the body.
    pub constructs: Vec<String>,
}

impl FnDef {
    pub fn crate_name(&self) -> &str {
        self.module_path.split("::").next().unwrap_or(&self.module_path)
    }
}

/// A `use` import: `alias` in `module` stands for `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub alias: String,
    pub path: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FileFacts {
    pub defs: Vec<FnDef>,
    pub imports: Vec<Import>,
    /// `(trait, self type)` of every `impl Trait for Type`.
    pub trait_impls: Vec<(String, String)>,
}

/// Which `cfg`-gated items are compiled in.
#[derive(Debug, Clone, Copy)]
pub struct CfgEnv<'a> {
    pub include_tests: bool,
    pub tags: &'a [String],
}

impl CfgEnv<'_> {
    pub fn keeps(&self, attrs: &[Attribute]) -> bool {
        attrs.iter().all(|attr| {
            if attr.path().is_ident("test") {
                return self.include_tests;
            }
            if !attr.path().is_ident("cfg") {
                return true;
            }
            attr.parse_args::<Meta>().map(|meta| self.eval(&meta)).unwrap_or(true)
        })
    }

    /// Unknown predicates hold.
    fn eval(&self, meta: &Meta) -> bool {
        match meta {
            Meta::Path(path) if path.is_ident("test") => self.include_tests,
            Meta::NameValue(nv) if nv.path.is_ident("feature") => match &nv.value {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s), ..
                }) => self.tags.iter().any(|t| *t == s.value()),
                _ => true,
            },
            Meta::List(list) => {
                let Ok(args) = list.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated) else {
                    return true;
                };
                if list.path.is_ident("not") {
                    args.first().map(|m| !self.eval(m)).unwrap_or(true)
                } else if list.path.is_ident("all") {
                    args.iter().all(|m| self.eval(m))
                } else if list.path.is_ident("any") {
                    args.iter().any(|m| self.eval(m))
                } else {
                    true
                }
            }
            _ => true,
        }
    }
}

fn is_test_fn(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|a| a.path().is_ident("test"))
}

fn is_pub(vis: &Visibility) -> bool {
    matches!(vis, Visibility::Public(_))
}

pub fn segments(path: &syn::Path) -> Vec<String> {
    path.segments.iter().map(|s| s.ident.to_string()).collect()
}

/// Name of the type an impl block is for (`Server` for `impl<T> a::Server<T>`).
fn type_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(tp) => tp.path.segments.last().map(|s| s.ident.to_string()),
        syn::Type::Reference(r) => type_name(&r.elem),
        _ => None,
    }
}

/// Parses one file. A file gated out by an inner `#![cfg(..)]` yields no facts.
pub fn extract(file: &SourceFile, env: CfgEnv<'_>) -> syn::Result<FileFacts> {
    let ast = syn::parse_file(&file.content)?;
    let mut facts = FileFacts::default();
    if env.keeps(&ast.attrs) {
        let mut walker = ItemWalker {
            file: file.display_path(),
            env,
            facts: &mut facts,
        };
        walker.items(&ast.items, &file.module_path);
    }
    Ok(facts)
}

struct Owner {
    ty: String,
    trait_name: Option<String>,
    trait_default: bool,
}

struct ItemWalker<'f, 'e> {
    file: String,
    env: CfgEnv<'e>,
    facts: &'f mut FileFacts,
}

impl ItemWalker<'_, '_> {
    fn items(&mut self, items: &[Item], module: &str) {
        for item in items {
            match item {
                Item::Fn(f) if self.env.keeps(&f.attrs) => {
                    self.function(module, None, &f.sig, &f.block, &f.attrs, is_pub(&f.vis));
                }
                Item::Impl(imp) if self.env.keeps(&imp.attrs) => {
                    let Some(ty) = type_name(&imp.self_ty) else { continue };
                    let trait_name = imp
                        .trait_
                        .as_ref()
                        .and_then(|(_, path, _)| path.segments.last())
                        .map(|s| s.ident.to_string());
                    if let Some(tr) = &trait_name {
                        self.facts.trait_impls.push((tr.clone(), ty.clone()));
                    }
                    for impl_item in &imp.items {
                        if let ImplItem::Fn(method) = impl_item {
                            if !self.env.keeps(&method.attrs) {
                                continue;
                            }
                            // trait methods are as visible as the trait
                            let exported = trait_name.is_some() || is_pub(&method.vis);
                            let owner = Owner {
                                ty: ty.clone(),
                                trait_name: trait_name.clone(),
                                trait_default: false,
                            };
                            self.function(module, Some(owner), &method.sig, &method.block, &method.attrs, exported);
                        }
                    }
                }
                Item::Trait(tr) if self.env.keeps(&tr.attrs) => {
                    for trait_item in &tr.items {
                        if let TraitItem::Fn(method) = trait_item {
                            let Some(block) = &method.default else { continue };
                            if !self.env.keeps(&method.attrs) {
                                continue;
                            }
                            let owner = Owner {
                                ty: tr.ident.to_string(),
                                trait_name: None,
                                trait_default: true,
                            };
                            self.function(module, Some(owner), &method.sig, block, &method.attrs, is_pub(&tr.vis));
                        }
                    }
                }
                Item::Mod(m) if self.env.keeps(&m.attrs) => {
                    if let Some((_, content)) = &m.content {
                        self.items(content, &format!("{}::{}", module, m.ident));
                    }
                }
                Item::Use(u) if self.env.keeps(&u.attrs) => {
                    let mut flat = Vec::new();
                    flatten_use(&u.tree, &mut Vec::new(), &mut flat);
                    for (alias, path) in flat {
                        self.facts.imports.push(Import {
                            module: module.to_string(),
                            alias,
                            path,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn function(
        &mut self,
        module: &str,
        owner: Option<Owner>,
        sig: &Signature,
        block: &Block,
        attrs: &[Attribute],
        exported: bool,
    ) {
        let name = sig.ident.to_string();
        let id = match &owner {
            None => format!("{module}::{name}"),
            Some(Owner { ty, trait_name: None, .. }) => format!("{module}::{ty}::{name}"),
            Some(Owner { ty, trait_name: Some(tr), .. }) => format!("{module}::<{ty} as {tr}>::{name}"),
        };
        let self_type = owner.as_ref().map(|o| o.ty.clone());
        let trait_default = owner.as_ref().map(|o| o.trait_default).unwrap_or(false);
        let mut body = BodyVisitor {
            self_type: self_type.as_deref(),
            calls: Vec::new(),
            constructs: Vec::new(),
        };
        body.visit_block(block);
        let (calls, constructs) = (body.calls, body.constructs);

        self.facts.defs.push(FnDef {
            id,
            name,
            module_path: module.to_string(),
            receiver: self_type,
            trait_default,
            exported,
            file: self.file.clone(),
            line: sig.ident.span().start().line,
            is_test: is_test_fn(attrs),
            calls,
            constructs,
        });
    }
}

fn flatten_use(tree: &UseTree, prefix: &mut Vec<String>, out: &mut Vec<(String, Vec<String>)>) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            flatten_use(&p.tree, prefix, out);
            prefix.pop();
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            if name == "self" {
                if let Some(last) = prefix.last() {
                    out.push((last.clone(), prefix.clone()));
                }
            } else {
                let mut full = prefix.clone();
                full.push(name.clone());
                out.push((name, full));
            }
        }
        UseTree::Rename(r) => {
            let mut full = prefix.clone();
            full.push(r.ident.to_string());
            out.push((r.rename.to_string(), full));
        }
        UseTree::Glob(_) => {}
        UseTree::Group(g) => {
            for item in &g.items {
                flatten_use(item, prefix, out);
            }
        }
    }
}

struct BodyVisitor<'a> {
    self_type: Option<&'a str>,
    calls: Vec<RawCall>,
    constructs: Vec<String>,
}

impl BodyVisitor<'_> {
    fn push(&mut self, kind: CallKind, span: proc_macro2::Span) {
        self.calls.push(RawCall {
            kind,
            line: span.start().line,
        });
    }

    fn construct(&mut self, ty: &str) {
        let ty = match (ty, self.self_type) {
            ("Self", Some(own)) => own,
            _ => ty,
        };
        if ty.starts_with(|c: char| c.is_ascii_uppercase()) && !self.constructs.iter().any(|t| t == ty) {
            self.constructs.push(ty.to_string());
        }
    }

    fn fn_refs<'ast>(&mut self, args: impl IntoIterator<Item = &'ast Expr>) {
        for arg in args {
            if let Expr::Path(p) = arg {
                if p.qself.is_none() {
                    self.push(CallKind::FnRef(segments(&p.path)), p.span());
                }
            }
        }
    }
}

impl<'ast> Visit<'ast> for BodyVisitor<'_> {
    // nested items are definitions of their own
    fn visit_item(&mut self, _item: &'ast Item) {}

    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        if let Expr::Path(p) = &*call.func {
            if p.qself.is_none() {
                self.push(CallKind::Path(segments(&p.path)), call.func.span());
            }
        }
        self.fn_refs(&call.args);
        visit::visit_expr_call(self, call);
    }

    fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
        let on_self = matches!(&*call.receiver, Expr::Path(p) if p.path.is_ident("self"));
        self.push(
            CallKind::Method {
                name: call.method.to_string(),
                on_self,
            },
            call.method.span(),
        );
        self.fn_refs(&call.args);
        visit::visit_expr_method_call(self, call);
    }

    // unit structs, variants and `Type::ctor` paths
    fn visit_expr_path(&mut self, expr: &'ast syn::ExprPath) {
        let segs = &expr.path.segments;
        let ty = if segs.len() >= 2 { segs.iter().nth(segs.len() - 2) } else { segs.first() };
        if let Some(ty) = ty {
            self.construct(&ty.ident.to_string());
        }
        visit::visit_expr_path(self, expr);
    }

    fn visit_expr_struct(&mut self, expr: &'ast syn::ExprStruct) {
        if let Some(last) = expr.path.segments.last() {
            self.construct(&last.ident.to_string());
        }
        visit::visit_expr_struct(self, expr);
    }

    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        self.push(CallKind::Macro(segments(&mac.path)), mac.path.span());
        // format-style arguments; anything else is left alone
        if let Ok(args) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                self.visit_expr(arg);
            }
        }
    }
}
