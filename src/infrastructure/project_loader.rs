use crate::ports::BuildRequest;
use anyhow::{Context, Result};
use cargo_metadata::MetadataCommand;
use std::fs;
use std::path::{Path, PathBuf};

/// One Rust source file and the module it defines.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `crate::a::b` style path with the crate name in front.
    pub module_path: String,
    pub content: String,
}

impl SourceFile {
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct ProjectLoader;

impl ProjectLoader {
    /// Loads every module argument: a `Cargo.toml`, a crate or source
    /// directory, or a single `.rs` file, resolved against `request.dir`.
    pub fn load(request: &BuildRequest) -> Result<Vec<SourceFile>> {
        let base = request.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut files = Vec::new();
        for arg in &request.module_args {
            let path = base.join(arg);
            if !path.exists() {
                anyhow::bail!("module argument {} not found (resolved to {})", arg, path.display());
            }
            if path.file_name().map(|n| n == "Cargo.toml").unwrap_or(false) {
                files.extend(Self::load_workspace(&path, request.include_tests)?);
            } else if path.is_dir() {
                files.extend(Self::load_dir(&path, request.include_tests)?);
            } else {
                let crate_name = path
                    .file_stem()
                    .map(|s| crate_ident(&s.to_string_lossy()))
                    .unwrap_or_else(|| "main".to_string());
                Self::push_file(&path, crate_name, &mut files)?;
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);
        log::debug!("loaded {} source files", files.len());
        Ok(files)
    }

    /// All lib/bin targets of the workspace members.
    pub fn load_workspace(manifest_path: &Path, include_tests: bool) -> Result<Vec<SourceFile>> {
        let metadata = MetadataCommand::new()
            .manifest_path(manifest_path)
            .no_deps()
            .exec()
            .context("Failed to execute cargo metadata")?;

        let mut files = Vec::new();
        for package_id in &metadata.workspace_members {
            let Some(package) = metadata.packages.iter().find(|p| &p.id == package_id) else {
                continue;
            };
            let crate_name = crate_ident(&package.name);
            for target in &package.targets {
                let is_test = target.kind.iter().any(|k| k == "test");
                if is_test && !include_tests {
                    continue;
                }
                if !is_test && !target.kind.iter().any(|k| k == "lib" || k == "bin" || k == "proc-macro") {
                    continue;
                }
                let src_path = target.src_path.as_std_path();
                if is_test || src_path.parent().map(|p| p.ends_with("bin")).unwrap_or(false) {
                    Self::push_file(src_path, crate_ident(&target.name), &mut files)?;
                } else if let Some(src_dir) = src_path.parent() {
                    Self::collect_rs_recursive(src_dir, src_dir, &crate_name, &mut files)?;
                }
            }
        }
        Ok(files)
    }

    /// A crate directory (with `src/`) or a plain directory of sources.
    fn load_dir(dir: &Path, include_tests: bool) -> Result<Vec<SourceFile>> {
        let manifest = dir.join("Cargo.toml");
        let mut crate_name = None;
        if manifest.is_file() {
            crate_name = package_name(&manifest)?;
        }
        if crate_name.is_none() {
            let full = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
            crate_name = full.file_name().map(|n| n.to_string_lossy().to_string());
        }
        let crate_name = crate_name
            .map(|n| crate_ident(&n))
            .unwrap_or_else(|| "main".to_string());

        let mut files = Vec::new();
        let src = dir.join("src");
        if src.is_dir() {
            Self::collect_rs_recursive(&src, &src, &crate_name, &mut files)?;
            let tests = dir.join("tests");
            if include_tests && tests.is_dir() {
                for entry in fs::read_dir(&tests)? {
                    let path = entry?.path();
                    if path.extension().map(|e| e == "rs").unwrap_or(false) {
                        let stem = path.file_stem().map(|s| crate_ident(&s.to_string_lossy()));
                        Self::push_file(&path, stem.unwrap_or_else(|| "tests".to_string()), &mut files)?;
                    }
                }
            }
        } else {
            Self::collect_rs_recursive(dir, dir, &crate_name, &mut files)?;
        }
        Ok(files)
    }

    fn collect_rs_recursive(root: &Path, dir: &Path, crate_name: &str, out: &mut Vec<SourceFile>) -> Result<()> {
        if dir.ends_with("target") || dir.ends_with(".git") {
            return Ok(());
        }
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                // src/bin targets are crates of their own
                if dir == root && path.ends_with("bin") {
                    for bin in fs::read_dir(&path)? {
                        let bin = bin?.path();
                        if bin.extension().map(|e| e == "rs").unwrap_or(false) {
                            let stem = bin.file_stem().map(|s| crate_ident(&s.to_string_lossy()));
                            Self::push_file(&bin, stem.unwrap_or_else(|| crate_name.to_string()), out)?;
                        }
                    }
                    continue;
                }
                Self::collect_rs_recursive(root, &path, crate_name, out)?;
            } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                let module = module_path_for(root, &path, crate_name);
                Self::push_file(&path, module, out)?;
            }
        }
        Ok(())
    }

    fn push_file(path: &Path, module_path: String, out: &mut Vec<SourceFile>) -> Result<()> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read file {}", path.display()))?;
        out.push(SourceFile {
            path: path.to_path_buf(),
            module_path,
            content,
        });
        Ok(())
    }
}

/// `src/a/b.rs` and `src/a/b/mod.rs` are `crate::a::b`; `lib.rs` and
/// `main.rs` at the root are the crate itself.
pub fn module_path_for(root: &Path, file: &Path, crate_name: &str) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = rel
        .iter()
        .map(|s| s.to_string_lossy().to_string())
        .collect();
    if let Some(last) = segments.pop() {
        let stem = last.trim_end_matches(".rs");
        let is_root = segments.is_empty() && (stem == "lib" || stem == "main");
        if stem != "mod" && !is_root {
            segments.push(stem.to_string());
        }
    }
    std::iter::once(crate_name.to_string())
        .chain(segments.into_iter().map(|s| crate_ident(&s)))
        .collect::<Vec<_>>()
        .join("::")
}

fn crate_ident(name: &str) -> String {
    name.replace('-', "_")
}

fn package_name(manifest: &Path) -> Result<Option<String>> {
    let text = fs::read_to_string(manifest).with_context(|| format!("Failed to read {}", manifest.display()))?;
    let parsed: toml::Value = toml::from_str(&text).with_context(|| format!("Invalid toml in {}", manifest.display()))?;
    Ok(parsed
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string))
}
