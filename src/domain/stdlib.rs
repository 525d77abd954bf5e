//! Standard-library and runtime-adjacent module classification.

/// Platform crates shipped with the toolchain.
const STD_CRATES: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

/// Runtime support modules that are noise even when reached through std.
const RUNTIME_MODULES: &[&str] = &[
    "std::rt",
    "std::sys",
    "std::sys_common",
    "core::intrinsics",
    "core::panicking",
    "alloc::alloc",
];

/// Segments that mark a module as private plumbing of its crate.
const INTERNAL_SEGMENTS: &[&str] = &["internal", "__private", "__rt"];

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c| c == ':' || c == '/').filter(|s| !s.is_empty())
}

/// Whether a module path belongs to the platform library.
pub fn is_std_module_path(path: &str) -> bool {
    segments(path)
        .next()
        .map(|first| STD_CRATES.contains(&first))
        .unwrap_or(false)
}

/// Whether a module path is low-level runtime support rather than user or
/// dependency code.
pub fn is_internal_module_path(path: &str) -> bool {
    if segments(path).any(|seg| INTERNAL_SEGMENTS.contains(&seg)) {
        return true;
    }
    RUNTIME_MODULES.iter().any(|module| {
        path == *module
            || path
                .strip_prefix(module)
                .map(|rest| rest.starts_with("::"))
                .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_paths() {
        assert!(is_std_module_path("std"));
        assert!(is_std_module_path("std::collections::hash_map"));
        assert!(is_std_module_path("core::fmt"));
        assert!(is_std_module_path("alloc::vec"));
        assert!(!is_std_module_path("stdx::io"));
        assert!(!is_std_module_path("my_app::std"));
        assert!(!is_std_module_path(""));
    }

    #[test]
    fn test_internal_paths() {
        assert!(is_internal_module_path("std::rt"));
        assert!(is_internal_module_path("std::sys::unix::thread"));
        assert!(is_internal_module_path("serde::__private::de"));
        assert!(is_internal_module_path("tokio::runtime::internal"));
        assert!(is_internal_module_path("golang.org/x/internal/fmt"));
        assert!(!is_internal_module_path("std::rtx"));
        assert!(!is_internal_module_path("my_app::handlers"));
    }
}
