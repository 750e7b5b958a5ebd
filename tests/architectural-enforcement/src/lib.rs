//! Architectural Enforcement Integration Tests
//!
//! Line scanners over the chorus sources that enforce:
//! - No sleep() calls in production code outside retry delays
//! - No blocking I/O inside async functions
//!
//! The helpers here are shared by the test files under `tests/`.

use std::path::{Path, PathBuf};

/// Source directories checked by every scanner
pub const PRODUCTION_DIRS: &[&str] = &["chorus/core/src", "chorus/cli/src"];

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
///
/// # Panics
///
/// Panics if the directory does not exist, so a moved crate cannot make a
/// scanner pass vacuously.
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    assert!(root.is_dir(), "missing source directory: {}", root.display());

    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Code part of a line, with any `//` comment removed
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// If `line` declares a function, whether it is async
///
/// Recognizes visibility prefixes (`pub`, `pub(crate)`) and `async`.
#[must_use]
pub fn fn_declaration(line: &str) -> Option<bool> {
    let mut rest = line.trim();
    if let Some(after) = rest.strip_prefix("pub") {
        rest = match after.trim_start().strip_prefix('(') {
            Some(scoped) => scoped.split_once(')')?.1.trim_start(),
            None => after.trim_start(),
        };
    }
    if let Some(after) = rest.strip_prefix("async ") {
        return after.trim_start().starts_with("fn ").then_some(true);
    }
    rest.starts_with("fn ").then_some(false)
}

/// Whether `line` opens a module or impl block
#[must_use]
pub fn is_block_boundary(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("mod ")
        || line.starts_with("pub mod ")
        || (line.starts_with("impl") && line.contains('{'))
}

/// Index of the first top-level `#[cfg(test)]`; everything after is test code
#[must_use]
pub fn test_module_start(lines: &[&str]) -> usize {
    lines
        .iter()
        .position(|line| line.starts_with("#[cfg(test)]"))
        .unwrap_or(lines.len())
}

/// Whether line `idx` sits inside an `async fn`
///
/// Scans upward to the nearest function declaration.
#[must_use]
pub fn enclosing_fn_is_async(lines: &[&str], idx: usize) -> Option<bool> {
    for line in lines[..idx].iter().rev() {
        if let Some(is_async) = fn_declaration(line) {
            return Some(is_async);
        }
        if is_block_boundary(line) {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_declaration() {
        assert_eq!(fn_declaration("    fn load() {"), Some(false));
        assert_eq!(fn_declaration("pub fn load_from_path(path: P) {"), Some(false));
        assert_eq!(fn_declaration("pub(crate) fn now_ms() -> u64 {"), Some(false));
        assert_eq!(fn_declaration("    pub async fn run(self) {"), Some(true));
        assert_eq!(fn_declaration("async fn complete(&self) {"), Some(true));
        assert_eq!(fn_declaration("let f = fn_ptr;"), None);
        assert_eq!(fn_declaration("    // fn in a comment"), None);
    }

    #[test]
    fn test_enclosing_fn() {
        let code = [
            "impl Foo {",
            "    pub async fn run(&self) {",
            "        work().await;",
            "    }",
            "    fn helper() {",
            "        sync_work();",
            "    }",
            "}",
        ];
        assert_eq!(enclosing_fn_is_async(&code, 2), Some(true));
        assert_eq!(enclosing_fn_is_async(&code, 5), Some(false));
        assert_eq!(enclosing_fn_is_async(&code, 1), None);
    }

    #[test]
    fn test_test_module_start() {
        let code = ["fn a() {}", "", "#[cfg(test)]", "mod tests {}"];
        assert_eq!(test_module_start(&code), 2);
        assert_eq!(test_module_start(&code[..2]), 2);
    }

    #[test]
    fn test_production_dirs_exist() {
        for dir in PRODUCTION_DIRS {
            assert!(!rust_files(dir).is_empty(), "no sources in {dir}");
        }
    }
}
