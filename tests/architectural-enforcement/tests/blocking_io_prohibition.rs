//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in chorus MUST NOT use blocking I/O.
//! **Required**: Use `tokio::fs`, `tokio::io`, `tokio::net`, not `std::fs`,
//! `std::net`, `std::process`.
//!
//! Blocking calls are acceptable in non-async functions (config loading runs
//! before any turn is sent) and in test code.

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, enclosing_fn_is_async, rust_files, test_module_start, PRODUCTION_DIRS,
};

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n❌ FORBIDDEN in async fn:");
        eprintln!("  - std::fs::read_to_string(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream");
        eprintln!("  - std::process::Command");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("  - std::io::stdin()");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::write().await");
        eprintln!("  - tokio::io::stdin() with AsyncBufReadExt");
        eprintln!("  - reqwest::Client");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        for file in rust_files(dir) {
            check_file(&file, &mut violations);
        }
    }
    violations
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();
    let tests_start = test_module_start(&lines);

    for (idx, line) in lines.iter().enumerate().take(tests_start) {
        if let Some(kind) = blocking_call(code_part(line)) {
            // Sync functions and module-level imports are fine
            if enclosing_fn_is_async(&lines, idx) != Some(true) {
                continue;
            }
            violations.push(format!(
                "{}:{} - {kind}: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }
}

/// Kind of blocking call on a line, if any
fn blocking_call(code: &str) -> Option<&'static str> {
    if code.contains("std::fs::") {
        Some("Blocking file I/O")
    } else if code.contains("std::net::") {
        Some("Blocking network I/O")
    } else if code.contains("std::process::Command") {
        Some("Blocking process I/O")
    } else if code.contains("reqwest::blocking") {
        Some("Blocking HTTP client")
    } else if code.contains("std::io::stdin()") || code.contains("io::stdin().read_line") {
        Some("Blocking stdin in async")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_io_detection() {
        let code = [
            "async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert_eq!(blocking_call(code[1]), Some("Blocking file I/O"));
        assert_eq!(enclosing_fn_is_async(&code, 1), Some(true));
    }

    #[test]
    fn test_sync_config_loading_allowed() {
        let code = [
            "    pub fn load_from_path(path: Option<PathBuf>) -> Result<Self, ConfigError> {",
            "        let text = std::fs::read_to_string(path)?;",
            "    }",
        ];
        assert_eq!(enclosing_fn_is_async(&code, 1), Some(false));
    }

    #[test]
    fn test_async_stdin_allowed() {
        assert_eq!(
            blocking_call("let mut lines = BufReader::new(tokio::io::stdin()).lines();"),
            None
        );
        assert_eq!(blocking_call("std::io::stdin().read_line(&mut buf)?;"), Some("Blocking stdin in async"));
    }
}
