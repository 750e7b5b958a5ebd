//! Integration Test: Sleep Prohibition
//!
//! **Policy**: chorus production code MUST NOT sleep. Streams are driven by
//! I/O readiness and cancellation tokens, never by polling.
//! **Exception**: the delay between retries of a failed non-streaming request.
//!
//! Test modules are not scanned.

use std::fs;
use std::path::Path;

use architectural_enforcement::{code_part, rust_files, test_module_start, PRODUCTION_DIRS};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Delay between retry attempts");
        eprintln!("  - Test code");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for stream chunks (await the stream!)");
        eprintln!("  - Sleep to wait for cancellation (select on the token!)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn find_sleep_violations() -> Vec<String> {
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
        let code = code_part(line);
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }
        if is_retry_context(&lines, idx) {
            continue;
        }
        violations.push(format!("{}:{} - {}", path.display(), idx + 1, line.trim()));
    }
}

/// Whether a sleep waits out a retry delay
///
/// Requires retry wording nearby and a delay taken from configuration or an
/// exponential backoff calculation.
fn is_retry_context(lines: &[&str], current_idx: usize) -> bool {
    let context_range = current_idx.saturating_sub(15)..std::cmp::min(current_idx + 5, lines.len());

    let mut has_delay = false;
    let mut has_retry_context = false;

    for line in &lines[context_range] {
        let line = line.to_lowercase();

        if line.contains("retry_delay")
            || line.contains("backoff")
            || line.contains("<<")
            || line.contains("pow")
        {
            has_delay = true;
        }

        if line.contains("retry") || line.contains("retries") || line.contains("attempt") {
            has_retry_context = true;
        }
    }

    has_delay && has_retry_context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_sleep_is_flagged() {
        let code = [
            "async fn wait_for_chunk(&mut self) {",
            "    while self.buffer.is_empty() {",
            "        tokio::time::sleep(Duration::from_millis(10)).await;",
            "    }",
            "}",
        ];
        assert!(!is_retry_context(&code, 2));
    }

    #[test]
    fn test_retry_delay_allowed() {
        let code = [
            "Err(e) if e.is_retryable() && attempt < self.max_retries => {",
            "    attempt += 1;",
            "    tokio::time::sleep(self.retry_delay).await;",
            "}",
        ];
        assert!(is_retry_context(&code, 2));
    }

    #[test]
    fn test_backoff_allowed() {
        let code = [
            "fn reconnect() {",
            "    let delay = base_delay * (1 << attempt);",
            "    tokio::time::sleep(Duration::from_millis(delay)).await;",
            "}",
        ];
        assert!(is_retry_context(&code, 2));
    }
}
