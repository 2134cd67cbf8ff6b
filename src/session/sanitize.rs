//! Field sanitization for submitted results.
//!
//! Submitted values end up in CSV exports, so anything that could split a
//! cell or a row is collapsed before sending.

use regex::Regex;
use std::sync::LazyLock;

// Runs of CR, LF, whitespace, double quotes and commas
const UNSAFE_RUN_PATTERN: &str = r#"[\r\n\s",]+"#;

fn compile_regex_unsafe(pattern: &str, context: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| {
        panic!(
            "Failed to compile regex pattern '{}' in {}: {}. This is a programming error.",
            pattern, context, e
        )
    })
}

static UNSAFE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex_unsafe(UNSAFE_RUN_PATTERN, "UNSAFE_RUN_RE"));

/// Collapses every unsafe run into a single space and trims the result.
pub fn sanitize_field(value: &str) -> String {
    UNSAFE_RUN_RE.replace_all(value, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(
            sanitize_field("Mozilla/5.0 (X11,\r\n \"Linux\")"),
            "Mozilla/5.0 (X11 Linux )"
        );
    }

    #[test]
    fn test_sanitize_trims() {
        assert_eq!(sanitize_field("  ,\"a\",  "), "a");
        assert_eq!(sanitize_field("\r\n"), "");
    }

    #[test]
    fn test_sanitize_keeps_plain_values() {
        assert_eq!(sanitize_field("87"), "87");
        assert_eq!(sanitize_field("TIMEOUT"), "TIMEOUT");
    }
}
