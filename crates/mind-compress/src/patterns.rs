//! Line heuristics shared by the summarizers.
//!
//! Captured output may embed source in any language, so each pattern is an
//! alternation over the common syntaxes (Rust, JS/TS, Python, Go, C-family,
//! Java/C#).

use regex::Regex;
use std::sync::LazyLock;

/// `cat -n` style prefix emitted by file-read tools: `   12→` or `   12\t`.
pub(crate) static LINE_NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+(?:→|\t)").unwrap());

pub(crate) static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)^\s*(?:
            import\s
            | from\s+\S+\s+import\s
            | use\s+[\w:]+
            | extern\s+crate\s
            | \#include\s*[<"]
            | (?:const|let|var)\s+[\w{}\s,]+=\s*require\s*\(
            | require\s*\(
            | using\s+[\w.]+\s*;
        )"#,
    )
    .unwrap()
});

pub(crate) static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^\s*(?:
            export\s
            | module\.exports
            | exports\.\w+\s*=
            | pub(?:\([\w:]+\))?\s+(?:async\s+)?(?:fn|struct|enum|trait|mod|const|static|type|use)\s
        )",
    )
    .unwrap()
});

pub(crate) static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^\s*(?:
            (?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*\w+
            | (?:async\s+)?def\s+\w+
            | (?:pub(?:\([\w:]+\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+\w+
            | func\s+(?:\([^)]*\)\s*)?\w+
            | (?:export\s+)?(?:const|let|var)\s+\w+\s*=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>
            | (?:public|private|protected|internal)\s+(?:static\s+)?(?:async\s+)?[\w<>\[\],]+\s+\w+\s*\(
        )",
    )
    .unwrap()
});

/// Captures the declared name.
pub(crate) static TYPE_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:class|struct|interface|trait|enum)\s+([A-Za-z_]\w*)").unwrap());

pub(crate) static TODO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?://|#|/\*|\*|--|<!--)\s*(?:TODO|FIXME|BUG|HACK|XXX)\b").unwrap()
});

pub(crate) static ERROR_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:error|errors|failed|failure|fatal|panic|panicked|exception|warning|warn)\b")
        .unwrap()
});

pub(crate) static SUCCESS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:success|successful|successfully|passed|passing|ok|done|completed|finished)\b")
        .unwrap()
});

/// Strip a `cat -n` prefix so the structural patterns can anchor on `^`.
pub(crate) fn strip_line_number(line: &str) -> &str {
    match LINE_NUMBER_PREFIX.find(line) {
        Some(found) => &line[found.end()..],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_number() {
        assert_eq!(strip_line_number("    12→use std::fs;"), "use std::fs;");
        assert_eq!(strip_line_number("     3\timport os"), "import os");
        assert_eq!(strip_line_number("plain line"), "plain line");
    }

    #[test]
    fn test_import_patterns_cover_languages() {
        for line in [
            "use std::collections::HashMap;",
            "import { readFile } from 'fs';",
            "from pathlib import Path",
            "#include <stdio.h>",
            "const fs = require('fs');",
            "using System.Text;",
        ] {
            assert!(IMPORT_RE.is_match(line), "{line}");
        }
        assert!(!IMPORT_RE.is_match("let user = load();"));
    }

    #[test]
    fn test_function_patterns_cover_languages() {
        for line in [
            "pub async fn open(config: &Config) -> Result<Self> {",
            "fn helper() {}",
            "def compress(output):",
            "export async function remember(input) {",
            "func (s *Store) Put(key string) error {",
            "const handler = async (event) => {",
            "public static void main(String[] args) {",
        ] {
            assert!(FUNCTION_RE.is_match(line), "{line}");
        }
        assert!(!FUNCTION_RE.is_match("// fn in a comment"));
    }

    #[test]
    fn test_type_declarations_capture_name() {
        let names: Vec<&str> = TYPE_DECL_RE
            .captures_iter("pub struct MindStore {\nexport class Mind {\ninterface Frame {")
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        assert_eq!(names, ["MindStore", "Mind", "Frame"]);
    }

    #[test]
    fn test_todo_requires_comment_marker() {
        assert!(TODO_RE.is_match("    // TODO: handle rename failure"));
        assert!(TODO_RE.is_match("# FIXME flaky"));
        assert!(!TODO_RE.is_match("let todo = TODO_LIST;"));
    }
}
