//! Glob patterns used for bulk invalidation.
//!
//! `*` is the only wildcard and matches zero or more characters. Every other
//! character is literal in both tiers: regex metacharacters are escaped for
//! the local matcher, and Redis glob metacharacters (`?`, `[`, `]`, `\`) are
//! escaped for `SCAN MATCH`.

use regex::Regex;

/// Compile a glob into a regex anchored to the whole key.
///
/// Dot-all mode keeps `*` matching line breaks, as Redis `MATCH` does.
pub fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{body}$"))
}

/// Translate a glob into a Redis `MATCH` pattern with identical semantics.
pub fn redis_match_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if matches!(ch, '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
