//! Generated CMake fragment listing imported sources

use anyhow::{Context, Result};
use std::path::Path;

/// Render `set(VARIABLE ../a.c ../b.c)` with one entry per line
///
/// Sources are sorted so regenerating from the same inputs produces the same
/// bytes.
pub fn render(variable: &str, sources: &[String]) -> String {
    let mut sorted: Vec<&str> = sources.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = format!("set({}", variable);
    for source in sorted {
        out.push_str("\n        ../");
        out.push_str(source);
    }
    out.push_str(")\n");
    out
}

pub fn write(path: &Path, variable: &str, sources: &[String]) -> Result<()> {
    std::fs::write(path, render(variable, sources))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Entries listed in a previously rendered fragment
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .skip(1)
        .map(|l| l.trim().trim_end_matches(')'))
        .filter_map(|l| l.strip_prefix("../"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sorted() {
        let sources = vec!["servo.c".to_string(), "adcDCpropab.c".to_string()];
        assert_eq!(
            render("SIMPLE_OBJECTS", &sources),
            "set(SIMPLE_OBJECTS\n        ../adcDCpropab.c\n        ../servo.c)\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render("LIBPROPELLER_OBJECTS", &[]), "set(LIBPROPELLER_OBJECTS)\n");
    }

    #[test]
    fn test_parse_round_trip() {
        let sources = vec!["b.S".to_string(), "a.c".to_string()];
        assert_eq!(parse(&render("X", &sources)), vec!["a.c", "b.S"]);
    }
}
