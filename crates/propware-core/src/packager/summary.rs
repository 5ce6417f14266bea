//! PASS/FAIL report at the end of a packaging run

use colored::Colorize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Alphabetical; may include the `current` alias
    pub passed: Vec<String>,
    /// Declared refs that didn't pass, in declared order
    pub failed: Vec<String>,
}

impl Summary {
    pub fn new(declared: &[String], mut passed: Vec<String>) -> Self {
        passed.sort();
        passed.dedup();
        let failed = declared
            .iter()
            .filter(|r| !passed.contains(r))
            .cloned()
            .collect();
        Self { passed, failed }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn print(&self) {
        print!("\n\n{}", self);
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        for name in &self.passed {
            writeln!(f, "\t{} {}", "PASS:".green(), name)?;
        }
        for name in &self.failed {
            writeln!(f, "\t{} {}", "FAIL:".red(), name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ordering() {
        let declared = refs(&["release-2.0", "master", "v1.1", "development"]);
        let summary = Summary::new(&declared, refs(&["release-2.0", "current", "development"]));

        assert_eq!(summary.passed, refs(&["current", "development", "release-2.0"]));
        assert_eq!(summary.failed, refs(&["master", "v1.1"]));
        assert!(!summary.is_success());

        let text = summary.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Summary:");
        let expected = [
            ("PASS:", "current"),
            ("PASS:", "development"),
            ("PASS:", "release-2.0"),
            ("FAIL:", "master"),
            ("FAIL:", "v1.1"),
        ];
        assert_eq!(lines.len(), expected.len() + 1);
        for (line, (status, name)) in lines[1..].iter().zip(expected) {
            assert!(line.contains(status) && line.ends_with(name), "{:?}", line);
        }
    }
}
