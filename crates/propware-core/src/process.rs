//! Blocking subprocess helpers with the usual `Running:` echo

use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, ExitStatus, Output, Stdio};

/// Render a command line the way a user would type it
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| {
            let s = s.to_string_lossy();
            if s.contains(' ') {
                format!("\"{}\"", s)
            } else {
                s.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Echo and run a command with inherited stdio
pub fn run(cmd: &mut Command) -> Result<ExitStatus> {
    let line = describe(cmd);
    println!("{} {}", "Running:".dimmed(), line.yellow());
    cmd.status()
        .with_context(|| format!("Failed to execute: {}", line))
}

/// Run a command with all output discarded
pub fn run_quiet(cmd: &mut Command) -> Result<ExitStatus> {
    let line = describe(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("Failed to execute: {}", line))
}

/// Run a command, capturing its output
pub fn capture(cmd: &mut Command) -> Result<Output> {
    let line = describe(cmd);
    cmd.stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {}", line))
}

/// Run a command, failing with its stderr if it exits non-zero
pub fn check(cmd: &mut Command) -> Result<Output> {
    let line = describe(cmd);
    println!("{} {}", "Running:".dimmed(), line.yellow());
    let output = capture(cmd)?;
    if !output.status.success() {
        anyhow::bail!(
            "`{}` failed with exit code {}\n{}",
            line,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
    }
    Ok(output)
}
