//! User interaction seam
//!
//! The resolver and configurator ask questions through [`Prompter`]; the
//! cliclack implementation lives in `tui`, and [`Defaults`] answers every
//! question with its default for non-interactive runs.

use crate::platform::EnvScope;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub trait Prompter {
    /// Ask for a parent directory to install `tool` into. Invalid answers are
    /// re-prompted by the implementation.
    fn install_parent(&mut self, tool: &str, default: &Path) -> Result<PathBuf>;

    /// Yes/no question
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;

    /// Three-way environment scope menu
    fn env_scope(&mut self, default: EnvScope) -> Result<EnvScope>;
}

/// Accepts every default without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct Defaults;

impl Prompter for Defaults {
    fn install_parent(&mut self, _tool: &str, default: &Path) -> Result<PathBuf> {
        Ok(default.to_path_buf())
    }

    fn confirm(&mut self, _message: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn env_scope(&mut self, default: EnvScope) -> Result<EnvScope> {
        Ok(default)
    }
}

/// Accept a directory that exists, or whose parent exists so it can be created
pub fn validate_install_parent(input: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(input.trim());
    if path.as_os_str().is_empty() {
        return Err("Please enter a directory".to_string());
    }
    if path.is_dir() {
        return Ok(path);
    }
    if path.exists() {
        return Err(format!("\"{}\" is not a directory.", path.display()));
    }
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => Ok(path),
        _ => Err(format!("\"{}\" does not exist.", path.display())),
    }
}
