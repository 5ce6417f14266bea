//! Source control operations used while packaging

use crate::error::Error;
use crate::process;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The repository being packaged
pub trait SourceControl {
    /// Checked-out tree
    fn work_tree(&self) -> &Path;

    /// Drop untracked and ignored files
    fn clean_untracked(&mut self) -> Result<()>;

    fn checkout(&mut self, git_ref: &str) -> Result<()>;

    fn pull(&mut self) -> Result<()>;

    fn is_tag(&self, git_ref: &str) -> bool;
}

/// `git` command-line client
#[derive(Debug, Clone)]
pub struct Git {
    git: PathBuf,
    work_tree: PathBuf,
    /// Patterns kept by `git clean`
    keep: Vec<String>,
    /// Re-clone from this URL before every checkout
    fresh_clone: Option<String>,
}

impl Git {
    pub fn new(git: impl Into<PathBuf>, work_tree: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            work_tree: work_tree.into(),
            keep: Vec::new(),
            fresh_clone: None,
        }
    }

    /// Keep files matching `pattern` when cleaning
    pub fn keep(mut self, pattern: impl Into<String>) -> Self {
        self.keep.push(pattern.into());
        self
    }

    pub fn fresh_clone(mut self, url: impl Into<String>) -> Self {
        self.fresh_clone = Some(url.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.current_dir(&self.work_tree);
        cmd
    }

    fn reclone(&self, url: &str) -> Result<()> {
        if self.work_tree.exists() {
            std::fs::remove_dir_all(&self.work_tree)
                .with_context(|| format!("Failed to remove {}", self.work_tree.display()))?;
        }
        let parent = self
            .work_tree
            .parent()
            .context("Clone directory has no parent")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        process::check(
            Command::new(&self.git)
                .arg("clone")
                .arg(url)
                .arg(&self.work_tree)
                .current_dir(parent),
        )?;
        Ok(())
    }
}

impl SourceControl for Git {
    fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    fn clean_untracked(&mut self) -> Result<()> {
        if !self.work_tree.exists() {
            return Ok(());
        }
        let mut cmd = self.command();
        cmd.args(["clean", "-fxd"]);
        for pattern in &self.keep {
            cmd.arg(format!("-e{}", pattern));
        }
        process::check(&mut cmd)?;
        Ok(())
    }

    fn checkout(&mut self, git_ref: &str) -> Result<()> {
        if let Some(url) = self.fresh_clone.clone() {
            self.reclone(&url)
                .with_context(|| Error::CheckoutFailed(git_ref.to_string()))?;
        }
        process::check(self.command().args(["checkout", git_ref]))
            .with_context(|| Error::CheckoutFailed(git_ref.to_string()))?;
        Ok(())
    }

    fn pull(&mut self) -> Result<()> {
        process::check(self.command().arg("pull")).context("Failed to pull latest sources")?;
        Ok(())
    }

    fn is_tag(&self, git_ref: &str) -> bool {
        process::run_quiet(
            self.command()
                .args(["show-ref", "--verify", "--quiet"])
                .arg(format!("refs/tags/{}", git_ref)),
        )
        .is_ok_and(|status| status.success())
    }
}
