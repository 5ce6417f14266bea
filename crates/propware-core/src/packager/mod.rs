//! Binary distributions of every release branch and tag
//!
//! For each ref the packager checks out the tree, brings its bundled
//! libraries up to date when that ref needs it, builds it and zips the
//! whitelisted results. One ref failing never stops the others; a tree that
//! can't even generate build files stops the run.

pub mod archive;
pub mod dist;
pub mod git;
pub mod summary;

pub use archive::{archive_name, clean_old_archives, ArchiveFilter};
pub use dist::DistConfig;
pub use git::{Git, SourceControl};
pub use summary::Summary;

use crate::builder::BuildInvoker;
use crate::config::ProjectConfig;
use crate::error::Error;
use crate::importer;
use crate::runtime::Probe;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Present in trees that bundle the library importer
pub const IMPORTER_MARKER: &str = "util/propwareImporter.py";

/// Name of the alias archive and summary entry for [`DistConfig::current`]
pub const CURRENT_ALIAS: &str = "current";

/// Per-ref build steps
pub trait RefBuilder {
    /// Refresh the bundled third-party libraries
    fn reimport(&mut self, root: &Path) -> Result<()>;

    /// Generate and compile; `Ok(false)` when the compile itself failed
    fn compile(&mut self, root: &Path) -> Result<bool>;

    fn clean(&mut self, root: &Path) -> Result<()>;
}

/// Builds with the installed toolchain
pub struct ToolchainBuilder {
    search_path: Vec<PathBuf>,
    exe_suffix: &'static str,
}

impl ToolchainBuilder {
    pub fn new(search_path: Vec<PathBuf>, exe_suffix: &'static str) -> Self {
        Self {
            search_path,
            exe_suffix,
        }
    }

    fn invoker(&self, root: &Path) -> Result<BuildInvoker> {
        BuildInvoker::for_tree(root, &Probe::new(self.search_path.clone(), self.exe_suffix))
    }
}

impl RefBuilder for ToolchainBuilder {
    fn reimport(&mut self, root: &Path) -> Result<()> {
        let config = ProjectConfig::new(root).with_search_path(self.search_path.clone());
        importer::import_all(&config, self.exe_suffix, None)?;
        Ok(())
    }

    fn compile(&mut self, root: &Path) -> Result<bool> {
        let invoker = self.invoker(root)?;
        invoker.generate()?;
        Ok(invoker.compile()?.success())
    }

    fn clean(&mut self, root: &Path) -> Result<()> {
        self.invoker(root)?.clean()
    }
}

/// How a particular ref has to be packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefStrategy {
    pub reimport: bool,
}

impl RefStrategy {
    pub fn for_tree(root: &Path, git_ref: &str, dist: &DistConfig) -> Self {
        Self {
            reimport: root.join(IMPORTER_MARKER).is_file()
                || dist.force_import_refs.iter().any(|r| r == git_ref),
        }
    }
}

enum RefOutcome {
    /// Summary names: the ref, plus the alias for the current ref
    Packaged(Vec<String>),
    Failed,
}

pub struct BranchPackager<S, B> {
    scm: S,
    builder: B,
    dist: DistConfig,
    filter: ArchiveFilter,
    output_dir: PathBuf,
}

impl<S: SourceControl, B: RefBuilder> BranchPackager<S, B> {
    pub fn new(scm: S, builder: B, dist: DistConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            scm,
            builder,
            dist,
            filter: ArchiveFilter::default(),
            output_dir: output_dir.into(),
        }
    }

    /// Package every ref in `refs`, always finishing back on the current ref
    ///
    /// The summary is printed before returning, including when the run was
    /// cut short by an error.
    pub fn run(&mut self, refs: &[String]) -> Result<Summary> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create directory: {}", self.output_dir.display())
        })?;
        for old in clean_old_archives(&self.output_dir, &self.dist.archive_prefix)? {
            println!("{} {}", "Removed".dimmed(), old.display());
        }

        let root = self.scm.work_tree().to_path_buf();
        if root.exists() {
            if let Err(e) = self.builder.clean(&root) {
                warn(&format!("{:#}", e));
            }
        }
        if let Err(e) = self.scm.clean_untracked() {
            warn(&format!("{:#}", e));
        }

        let mut passed = Vec::new();
        let mut fatal = None;
        for git_ref in refs {
            match self.package_ref(git_ref) {
                Ok(RefOutcome::Packaged(names)) => passed.extend(names),
                Ok(RefOutcome::Failed) => {}
                Err(e) => {
                    fatal = Some(e.context(format!("Packaging stopped at {}", git_ref)));
                    break;
                }
            }
        }

        self.clean_exit();

        let summary = Summary::new(refs, passed);
        summary.print();
        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    fn checkout(&mut self, git_ref: &str) -> Result<()> {
        self.scm.clean_untracked()?;
        self.scm.checkout(git_ref)?;
        if !self.scm.is_tag(git_ref) {
            self.scm.pull()?;
        }
        println!("Now in {}", git_ref.cyan());
        Ok(())
    }

    fn package_ref(&mut self, git_ref: &str) -> Result<RefOutcome> {
        if let Err(e) = self.checkout(git_ref) {
            error(&format!("{:#}", e));
            return Ok(RefOutcome::Failed);
        }

        let root = self.scm.work_tree().to_path_buf();
        let strategy = RefStrategy::for_tree(&root, git_ref, &self.dist);
        if strategy.reimport {
            if let Err(e) = self.builder.reimport(&root) {
                error(&format!("{:#}", e));
                return Ok(RefOutcome::Failed);
            }
        }

        let outcome = if self.builder.compile(&root)? {
            match self.write_archives(&root, git_ref) {
                Ok(names) => RefOutcome::Packaged(names),
                Err(e) => {
                    error(&format!("{:#}", e));
                    RefOutcome::Failed
                }
            }
        } else {
            error(&format!("Make failed to finish executing for {}", git_ref));
            RefOutcome::Failed
        };

        self.builder.clean(&root)?;
        Ok(outcome)
    }

    fn write_archives(&self, root: &Path, git_ref: &str) -> Result<Vec<String>> {
        let prefix = &self.dist.archive_prefix;
        let archive = self.output_dir.join(archive_name(prefix, git_ref));
        let entries = self.filter.collect(root)?;
        archive::write_archive(root, &entries, &archive)?;
        println!("{} {} ({} files)", "Created".green(), archive.display(), entries.len());

        let mut names = vec![git_ref.to_string()];
        if git_ref == self.dist.current {
            let alias = self.output_dir.join(archive_name(prefix, CURRENT_ALIAS));
            std::fs::copy(&archive, &alias)
                .with_context(|| format!("Failed to write {}", alias.display()))?;
            names.push(CURRENT_ALIAS.to_string());
        }
        Ok(names)
    }

    /// Leave the repository clean and on the current ref
    fn clean_exit(&mut self) {
        println!("{}", "Attempting clean exit".dimmed());
        let current = self.dist.current.clone();
        let result = self
            .scm
            .clean_untracked()
            .and_then(|_| self.scm.checkout(&current));
        if let Err(e) = result {
            error(&format!(
                "Failed to return the repository to '{}': {:#}",
                current, e
            ));
        }
    }
}

/// Options for [`package`]
#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    pub include_tags: bool,
    /// Replaces the configured branches when non-empty
    pub branches: Vec<String>,
    pub config_file: Option<PathBuf>,
    /// Where archives are written; the project root when absent
    pub output_dir: Option<PathBuf>,
    /// Work in a scratch clone instead of the project checkout
    pub fresh_clone: bool,
    /// Clone URL for fresh-clone mode
    pub repository: Option<String>,
}

impl PackageOptions {
    /// The distribution config with command-line branches applied, and the
    /// refs to package in order
    pub fn dist_and_refs(&self) -> Result<(DistConfig, Vec<String>)> {
        let mut dist = match &self.config_file {
            Some(path) => DistConfig::load(path)?,
            None => DistConfig::default(),
        };
        if !self.branches.is_empty() {
            dist.branches = self.branches.clone();
        }
        let refs = dist.refs(self.include_tags);
        Ok((dist, refs))
    }
}

/// Package the configured refs of the project at `config.root`
pub fn package(config: &ProjectConfig, exe_suffix: &'static str, options: &PackageOptions) -> Result<Summary> {
    let (dist, refs) = options.dist_and_refs()?;

    let git_exe = Probe::new(config.search_path.clone(), exe_suffix)
        .which("git")
        .ok_or_else(|| Error::MissingTool {
            tool: "git".to_string(),
        })?;
    let keep = format!("{}*.zip", dist.archive_prefix);
    let git = if options.fresh_clone {
        let url = options
            .repository
            .clone()
            .unwrap_or_else(|| dist.repository.clone());
        let scratch = std::env::temp_dir().join(&dist.archive_prefix);
        Git::new(git_exe, scratch).keep(keep).fresh_clone(url)
    } else {
        Git::new(git_exe, &config.root).keep(keep)
    };

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| config.root.clone());
    let builder = ToolchainBuilder::new(config.search_path.clone(), exe_suffix);

    BranchPackager::new(git, builder, dist, output_dir).run(&refs)
}

fn warn(message: &str) {
    eprintln!("{} {}", "Warning:".yellow(), message);
}

fn error(message: &str) {
    eprintln!("{} {}", "Error:".red(), message);
}
