//! Dependency resolution for CMake and PropGCC
//!
//! Resolution is split in two so every question is asked before anything is
//! downloaded: [`DependencyResolver::decide`] probes and prompts,
//! [`DependencyResolver::fetch_all`] downloads and extracts whatever is still
//! missing.

use crate::config::ProjectConfig;
use crate::fetch::{self, ArchiveSource};
use crate::platform::Platform;
use crate::prompt::Prompter;
use crate::runtime::{cmake_tool, find_file, install_root_of, propgcc_tool, Probe, ToolDependency};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Install locations passed on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cmake_path: Option<PathBuf>,
    pub propgcc_path: Option<PathBuf>,
}

/// Both managed dependencies
#[derive(Debug, Clone)]
pub struct Dependencies {
    pub cmake: ToolDependency,
    pub propgcc: ToolDependency,
}

impl Dependencies {
    pub fn all(&self) -> [&ToolDependency; 2] {
        [&self.cmake, &self.propgcc]
    }

    pub fn pending_downloads(&self) -> usize {
        self.all().iter().filter(|d| d.needs_download()).count()
    }
}

pub struct DependencyResolver<'a> {
    platform: &'a dyn Platform,
    config: &'a ProjectConfig,
    probe: Probe,
    cache_dir: PathBuf,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a ProjectConfig) -> Self {
        Self {
            probe: Probe::new(config.search_path.clone(), platform.exe_suffix()),
            platform,
            config,
            cache_dir: std::env::temp_dir(),
        }
    }

    /// Directory downloaded archives are cached in
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Decide, for both dependencies, whether to use an existing install or
    /// where to download a fresh copy
    pub fn decide(&self, overrides: &Overrides, prompter: &mut dyn Prompter) -> Result<Dependencies> {
        let mut cmake = ToolDependency::new(cmake_tool(), self.platform.cmake_archive());
        self.decide_one(&mut cmake, overrides.cmake_path.as_deref(), &[], prompter)?;

        let mut propgcc = ToolDependency::new(propgcc_tool(), self.platform.propgcc_archive());
        let well_known = self.platform.default_toolchain_roots();
        self.decide_one(
            &mut propgcc,
            overrides.propgcc_path.as_deref(),
            &well_known,
            prompter,
        )?;

        Ok(Dependencies { cmake, propgcc })
    }

    fn decide_one(
        &self,
        dep: &mut ToolDependency,
        override_path: Option<&Path>,
        well_known: &[PathBuf],
        prompter: &mut dyn Prompter,
    ) -> Result<()> {
        let exe = self.probe.exe_name(dep.config.name);

        if let Some(path) = override_path {
            if let Some(found) = find_file(path, &exe) {
                dep.resolved_root = install_root_of(&found);
            } else {
                dep.extraction_parent = Some(path.to_path_buf());
            }
            return Ok(());
        }

        // An install the user turned down must not come back as a well-known root
        let mut declined = None;
        if let Some(found) = self.probe.which(dep.config.name) {
            if self.version_acceptable(dep, &found)? {
                if let Some(root) = install_root_of(&found) {
                    let accept = is_writable(&root)
                        || prompter.confirm(
                            &format!(
                                "{} at {} is not writable. Use it anyway?",
                                dep.config.display_name,
                                root.display()
                            ),
                            true,
                        )?;
                    if accept {
                        dep.resolved_root = Some(root);
                        return Ok(());
                    }
                    declined = Some(root);
                }
            }
        }

        if let Some(root) = well_known.iter().find(|root| {
            root.join("bin").join(&exe).is_file() && !same_dir(root, declined.as_deref())
        }) {
            dep.resolved_root = Some(root.clone());
            return Ok(());
        }

        let parent = prompter.install_parent(dep.config.display_name, &self.config.home)?;
        dep.extraction_parent = Some(parent);
        Ok(())
    }

    fn version_acceptable(&self, dep: &ToolDependency, exe: &Path) -> Result<bool> {
        let Some(min) = &dep.config.min_version else {
            return Ok(true);
        };

        let version = self
            .probe
            .version(exe)
            .with_context(|| format!("Failed to determine the {} version", dep.config.display_name))?;

        if &version < min {
            println!(
                "{} An existing version of {} ({}) has been detected. PropWare requires {} or \
                 higher - a new version will be installed.",
                "Warning:".yellow(),
                dep.config.display_name,
                version,
                min
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Download and extract every dependency that still needs it
    pub async fn fetch_all<S: ArchiveSource>(&self, deps: &mut Dependencies, source: &S) -> Result<()> {
        self.fetch_one(&mut deps.cmake, source).await?;
        self.fetch_one(&mut deps.propgcc, source).await?;
        Ok(())
    }

    async fn fetch_one<S: ArchiveSource>(&self, dep: &mut ToolDependency, source: &S) -> Result<()> {
        if !dep.needs_download() {
            return Ok(());
        }
        let Some(parent) = dep.extraction_parent.clone() else {
            return Ok(());
        };

        // An existing directory is fine
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let archive = source.fetch(&dep.archive, &self.cache_dir).await?;
        fetch::extract(&archive, &parent)?;

        let exe = self.probe.exe_name(dep.config.name);
        let preferred = parent.join(&dep.archive.root_dir_name);
        let root = if preferred.join("bin").join(&exe).is_file() {
            preferred
        } else {
            find_file(&parent, &exe)
                .and_then(|found| found.parent()?.parent().map(Path::to_path_buf))
                .unwrap_or(preferred)
        };

        dep.resolved_root = Some(root);
        dep.newly_downloaded = true;
        Ok(())
    }
}

fn same_dir(dir: &Path, other: Option<&Path>) -> bool {
    let Some(other) = other else { return false };
    match (std::fs::canonicalize(dir), std::fs::canonicalize(other)) {
        (Ok(a), Ok(b)) => a == b,
        _ => dir == other,
    }
}

/// Whether files can be created in `dir`
fn is_writable(dir: &Path) -> bool {
    let marker = dir.join(".propware-write-test");
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&marker)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(_) => false,
    }
}
