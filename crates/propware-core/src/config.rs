//! Project-wide paths, constructed once and handed to every component

use crate::error::Error;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the project root
pub const PROPWARE_PATH_ENV: &str = "PROPWARE_PATH";

/// Environment variable naming the PropGCC install prefix
pub const PROPGCC_PREFIX_ENV: &str = "PROPGCC_PREFIX";

/// Hidden cache directory for clones and downloaded archives
pub const DOWNLOADS_DIRECTORY: &str = ".external_downloads";

/// Out-of-source CMake build directory
pub const BUILD_DIRECTORY: &str = "bin";

/// Entries that must all be present for a directory to be a PropWare root
const ROOT_MARKERS: &[&str] = &["PropWare", "util", "libpropeller", "simple"];

/// Memory-model build variants; also names of per-variant subdirectories
pub const MEMORY_MODELS: &[&str] = &["cog", "cmm", "lmm", "xmmc", "xmm-single", "xmm-split"];

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub downloads_dir: PathBuf,
    /// Ordered executable search path
    pub search_path: Vec<PathBuf>,
    pub home: PathBuf,
}

impl ProjectConfig {
    /// Build a config for a known project root, reading the search path from `PATH`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let search_path = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            downloads_dir: root.join(DOWNLOADS_DIRECTORY),
            root,
            search_path,
            home,
        }
    }

    /// Resolve the project root from an explicit flag, `PROPWARE_PATH`, or the
    /// nearest ancestor of the current directory that looks like a PropWare root
    pub fn discover(root_override: Option<&Path>) -> Result<Self> {
        if let Some(root) = root_override {
            let root = std::path::absolute(root)
                .with_context(|| format!("Invalid project root: {}", root.display()))?;
            return Ok(Self::new(root));
        }

        if let Some(root) = std::env::var_os(PROPWARE_PATH_ENV) {
            let root = PathBuf::from(root);
            if root.is_dir() {
                return Ok(Self::new(root));
            }
        }

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        cwd.ancestors()
            .find(|dir| is_project_root(dir))
            .map(Self::new)
            .ok_or_else(|| Error::ProjectRootNotFound(cwd.clone()).into())
    }

    /// Override the search path (used when probing freshly extracted tools)
    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Create the downloads cache if needed; hidden on Windows
    pub fn init_downloads_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.downloads_dir).with_context(|| {
            format!("Failed to create directory: {}", self.downloads_dir.display())
        })?;

        #[cfg(windows)]
        {
            let _ = std::process::Command::new("attrib")
                .arg("+H")
                .arg(&self.downloads_dir)
                .output();
        }

        Ok(&self.downloads_dir)
    }
}

/// Whether `dir` contains every PropWare root marker
pub fn is_project_root(dir: &Path) -> bool {
    ROOT_MARKERS.iter().all(|m| dir.join(m).exists())
}
