//! Build dependencies the installer manages
//!
//! Each dependency is described by a static [`ToolConfig`] plus the pinned
//! archive the current platform downloads when no usable copy is installed.

use semver::Version;
use std::path::PathBuf;

/// Static description of an external tool
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Executable probed on the search path (e.g., "cmake")
    pub name: &'static str,
    /// Display name for user-facing messages
    pub display_name: &'static str,
    /// Oldest acceptable version, if the tool is version-checked at all
    pub min_version: Option<Version>,
    /// Environment variable overriding the pinned download URL
    pub url_env: &'static str,
}

/// A pinned, platform-specific download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedArchive {
    pub url: String,
    /// Top-level directory the archive extracts to
    pub root_dir_name: String,
}

impl PinnedArchive {
    pub fn new(url: &str, root_dir_name: &str) -> Self {
        Self {
            url: url.to_string(),
            root_dir_name: root_dir_name.to_string(),
        }
    }

    /// Apply an environment override of the URL, if set
    pub fn with_env_override(mut self, var: &str) -> Self {
        if let Ok(url) = std::env::var(var) {
            if !url.is_empty() {
                self.url = url;
            }
        }
        self
    }

    /// File name of the archive as it will land in the download cache
    pub fn file_name(&self) -> &str {
        self.url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download")
    }
}

/// Resolution state for one dependency
#[derive(Debug, Clone)]
pub struct ToolDependency {
    pub config: ToolConfig,
    pub archive: PinnedArchive,
    /// Parent directory to extract into when a download is required
    pub extraction_parent: Option<PathBuf>,
    /// Final install root (the directory containing `bin/`)
    pub resolved_root: Option<PathBuf>,
    pub newly_downloaded: bool,
}

impl ToolDependency {
    pub fn new(config: ToolConfig, archive: PinnedArchive) -> Self {
        let archive = archive.with_env_override(config.url_env);
        Self {
            config,
            archive,
            extraction_parent: None,
            resolved_root: None,
            newly_downloaded: false,
        }
    }

    pub fn needs_download(&self) -> bool {
        self.resolved_root.is_none() && self.extraction_parent.is_some()
    }

    /// `<root>/bin`, once resolved
    pub fn bin_dir(&self) -> Option<PathBuf> {
        self.resolved_root.as_ref().map(|r| r.join("bin"))
    }
}

/// CMake, the build-system generator (3.x required)
pub fn cmake_tool() -> ToolConfig {
    ToolConfig {
        name: "cmake",
        display_name: "CMake",
        min_version: Some(Version::new(3, 0, 0)),
        url_env: "PROPWARE_CMAKE_URL",
    }
}

/// PropGCC, the Propeller cross-compiler toolchain
pub fn propgcc_tool() -> ToolConfig {
    ToolConfig {
        name: "propeller-elf-gcc",
        display_name: "PropGCC",
        min_version: None,
        url_env: "PROPWARE_PROPGCC_URL",
    }
}
