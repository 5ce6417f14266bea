//! Executable lookup and version inspection

use super::version::parse_version_output;
use crate::error::Error;
use anyhow::{Context, Result};
use semver::Version;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// Searches an ordered list of directories for executables
#[derive(Debug, Clone)]
pub struct Probe {
    dirs: Vec<PathBuf>,
    exe_suffix: &'static str,
}

impl Probe {
    pub fn new(dirs: Vec<PathBuf>, exe_suffix: &'static str) -> Self {
        Self { dirs, exe_suffix }
    }

    /// Return the first executable named `program` on the search path, in
    /// directory order. Windows also tries the `PATHEXT` extensions.
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        if self.dirs.is_empty() {
            return None;
        }
        let paths = std::env::join_paths(&self.dirs).ok()?;
        let cwd = std::env::current_dir().unwrap_or_default();
        which::which_in(program, Some(paths), cwd).ok().map(absolute)
    }

    /// Executable name with the platform suffix applied
    pub fn exe_name(&self, program: &str) -> String {
        format!("{}{}", program, self.exe_suffix)
    }

    /// Run `<exe> --version` and parse the first line into a version triple
    pub fn version(&self, exe: &Path) -> Result<Version> {
        let output = Command::new(exe)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to run {} --version", exe.display()))?;

        if !output.status.success() {
            return Err(Error::VersionParse(format!(
                "{} --version exited with {}",
                exe.display(),
                output.status
            ))
            .into());
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_version_output(&text)?)
    }
}

/// Recursively search `root` for a file named `name`
///
/// Entries are visited in name order so repeated calls agree.
pub fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == name)
        .map(|e| e.into_path())
}

/// Install root for an executable living in `<root>/bin/<exe>`
pub fn install_root_of(exe: &Path) -> Option<PathBuf> {
    let real = std::fs::canonicalize(exe).unwrap_or_else(|_| exe.to_path_buf());
    real.parent()?.parent().map(Path::to_path_buf)
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
