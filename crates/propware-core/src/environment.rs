//! Environment configuration
//!
//! Makes the resolved tool paths discoverable: the current process is updated
//! immediately, future sessions through the platform (shell profile,
//! `/etc/environment`, or the registry). Existing variables are never
//! overwritten; `PATH` is only ever prepended to.

use crate::config::{ProjectConfig, PROPGCC_PREFIX_ENV, PROPWARE_PATH_ENV};
use crate::error::Error;
use crate::platform::{EnvScope, Persisted, Platform};
use crate::prompt::Prompter;
use crate::runtime::ToolDependency;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A shell startup file that `export` lines are appended to
#[derive(Debug, Clone)]
pub struct ShellProfile {
    path: PathBuf,
}

impl ShellProfile {
    /// Profile for a known login shell, or `None` for shells we don't handle
    pub fn for_shell(shell: &str, home: &Path) -> Option<Self> {
        let file = match shell.rsplit('/').next()? {
            "bash" => ".bashrc",
            "zsh" => ".zshrc",
            _ => return None,
        };
        Some(Self {
            path: home.join(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export_line(key: &str, value: &str) -> String {
        if key == "PATH" {
            format!("export PATH=\"{}:$PATH\"", value)
        } else {
            format!("export {}=\"{}\"", key, value)
        }
    }

    /// Append the export unless an identical line is already present.
    /// Returns whether the file changed.
    pub fn ensure_export(&self, key: &str, value: &str) -> Result<bool> {
        if !self.path.exists() {
            return Err(Error::MissingShellProfile(self.path.clone()).into());
        }
        append_line_once(&self.path, &Self::export_line(key, value))
    }
}

/// Append `line` to `path` (creating it) unless a line with identical content
/// exists. Returns whether anything was written.
pub fn append_line_once(path: &Path, line: &str) -> Result<bool> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;

    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{}{}", separator, line)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// What the configurator did, for the completion banner
#[derive(Debug, Default)]
pub struct EnvReport {
    pub persisted: Vec<(String, Persisted)>,
    /// Root-level variables were written; a reboot is needed
    pub needs_reboot: bool,
    pub scope: Option<EnvScope>,
}

impl EnvReport {
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.persisted.iter().filter_map(|(_, p)| match p {
            Persisted::Instruction(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

pub struct EnvironmentConfigurator<'a> {
    platform: &'a dyn Platform,
    lookup: fn(&str) -> Option<String>,
    update_process: bool,
}

impl<'a> EnvironmentConfigurator<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self {
            platform,
            lookup: |key| std::env::var(key).ok(),
            update_process: true,
        }
    }

    /// Use a different view of the current environment and leave the
    /// process environment untouched
    pub fn detached(platform: &'a dyn Platform, lookup: fn(&str) -> Option<String>) -> Self {
        Self {
            platform,
            lookup,
            update_process: false,
        }
    }

    /// Persist tool paths and the project root
    ///
    /// `toolchain` is the resolved PropGCC dependency; every dependency in
    /// `deps` that was freshly downloaded gets its `bin` directory on `PATH`.
    pub fn configure(
        &self,
        config: &ProjectConfig,
        deps: &[&ToolDependency],
        toolchain: &ToolDependency,
        prompter: &mut dyn Prompter,
    ) -> Result<EnvReport> {
        let mut report = EnvReport::default();

        for dep in deps.iter().filter(|d| d.newly_downloaded) {
            if let Some(bin) = dep.bin_dir() {
                let bin = bin.display().to_string();
                if self.update_process {
                    prepend_process_path(Path::new(&bin))?;
                }
                let persisted = self.platform.persist_var("PATH", &bin, EnvScope::User)?;
                report.persisted.push(("PATH".to_string(), persisted));
            }
        }

        let mut wanted: Vec<(&str, String)> = vec![(
            PROPWARE_PATH_ENV,
            config.root.display().to_string(),
        )];
        if let Some(root) = &toolchain.resolved_root {
            wanted.insert(0, (PROPGCC_PREFIX_ENV, root.display().to_string()));
        }

        let missing: Vec<_> = wanted
            .into_iter()
            .filter(|(key, _)| (self.lookup)(key).is_none())
            .collect();

        if missing.is_empty() {
            return Ok(report);
        }

        let scope = prompter.env_scope(self.platform.default_env_scope())?;
        report.scope = Some(scope);

        for (key, value) in missing {
            if self.update_process {
                std::env::set_var(key, &value);
            }
            let persisted = self.platform.persist_var(key, &value, scope)?;
            if scope == EnvScope::Root && matches!(persisted, Persisted::Written(_)) {
                report.needs_reboot = true;
            }
            report.persisted.push((key.to_string(), persisted));
        }

        Ok(report)
    }
}

/// Put `dir` at the front of this process's `PATH`
pub fn prepend_process_path(dir: &Path) -> Result<()> {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(current) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&current).filter(|p| p != dir));
    }
    let joined = std::env::join_paths(paths).context("Invalid PATH entry")?;
    std::env::set_var("PATH", joined);
    Ok(())
}
