//! Platform capabilities
//!
//! Everything that differs between operating systems sits behind the
//! [`Platform`] trait: pinned downloads, well-known install locations, and how
//! environment variables are made visible to future sessions. One
//! implementation is selected at startup by [`detect`] and passed to the
//! components that need it.

pub mod unix;
pub mod windows;

use crate::prompt::Prompter;
use crate::runtime::PinnedArchive;
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;

pub use unix::Unix;
pub use windows::Windows;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatingSystem {
    Linux,
    Mac,
    Windows,
    Other(String),
}

impl OperatingSystem {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OperatingSystem::Linux,
            "macos" => OperatingSystem::Mac,
            "windows" => OperatingSystem::Windows,
            other => OperatingSystem::Other(other.to_string()),
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingSystem::Linux => write!(f, "Linux"),
            OperatingSystem::Mac => write!(f, "Mac"),
            OperatingSystem::Windows => write!(f, "Windows"),
            OperatingSystem::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Where an environment variable should be made persistent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvScope {
    /// System-wide (may require a reboot)
    Root,
    /// Current user's shell profile or registry hive
    User,
    /// Print instructions only
    Manual,
}

impl EnvScope {
    pub fn display_name(&self) -> &'static str {
        match self {
            EnvScope::Root => "Root environment (all users)",
            EnvScope::User => "User environment",
            EnvScope::Manual => "Configure them myself",
        }
    }
}

impl fmt::Display for EnvScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Outcome of persisting one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// Written to the named location
    Written(String),
    /// The exact setting was already present
    AlreadyPresent(String),
    /// Could not be automated; the user must act on this message
    Instruction(String),
}

/// Platform-specific capabilities used by the installer
pub trait Platform: Send + Sync {
    fn os(&self) -> OperatingSystem;

    /// Suffix tried after the bare executable name
    fn exe_suffix(&self) -> &'static str {
        ""
    }

    /// Pinned CMake download for this platform
    fn cmake_archive(&self) -> PinnedArchive;

    /// Pinned PropGCC download for this platform
    fn propgcc_archive(&self) -> PinnedArchive;

    /// Locations a toolchain is commonly installed to outside the PATH
    fn default_toolchain_roots(&self) -> Vec<PathBuf>;

    /// Scope pre-selected in the environment menu
    fn default_env_scope(&self) -> EnvScope;

    /// Make `key=value` visible to future sessions. `PATH` is prepended to,
    /// never overwritten.
    fn persist_var(&self, key: &str, value: &str, scope: EnvScope) -> Result<Persisted>;

    /// Instructions for installing Make, or `None` when Make ships with the toolchain
    fn missing_make_instructions(&self) -> Option<&'static str>;

    /// Install Make with the system package manager. Returns whether an
    /// install ran and succeeded.
    fn install_make(&self, _prompter: &mut dyn Prompter) -> Result<bool> {
        Ok(false)
    }

    /// Extra checks after dependencies are in place (group membership, etc.)
    fn post_install_checks(&self, _prompter: &mut dyn Prompter) -> Result<()> {
        Ok(())
    }
}

/// Select the platform implementation for the running OS
pub fn detect() -> Result<Box<dyn Platform>> {
    match OperatingSystem::current() {
        OperatingSystem::Linux => Ok(Box::new(Unix::linux())),
        OperatingSystem::Mac => Ok(Box::new(Unix::mac())),
        OperatingSystem::Windows => Ok(Box::new(Windows::new())),
        OperatingSystem::Other(name) => {
            anyhow::bail!("Your operating system ({}) is not supported", name)
        }
    }
}
