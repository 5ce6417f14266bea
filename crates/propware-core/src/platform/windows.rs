//! Windows: registry-backed environment variables via `reg.exe`

use super::{EnvScope, OperatingSystem, Persisted, Platform};
use crate::process;
use crate::runtime::PinnedArchive;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Command;

const USER_KEY: &str = r"HKCU\Environment";
const SYSTEM_KEY: &str = r"HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

#[derive(Debug, Clone, Default)]
pub struct Windows;

impl Windows {
    pub fn new() -> Self {
        Self
    }

    fn query(key: &str, name: &str) -> Result<Option<String>> {
        let output = process::capture(Command::new("reg").args(["query", key, "/v", name]))?;
        if !output.status.success() {
            // Value does not exist yet
            return Ok(None);
        }
        Ok(parse_reg_query(&String::from_utf8_lossy(&output.stdout), name))
    }

    fn set(key: &str, name: &str, value: &str) -> Result<()> {
        process::check(Command::new("reg").args([
            "add",
            key,
            "/v",
            name,
            "/t",
            "REG_EXPAND_SZ",
            "/d",
            value,
            "/f",
        ]))
        .with_context(|| format!("Failed to write {} to {}", name, key))?;
        Ok(())
    }
}

impl Platform for Windows {
    fn os(&self) -> OperatingSystem {
        OperatingSystem::Windows
    }

    fn exe_suffix(&self) -> &'static str {
        ".exe"
    }

    fn cmake_archive(&self) -> PinnedArchive {
        PinnedArchive::new(
            "http://www.cmake.org/files/v3.0/cmake-3.0.1-win32-x86.zip",
            "cmake-3.0.1-win32-x86",
        )
    }

    fn propgcc_archive(&self) -> PinnedArchive {
        PinnedArchive::new(
            "http://david.zemon.name/downloads/PropGCC-win_v1_0_0.zip",
            "propgcc",
        )
    }

    fn default_toolchain_roots(&self) -> Vec<PathBuf> {
        vec![
            PathBuf::from(r"C:\Program Files (x86)\SimpleIDE\propeller-gcc"),
            PathBuf::from(r"C:\Program Files\SimpleIDE\propeller-gcc"),
            PathBuf::from(r"C:\propgcc"),
        ]
    }

    fn default_env_scope(&self) -> EnvScope {
        EnvScope::User
    }

    fn persist_var(&self, key: &str, value: &str, scope: EnvScope) -> Result<Persisted> {
        let reg_key = match scope {
            EnvScope::Root => SYSTEM_KEY,
            EnvScope::User => USER_KEY,
            EnvScope::Manual => {
                return Ok(Persisted::Instruction(format!(
                    "Please set {} to \"{}\"",
                    key, value
                )))
            }
        };

        let existing = Self::query(reg_key, key)?;
        let new_value = if key.eq_ignore_ascii_case("PATH") {
            match prepend_path_entry(existing.as_deref(), value) {
                Some(v) => v,
                None => return Ok(Persisted::AlreadyPresent(reg_key.to_string())),
            }
        } else if existing.as_deref() == Some(value) {
            return Ok(Persisted::AlreadyPresent(reg_key.to_string()));
        } else {
            value.to_string()
        };

        Self::set(reg_key, key, &new_value)?;
        Ok(Persisted::Written(reg_key.to_string()))
    }

    fn missing_make_instructions(&self) -> Option<&'static str> {
        // Make ships inside PropGCC's bin directory
        None
    }
}

/// Extract a value from `reg query` output
///
/// Lines look like `    PATH    REG_EXPAND_SZ    C:\a;C:\b`.
pub fn parse_reg_query(output: &str, name: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let type_start = line.find("REG_")?;
        if !line[..type_start].trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let rest = &line[type_start..];
        let value_start = rest.find(char::is_whitespace)?;
        Some(rest[value_start..].trim().to_string())
    })
}

/// New `PATH` with `entry` in front, or `None` if it is already listed
pub fn prepend_path_entry(existing: Option<&str>, entry: &str) -> Option<String> {
    match existing {
        Some(current) if current.split(';').any(|p| p.eq_ignore_ascii_case(entry)) => None,
        Some(current) if !current.is_empty() => Some(format!("{};{}", entry, current)),
        _ => Some(entry.to_string()),
    }
}
