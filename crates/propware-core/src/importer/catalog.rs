//! Library catalog: short name to source directory

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryCatalog {
    units: BTreeMap<String, PathBuf>,
}

impl LibraryCatalog {
    /// A catalog with a single unit
    pub fn single(name: &str, path: PathBuf) -> Self {
        let mut catalog = Self::default();
        catalog.insert(name, path);
        catalog
    }

    /// Scan `root/<category>/<subdir>`; keys are subdirectory names with
    /// `prefix` removed
    pub fn scan(root: &Path, prefix: &str) -> Result<Self> {
        let mut catalog = Self::default();

        for category in sorted_dirs(root)? {
            for unit in sorted_dirs(&category)? {
                let Some(name) = unit.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let key = name.strip_prefix(prefix).unwrap_or(name).to_string();
                catalog.units.insert(key, unit);
            }
        }

        Ok(catalog)
    }

    pub fn insert(&mut self, name: &str, path: PathBuf) {
        self.units.insert(name.to_string(), path);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.units.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_strips_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for dir in [
            "Text Devices/libsimpletext",
            "Text Devices/libfdserial",
            "Motor/libservo",
            "Utility/libsimpletools/source",
        ] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::write(root.join("README.txt"), "").unwrap();
        std::fs::write(root.join("Motor/notes.txt"), "").unwrap();

        let catalog = LibraryCatalog::scan(root, "lib").unwrap();
        let keys: Vec<_> = catalog.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["fdserial", "servo", "simpletext", "simpletools"]);
        assert!(catalog
            .iter()
            .any(|(k, dir)| k == "servo" && dir == root.join("Motor/libservo")));
    }

    #[test]
    fn test_unprefixed_names_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("Misc/ping")).unwrap();
        let catalog = LibraryCatalog::scan(tmp.path(), "lib").unwrap();
        let keys: Vec<_> = catalog.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ping"]);
    }

    #[test]
    fn test_scan_missing_root_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(LibraryCatalog::scan(&tmp.path().join("nope"), "lib").is_err());
    }
}
