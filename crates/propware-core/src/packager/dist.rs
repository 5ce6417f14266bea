//! Which refs to package, loaded from YAML or built in

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Refs to package and how to name the results
///
/// ```yaml
/// branches: [master, development]
/// tags: [v1.2]
/// current: master
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistConfig {
    pub branches: Vec<String>,
    pub tags: Vec<String>,

    /// Ref also published as `<prefix>_current.zip`; checked out again when
    /// packaging finishes
    pub current: String,

    /// Refs whose tree needs a library import even without the importer marker
    pub force_import_refs: Vec<String>,

    pub archive_prefix: String,

    /// Cloned in fresh-clone mode when no URL is given
    pub repository: String,
}

impl Default for DistConfig {
    fn default() -> Self {
        Self {
            branches: owned(&["master", "development", "release-2.0", "release-2.0-nightly"]),
            tags: owned(&["v1.1", "v1.2", "v2.0-beta1", "v2.0-beta2", "v2.0-beta3", "v2.0-beta4"]),
            current: "release-2.0".to_string(),
            force_import_refs: owned(&["v2.0-beta1"]),
            archive_prefix: "PropWare".to_string(),
            repository: "https://github.com/SwimDude0614/PropWare.git".to_string(),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl DistConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Branches, followed by tags when requested
    pub fn refs(&self, include_tags: bool) -> Vec<String> {
        let mut refs = self.branches.clone();
        if include_tags {
            refs.extend(self.tags.iter().cloned());
        }
        refs
    }
}
