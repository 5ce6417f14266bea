//! Remove CMake's generated state from a tree

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GENERATED_DIRECTORY: &str = "CMakeFiles";
const GENERATED_FILES: &[&str] = &["CMakeCache.txt", "cmake_install.cmake"];

/// Delete every `CMakeFiles` directory, `CMakeCache.txt` and
/// `cmake_install.cmake` below `root`, returning what was removed
pub fn scrub(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let name = entry.file_name();
        if entry.file_type().is_dir() && name == GENERATED_DIRECTORY {
            dirs.push(entry.into_path());
            walker.skip_current_dir();
        } else if entry.file_type().is_file() && GENERATED_FILES.iter().any(|f| name == *f) {
            files.push(entry.into_path());
        }
    }

    for dir in &dirs {
        std::fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    for file in &files {
        std::fs::remove_file(file).with_context(|| format!("Failed to remove {}", file.display()))?;
    }

    dirs.extend(files);
    Ok(dirs)
}
