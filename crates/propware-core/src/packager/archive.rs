//! Selecting and zipping the files that make up a binary distribution

use crate::config::DOWNLOADS_DIRECTORY;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Top-level directories never archived
pub const BLACKLISTED_DIRECTORIES: &[&str] = &["docs", ".idea", ".settings", ".git", DOWNLOADS_DIRECTORY];

/// Archived regardless of extension
pub const WHITELISTED_FILES: &[&str] = &["CMakeLists.txt", "Doxyfile", "README", "run_all_tests", "run_unit"];

pub const WHITELISTED_EXTENSIONS: &[&str] = &[
    "c", "s", "cpp", "cxx", "cc", "h", "a", "dox", "md", "py", "pl", "elf", "rb", "jpg", "lang", "pdf",
    "png", "cmake",
];

/// Inclusion rules for a distribution archive
#[derive(Debug, Clone)]
pub struct ArchiveFilter {
    pub blacklisted_dirs: Vec<String>,
    pub whitelisted_files: Vec<String>,
    pub whitelisted_extensions: Vec<String>,
}

impl Default for ArchiveFilter {
    fn default() -> Self {
        Self {
            blacklisted_dirs: owned(BLACKLISTED_DIRECTORIES),
            whitelisted_files: owned(WHITELISTED_FILES),
            whitelisted_extensions: owned(WHITELISTED_EXTENSIONS),
        }
    }
}

impl ArchiveFilter {
    /// A listed name, or `stem.ext` with exactly one dot and a whitelisted
    /// extension (any case)
    pub fn is_whitelisted(&self, file_name: &str) -> bool {
        if self.whitelisted_files.iter().any(|f| f == file_name) {
            return true;
        }

        let mut parts = file_name.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(stem), Some(ext), None) if !stem.is_empty() => self
                .whitelisted_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }

    fn is_blacklisted_dir(&self, name: &str) -> bool {
        self.blacklisted_dirs.iter().any(|d| d == name)
    }

    /// Root-relative, `/`-separated paths of every file to archive, sorted
    pub fn collect(&self, root: &Path) -> Result<Vec<String>> {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.depth() == 1
                    && e.file_type().is_dir()
                    && e.file_name().to_str().is_some_and(|n| self.is_blacklisted_dir(n)))
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !self.is_whitelisted(name) {
                continue;
            }
            let relative = entry.path().strip_prefix(root)?;
            entries.push(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }

        entries.sort();
        Ok(entries)
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `<prefix>_<ref>.zip`, with `/` in ref names replaced by `-`
pub fn archive_name(prefix: &str, git_ref: &str) -> String {
    format!("{}_{}.zip", prefix, git_ref.replace('/', "-"))
}

/// Zip `entries` (relative to `root`) into `dst`
pub fn write_archive(root: &Path, entries: &[String], dst: &Path) -> Result<()> {
    let file = File::create(dst).with_context(|| format!("Failed to create {}", dst.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in entries {
        let path = root.join(entry);
        let mut source =
            File::open(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        zip.start_file(entry.as_str(), options)?;
        std::io::copy(&mut source, &mut zip)
            .with_context(|| format!("Failed to archive {}", path.display()))?;
    }

    zip.finish()
        .with_context(|| format!("Failed to write {}", dst.display()))?;
    Ok(())
}

/// Delete `<prefix>_*.zip` left over from a previous run
pub fn clean_old_archives(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !dir.is_dir() {
        return Ok(removed);
    }

    let pattern = format!(
        "{}/{}_*.zip",
        glob::Pattern::escape(&dir.display().to_string()),
        glob::Pattern::escape(prefix)
    );
    let matches = glob::glob(&pattern).with_context(|| format!("Invalid pattern {}", pattern))?;
    for path in matches {
        let path = path.with_context(|| format!("Failed to read {}", dir.display()))?;
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}
