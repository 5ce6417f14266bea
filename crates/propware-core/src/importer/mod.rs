//! Third-party library importer
//!
//! Each library goes through the same sequence: clean out the previous import,
//! clone or update the upstream repository, mirror the interesting subtree
//! into the project, flatten the compilable sources into a "cheater"
//! directory and finally write a CMake fragment listing them.
//!
//! Nothing is written outside the project root and its downloads cache.

pub mod catalog;
pub mod classify;
pub mod library;
pub mod manifest;

pub use catalog::LibraryCatalog;
pub use classify::{classify, FileClass};
pub use library::{
    CheaterClean, Library, LibrarySpec, SourceRule, UnitLayout, LIBPROPELLER, SIMPLE,
};

use crate::config::{ProjectConfig, MEMORY_MODELS};
use crate::process;
use crate::runtime::Probe;
use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// What an import produced
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub library: &'static str,
    /// Source file names listed in the manifest, sorted
    pub sources: Vec<String>,
    pub headers: usize,
    pub manifest: PathBuf,
}

pub struct LibraryImporter<'a> {
    spec: &'a LibrarySpec,
    config: &'a ProjectConfig,
    probe: Probe,
}

impl<'a> LibraryImporter<'a> {
    pub fn new(spec: &'a LibrarySpec, config: &'a ProjectConfig, exe_suffix: &'static str) -> Self {
        Self {
            spec,
            config,
            probe: Probe::new(config.search_path.clone(), exe_suffix),
        }
    }

    fn clone_path(&self) -> PathBuf {
        self.spec.clone_path(&self.config.downloads_dir)
    }

    fn cheater_path(&self) -> PathBuf {
        self.spec.cheater_path(&self.config.root)
    }

    /// Run every step in order
    pub fn run(&self) -> Result<ImportReport> {
        self.clean()?;
        self.config.init_downloads_dir()?;
        self.fetch();
        self.import()?;

        let catalog = self.catalog()?;
        let copied = self.filter_copy(&catalog)?;
        let manifest = self.write_manifest(&copied.sources)?;

        Ok(ImportReport {
            library: self.spec.name,
            sources: copied.sources,
            headers: copied.headers,
            manifest,
        })
    }

    /// Remove everything a previous import produced
    pub fn clean(&self) -> Result<()> {
        let cheater = self.cheater_path();

        if let Some(import) = &self.spec.import {
            let dest = self.config.root.join(import.to);
            if dest.is_dir() {
                for entry in read_dir_sorted(&dest)? {
                    let Some(name) = file_name(&entry) else { continue };
                    if entry == cheater || self.spec.is_clean_excluded(name) {
                        continue;
                    }
                    remove_path(&entry)?;
                }
            }
        }

        if cheater.is_dir() {
            let max_depth = match self.spec.cheater_clean {
                CheaterClean::AllFiles => usize::MAX,
                CheaterClean::TopLevelSources => 1,
            };
            let walker = WalkDir::new(&cheater)
                .min_depth(1)
                .max_depth(max_depth)
                .into_iter()
                .filter_entry(|e| {
                    !(e.file_type().is_dir()
                        && e.file_name().to_str().is_some_and(|n| self.spec.is_clean_excluded(n)))
                });
            for entry in walker {
                let entry = entry?;
                let Some(name) = entry.file_name().to_str() else { continue };
                let removable = match self.spec.cheater_clean {
                    CheaterClean::AllFiles => !self.spec.is_clean_excluded(name),
                    CheaterClean::TopLevelSources => classify(name) == FileClass::Source,
                };
                if entry.file_type().is_file() && removable {
                    remove_path(entry.path())?;
                }
            }

            let cmake_files = cheater.join("CMakeFiles");
            if cmake_files.exists() {
                remove_path(&cmake_files)?;
            }
        }

        if self.spec.copy_headers {
            for header in self.upstream_headers()? {
                let target = self.config.root.join(&header);
                if target.is_file() {
                    remove_path(&target)?;
                }
            }
        }

        Ok(())
    }

    /// Headers an import of the current clone places at the project root
    fn upstream_headers(&self) -> Result<BTreeSet<String>> {
        let mut headers = BTreeSet::new();
        let Ok(catalog) = self.catalog() else {
            return Ok(headers);
        };
        for (_, dir) in catalog.iter() {
            let Ok(entries) = read_dir_sorted(dir) else { continue };
            for entry in entries {
                if let Some(name) = file_name(&entry) {
                    if entry.is_file() && classify(name) == FileClass::Header {
                        headers.insert(name.to_string());
                    }
                }
            }
        }
        Ok(headers)
    }

    /// Clone or update the upstream repository; failures only warn
    pub fn fetch(&self) {
        let Some(git) = self.probe.which("git") else {
            eprintln!(
                "{} unable to update the {} repository: `git` is not on the PATH",
                "Warning:".yellow(),
                self.spec.name
            );
            return;
        };

        let clone = self.clone_path();
        let mut cmd = Command::new(git);
        if clone.exists() {
            cmd.arg("pull").current_dir(&clone);
        } else {
            cmd.arg("clone")
                .arg(self.spec.repository)
                .arg(&clone)
                .current_dir(&self.config.downloads_dir);
        }

        if let Err(e) = process::check(&mut cmd) {
            eprintln!(
                "{} unable to clone or update the {} repository: {:#}",
                "Warning:".yellow(),
                self.spec.name,
                e
            );
        }
    }

    /// Mirror the upstream subtree into the project, overwriting existing files
    pub fn import(&self) -> Result<()> {
        let Some(import) = &self.spec.import else {
            return Ok(());
        };
        let from = self.clone_path().join(import.from);
        let to = self.config.root.join(import.to);
        if !from.is_dir() {
            anyhow::bail!(
                "{} sources not found at {}",
                self.spec.name,
                from.display()
            );
        }
        copy_tree(&from, &to)
    }

    /// Units to collect sources from
    pub fn catalog(&self) -> Result<LibraryCatalog> {
        match &self.spec.units {
            UnitLayout::Flat => {
                let import = self
                    .spec
                    .import
                    .as_ref()
                    .context("a flat library must declare an import tree")?;
                Ok(LibraryCatalog::single(
                    self.spec.name,
                    self.config.root.join(import.to),
                ))
            }
            UnitLayout::Catalog { tree, prefix, extras } => {
                let tree = self.clone_path().join(tree);
                let mut catalog = LibraryCatalog::scan(&tree, prefix)
                    .with_context(|| format!("{} sources not found", self.spec.name))?;
                for (key, path) in extras.iter() {
                    catalog.insert(key, tree.join(path));
                }
                Ok(catalog)
            }
        }
    }

    /// Copy compilable sources into the cheater directory and headers into the
    /// project root
    pub fn filter_copy(&self, catalog: &LibraryCatalog) -> Result<FilterCopy> {
        let cheater = self.cheater_path();
        std::fs::create_dir_all(&cheater)
            .with_context(|| format!("Failed to create directory: {}", cheater.display()))?;

        let mut copy = FilterCopy::default();
        let mut seen = BTreeSet::new();

        for (key, dir) in catalog.iter() {
            let demo_files = match self.spec.units {
                UnitLayout::Catalog { .. } => vec![format!("lib{}.c", key), format!("lib{}.h", key)],
                UnitLayout::Flat => Vec::new(),
            };

            for file in self.unit_files(dir, &cheater)? {
                let Some(name) = file_name(&file) else { continue };
                if demo_files.iter().any(|d| d == name) || self.spec.blacklist.contains(&name) {
                    continue;
                }

                match classify(name) {
                    FileClass::Source if self.accepts_source(name) => {
                        if seen.insert(name.to_string()) {
                            copy_file(&file, &cheater.join(name))?;
                            copy.sources.push(name.to_string());
                        }
                    }
                    FileClass::Header if self.spec.copy_headers => {
                        copy_file(&file, &self.config.root.join(name))?;
                        copy.headers += 1;
                    }
                    _ => {}
                }
            }

            if let UnitLayout::Catalog { .. } = self.spec.units {
                copy_memory_model_data(dir, &cheater)?;
            }
        }

        copy.sources.sort();
        Ok(copy)
    }

    fn unit_files(&self, dir: &Path, cheater: &Path) -> Result<Vec<PathBuf>> {
        match self.spec.units {
            UnitLayout::Flat => {
                let mut files = Vec::new();
                let walker = WalkDir::new(dir)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| e.path() != cheater && e.file_name() != ".git");
                for entry in walker {
                    let entry = entry?;
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
                Ok(files)
            }
            UnitLayout::Catalog { .. } => Ok(read_dir_sorted(dir)?
                .into_iter()
                .filter(|p| p.is_file())
                .collect()),
        }
    }

    fn accepts_source(&self, name: &str) -> bool {
        match self.spec.source_rule {
            SourceRule::AnySource => true,
            SourceRule::AssemblyOr(names) => classify::is_assembly(name) || names.contains(&name),
        }
    }

    /// Write the sorted manifest fragment into the cheater directory
    pub fn write_manifest(&self, sources: &[String]) -> Result<PathBuf> {
        let path = self.spec.manifest_path(&self.config.root);
        manifest::write(&path, self.spec.manifest_variable, sources)?;
        Ok(path)
    }
}

#[derive(Debug, Default)]
pub struct FilterCopy {
    pub sources: Vec<String>,
    pub headers: usize,
}

/// Import every library, or just `only`
pub fn import_all(
    config: &ProjectConfig,
    exe_suffix: &'static str,
    only: Option<Library>,
) -> Result<Vec<ImportReport>> {
    let libraries: Vec<Library> = match only {
        Some(library) => vec![library],
        None => Library::all().to_vec(),
    };

    libraries
        .iter()
        .map(|library| {
            let spec = library.spec();
            LibraryImporter::new(spec, config, exe_suffix)
                .run()
                .with_context(|| format!("Failed to import {}", spec.name))
        })
        .collect()
}

/// `.dat` blobs shipped in per-memory-model subdirectories
fn copy_memory_model_data(unit: &Path, cheater: &Path) -> Result<()> {
    for model in MEMORY_MODELS {
        let dir = unit.join(model);
        if !dir.is_dir() {
            continue;
        }
        for file in read_dir_sorted(&dir)? {
            let Some(name) = file_name(&file) else { continue };
            let target = cheater.join(name);
            if name.ends_with(".dat") && file.is_file() && !target.exists() {
                copy_file(&file, &target)?;
            }
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn remove_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove {}", path.display()))
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Recursive copy that overwrites existing files
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).into_iter().filter_entry(|e| e.file_name() != ".git") {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// A project with no `git` on the search path, so fetch leaves the
    /// pre-seeded clone untouched
    fn offline_project() -> (tempfile::TempDir, ProjectConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let config = ProjectConfig::new(tmp.path()).with_search_path(vec![]);
        (tmp, config)
    }

    fn seed_libpropeller(config: &ProjectConfig) {
        let upstream = config.downloads_dir.join("libpropeller/libpropeller");
        write(&upstream.join("serial/serial.S"), "asm");
        write(&upstream.join("serial/serial.h"), "hdr");
        write(&upstream.join("numbers/numbers.cpp"), "num");
        write(&upstream.join("numbers/numbers.h"), "hdr");
        write(&upstream.join("pin/pin.cpp"), "not wanted");
        write(&upstream.join("pwm32/pwm32.s"), "asm");
    }

    fn seed_simple(config: &ProjectConfig) {
        let tree = config.downloads_dir.join("Simple-Libraries/Learn/Simple Libraries");
        write(&tree.join("Utility/libsimpletools/simpletools.h"), "hdr");
        write(&tree.join("Utility/libsimpletools/libsimpletools.c"), "demo");
        write(&tree.join("Utility/libsimpletools/source/pause.c"), "src");
        write(&tree.join("Utility/libsimpletools/source/i2c_init.c"), "src");
        write(&tree.join("Motor/libservo/servo.c"), "src");
        write(&tree.join("Motor/libservo/servo.h"), "hdr");
        write(&tree.join("Motor/libservo/libservo.h"), "demo");
        write(&tree.join("Motor/libservo/cmm/servo_pasm.dat"), "blob");
        write(&tree.join("Motor/libservo/lmm/servo_pasm.dat"), "other blob");
        write(&tree.join("Motor/libservo/lmm/ignored.txt"), "x");
    }

    fn listing(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let content = if e.file_type().is_file() {
                    std::fs::read(e.path()).unwrap()
                } else {
                    Vec::new()
                };
                (e.path().strip_prefix(dir).unwrap().to_path_buf(), content)
            })
            .collect()
    }

    #[test]
    fn test_libpropeller_import() {
        let (_tmp, config) = offline_project();
        seed_libpropeller(&config);

        let report = LibraryImporter::new(&LIBPROPELLER, &config, "").run().unwrap();
        assert_eq!(report.sources, vec!["numbers.cpp", "pwm32.s", "serial.S"]);
        assert_eq!(report.headers, 0);

        let cheater = config.root.join("libpropeller/source");
        assert!(cheater.join("serial.S").is_file());
        assert!(!cheater.join("pin.cpp").exists());
        assert!(config.root.join("libpropeller/pin/pin.cpp").is_file());
        assert!(!config.root.join("serial.h").exists());
    }

    #[test]
    fn test_manifest_matches_cheater_dir() {
        let (_tmp, config) = offline_project();
        seed_simple(&config);

        let report = LibraryImporter::new(&SIMPLE, &config, "").run().unwrap();
        let content = std::fs::read_to_string(&report.manifest).unwrap();
        let listed = manifest::parse(&content);

        let mut in_cheater: Vec<String> = std::fs::read_dir(config.root.join("simple"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| classify(n) == FileClass::Source && !n.ends_with(".dat"))
            .collect();
        in_cheater.sort();

        assert_eq!(listed, in_cheater);
        assert_eq!(listed, vec!["i2c_init.c", "pause.c", "servo.c"]);
    }

    #[test]
    fn test_simple_headers_and_demo_files() {
        let (_tmp, config) = offline_project();
        seed_simple(&config);

        let report = LibraryImporter::new(&SIMPLE, &config, "").run().unwrap();
        assert_eq!(report.headers, 2);
        assert!(config.root.join("servo.h").is_file());
        assert!(config.root.join("simpletools.h").is_file());
        assert!(!config.root.join("libservo.h").exists());
        assert!(!config.root.join("simple/libsimpletools.c").exists());
    }

    #[test]
    fn test_memory_model_data_first_copy_wins() {
        let (_tmp, config) = offline_project();
        seed_simple(&config);

        LibraryImporter::new(&SIMPLE, &config, "").run().unwrap();
        let dat = config.root.join("simple/servo_pasm.dat");
        assert_eq!(std::fs::read_to_string(dat).unwrap(), "blob");
        assert!(!config.root.join("simple/ignored.txt").exists());
    }

    #[test]
    fn test_import_is_deterministic() {
        let (_tmp, config) = offline_project();
        seed_simple(&config);
        seed_libpropeller(&config);

        import_all(&config, "", None).unwrap();
        let first = listing(&config.root);
        import_all(&config, "", None).unwrap();
        assert_eq!(listing(&config.root), first);
    }

    #[test]
    fn test_clean_is_idempotent_and_keeps_excludes() {
        let (_tmp, config) = offline_project();
        seed_libpropeller(&config);
        let importer = LibraryImporter::new(&LIBPROPELLER, &config, "");
        importer.run().unwrap();

        let dest = config.root.join("libpropeller");
        write(&dest.join("CMakeLists.txt"), "cmake");
        write(&dest.join("source/CMakeLists.txt"), "cmake");
        write(&dest.join("source/libpropeller.cmake"), "include");
        write(&dest.join("source/cmm/liblibpropeller.a"), "archive");
        write(&dest.join("source/CMakeFiles/junk.o"), "obj");

        importer.clean().unwrap();
        let once = listing(&config.root);
        importer.clean().unwrap();
        assert_eq!(listing(&config.root), once);

        assert!(dest.join("CMakeLists.txt").is_file());
        assert!(dest.join("source/CMakeLists.txt").is_file());
        assert!(dest.join("source/libpropeller.cmake").is_file());
        assert!(dest.join("source/cmm/liblibpropeller.a").is_file());
        assert!(!dest.join("source/CMakeFiles").exists());
        assert!(!dest.join("source/serial.S").exists());
        assert!(!dest.join("source/libpropellerObjects.cmake").exists());
        assert!(!dest.join("serial").exists());
    }

    #[test]
    fn test_clean_removes_imported_headers_only() {
        let (_tmp, config) = offline_project();
        seed_simple(&config);
        write(&config.root.join("PropWare.h"), "ours");

        let importer = LibraryImporter::new(&SIMPLE, &config, "");
        importer.run().unwrap();
        assert!(config.root.join("servo.h").is_file());

        importer.clean().unwrap();
        assert!(!config.root.join("servo.h").exists());
        assert!(config.root.join("PropWare.h").is_file());
    }

    #[test]
    fn test_simple_clean_keeps_non_source_files() {
        let (_tmp, config) = offline_project();
        seed_simple(&config);
        let importer = LibraryImporter::new(&SIMPLE, &config, "");
        importer.run().unwrap();

        let cheater = config.root.join("simple");
        write(&cheater.join("README.md"), "notes");
        write(&cheater.join("Doxyfile"), "doxygen");
        write(&cheater.join("cmm/libsimple.a"), "archive");
        write(&cheater.join("CMakeFiles/junk.o"), "obj");

        importer.clean().unwrap();
        assert!(!cheater.join("servo.c").exists());
        assert!(!cheater.join("pause.c").exists());
        assert!(!cheater.join("servo_pasm.dat").exists());
        assert!(!cheater.join("CMakeFiles").exists());
        assert!(cheater.join("README.md").is_file());
        assert!(cheater.join("Doxyfile").is_file());
        assert!(cheater.join("cmm/libsimple.a").is_file());
    }

    #[test]
    fn test_missing_upstream_is_error() {
        let (_tmp, config) = offline_project();
        assert!(LibraryImporter::new(&SIMPLE, &config, "").run().is_err());
        assert!(LibraryImporter::new(&LIBPROPELLER, &config, "").run().is_err());
    }

    #[test]
    fn test_blacklisted_names_are_skipped() {
        static SPEC: LibrarySpec = LibrarySpec {
            name: "Simple",
            repository: "",
            clone_dir: "Simple-Libraries",
            import: None,
            units: UnitLayout::Catalog {
                tree: "Learn/Simple Libraries",
                prefix: "lib",
                extras: &[],
            },
            source_rule: SourceRule::AnySource,
            copy_headers: false,
            cheater_dir: "simple",
            cheater_clean: CheaterClean::TopLevelSources,
            clean_excludes: &[],
            blacklist: &["servo.c"],
            manifest_file: "simpleObjects.cmake",
            manifest_variable: "SIMPLE_OBJECTS",
        };

        let (_tmp, config) = offline_project();
        seed_simple(&config);
        let report = LibraryImporter::new(&SPEC, &config, "").run().unwrap();
        assert!(!report.sources.contains(&"servo.c".to_string()));
        assert!(!config.root.join("simple/servo.c").exists());
    }
}
