//! Descriptions of the third-party libraries PropWare bundles

use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// Which third-party library to import
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Library {
    Libpropeller,
    Simple,
}

impl Library {
    pub fn all() -> [Library; 2] {
        [Library::Libpropeller, Library::Simple]
    }

    pub fn spec(&self) -> &'static LibrarySpec {
        match self {
            Library::Libpropeller => &LIBPROPELLER,
            Library::Simple => &SIMPLE,
        }
    }
}

/// Subtree of the clone mirrored into the project
#[derive(Debug, Clone, Copy)]
pub struct ImportTree {
    /// Relative to the clone
    pub from: &'static str,
    /// Relative to the project root
    pub to: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub enum UnitLayout {
    /// The imported tree is one unit, walked recursively
    Flat,
    /// `tree/<category>/<prefix><name>` directories, each walked one level deep
    Catalog {
        /// Relative to the clone
        tree: &'static str,
        prefix: &'static str,
        /// Additional `(key, path relative to tree)` units
        extras: &'static [(&'static str, &'static str)],
    },
}

/// Which source files end up in the manifest
#[derive(Debug, Clone, Copy)]
pub enum SourceRule {
    AnySource,
    /// Assembly files plus the named files
    AssemblyOr(&'static [&'static str]),
}

/// What Clean removes from the cheater directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheaterClean {
    /// Every file below it, recursively
    AllFiles,
    /// Only source files directly inside it; project files living there survive
    TopLevelSources,
}

#[derive(Debug)]
pub struct LibrarySpec {
    pub name: &'static str,
    pub repository: &'static str,
    /// Directory name under the downloads cache
    pub clone_dir: &'static str,
    pub import: Option<ImportTree>,
    pub units: UnitLayout,
    pub source_rule: SourceRule,
    /// Copy headers to the project root
    pub copy_headers: bool,
    /// Flattened source directory, relative to the project root
    pub cheater_dir: &'static str,
    pub cheater_clean: CheaterClean,
    /// Names Clean never removes
    pub clean_excludes: &'static [&'static str],
    /// File names never copied
    pub blacklist: &'static [&'static str],
    pub manifest_file: &'static str,
    pub manifest_variable: &'static str,
}

impl LibrarySpec {
    pub fn clone_path(&self, downloads_dir: &Path) -> PathBuf {
        downloads_dir.join(self.clone_dir)
    }

    pub fn cheater_path(&self, root: &Path) -> PathBuf {
        root.join(self.cheater_dir)
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        self.cheater_path(root).join(self.manifest_file)
    }

    pub fn is_clean_excluded(&self, name: &str) -> bool {
        self.clean_excludes.contains(&name)
    }
}

pub static LIBPROPELLER: LibrarySpec = LibrarySpec {
    name: "libpropeller",
    repository: "https://github.com/libpropeller/libpropeller.git",
    clone_dir: "libpropeller",
    import: Some(ImportTree {
        from: "libpropeller",
        to: "libpropeller",
    }),
    units: UnitLayout::Flat,
    source_rule: SourceRule::AssemblyOr(&["numbers.cpp"]),
    copy_headers: false,
    cheater_dir: "libpropeller/source",
    cheater_clean: CheaterClean::AllFiles,
    clean_excludes: &[
        "cog",
        "cmm",
        "lmm",
        "xmmc",
        "xmm-single",
        "xmm-split",
        "CMakeLists.txt",
        "libpropeller.cmake",
    ],
    blacklist: &[],
    manifest_file: "libpropellerObjects.cmake",
    manifest_variable: "LIBPROPELLER_OBJECTS",
};

pub static SIMPLE: LibrarySpec = LibrarySpec {
    name: "Simple",
    repository: "https://github.com/parallaxinc/Simple-Libraries.git",
    clone_dir: "Simple-Libraries",
    import: None,
    units: UnitLayout::Catalog {
        tree: "Learn/Simple Libraries",
        prefix: "lib",
        extras: &[("__simpletools", "Utility/libsimpletools/source")],
    },
    source_rule: SourceRule::AnySource,
    copy_headers: true,
    cheater_dir: "simple",
    cheater_clean: CheaterClean::TopLevelSources,
    clean_excludes: &[
        "cog",
        "cmm",
        "lmm",
        "xmmc",
        "xmm-single",
        "xmm-split",
        "CMakeLists.txt",
        "simple.cmake",
    ],
    blacklist: &[],
    manifest_file: "simpleObjects.cmake",
    manifest_variable: "SIMPLE_OBJECTS",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let root = Path::new("/p");
        assert_eq!(
            LIBPROPELLER.manifest_path(root),
            Path::new("/p/libpropeller/source/libpropellerObjects.cmake")
        );
        assert_eq!(SIMPLE.manifest_path(root), Path::new("/p/simple/simpleObjects.cmake"));
        assert_eq!(
            SIMPLE.clone_path(Path::new("/p/.external_downloads")),
            Path::new("/p/.external_downloads/Simple-Libraries")
        );
    }

    #[test]
    fn test_excludes_cover_memory_models() {
        for spec in [&LIBPROPELLER, &SIMPLE] {
            for model in crate::config::MEMORY_MODELS {
                assert!(spec.is_clean_excluded(model), "{} {}", spec.name, model);
            }
            assert!(spec.is_clean_excluded("CMakeLists.txt"));
        }
    }
}
