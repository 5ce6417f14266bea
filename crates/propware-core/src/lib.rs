//! PropWare Core - installer, library importer and release packager
//!
//! This library holds everything behind the `propware` command: locating or
//! downloading the build dependencies, persisting the environment, importing
//! the bundled third-party libraries, driving CMake/Make and packaging
//! release archives of many refs.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - Probing, version parsing, downloads, file
//!   classification, subprocess helpers, `.dat` object conversion
//! - **Layer 2: Workflow Components** - [`resolver::DependencyResolver`],
//!   [`environment::EnvironmentConfigurator`], [`importer::LibraryImporter`],
//!   [`builder::BuildInvoker`], [`packager::BranchPackager`]. OS differences
//!   are confined to a [`platform::Platform`] picked once at startup.
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based installer (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based installer prompts
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use propware_core::{importer, ProjectConfig};
//!
//! let config = ProjectConfig::discover(None)?;
//! for report in importer::import_all(&config, "", None)? {
//!     println!("{}: {} sources", report.library, report.sources.len());
//! }
//! ```

pub mod builder;
pub mod config;
pub mod datsym;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod importer;
pub mod packager;
pub mod platform;
pub mod process;
pub mod prompt;
pub mod resolver;
pub mod runtime;
pub mod scrub;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use builder::{BuildInvoker, BuildSystem};
pub use config::ProjectConfig;
pub use error::Error;
pub use importer::{import_all, Library, LibraryImporter};
pub use packager::{BranchPackager, DistConfig, PackageOptions, Summary};
pub use platform::{EnvScope, Platform};
pub use prompt::{Defaults, Prompter};
pub use resolver::{DependencyResolver, Overrides};

#[cfg(feature = "tui")]
pub use tui::run_install;
