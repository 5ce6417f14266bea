//! Tool detection
//!
//! This module provides:
//! - Executable lookup on an explicit search path
//! - `--version` parsing into comparable triples
//! - Descriptions of the two managed build dependencies

pub mod probe;
pub mod tool;
pub mod version;

pub use probe::{find_file, install_root_of, Probe};
pub use tool::{cmake_tool, propgcc_tool, PinnedArchive, ToolConfig, ToolDependency};
pub use version::parse_version_output;
