//! Error types for failures that callers need to tell apart

use std::path::PathBuf;
use thiserror::Error;

/// Failures with a dedicated meaning in the install/build/package pipeline
///
/// Everything else travels as `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum Error {
    #[error("\"{}\" is not a recognized compressed file type", .0.display())]
    UnrecognizedArchive(PathBuf),

    #[error("CMake failed to generate build files in {}", .0.display())]
    GenerationFailed(PathBuf),

    #[error("Make failed to finish executing (exit code {0})")]
    CompileFailed(i32),

    #[error("`make {target}` failed with exit code {code}")]
    CleanFailed { target: String, code: i32 },

    #[error("{tool} was not found on the PATH")]
    MissingTool { tool: String },

    #[error(
        "Cannot find {}. It is expected to exist so that environment variables can be added to it",
        .0.display()
    )]
    MissingShellProfile(PathBuf),

    #[error("Unable to parse a version number from `{0}`")]
    VersionParse(String),

    #[error("Could not locate the PropWare root directory starting from {}", .0.display())]
    ProjectRootNotFound(PathBuf),

    #[error("Failed to checkout {0}")]
    CheckoutFailed(String),

    #[error("Renaming symbols failed for {}", .0.display())]
    SymbolRenameFailed(PathBuf),
}
