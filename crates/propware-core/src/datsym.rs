//! Turn a binary `.dat` blob into a Propeller object file
//!
//! `objcopy -Ibinary` derives the `_binary_<name>_dat_start`/`_end`/`_size`
//! symbols from the input path it is given. Running it on a bare file name
//! inside a scratch directory yields the names SimpleIDE links against,
//! whatever directory (`cmm/`, `lmm/`, ...) the blob came from.

use crate::error::Error;
use crate::process;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::Command;

/// Convert `input` with `objcopy` and write the object file to `output`
pub fn convert(objcopy: &Path, input: &Path, output: &Path, verbose: bool) -> Result<()> {
    let input_name = input
        .file_name()
        .with_context(|| format!("Not a file: {}", input.display()))?;
    let output_name = output
        .file_name()
        .with_context(|| format!("Not a file: {}", output.display()))?;

    let scratch = tempfile::tempdir().context("Failed to create a scratch directory")?;
    let scratch_input = scratch.path().join(input_name);
    let scratch_output = scratch.path().join(output_name);

    copy(input, &scratch_input, verbose)?;

    let mut cmd = Command::new(objcopy);
    cmd.args(["-Ibinary", "-Opropeller-elf-gcc", "-Bpropeller"])
        .arg(input_name)
        .arg(output_name)
        .current_dir(scratch.path());
    let status = if verbose {
        process::run(&mut cmd)?
    } else {
        process::capture(&mut cmd)?.status
    };
    if !status.success() {
        return Err(Error::SymbolRenameFailed(input.to_path_buf()).into());
    }

    copy(&scratch_output, output, verbose)
}

fn copy(from: &Path, to: &Path, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{} cp {} {}",
            "Running:".dimmed(),
            from.display(),
            to.display()
        );
    }
    std::fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}
