//! PropWare CLI - installer, library importer, release packager and .dat converter

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use propware_core::builder::BuildInvoker;
use propware_core::config::PROPGCC_PREFIX_ENV;
use propware_core::datsym;
use propware_core::error::Error;
use propware_core::importer::{self, Library};
use propware_core::packager::{self, PackageOptions};
use propware_core::platform::{self, Platform};
use propware_core::resolver::Overrides;
use propware_core::runtime::Probe;
use propware_core::tui::InstallArgs;
use propware_core::{scrub, ProjectConfig};
use std::path::PathBuf;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "propware")]
#[command(about = "Install, import and package PropWare")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install CMake and PropGCC, set up the environment and build PropWare
    Install(CliInstallArgs),
    /// Re-import libpropeller and the Simple libraries
    Import(ImportArgs),
    /// Build the PropWare tree with CMake or Make
    Build(RootArgs),
    /// Build and zip every configured branch and tag
    Package(PackageArgs),
    /// Delete CMake-generated files below the project root
    Scrub(RootArgs),
    /// Convert a binary .dat file into an object with SimpleIDE symbol names
    Datsym(DatsymArgs),
}

#[derive(Parser, Debug, Default)]
pub struct CliInstallArgs {
    /// Existing PropGCC installation to use instead of downloading one
    #[arg(long = "propgcc-path")]
    pub propgcc_path: Option<PathBuf>,

    /// Existing CMake installation to use instead of downloading one
    #[arg(long = "cmake-path")]
    pub cmake_path: Option<PathBuf>,

    /// PropWare root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Skip importing libpropeller and the Simple libraries
    #[arg(long = "skip-import")]
    pub skip_import: bool,

    /// Skip the initial build
    #[arg(long = "skip-build")]
    pub skip_build: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,
}

impl From<CliInstallArgs> for InstallArgs {
    fn from(args: CliInstallArgs) -> Self {
        InstallArgs {
            root: args.root,
            overrides: Overrides {
                cmake_path: args.cmake_path,
                propgcc_path: args.propgcc_path,
            },
            skip_import: args.skip_import,
            skip_build: args.skip_build,
            yes: args.yes,
        }
    }
}

#[derive(Parser, Debug)]
pub struct RootArgs {
    /// PropWare root directory
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// PropWare root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Import a single library
    #[arg(long, value_enum)]
    pub only: Option<Library>,
}

#[derive(Parser, Debug)]
pub struct PackageArgs {
    /// PropWare root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Package the release tags as well as the branches
    #[arg(long)]
    pub tags: bool,

    /// Branch to package; repeat to package several (replaces the configured list)
    #[arg(short, long = "branch")]
    pub branches: Vec<String>,

    /// YAML file with the branch and tag lists
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the archives are written to (defaults to the project root)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Package from a scratch clone instead of this checkout
    #[arg(long = "fresh-clone")]
    pub fresh_clone: bool,

    /// Repository to clone in fresh-clone mode
    #[arg(long, requires = "fresh_clone")]
    pub repository: Option<String>,
}

#[derive(Parser, Debug)]
pub struct DatsymArgs {
    /// Path to propeller-elf-objcopy (looked up on the PATH and in $PROPGCC_PREFIX/bin otherwise)
    #[arg(long)]
    pub objcopy: Option<PathBuf>,

    /// Binary file to convert
    #[arg(short, long)]
    pub input: PathBuf,

    /// Object file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Print each step
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<PackageArgs> for PackageOptions {
    fn from(args: PackageArgs) -> Self {
        PackageOptions {
            include_tags: args.tags,
            branches: args.branches,
            config_file: args.config,
            output_dir: args.output,
            fresh_clone: args.fresh_clone,
            repository: args.repository,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();

    match args.command {
        Some(Command::Install(install_args)) => install(install_args).await,
        Some(Command::Import(import_args)) => import(import_args),
        Some(Command::Build(root_args)) => build(root_args),
        Some(Command::Package(package_args)) => package(package_args),
        Some(Command::Scrub(root_args)) => scrub_tree(root_args),
        Some(Command::Datsym(datsym_args)) => convert_dat(datsym_args),
        // No subcommand provided, default to the interactive installer
        None => install(CliInstallArgs::default()).await,
    }
}

async fn install(args: CliInstallArgs) -> Result<()> {
    let result = propware_core::run_install(args.into(), CLI_VERSION).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}

fn import(args: ImportArgs) -> Result<()> {
    let platform = platform::detect()?;
    let config = ProjectConfig::discover(args.root.as_deref())?;

    for report in importer::import_all(&config, platform.exe_suffix(), args.only)? {
        println!(
            "{} {}: {} sources, {} headers ({})",
            "Imported".green(),
            report.library,
            report.sources.len(),
            report.headers,
            report.manifest.display()
        );
    }
    Ok(())
}

fn build(args: RootArgs) -> Result<()> {
    let platform = platform::detect()?;
    let config = ProjectConfig::discover(args.root.as_deref())?;
    let probe = Probe::new(config.search_path.clone(), platform.exe_suffix());

    let invoker = BuildInvoker::for_tree(&config.root, &probe)
        .inspect_err(|e| print_make_help(e, platform.as_ref()))?;
    invoker.build()?;
    println!("{}", "Build complete".green());
    Ok(())
}

fn package(args: PackageArgs) -> Result<()> {
    let platform = platform::detect()?;
    let config = ProjectConfig::discover(args.root.as_deref())?;

    let summary = packager::package(&config, platform.exe_suffix(), &args.into())?;
    if !summary.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn scrub_tree(args: RootArgs) -> Result<()> {
    let config = ProjectConfig::discover(args.root.as_deref())?;

    let removed = scrub::scrub(&config.root)?;
    for path in &removed {
        println!("{} {}", "Removed".dimmed(), path.display());
    }
    println!("{} generated entries removed", removed.len());
    Ok(())
}

fn convert_dat(args: DatsymArgs) -> Result<()> {
    let objcopy = match args.objcopy {
        Some(path) => path,
        None => {
            let platform = platform::detect()?;
            let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default();
            if let Some(prefix) = std::env::var_os(PROPGCC_PREFIX_ENV) {
                dirs.push(PathBuf::from(prefix).join("bin"));
            }
            Probe::new(dirs, platform.exe_suffix())
                .which("propeller-elf-objcopy")
                .ok_or_else(|| Error::MissingTool {
                    tool: "propeller-elf-objcopy".to_string(),
                })?
        }
    };

    datsym::convert(&objcopy, &args.input, &args.output, args.verbose)?;
    if args.verbose {
        println!("{} {}", "Created".green(), args.output.display());
    }
    Ok(())
}

fn print_make_help(err: &anyhow::Error, platform: &dyn Platform) {
    if let Some(Error::MissingTool { tool }) = err.downcast_ref::<Error>() {
        if tool == "make" {
            if let Some(instructions) = platform.missing_make_instructions() {
                eprintln!("{} {}", "Warning:".yellow(), instructions);
            }
        }
    }
}
