//! Charm-style installer prompts using cliclack

use crate::builder::BuildInvoker;
use crate::config::ProjectConfig;
use crate::environment::{EnvReport, EnvironmentConfigurator};
use crate::fetch::ArchiveFetcher;
use crate::importer;
use crate::platform::{self, EnvScope, Persisted, Platform};
use crate::prompt::{validate_install_parent, Prompter};
use crate::resolver::{Dependencies, DependencyResolver, Overrides};
use crate::runtime::Probe;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// CLI arguments for the install command
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    /// Project root; discovered when absent
    pub root: Option<PathBuf>,

    pub overrides: Overrides,

    /// Skip the library import
    pub skip_import: bool,

    /// Skip the initial build
    pub skip_build: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,
}

/// Answers questions with cliclack, or with defaults in `--yes` mode
pub struct ClackPrompter {
    yes: bool,
}

impl ClackPrompter {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }
}

impl Prompter for ClackPrompter {
    fn install_parent(&mut self, tool: &str, default: &Path) -> Result<PathBuf> {
        if self.yes {
            cliclack::log::info(format!("Installing {} into {}", tool, default.display()))?;
            return Ok(default.to_path_buf());
        }

        let default = default.display().to_string();
        let input: String = cliclack::input(format!("Where should {} be installed?", tool))
            .placeholder(&default)
            .default_input(&default)
            .validate(|input: &String| validate_install_parent(input).map(|_| ()))
            .interact()?;

        validate_install_parent(&input).map_err(anyhow::Error::msg)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        if self.yes {
            return Ok(default);
        }
        Ok(cliclack::confirm(message).initial_value(default).interact()?)
    }

    fn env_scope(&mut self, default: EnvScope) -> Result<EnvScope> {
        if self.yes {
            cliclack::log::info(format!("Environment: {}", default.display_name()))?;
            return Ok(default);
        }

        let mut select = cliclack::select("How should PropWare's environment variables be set?");
        for scope in [EnvScope::Root, EnvScope::User, EnvScope::Manual] {
            let hint = if scope == default { "recommended" } else { "" };
            select = select.item(scope, scope.display_name(), hint);
        }
        Ok(select.initial_value(default).interact()?)
    }
}

/// Install CMake and PropGCC, configure the environment, import the bundled
/// libraries and build PropWare once
pub async fn run_install(args: InstallArgs, cli_version: &str) -> Result<()> {
    cliclack::intro("PropWare installer")?;

    let platform = platform::detect()?;
    let config = ProjectConfig::discover(args.root.as_deref())?;
    cliclack::log::info(format!(
        "PropWare root: {} ({})",
        config.root.display(),
        platform.os()
    ))?;

    let mut prompter = ClackPrompter::new(args.yes);

    // Every question is asked before anything is downloaded
    let resolver = DependencyResolver::new(platform.as_ref(), &config)
        .with_cache_dir(config.init_downloads_dir()?.to_path_buf());
    let mut deps = resolver.decide(&args.overrides, &mut prompter)?;
    report_decisions(&deps)?;

    if deps.pending_downloads() > 0 {
        let spinner = cliclack::spinner();
        spinner.start("Downloading dependencies...");
        let fetcher = ArchiveFetcher::new(&format!("propware/{}", cli_version));
        match resolver.fetch_all(&mut deps, &fetcher).await {
            Ok(()) => spinner.stop("Dependencies installed"),
            Err(e) => {
                spinner.stop("Download failed");
                return Err(e);
            }
        }
    }

    let report = EnvironmentConfigurator::new(platform.as_ref()).configure(
        &config,
        &deps.all(),
        &deps.propgcc,
        &mut prompter,
    )?;
    report_environment(&report)?;

    if !args.skip_import {
        cliclack::log::step("Importing libpropeller and the Simple libraries")?;
        for imported in importer::import_all(&config, platform.exe_suffix(), None)? {
            cliclack::log::success(format!(
                "{}: {} sources, {} headers",
                imported.library,
                imported.sources.len(),
                imported.headers
            ))?;
        }
    }

    // Freshly extracted tools aren't on the caller's PATH yet
    let mut search_path: Vec<PathBuf> = deps.all().iter().filter_map(|d| d.bin_dir()).collect();
    search_path.extend(config.search_path.iter().cloned());
    let probe = Probe::new(search_path, platform.exe_suffix());

    let mut make_missing = probe.which("make").is_none();
    if make_missing && platform.install_make(&mut prompter)? {
        make_missing = probe.which("make").is_none();
    }
    if make_missing {
        if let Some(instructions) = platform.missing_make_instructions() {
            cliclack::log::warning(instructions)?;
        }
    }

    if !args.skip_build && !make_missing {
        cliclack::log::step("Building PropWare")?;
        BuildInvoker::for_tree(&config.root, &probe)?.build()?;
        cliclack::log::success("Build complete")?;
    }

    platform.post_install_checks(&mut prompter)?;

    print_next_steps(&report)
}

fn report_decisions(deps: &Dependencies) -> Result<()> {
    for dep in deps.all() {
        let name = dep.config.display_name;
        match (&dep.resolved_root, &dep.extraction_parent) {
            (Some(root), _) => {
                cliclack::log::success(format!("{} found at {}", name, root.display()))?
            }
            (None, Some(parent)) => cliclack::log::info(format!(
                "{} will be downloaded into {}",
                name,
                parent.display()
            ))?,
            (None, None) => {}
        }
    }
    Ok(())
}

fn report_environment(report: &EnvReport) -> Result<()> {
    for (key, persisted) in &report.persisted {
        match persisted {
            Persisted::Written(location) => {
                cliclack::log::success(format!("{} added to {}", key, location))?
            }
            Persisted::AlreadyPresent(location) => {
                cliclack::log::info(format!("{} already set in {}", key, location))?
            }
            Persisted::Instruction(message) => cliclack::log::warning(message)?,
        }
    }
    Ok(())
}

fn print_next_steps(report: &EnvReport) -> Result<()> {
    println!();
    println!("  Next steps");
    println!();

    let mut steps = vec!["Restart your shell so the new environment variables take effect".to_string()];
    if report.needs_reboot {
        steps.push("Reboot: system-wide variables are only read at login".to_string());
    }
    if report.instructions().next().is_some() {
        steps.push("Complete the manual environment steps listed above".to_string());
    }

    for (i, step) in steps.iter().enumerate() {
        println!("  {}.  {}", i + 1, step);
    }

    cliclack::outro("PropWare is ready")?;
    Ok(())
}
