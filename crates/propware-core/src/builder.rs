//! CMake / Make invocation for a PropWare tree

use crate::config::BUILD_DIRECTORY;
use crate::error::Error;
use crate::process;
use crate::runtime::Probe;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// `make simple_clean` exits with this when the target doesn't exist
const MISSING_TARGET_EXIT_CODE: i32 = 2;

const MAX_JOBS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSystem {
    /// Out-of-source CMake build in `bin/`
    CMake,
    /// Plain makefiles at the root
    Make,
}

impl BuildSystem {
    /// Older trees predate the CMake build
    pub fn detect(root: &Path) -> Self {
        if root.join("CMakeLists.txt").is_file() {
            BuildSystem::CMake
        } else {
            BuildSystem::Make
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildInvoker {
    cmake: Option<PathBuf>,
    make: PathBuf,
    source_dir: PathBuf,
    build_dir: PathBuf,
    system: BuildSystem,
    jobs: usize,
}

impl BuildInvoker {
    /// Set up a build of the tree at `root`, locating tools through `probe`
    pub fn for_tree(root: &Path, probe: &Probe) -> Result<Self> {
        let system = BuildSystem::detect(root);

        let make = probe.which("make").ok_or_else(|| Error::MissingTool {
            tool: "make".to_string(),
        })?;
        let cmake = probe.which("cmake");
        if system == BuildSystem::CMake && cmake.is_none() {
            return Err(Error::MissingTool {
                tool: "cmake".to_string(),
            }
            .into());
        }

        let build_dir = match system {
            BuildSystem::CMake => root.join(BUILD_DIRECTORY),
            BuildSystem::Make => root.to_path_buf(),
        };

        Ok(Self {
            cmake,
            make,
            source_dir: root.to_path_buf(),
            build_dir,
            system,
            jobs: default_jobs(),
        })
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Run CMake in the build directory; a no-op for plain Make trees
    pub fn generate(&self) -> Result<()> {
        let Some(cmake) = self.cmake_for_tree() else {
            return Ok(());
        };

        std::fs::create_dir_all(&self.build_dir)
            .with_context(|| format!("Failed to create directory: {}", self.build_dir.display()))?;

        let status = process::run(
            Command::new(cmake)
                .args(["-G", "Unix Makefiles"])
                .arg(&self.source_dir)
                .current_dir(&self.build_dir),
        )?;
        if !status.success() {
            return Err(Error::GenerationFailed(self.build_dir.clone()).into());
        }
        Ok(())
    }

    /// Run the parallel build and hand back its status
    pub fn compile(&self) -> Result<ExitStatus> {
        process::run(
            Command::new(&self.make)
                .arg(format!("-j{}", self.jobs))
                .arg("--silent")
                .current_dir(&self.build_dir),
        )
    }

    /// Generate and compile, treating a failed build as an error
    pub fn build(&self) -> Result<()> {
        self.generate()?;
        let status = self.compile()?;
        if !status.success() {
            return Err(Error::CompileFailed(status.code().unwrap_or(-1)).into());
        }
        Ok(())
    }

    /// Remove build outputs, tolerating trees without a `simple_clean` target
    pub fn clean(&self) -> Result<()> {
        if !self.build_dir.exists() {
            return Ok(());
        }

        // Makefiles may be stale or missing; only failing to start a tool is fatal
        if let Some(cmake) = self.cmake_for_tree() {
            process::run_quiet(
                Command::new(cmake)
                    .args(["-G", "Unix Makefiles"])
                    .arg(&self.source_dir)
                    .current_dir(&self.build_dir),
            )?;
        }

        Command::new(&self.make)
            .args(["clean", "--silent"])
            .current_dir(&self.build_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to execute: {} clean", self.make.display()))?;

        let status = process::run_quiet(
            Command::new(&self.make)
                .args(["simple_clean", "--silent"])
                .current_dir(&self.build_dir),
        )?;
        match status.code() {
            Some(0) | Some(MISSING_TARGET_EXIT_CODE) => Ok(()),
            code => Err(Error::CleanFailed {
                target: "simple_clean".to_string(),
                code: code.unwrap_or(-1),
            }
            .into()),
        }
    }

    fn cmake_for_tree(&self) -> Option<&Path> {
        match self.system {
            BuildSystem::CMake => self.cmake.as_deref(),
            BuildSystem::Make => None,
        }
    }
}

/// One job per CPU, capped at four
pub fn default_jobs() -> usize {
    jobs_for(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
}

fn jobs_for(cpus: usize) -> usize {
    cpus.clamp(1, MAX_JOBS)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Install a shell script named `name` in `dir` that appends its
    /// arguments to `log` and runs `body`
    fn fake_tool(dir: &Path, name: &str, log: &Path, body: &str) {
        let path = dir.join(name);
        std::fs::write(
            &path,
            format!(
                "#!/bin/sh\necho \"{} $*\" >> \"{}\"\n{}\n",
                name,
                log.display(),
                body
            ),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        tools: PathBuf,
        log: PathBuf,
    }

    impl Fixture {
        fn new(cmake_tree: bool) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().join("PropWare");
            let tools = tmp.path().join("tools");
            std::fs::create_dir_all(&root).unwrap();
            std::fs::create_dir_all(&tools).unwrap();
            if cmake_tree {
                std::fs::write(root.join("CMakeLists.txt"), "project(PropWare)").unwrap();
            }
            let log = tmp.path().join("log.txt");
            Self {
                _tmp: tmp,
                root,
                tools,
                log,
            }
        }

        fn tool(&self, name: &str, body: &str) -> &Self {
            fake_tool(&self.tools, name, &self.log, body);
            self
        }

        fn invoker(&self) -> Result<BuildInvoker> {
            BuildInvoker::for_tree(&self.root, &Probe::new(vec![self.tools.clone()], ""))
        }

        fn log(&self) -> Vec<String> {
            std::fs::read_to_string(&self.log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn test_jobs_capped() {
        assert_eq!(jobs_for(0), 1);
        assert_eq!(jobs_for(2), 2);
        assert_eq!(jobs_for(4), 4);
        assert_eq!(jobs_for(16), 4);
    }

    #[test]
    fn test_detect_build_system() {
        let fx = Fixture::new(false);
        assert_eq!(BuildSystem::detect(&fx.root), BuildSystem::Make);
        std::fs::write(fx.root.join("CMakeLists.txt"), "").unwrap();
        assert_eq!(BuildSystem::detect(&fx.root), BuildSystem::CMake);
    }

    #[test]
    fn test_build_cmake_tree() {
        let fx = Fixture::new(true);
        fx.tool("cmake", "exit 0").tool("make", "exit 0");

        let invoker = fx.invoker().unwrap().with_jobs(3);
        invoker.build().unwrap();

        assert!(fx.root.join("bin").is_dir());
        assert_eq!(
            fx.log(),
            vec![
                format!("cmake -G Unix Makefiles {}", fx.root.display()),
                "make -j3 --silent".to_string(),
            ]
        );
    }

    #[test]
    fn test_generation_failure() {
        let fx = Fixture::new(true);
        fx.tool("cmake", "exit 1").tool("make", "exit 0");

        let err = fx.invoker().unwrap().build().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::GenerationFailed(_))));
        assert_eq!(fx.log().len(), 1);
    }

    #[test]
    fn test_compile_failure() {
        let fx = Fixture::new(false);
        fx.tool("make", "exit 2");

        let invoker = fx.invoker().unwrap();
        assert_eq!(invoker.compile().unwrap().code(), Some(2));
        let err = invoker.build().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CompileFailed(2))));
    }

    #[test]
    fn test_missing_make() {
        let fx = Fixture::new(false);
        let err = fx.invoker().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingTool { tool }) if tool == "make"
        ));
    }

    #[test]
    fn test_missing_cmake_only_matters_for_cmake_trees() {
        let fx = Fixture::new(false);
        fx.tool("make", "exit 0");
        assert!(fx.invoker().is_ok());

        std::fs::write(fx.root.join("CMakeLists.txt"), "").unwrap();
        let err = fx.invoker().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingTool { tool }) if tool == "cmake"
        ));
    }

    #[test]
    fn test_clean_without_build_dir_is_noop() {
        let fx = Fixture::new(true);
        fx.tool("cmake", "exit 0").tool("make", "exit 0");
        fx.invoker().unwrap().clean().unwrap();
        assert!(fx.log().is_empty());
    }

    #[test]
    fn test_clean_swallows_missing_simple_clean_target() {
        let fx = Fixture::new(true);
        fx.tool("cmake", "exit 1")
            .tool("make", "[ \"$1\" = simple_clean ] && exit 2\nexit 0");
        std::fs::create_dir_all(fx.root.join("bin")).unwrap();

        fx.invoker().unwrap().clean().unwrap();
        let log = fx.log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1], "make clean --silent");
        assert_eq!(log[2], "make simple_clean --silent");
    }

    #[test]
    fn test_clean_reports_make_that_cannot_start() {
        let fx = Fixture::new(false);
        fx.tool("make", "exit 0");
        let invoker = fx.invoker().unwrap();
        std::fs::remove_file(fx.tools.join("make")).unwrap();

        let err = invoker.clean().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to execute"));
        assert!(err.downcast_ref::<Error>().is_none());
    }

    #[test]
    fn test_clean_reports_other_failures() {
        let fx = Fixture::new(false);
        fx.tool("make", "[ \"$1\" = simple_clean ] && exit 3\nexit 0");

        let err = fx.invoker().unwrap().clean().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CleanFailed { code: 3, .. })
        ));
    }
}
