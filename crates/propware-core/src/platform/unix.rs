//! Linux and macOS

use super::{EnvScope, OperatingSystem, Persisted, Platform};
use crate::environment::{append_line_once, ShellProfile};
use crate::process;
use crate::prompt::Prompter;
use crate::runtime::{PinnedArchive, Probe};
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::process::Command;

const ETC_ENVIRONMENT: &str = "/etc/environment";

#[derive(Debug, Clone)]
pub struct Unix {
    os: OperatingSystem,
    /// Login shell, from `$SHELL`
    shell: Option<String>,
    home: PathBuf,
    etc_environment: PathBuf,
    /// Where `sudo`, `id` and the package tools are looked up
    tool_dirs: Vec<PathBuf>,
    arch: &'static str,
}

impl Unix {
    pub fn linux() -> Self {
        Self::new(OperatingSystem::Linux)
    }

    pub fn mac() -> Self {
        Self::new(OperatingSystem::Mac)
    }

    fn new(os: OperatingSystem) -> Self {
        Self {
            os,
            shell: std::env::var("SHELL").ok(),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("~")),
            etc_environment: PathBuf::from(ETC_ENVIRONMENT),
            tool_dirs: std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default(),
            arch: std::env::consts::ARCH,
        }
    }

    /// Same platform, with explicit shell/home/system-environment locations
    pub fn with_paths(
        mut self,
        shell: Option<String>,
        home: PathBuf,
        etc_environment: PathBuf,
    ) -> Self {
        self.shell = shell;
        self.home = home;
        self.etc_environment = etc_environment;
        self
    }

    fn profile(&self) -> Option<ShellProfile> {
        ShellProfile::for_shell(self.shell.as_deref()?, &self.home)
    }

    fn persist_user(&self, key: &str, value: &str) -> Result<Persisted> {
        match self.profile() {
            Some(profile) => {
                let location = profile.path().display().to_string();
                if profile.ensure_export(key, value)? {
                    Ok(Persisted::Written(location))
                } else {
                    Ok(Persisted::AlreadyPresent(location))
                }
            }
            None if key == "PATH" => Ok(Persisted::Instruction(format!(
                "Unknown shell is used. It is recommended that you add {} to your PATH.",
                value
            ))),
            None => Ok(Persisted::Instruction(format!(
                "Unknown shell is used. It is recommended that you add {}={} to your environment.",
                key, value
            ))),
        }
    }

    fn tool(&self, name: &str) -> Option<PathBuf> {
        Probe::new(self.tool_dirs.clone(), "").which(name)
    }

    /// Debian and derivatives, recognised by their package tools
    fn is_debian(&self) -> bool {
        self.os == OperatingSystem::Linux
            && self.tool("apt-get").is_some()
            && self.tool("dpkg-query").is_some()
    }

    /// Run `sudo <args>`, warning instead of failing on a non-zero exit
    fn sudo(&self, args: &[&str]) -> Result<bool> {
        let Some(sudo) = self.tool("sudo") else {
            eprintln!(
                "{} `sudo` is not available; please run \"{}\" as root",
                "Warning:".yellow(),
                args.join(" ")
            );
            return Ok(false);
        };
        let status = process::run(Command::new(sudo).args(args))?;
        if !status.success() {
            eprintln!("{} \"sudo {}\" failed", "Warning:".yellow(), args.join(" "));
        }
        Ok(status.success())
    }

    /// PropGCC is a 32-bit build, so 64-bit Debian needs the i386 C library
    fn check_i386_libc(&self, prompter: &mut dyn Prompter) -> Result<()> {
        if self.arch != "x86_64" || !self.is_debian() {
            return Ok(());
        }
        let Some(dpkg_query) = self.tool("dpkg-query") else {
            return Ok(());
        };

        // dpkg-query exits non-zero when some patterns match nothing
        let listing = process::capture(Command::new(dpkg_query).args(["-l", "libc6*"]))?;
        if has_i386_libc(&String::from_utf8_lossy(&listing.stdout)) {
            return Ok(());
        }

        let install = prompter.confirm(
            "PropGCC needs the 32-bit C library (libc6:i386). Root privileges are required. \
             Should it be installed?",
            true,
        )?;
        if install && self.sudo(&["dpkg", "--add-architecture", "i386"])? {
            self.sudo(&["apt-get", "update"])?;
            self.sudo(&["apt-get", "install", "-y", "libc6:i386"])?;
        }
        Ok(())
    }

    fn check_dialout(&self, prompter: &mut dyn Prompter) -> Result<()> {
        let user = match std::env::var("USER") {
            Ok(user) => user,
            Err(_) => return Ok(()),
        };
        let Some(id) = self.tool("id") else {
            return Ok(());
        };

        let groups = process::capture(Command::new(id).arg("-nG"))?;
        if in_group(&String::from_utf8_lossy(&groups.stdout), "dialout") {
            return Ok(());
        }

        let add = prompter.confirm(
            "Your user must be added to the \"dialout\" group in order to program a Propeller \
             chip. Root privileges are required. Should your user be added?",
            true,
        )?;
        if add && !self.sudo(&["usermod", "-a", "-G", "dialout", user.as_str()])? {
            eprintln!(
                "{} Failed to add {} to the dialout group",
                "Warning:".yellow(),
                user
            );
        }
        Ok(())
    }

    fn persist_root(&self, key: &str, value: &str) -> Result<Persisted> {
        match self.os {
            // /etc/environment has no expansion, so PATH can't be prepended there
            OperatingSystem::Linux if key != "PATH" => {
                let location = self.etc_environment.display().to_string();
                match append_line_once(&self.etc_environment, &format!("{}={}", key, value)) {
                    Ok(true) => Ok(Persisted::Written(location)),
                    Ok(false) => Ok(Persisted::AlreadyPresent(location)),
                    Err(e) if is_permission_denied(&e) => Ok(Persisted::Instruction(format!(
                        "{} is not writable by this user. Please add {}={} to it with root \
                         privileges, or re-run the installer with sudo.",
                        location, key, value
                    ))),
                    Err(e) => Err(e),
                }
            }
            _ => Ok(Persisted::Instruction(format!(
                "Root environment variables cannot be configured automatically on {}. \
                 Please add {}={} to your system environment.",
                self.os, key, value
            ))),
        }
    }
}

impl Platform for Unix {
    fn os(&self) -> OperatingSystem {
        self.os.clone()
    }

    fn cmake_archive(&self) -> PinnedArchive {
        match self.os {
            OperatingSystem::Mac => PinnedArchive::new(
                "http://www.cmake.org/files/v3.0/cmake-3.0.1-Darwin-universal.tar.gz",
                "cmake-3.0.1-Darwin64-universal",
            ),
            _ => PinnedArchive::new(
                "http://www.cmake.org/files/v3.0/cmake-3.0.1-Linux-i386.tar.gz",
                "cmake-3.0.1-Linux-i386",
            ),
        }
    }

    fn propgcc_archive(&self) -> PinnedArchive {
        match self.os {
            OperatingSystem::Mac => PinnedArchive::new(
                "http://david.zemon.name/downloads/PropGCC-osx_10.6.8_v1_0_0.tar.gz",
                "propgcc",
            ),
            _ => PinnedArchive::new(
                "http://david.zemon.name/downloads/PropGCC-linux_v1_0_0.tar.gz",
                "propgcc",
            ),
        }
    }

    fn default_toolchain_roots(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/opt/parallax")]
    }

    fn default_env_scope(&self) -> EnvScope {
        match self.os {
            OperatingSystem::Linux => EnvScope::Root,
            _ => EnvScope::User,
        }
    }

    fn persist_var(&self, key: &str, value: &str, scope: EnvScope) -> Result<Persisted> {
        match scope {
            EnvScope::Root => self.persist_root(key, value),
            EnvScope::User => self.persist_user(key, value),
            EnvScope::Manual => Ok(Persisted::Instruction(format!(
                "Please set {} to \"{}\"",
                key, value
            ))),
        }
    }

    fn missing_make_instructions(&self) -> Option<&'static str> {
        match self.os {
            OperatingSystem::Mac => Some(
                "Make was not detected on your system. Install the Xcode command line tools \
                 by executing \"xcode-select --install\".",
            ),
            _ => Some(
                "Make was not detected on your system. You can install it by executing \
                 \"sudo apt-get install make\".",
            ),
        }
    }

    fn install_make(&self, prompter: &mut dyn Prompter) -> Result<bool> {
        if !self.is_debian() {
            return Ok(false);
        }
        let install = prompter.confirm(
            "Make was not detected. Install it with \"sudo apt-get install make\"?",
            true,
        )?;
        if !install {
            return Ok(false);
        }
        self.sudo(&["apt-get", "install", "-y", "make"])
    }

    fn post_install_checks(&self, prompter: &mut dyn Prompter) -> Result<()> {
        if self.os != OperatingSystem::Linux {
            return Ok(());
        }
        self.check_i386_libc(prompter)?;
        self.check_dialout(prompter)
    }
}

/// Whether a `dpkg-query -l` listing has an installed 32-bit libc6
fn has_i386_libc(listing: &str) -> bool {
    listing
        .lines()
        .filter(|line| line.starts_with("ii"))
        .any(|line| line.contains("libc6:i386") || line.contains("libc6-i386"))
}

fn is_permission_denied(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
}

fn in_group(id_output: &str, group: &str) -> bool {
    id_output.split_whitespace().any(|g| g == group)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn unix_in(dir: &std::path::Path, shell: Option<&str>) -> Unix {
        Unix::linux().with_paths(
            shell.map(str::to_string),
            dir.to_path_buf(),
            dir.join("environment"),
        )
    }

    #[test]
    fn test_user_scope_writes_bashrc_once() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".bashrc"), "# existing\n").unwrap();
        let platform = unix_in(tmp.path(), Some("/bin/bash"));

        let first = platform
            .persist_var("PROPGCC_PREFIX", "/opt/parallax", EnvScope::User)
            .unwrap();
        assert!(matches!(first, Persisted::Written(_)));

        let second = platform
            .persist_var("PROPGCC_PREFIX", "/opt/parallax", EnvScope::User)
            .unwrap();
        assert!(matches!(second, Persisted::AlreadyPresent(_)));

        let content = std::fs::read_to_string(tmp.path().join(".bashrc")).unwrap();
        assert_eq!(content.matches("export PROPGCC_PREFIX").count(), 1);
    }

    #[test]
    fn test_unknown_shell_gives_instruction() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = unix_in(tmp.path(), Some("/usr/bin/fish"));

        let result = platform.persist_var("PATH", "/opt/cmake/bin", EnvScope::User).unwrap();
        match result {
            Persisted::Instruction(msg) => assert!(msg.contains("/opt/cmake/bin")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_bashrc_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = unix_in(tmp.path(), Some("/bin/bash"));
        assert!(platform
            .persist_var("PROPWARE_PATH", "/src/PropWare", EnvScope::User)
            .is_err());
    }

    #[test]
    fn test_root_scope_on_linux_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = unix_in(tmp.path(), None);

        platform.persist_var("PROPWARE_PATH", "/src/PropWare", EnvScope::Root).unwrap();
        platform.persist_var("PROPWARE_PATH", "/src/PropWare", EnvScope::Root).unwrap();

        let content = std::fs::read_to_string(tmp.path().join("environment")).unwrap();
        assert_eq!(content, "PROPWARE_PATH=/src/PropWare\n");
    }

    #[test]
    fn test_unwritable_etc_environment_gives_instruction() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let env = tmp.path().join("environment");
        std::fs::write(&env, "PATH=/usr/bin\n").unwrap();
        std::fs::set_permissions(&env, std::fs::Permissions::from_mode(0o444)).unwrap();
        if std::fs::OpenOptions::new().append(true).open(&env).is_ok() {
            // Running as root; permissions are not enforced
            return;
        }

        let platform = unix_in(tmp.path(), None);
        let result = platform
            .persist_var("PROPGCC_PREFIX", "/opt/parallax", EnvScope::Root)
            .unwrap();
        match result {
            Persisted::Instruction(msg) => {
                assert!(msg.contains("PROPGCC_PREFIX=/opt/parallax"));
                assert!(msg.contains(&env.display().to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&env).unwrap(), "PATH=/usr/bin\n");
    }

    #[test]
    fn test_root_scope_on_mac_is_instruction() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = Unix::mac().with_paths(None, tmp.path().into(), tmp.path().join("env"));
        let result = platform.persist_var("PROPWARE_PATH", "/x", EnvScope::Root).unwrap();
        assert!(matches!(result, Persisted::Instruction(_)));
        assert!(!tmp.path().join("env").exists());
    }

    /// Answers every confirmation with `answer` and counts the questions
    struct Confirm {
        answer: bool,
        asked: usize,
    }

    impl Prompter for Confirm {
        fn install_parent(&mut self, tool: &str, _: &std::path::Path) -> Result<PathBuf> {
            panic!("unexpected install prompt for {}", tool)
        }
        fn confirm(&mut self, _: &str, _: bool) -> Result<bool> {
            self.asked += 1;
            Ok(self.answer)
        }
        fn env_scope(&mut self, default: EnvScope) -> Result<EnvScope> {
            Ok(default)
        }
    }

    fn fake_tool(dir: &std::path::Path, name: &str, log: &std::path::Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
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

    /// A 64-bit Debian box whose package tools live in `<dir>/bin`
    fn debian_in(dir: &std::path::Path, libc_listing: &str) -> (Unix, PathBuf) {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let log = dir.join("calls.log");
        fake_tool(&bin, "apt-get", &log, "");
        fake_tool(&bin, "sudo", &log, "");
        fake_tool(&bin, "dpkg-query", &log, &format!("printf '{}'", libc_listing));

        let mut platform = unix_in(dir, None);
        platform.tool_dirs = vec![bin];
        platform.arch = "x86_64";
        (platform, log)
    }

    fn calls(log: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_install_make_on_debian_runs_apt_get() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, log) = debian_in(tmp.path(), "");
        let mut prompter = Confirm { answer: true, asked: 0 };

        assert!(platform.install_make(&mut prompter).unwrap());
        assert_eq!(prompter.asked, 1);
        assert!(calls(&log).contains(&"sudo apt-get install -y make".to_string()));
    }

    #[test]
    fn test_install_make_declined_runs_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, log) = debian_in(tmp.path(), "");
        let mut prompter = Confirm { answer: false, asked: 0 };

        assert!(!platform.install_make(&mut prompter).unwrap());
        assert!(calls(&log).is_empty());
    }

    #[test]
    fn test_install_make_without_apt_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut platform = unix_in(tmp.path(), None);
        platform.tool_dirs = vec![];
        let mut prompter = Confirm { answer: true, asked: 0 };

        assert!(!platform.install_make(&mut prompter).unwrap());
        assert_eq!(prompter.asked, 0);
    }

    #[test]
    fn test_missing_i386_libc_is_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, log) =
            debian_in(tmp.path(), "ii  libc6:amd64  2.36-9  amd64  GNU C Library\\n");
        let mut prompter = Confirm { answer: true, asked: 0 };

        platform.post_install_checks(&mut prompter).unwrap();
        let calls = calls(&log);
        assert!(calls.contains(&"sudo dpkg --add-architecture i386".to_string()));
        assert!(calls.contains(&"sudo apt-get install -y libc6:i386".to_string()));
    }

    #[test]
    fn test_installed_i386_libc_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, log) =
            debian_in(tmp.path(), "ii  libc6:i386  2.36-9  i386  GNU C Library\\n");
        let mut prompter = Confirm { answer: true, asked: 0 };

        platform.post_install_checks(&mut prompter).unwrap();
        assert_eq!(prompter.asked, 0);
        assert!(calls(&log).iter().all(|c| !c.starts_with("sudo")));
    }

    #[test]
    fn test_i386_libc_check_skipped_off_x86_64() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut platform, log) = debian_in(tmp.path(), "");
        platform.arch = "aarch64";
        let mut prompter = Confirm { answer: true, asked: 0 };

        platform.post_install_checks(&mut prompter).unwrap();
        assert_eq!(prompter.asked, 0);
        assert!(calls(&log).is_empty());
    }

    #[test]
    fn test_has_i386_libc() {
        assert!(has_i386_libc("ii  libc6:i386  2.36\n"));
        assert!(has_i386_libc("ii  libc6-i386  2.36\n"));
        assert!(!has_i386_libc("un  libc6:i386  <none>\nii  libc6:amd64 2.36\n"));
    }

    #[test]
    fn test_in_group() {
        assert!(in_group("david adm dialout sudo\n", "dialout"));
        assert!(!in_group("david adm dialoutx", "dialout"));
    }
}
