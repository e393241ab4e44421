//! Package installer collaborator.
//!
//! The resolver only needs two answers from the outside world: "is this module
//! importable already?" and "did installing this requirement work?". `PipInstaller`
//! answers both by shelling out to the configured Python interpreter.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

/// Where an install request is allowed to write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallScope {
    /// `pip install --user`
    User,
    /// Plain `pip install` into the interpreter's environment
    Environment,
}

/// Trait for the OS-level package installer
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Whether `module` can already be imported
    async fn is_importable(&self, module: &str) -> bool;

    /// Install `requirement`; true on success
    async fn install(&self, requirement: &str, scope: InstallScope) -> bool;
}

/// Probe script: exit 0 when the module named in argv[1] is importable
const PROBE_SCRIPT: &str =
    "import importlib.util, sys\ntry:\n    found = importlib.util.find_spec(sys.argv[1]) is not None\nexcept Exception:\n    found = False\nsys.exit(0 if found else 1)";

/// Installer backed by `python -m pip`
#[derive(Debug, Clone)]
pub struct PipInstaller {
    interpreter: String,
    install_timeout: Duration,
    probe_timeout: Duration,
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            install_timeout: Duration::from_millis(300_000),
            probe_timeout: Duration::from_millis(15_000),
        }
    }
}

impl PipInstaller {
    /// Create an installer for the given interpreter
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            ..Default::default()
        }
    }

    /// Set the install timeout in milliseconds
    pub fn install_timeout_ms(mut self, ms: u64) -> Self {
        self.install_timeout = Duration::from_millis(ms);
        self
    }

    /// Set the probe timeout in milliseconds
    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.probe_timeout = Duration::from_millis(ms);
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn install_args(requirement: &str, scope: InstallScope) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "--quiet".to_string(),
            "--disable-pip-version-check".to_string(),
        ];
        if scope == InstallScope::User {
            args.push("--user".to_string());
        }
        args.push(requirement.to_string());
        args
    }

    /// Run the interpreter with `args`; true on zero exit within `timeout`.
    async fn run_status(&self, args: &[String], timeout: Duration) -> bool {
        let child = Command::new(&self.interpreter)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to start {}: {}", self.interpreter, e);
                return false;
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    debug!("{} {:?} exited with {:?}: {}", self.interpreter, args, output.status.code(), stderr.trim());
                }
                output.status.success()
            }
            Ok(Err(e)) => {
                warn!("Failed waiting on {}: {}", self.interpreter, e);
                false
            }
            Err(_) => {
                warn!("{} {:?} timed out after {}ms", self.interpreter, args, timeout.as_millis());
                false
            }
        }
    }
}

#[async_trait]
impl PackageInstaller for PipInstaller {
    async fn is_importable(&self, module: &str) -> bool {
        let args = vec!["-c".to_string(), PROBE_SCRIPT.to_string(), module.to_string()];
        self.run_status(&args, self.probe_timeout).await
    }

    async fn install(&self, requirement: &str, scope: InstallScope) -> bool {
        debug!("Installing {} ({:?})", requirement, scope);
        let args = Self::install_args(requirement, scope);
        self.run_status(&args, self.install_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_default_config() {
        let installer = PipInstaller::default();
        assert_eq!(installer.interpreter(), "python3");
        assert_eq!(installer.install_timeout, Duration::from_millis(300_000));
        assert_eq!(installer.probe_timeout, Duration::from_millis(15_000));
    }

    #[test]
    fn test_builder() {
        let installer = PipInstaller::new("python3.12").install_timeout_ms(1000).probe_timeout_ms(200);
        assert_eq!(installer.interpreter(), "python3.12");
        assert_eq!(installer.install_timeout, Duration::from_millis(1000));
        assert_eq!(installer.probe_timeout, Duration::from_millis(200));
    }

    #[test]
    fn test_install_args_user_scope() {
        let args = PipInstaller::install_args("pandas>=2.0", InstallScope::User);
        assert_eq!(args[..3], ["-m", "pip", "install"]);
        assert!(args.contains(&"--user".to_string()));
        assert_eq!(args.last().unwrap(), "pandas>=2.0");
    }

    #[test]
    fn test_install_args_environment_scope() {
        let args = PipInstaller::install_args("pandas", InstallScope::Environment);
        assert!(!args.contains(&"--user".to_string()));
        assert_eq!(args.last().unwrap(), "pandas");
    }

    #[tokio::test]
    async fn test_missing_interpreter_reports_failure() {
        let installer = PipInstaller::new("definitely-not-a-python-xyz123");
        assert!(!installer.is_importable("os").await);
        assert!(!installer.install("requests", InstallScope::User).await);
    }

    #[tokio::test]
    async fn test_probe_stdlib_module() {
        if !python_available() {
            return;
        }
        let installer = PipInstaller::default();
        assert!(installer.is_importable("json").await);
        assert!(!installer.is_importable("no_such_module_xyz123").await);
    }
}
