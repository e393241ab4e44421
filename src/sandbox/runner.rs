//! Python sandbox runner
//!
//! Every run gets its own interpreter process and its own temporary working
//! directory, so nothing defined by one attempt is visible to the next. Stdout
//! is captured for the duration of the run; stderr is only used to describe a
//! fault. Runs are bounded by a wall-clock timeout, after which the process is
//! killed and the run reports `timeout`.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use tokio::process::Command;

/// Traceback frame pointing into the generated script
static SCRIPT_FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "[^"]*main\.py", line (\d+)"#).expect("frame regex is valid"));

/// File name the generated code is written to inside the run directory
const SCRIPT_NAME: &str = "main.py";

/// Fault text reported when a run exceeds its time budget
pub const TIMEOUT_FAULT: &str = "timeout";

/// Raw result of one sandboxed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// True when the code ran to completion
    pub success: bool,
    /// Captured stdout on success, a compact fault description otherwise
    pub captured: String,
}

impl RunReport {
    pub fn completed(captured: impl Into<String>) -> Self {
        Self {
            success: true,
            captured: captured.into(),
        }
    }

    pub fn fault(description: impl Into<String>) -> Self {
        Self {
            success: false,
            captured: description.into(),
        }
    }
}

/// Executes a code string and reports what happened
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str) -> RunReport;
}

/// Configuration for the Python sandbox
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter binary
    pub interpreter: String,
    /// Timeout in milliseconds (default: 60000)
    pub timeout_ms: u64,
    /// Captured stdout beyond this many bytes is cut off
    pub max_output_bytes: usize,
    /// Extra environment variables for the run
    pub env: Vec<(String, String)>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_ms: 60_000,
            max_output_bytes: 100_000,
            env: Vec::new(),
        }
    }
}

impl SandboxConfig {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            ..Default::default()
        }
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the captured output cap
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Runs generated Python in a fresh interpreter per call
#[derive(Debug, Clone, Default)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn execute(&self, code: &str) -> std::io::Result<Option<std::process::Output>> {
        let dir = tempfile::Builder::new().prefix("codemend-run-").tempdir()?;
        let script = dir.path().join(SCRIPT_NAME);
        tokio::fs::write(&script, code).await?;

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg("-B")
            .arg(&script)
            .current_dir(dir.path())
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .env("MPLBACKEND", "Agg");

        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let result = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => Some(output?),
            Err(_) => None,
        };

        // dir is dropped here, removing the script and anything the code wrote
        Ok(result)
    }
}

#[async_trait]
impl CodeRunner for PythonSandbox {
    async fn run(&self, code: &str) -> RunReport {
        match self.execute(code).await {
            Ok(Some(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let captured = truncate_output(&stdout, self.config.max_output_bytes);
                if output.status.success() {
                    debug!("Run completed with {} bytes of output", output.stdout.len());
                    RunReport::completed(captured)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let fault = summarize_fault(&stderr, output.status.code());
                    debug!("Run faulted: {}", fault);
                    RunReport::fault(fault)
                }
            }
            Ok(None) => {
                warn!("Run exceeded {}ms and was killed", self.config.timeout_ms);
                RunReport::fault(TIMEOUT_FAULT)
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.config.interpreter, e);
                RunReport::fault(format!("failed to start {}: {}", self.config.interpreter, e))
            }
        }
    }
}

/// Reduce a traceback to `ExceptionType: message (line N)`.
///
/// The exception line is the last non-blank stderr line. The line number comes
/// from the innermost frame inside the generated script, when there is one.
pub fn summarize_fault(stderr: &str, exit_code: Option<i32>) -> String {
    let last = stderr.lines().rev().map(str::trim).find(|l| !l.is_empty());

    let Some(message) = last else {
        return match exit_code {
            Some(code) => format!("process exited with code {}", code),
            None => "process terminated by signal".to_string(),
        };
    };

    let line = SCRIPT_FRAME_RE
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    match line {
        Some(line) => format!("{} (line {})", message, line),
        None => message.to_string(),
    }
}

/// Cut `text` to at most `max_bytes`, on a char boundary, noting the cut.
pub fn truncate_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n[truncated, {} bytes total]", &text[..end], text.len())
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
    fn test_sandbox_config_default() {
        let config = SandboxConfig::default();
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.max_output_bytes, 100_000);
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_sandbox_config_builder() {
        let config = SandboxConfig::new("python3.11")
            .timeout_ms(500)
            .max_output_bytes(64)
            .env("FOO", "bar");
        assert_eq!(config.interpreter, "python3.11");
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.max_output_bytes, 64);
        assert_eq!(config.env[0], ("FOO".to_string(), "bar".to_string()));
    }

    #[test]
    fn test_summarize_fault_traceback() {
        let stderr = "Traceback (most recent call last):\n  File \"/tmp/codemend-run-abc/main.py\", line 3, in <module>\n    print(1/0)\nZeroDivisionError: division by zero\n";
        assert_eq!(summarize_fault(stderr, Some(1)), "ZeroDivisionError: division by zero (line 3)");
    }

    #[test]
    fn test_summarize_fault_innermost_script_frame() {
        let stderr = "Traceback (most recent call last):\n  File \"/tmp/x/main.py\", line 9, in <module>\n    f()\n  File \"/tmp/x/main.py\", line 2, in f\n    raise ValueError('bad')\nValueError: bad\n";
        assert_eq!(summarize_fault(stderr, Some(1)), "ValueError: bad (line 2)");
    }

    #[test]
    fn test_summarize_fault_without_frame() {
        assert_eq!(summarize_fault("fatal: something\n\n", Some(2)), "fatal: something");
    }

    #[test]
    fn test_summarize_fault_empty_stderr() {
        assert_eq!(summarize_fault("", Some(3)), "process exited with code 3");
        assert_eq!(summarize_fault("  \n", None), "process terminated by signal");
    }

    #[test]
    fn test_truncate_output_short() {
        assert_eq!(truncate_output("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_output_long() {
        let text = "x".repeat(50);
        let truncated = truncate_output(&text, 10);
        assert!(truncated.starts_with("xxxxxxxxxx..."));
        assert!(truncated.contains("[truncated, 50 bytes total]"));
    }

    #[test]
    fn test_truncate_output_char_boundary() {
        // each Arabic letter is two bytes
        let text = "مرحبا";
        let truncated = truncate_output(text, 3);
        assert!(truncated.starts_with("م..."));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_fault() {
        let sandbox = PythonSandbox::new(SandboxConfig::new("no-such-python-xyz123"));
        let report = sandbox.run("print(1)").await;
        assert!(!report.success);
        assert!(report.captured.contains("failed to start"));
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let report = sandbox.run("print('hello from the sandbox')").await;
        assert!(report.success);
        assert_eq!(report.captured.trim(), "hello from the sandbox");
    }

    #[tokio::test]
    async fn test_run_empty_output() {
        if !python_available() {
            return;
        }
        let report = PythonSandbox::default().run("x = 1 + 1").await;
        assert!(report.success);
        assert!(report.captured.is_empty());
    }

    #[tokio::test]
    async fn test_run_crash_reports_exception() {
        if !python_available() {
            return;
        }
        let report = PythonSandbox::default().run("print('partial')\nprint(1/0)").await;
        assert!(!report.success);
        assert!(report.captured.starts_with("ZeroDivisionError"));
        assert!(report.captured.contains("line 2"));
        assert!(!report.captured.contains("Traceback"));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::new(SandboxConfig::default().timeout_ms(300));
        let report = sandbox.run("import time\ntime.sleep(10)").await;
        assert!(!report.success);
        assert_eq!(report.captured, TIMEOUT_FAULT);
    }

    #[tokio::test]
    async fn test_runs_do_not_share_namespace() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let first = sandbox.run("leaked = 42\nprint(leaked)").await;
        assert!(first.success);

        let second = sandbox.run("print(leaked)").await;
        assert!(!second.success);
        assert!(second.captured.contains("NameError"));
    }

    #[tokio::test]
    async fn test_runs_do_not_share_working_directory() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let first = sandbox.run("open('state.txt', 'w').write('x')").await;
        assert!(first.success);

        let second = sandbox.run("import os\nprint(os.path.exists('state.txt'))").await;
        assert_eq!(second.captured.trim(), "False");
    }

    #[tokio::test]
    async fn test_run_env_passthrough() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::new(SandboxConfig::default().env("CODEMEND_TEST_VAR", "hi"));
        let report = sandbox.run("import os\nprint(os.environ['CODEMEND_TEST_VAR'])").await;
        assert_eq!(report.captured.trim(), "hi");
    }
}
