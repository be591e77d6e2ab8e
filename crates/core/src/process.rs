//! External command execution
//!
//! Platform and data-plane operations are blocking invocations of external
//! programs. [`CommandRunner`] is the seam: [`SystemRunner`] spawns real
//! processes on the blocking thread pool, [`mock::MockRunner`] records calls
//! and replays canned output.
//!
//! A non-zero exit status is always an error. Command lines are redacted
//! through the global secret registry before they are logged or stored in an
//! error.

use crate::errors::{ProcessError, Result};
use crate::redaction::redact;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, instrument};

/// Program, arguments and working directory of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Split a configured command line such as `node cli/surfer.js` into
    /// program and leading arguments
    pub fn parse(command_line: &str) -> Result<Self> {
        let words = shell_words::split(command_line).map_err(|e| {
            ProcessError::InvalidCommandLine {
                command: command_line.to_string(),
                message: e.to_string(),
            }
        })?;
        let mut words = words.into_iter();
        let program = words.next().ok_or_else(|| ProcessError::InvalidCommandLine {
            command: command_line.to_string(),
            message: "command line is empty".to_string(),
        })?;
        Ok(Self {
            program,
            args: words.collect(),
            cwd: None,
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.cwd = dir.map(Path::to_path_buf);
        self
    }

    /// Full command line, shell-quoted, not redacted
    pub fn command_line(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Redacted command line
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", redact(&self.command_line()))
    }
}

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands to completion
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command; a non-zero exit yields [`ProcessError::Failed`]
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runner spawning real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(command = %spec))]
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || {
            let mut command = Command::new(&spec.program);
            command.args(&spec.args);
            if let Some(cwd) = &spec.cwd {
                command.current_dir(cwd);
            }

            let output = command.output().map_err(|e| ProcessError::Spawn {
                command: spec.to_string(),
                message: e.to_string(),
            })?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            debug!("stdout: {}", redact(stdout.trim_end()));
            if !stderr.trim().is_empty() {
                debug!("stderr: {}", redact(stderr.trim_end()));
            }

            if !output.status.success() {
                return Err(ProcessError::Failed {
                    command: spec.to_string(),
                    code: output.status.code(),
                    stderr: redact(stderr.trim()),
                }
                .into());
            }
            Ok(CommandOutput { stdout, stderr })
        })
        .await
        .map_err(|e| ProcessError::Join(e.to_string()))?
    }
}

pub mod mock {
    //! Recording command runner with canned responses
    //!
    //! Responses are keyed by the argument list joined with single spaces
    //! (the program name is not part of the key). Unmatched commands succeed
    //! with empty output.

    use super::{CommandOutput, CommandRunner, CommandSpec};
    use crate::errors::{ProcessError, Result};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Canned result for one command
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        Success(String),
        Failure { code: i32, stderr: String },
    }

    #[derive(Debug, Clone, Default)]
    pub struct MockRunner {
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        history: Arc<Mutex<Vec<CommandSpec>>>,
    }

    impl MockRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to `args` with `stdout`
        pub fn with_stdout(self, args: &str, stdout: &str) -> Self {
            self.set_response(args, MockResponse::Success(stdout.to_string()));
            self
        }

        /// Fail `args` with the given exit code
        pub fn with_failure(self, args: &str, code: i32, stderr: &str) -> Self {
            self.set_response(
                args,
                MockResponse::Failure {
                    code,
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        pub fn set_response(&self, args: &str, response: MockResponse) {
            self.responses
                .lock()
                .unwrap()
                .insert(args.to_string(), response);
        }

        /// Commands run so far, oldest first
        pub fn history(&self) -> Vec<CommandSpec> {
            self.history.lock().unwrap().clone()
        }

        /// Argument lists run so far, joined with spaces
        pub fn invocations(&self) -> Vec<String> {
            self.history()
                .iter()
                .map(|spec| spec.args.join(" "))
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for MockRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.history.lock().unwrap().push(spec.clone());
            let key = spec.args.join(" ");
            let response = self.responses.lock().unwrap().get(&key).cloned();
            match response {
                Some(MockResponse::Failure { code, stderr }) => Err(ProcessError::Failed {
                    command: spec.to_string(),
                    code: Some(code),
                    stderr,
                }
                .into()),
                Some(MockResponse::Success(stdout)) => Ok(CommandOutput {
                    stdout,
                    stderr: String::new(),
                }),
                None => Ok(CommandOutput::default()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockRunner;
    use super::*;
    use crate::errors::LifelineError;
    use crate::redaction::add_global_secret;

    #[test]
    fn test_parse_splits_words() {
        let spec = CommandSpec::parse("node 'cli/my surfer.js'").unwrap();
        assert_eq!(spec.program, "node");
        assert_eq!(spec.args, vec!["cli/my surfer.js"]);
    }

    #[test]
    fn test_parse_rejects_empty_and_unbalanced() {
        assert!(matches!(
            CommandSpec::parse("   "),
            Err(LifelineError::Process(ProcessError::InvalidCommandLine { .. }))
        ));
        assert!(CommandSpec::parse("surfer 'oops").is_err());
    }

    #[test]
    fn test_display_redacts_secrets() {
        add_global_secret("process-test-pw-8812");
        let spec = CommandSpec::new("surfer")
            .arg("login")
            .args(["--password", "process-test-pw-8812"]);
        assert_eq!(spec.to_string(), "surfer login --password ****");
        assert!(spec.command_line().contains("process-test-pw-8812"));
    }

    #[tokio::test]
    async fn test_mock_runner_replays_and_records() {
        let runner = MockRunner::new()
            .with_stdout("inspect", "{\"apps\":[]}")
            .with_failure("uninstall --app x", 1, "no such app");

        let out = runner
            .run(&CommandSpec::new("cloudron").arg("inspect"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "{\"apps\":[]}");

        let err = runner
            .run(&CommandSpec::new("cloudron").args(["uninstall", "--app", "x"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such app"));
        assert_eq!(runner.invocations(), vec!["inspect", "uninstall --app x"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hello"]);
        let out = SystemRunner.run(&spec).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_nonzero_exit_is_error() {
        let spec = CommandSpec::new("sh").args(["-c", "echo broken >&2; exit 3"]);
        let err = SystemRunner.run(&spec).await.unwrap_err();
        match err {
            LifelineError::Process(ProcessError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_system_runner_spawn_failure() {
        let spec = CommandSpec::new("lifeline-no-such-program-4711");
        let err = SystemRunner.run(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            LifelineError::Process(ProcessError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_honours_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let spec = CommandSpec::new("ls").current_dir(Some(dir.path()));
        let out = SystemRunner.run(&spec).await.unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }
}
