//! Running the administrative CLI.
//!
//! - [`Invocation`] - Program, arguments and environment for one run
//! - [`CommandRunner`] - Trait for anything that can execute an [`Invocation`]
//! - [`ProcessRunner`] - Spawns a real child process
//!
//! Runners report failures as plain text ([`RunFailure`]) because the admin
//! CLI has no structured error channel; classification happens in
//! [`retry`](crate::retry).

use std::fmt;
use std::process::Command;
use tracing::{debug, info};

use crate::model::AdminToken;

/// Environment variable the keystone CLI reads the service token from.
pub const DEFAULT_TOKEN_ENV: &str = "OS_SERVICE_TOKEN";

/// Default admin CLI executable.
pub const DEFAULT_PROGRAM: &str = "keystone";

/// One command line to run.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to run.
    pub program: String,
    /// Arguments, including the leading `--endpoint <url>` pair.
    pub args: Vec<String>,
    /// Secret environment variables, such as the service token.
    pub env: Vec<(String, AdminToken)>,
}

impl Invocation {
    /// Render the command line for logs. Environment values are not shown.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field(
                "env",
                &self.env.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A failed run, described by its textual output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    /// Exit status, if the process ran at all.
    pub status: Option<i32>,
    /// Error text used for classification.
    pub message: String,
}

impl RunFailure {
    /// Create a failure with no exit status.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Attach an exit status.
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "{} (exit status {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Executes invocations and returns their standard output.
///
/// - In production this is a [`ProcessRunner`].
/// - Under test, a scripted runner can replay canned outputs and failures.
pub trait CommandRunner: Send + Sync {
    /// Run to completion, returning stdout on success.
    fn run(&self, invocation: &Invocation) -> Result<String, RunFailure>;
}

/// Runs invocations as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, RunFailure> {
        info!("running admin command: {}", invocation.display_command());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        for (key, value) in &invocation.env {
            command.env(key, value.expose());
        }

        let output = command.output().map_err(|e| {
            RunFailure::new(format!(
                "failed to execute {}: {}",
                invocation.program, e
            ))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            debug!("admin command succeeded ({} bytes of output)", stdout.len());
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        let failure = RunFailure::new(message);
        Err(match output.status.code() {
            Some(code) => failure.with_status(code),
            None => failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> Invocation {
        Invocation {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: vec![(DEFAULT_TOKEN_ENV.to_string(), AdminToken::new("secret"))],
        }
    }

    #[test]
    fn test_display_command_omits_env() {
        let inv = invocation("keystone", &["--endpoint", "http://127.0.0.1:35357/v2.0/", "user-list"]);
        assert_eq!(
            inv.display_command(),
            "keystone --endpoint http://127.0.0.1:35357/v2.0/ user-list"
        );
        let debug = format!("{:?}", inv);
        assert!(debug.contains("OS_SERVICE_TOKEN"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_run_failure_display() {
        let failure = RunFailure::new("boom").with_status(2);
        assert_eq!(failure.to_string(), "boom (exit status 2)");
        assert_eq!(RunFailure::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_missing_program_is_a_failure() {
        let result = ProcessRunner::new().run(&invocation("ksadmin-no-such-program-xyz", &[]));
        let failure = result.unwrap_err();
        assert!(failure.message.contains("failed to execute"));
        assert_eq!(failure.status, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_passes_token_env() {
        let result = ProcessRunner::new()
            .run(&invocation("sh", &["-c", "printf '%s' \"$OS_SERVICE_TOKEN\""]))
            .unwrap();
        assert_eq!(result, "secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_reports_stderr() {
        let failure = ProcessRunner::new()
            .run(&invocation("sh", &["-c", "echo 'Unable to connect' >&2; exit 3"]))
            .unwrap_err();
        assert_eq!(failure.message, "Unable to connect");
        assert_eq!(failure.status, Some(3));
    }
}
