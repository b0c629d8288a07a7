//! Authenticated, retrying admin command execution.
//!
//! [`AdminInvoker`] ties the pieces together:
//!
//! 1. resolve the endpoint and token through an [`AdminContext`]
//! 2. run `<program> --endpoint <url> <args...>` through a [`CommandRunner`]
//! 3. on failure, classify the message with the [`RetryPolicy`] and either
//!    sleep and run the identical invocation again, or give up
//! 4. on success, strip warnings with a [`WarningFilter`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ksadmin_core::{AdminContext, AdminInvoker, IniFile};
//!
//! let context = Arc::new(AdminContext::new(IniFile::default()));
//! let invoker = AdminInvoker::new(context);
//! let users = invoker.run_admin_command(&["user-list".to_string()])?;
//! println!("{}", users);
//! # Ok::<(), ksadmin_core::KsAdminError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::AdminContext;
use crate::error::KsAdminError;
use crate::exec::{
    CommandRunner, DEFAULT_PROGRAM, DEFAULT_TOKEN_ENV, Invocation, ProcessRunner, RunFailure,
};
use crate::retry::{Backoff, BackoffError, RetryPolicy, Sleeper, ThreadSleeper};
use crate::sanitize::WarningFilter;

/// Flag the admin CLI takes the endpoint URL with.
pub const ENDPOINT_FLAG: &str = "--endpoint";

/// Error type for admin command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command failed with an unrecognized (fatal) message.
    #[error("admin command `{command}` failed: {failure}")]
    Failed { command: String, failure: RunFailure },

    /// The service kept reporting it was not ready until the retry budget ran
    /// out.
    #[error(
        "admin command `{command}` still failing after {attempts} attempts over {elapsed:?}: {last_failure}"
    )]
    RetriesExhausted {
        command: String,
        attempts: u32,
        elapsed: Duration,
        last_failure: RunFailure,
    },
}

/// Runs admin commands against the identity service.
pub struct AdminInvoker {
    context: Arc<AdminContext>,
    runner: Box<dyn CommandRunner>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
    filter: WarningFilter,
    program: String,
    token_env: String,
}

impl AdminInvoker {
    /// Create an invoker running the `keystone` executable with the default
    /// retry policy.
    pub fn new(context: Arc<AdminContext>) -> Self {
        Self {
            context,
            runner: Box::new(ProcessRunner::new()),
            sleeper: Box::new(ThreadSleeper),
            policy: RetryPolicy::default(),
            filter: WarningFilter::default(),
            program: DEFAULT_PROGRAM.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }

    /// Use a different command runner.
    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Use a different sleeper.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Use a different retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run a different executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Export the token under a different environment variable.
    pub fn with_token_env(mut self, token_env: impl Into<String>) -> Self {
        self.token_env = token_env.into();
        self
    }

    /// Run one admin command and return its output with warnings removed.
    ///
    /// Configuration errors propagate unchanged. Transient failures are
    /// retried within the policy's bounds; fatal failures are returned on the
    /// first occurrence.
    pub fn run_admin_command(&self, args: &[String]) -> Result<String, KsAdminError> {
        let invocation = self.build_invocation(args)?;
        let output = self.run_with_retries(&invocation)?;
        Ok(self.filter.apply(&output))
    }

    /// Build the invocation for `args` using the resolved endpoint and token.
    pub fn build_invocation(&self, args: &[String]) -> Result<Invocation, KsAdminError> {
        let endpoint = self.context.admin_endpoint()?;
        let token = self.context.admin_token()?;

        let mut full_args = Vec::with_capacity(args.len() + 2);
        full_args.push(ENDPOINT_FLAG.to_string());
        full_args.push(endpoint.to_string());
        full_args.extend(args.iter().cloned());

        Ok(Invocation {
            program: self.program.clone(),
            args: full_args,
            env: vec![(self.token_env.clone(), token)],
        })
    }

    /// Run `invocation` until it succeeds, fails fatally or exhausts the
    /// retry budget. Returns the raw output.
    pub fn run_with_retries(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let mut backoff = self.policy.schedule();

        loop {
            let failure = match self
                .runner
                .run(invocation)
                .map_err(|failure| self.policy.signatures.triage(failure))
            {
                Ok(output) => {
                    debug!(attempts = backoff.attempts(), "admin command succeeded");
                    return Ok(output);
                }
                Err(BackoffError::Permanent(failure)) => {
                    return Err(CommandError::Failed {
                        command: invocation.display_command(),
                        failure,
                    });
                }
                Err(BackoffError::Transient { err, .. }) => err,
            };

            let attempts = backoff.attempts();
            let Some(delay) = backoff.next_backoff() else {
                return Err(CommandError::RetriesExhausted {
                    command: invocation.display_command(),
                    attempts,
                    elapsed: backoff.elapsed(),
                    last_failure: failure,
                });
            };

            warn!(
                attempts,
                backoff = ?delay,
                "identity service not ready ({}), retrying",
                failure
            );
            self.sleeper.sleep(delay);
        }
    }
}

impl std::fmt::Debug for AdminInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminInvoker")
            .field("context", &self.context)
            .field("policy", &self.policy)
            .field("program", &self.program)
            .field("token_env", &self.token_env)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ConfigSource, ParsedConfig};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::path::Path;

    struct FixedSource(ParsedConfig);

    impl ConfigSource for FixedSource {
        fn path(&self) -> &Path {
            Path::new("/etc/keystone/keystone.conf")
        }

        fn read(&self) -> Result<ParsedConfig, ConfigError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Clone, Default)]
    struct Script {
        responses: Arc<Mutex<VecDeque<Result<String, RunFailure>>>>,
        calls: Arc<Mutex<Vec<Invocation>>>,
    }

    impl CommandRunner for Script {
        fn run(&self, invocation: &Invocation) -> Result<String, RunFailure> {
            self.calls.lock().push(invocation.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[derive(Clone, Default)]
    struct Naps(Arc<Mutex<Vec<Duration>>>);

    impl Sleeper for Naps {
        fn sleep(&self, duration: Duration) {
            self.0.lock().push(duration);
        }
    }

    fn invoker(responses: Vec<Result<String, RunFailure>>) -> (AdminInvoker, Script, Naps) {
        let context = Arc::new(AdminContext::new(FixedSource(
            ParsedConfig::new().with_value("DEFAULT", "admin_token", "foo"),
        )));
        let script = Script::default();
        script.responses.lock().extend(responses);
        let naps = Naps::default();
        let invoker = AdminInvoker::new(context)
            .with_runner(script.clone())
            .with_sleeper(naps.clone());
        (invoker, script, naps)
    }

    #[test]
    fn test_invocation_shape() {
        let (invoker, _, _) = invoker(vec![]);
        let inv = invoker.build_invocation(&["user-list".to_string()]).unwrap();

        assert_eq!(inv.program, "keystone");
        assert_eq!(
            inv.args,
            vec!["--endpoint", "http://127.0.0.1:35357/v2.0/", "user-list"]
        );
        assert_eq!(inv.env.len(), 1);
        assert_eq!(inv.env[0].0, "OS_SERVICE_TOKEN");
        assert_eq!(inv.env[0].1.expose(), "foo");
    }

    #[test]
    fn test_custom_program_and_token_env() {
        let (invoker, _, _) = invoker(vec![]);
        let invoker = invoker
            .with_program("/usr/bin/keystone")
            .with_token_env("SERVICE_TOKEN");
        let inv = invoker.build_invocation(&[]).unwrap();

        assert_eq!(inv.program, "/usr/bin/keystone");
        assert_eq!(inv.env[0].0, "SERVICE_TOKEN");
    }

    #[test]
    fn test_fatal_failure_not_retried() {
        let (invoker, script, naps) =
            invoker(vec![Err(RunFailure::new("No tenant with a name or ID of 'x'"))]);

        let err = invoker
            .run_admin_command(&["tenant-get".to_string(), "x".to_string()])
            .unwrap_err();

        assert!(matches!(
            err,
            KsAdminError::Command(CommandError::Failed { .. })
        ));
        assert!(err.to_string().contains("No tenant with a name or ID of 'x'"));
        assert_eq!(script.calls.lock().len(), 1);
        assert!(naps.0.lock().is_empty());
    }

    #[test]
    fn test_retries_exhausted() {
        let refused = || Err(RunFailure::new("[Errno 111] Connection refused"));
        let (invoker, script, naps) = invoker(vec![refused(), refused(), refused(), refused()]);
        let invoker = invoker.with_policy(
            RetryPolicy::default()
                .with_max_attempts(Some(3))
                .with_max_elapsed(None),
        );

        let err = invoker.run_admin_command(&["user-list".to_string()]).unwrap_err();

        match err {
            KsAdminError::Command(CommandError::RetriesExhausted { attempts, .. }) => {
                assert_eq!(attempts, 3)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(script.calls.lock().len(), 3);
        assert_eq!(*naps.0.lock(), vec![Duration::from_secs(10); 2]);
    }

    #[test]
    fn test_elapsed_budget() {
        let (invoker, script, naps) =
            invoker(vec![Err(RunFailure::new("(HTTP 400)")), Ok("late".to_string())]);
        let invoker = invoker.with_policy(
            RetryPolicy::default()
                .with_max_attempts(None)
                .with_max_elapsed(Some(Duration::from_secs(5))),
        );

        let err = invoker.run_admin_command(&["user-list".to_string()]).unwrap_err();

        assert!(matches!(
            err,
            KsAdminError::Command(CommandError::RetriesExhausted { attempts: 1, .. })
        ));
        assert_eq!(script.calls.lock().len(), 1);
        assert!(naps.0.lock().is_empty());
    }

    #[test]
    fn test_success_is_sanitized() {
        let (invoker, _, _) = invoker(vec![Ok("WARNING\n+-+-+\nWARNING".to_string())]);
        let output = invoker.run_admin_command(&["test_retries".to_string()]).unwrap();
        assert_eq!(output, "+-+-+\nWARNING");
    }
}
