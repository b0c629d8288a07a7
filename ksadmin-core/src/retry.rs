//! Retry policy for admin commands.
//!
//! A failed run is classified by searching its message for known substrings
//! ([`SignatureTable`]). Transient failures (the identity service is still
//! starting) are retried after a fixed backoff; anything else is fatal.
//!
//! The admin CLI only reports errors as text, so the signatures are tied to
//! its exact wording. They live in a table rather than in code so operators
//! can extend them without a rebuild.
//!
//! Scheduling uses the `backoff` crate: [`RetryPolicy::schedule`] yields a
//! [`BoundedBackoff`], a constant interval that runs out once the attempt or
//! time budget is spent.

pub use ::backoff::Error as BackoffError;
pub use ::backoff::backoff::Backoff;

use ::backoff::backoff::Constant;
use ::backoff::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::exec::RunFailure;

/// Default delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

/// Default maximum number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Default overall time budget.
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(600);

/// How a failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The service is not ready yet; retry.
    Transient,
    /// A genuine error; propagate.
    Fatal,
}

/// A single `{substring -> class}` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRule {
    /// Substring searched for in the failure message.
    pub pattern: String,
    /// Classification applied when the pattern matches.
    #[serde(default = "default_rule_class")]
    pub class: FailureClass,
}

fn default_rule_class() -> FailureClass {
    FailureClass::Transient
}

impl SignatureRule {
    /// A rule classifying matches as transient.
    pub fn transient(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            class: FailureClass::Transient,
        }
    }

    /// A rule classifying matches as fatal.
    pub fn fatal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            class: FailureClass::Fatal,
        }
    }
}

/// Ordered list of signature rules. The first match wins; no match is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureTable {
    rules: Vec<SignatureRule>,
}

impl SignatureTable {
    /// A table with no rules: every failure is fatal.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build a table from explicit rules.
    pub fn from_rules(rules: Vec<SignatureRule>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn push(&mut self, rule: SignatureRule) {
        self.rules.push(rule);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with_rule(mut self, rule: SignatureRule) -> Self {
        self.push(rule);
        self
    }

    /// The rules, in match order.
    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    /// Classify a failure message.
    pub fn classify(&self, message: &str) -> FailureClass {
        self.rules
            .iter()
            .find(|rule| message.contains(&rule.pattern))
            .map(|rule| rule.class)
            .unwrap_or(FailureClass::Fatal)
    }

    /// Wrap a failed run as a transient or permanent backoff error.
    pub fn triage(&self, failure: RunFailure) -> BackoffError<RunFailure> {
        match self.classify(&failure.message) {
            FailureClass::Transient => BackoffError::transient(failure),
            FailureClass::Fatal => BackoffError::permanent(failure),
        }
    }
}

impl Default for SignatureTable {
    /// Signatures the keystone CLI prints while the service is starting.
    fn default() -> Self {
        Self::from_rules(vec![
            SignatureRule::transient("[Errno 111] Connection refused"),
            SignatureRule::transient("(HTTP 400)"),
            SignatureRule::transient("HTTP Unable to establish connection"),
        ])
    }
}

/// Bounds and classification for retrying admin commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between attempts.
    pub backoff: Duration,
    /// Give up after this many attempts (`None` for no limit).
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed (`None` for no limit).
    pub max_elapsed: Option<Duration>,
    /// Transient/fatal classification.
    pub signatures: SignatureTable,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            max_elapsed: Some(DEFAULT_MAX_ELAPSED),
            signatures: SignatureTable::default(),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Set the backoff interval.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the time limit.
    pub fn with_max_elapsed(mut self, max_elapsed: Option<Duration>) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Replace the signature table.
    pub fn with_signatures(mut self, signatures: SignatureTable) -> Self {
        self.signatures = signatures;
        self
    }

    /// Start a fresh backoff schedule for one command.
    pub fn schedule(&self) -> BoundedBackoff {
        BoundedBackoff::new(self)
    }
}

/// Constant backoff bounded by an attempt count and an elapsed-time budget.
///
/// Each call to [`next_backoff`](Backoff::next_backoff) is made after a
/// failed attempt and either grants one more attempt, returning the delay to
/// wait first, or returns `None` once another attempt would exceed
/// `max_attempts` or would start after `max_elapsed`.
#[derive(Debug)]
pub struct BoundedBackoff<C = SystemClock> {
    interval: Constant,
    delay: Duration,
    max_attempts: Option<u32>,
    max_elapsed: Option<Duration>,
    retries: u32,
    clock: C,
    started: Instant,
}

impl BoundedBackoff<SystemClock> {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self::with_clock(policy, SystemClock::default())
    }
}

impl<C: Clock> BoundedBackoff<C> {
    /// Build a schedule that measures elapsed time with `clock`.
    pub fn with_clock(policy: &RetryPolicy, clock: C) -> Self {
        let started = clock.now();
        Self {
            interval: Constant::new(policy.backoff),
            delay: policy.backoff,
            max_attempts: policy.max_attempts,
            max_elapsed: policy.max_elapsed,
            retries: 0,
            clock,
            started,
        }
    }

    /// Attempts granted so far, counting the first one.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Time since the schedule started.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }
}

impl<C: Clock> Backoff for BoundedBackoff<C> {
    fn reset(&mut self) {
        self.interval.reset();
        self.retries = 0;
        self.started = self.clock.now();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempts() >= max) {
            return None;
        }
        if self
            .max_elapsed
            .is_some_and(|max| self.elapsed() + self.delay > max)
        {
            return None;
        }

        let delay = self.interval.next_backoff()?;
        self.retries += 1;
        Some(delay)
    }
}

/// Blocking delay between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
