//! # ksadmin Core
//!
//! Admin access to a running Keystone identity service.
//!
//! This crate provides:
//! - Reading `keystone.conf` into a section/key view
//! - Resolution of the admin token and admin endpoint, memoized per
//!   [`AdminContext`] with an explicit [`reset`](AdminContext::reset)
//! - An [`AdminInvoker`] that runs the keystone CLI with those credentials,
//!   retries while the service is still starting, and strips CLI warnings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ksadmin_core::{AdminContext, AdminInvoker, IniFile};
//!
//! let context = Arc::new(AdminContext::new(IniFile::new("/etc/keystone/keystone.conf")));
//! let invoker = AdminInvoker::new(Arc::clone(&context));
//!
//! let tenants = invoker.run_admin_command(&["tenant-list".to_string()])?;
//! println!("{}", tenants);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod invoker;
pub mod model;
pub mod resolve;
pub mod retry;
pub mod sanitize;

// Re-export commonly used types at crate root
pub use config::{
    ConfigError,
    ConfigSource,
    IniFile,
    ParsedConfig,
    DEFAULT_CONFIG_PATH,
};

pub use context::AdminContext;

pub use error::KsAdminError;

pub use exec::{
    CommandRunner,
    Invocation,
    ProcessRunner,
    RunFailure,
};

pub use invoker::{
    AdminInvoker,
    CommandError,
};

pub use model::{
    AdminEndpoint,
    AdminToken,
};

pub use resolve::ResolveError;

pub use retry::{
    BoundedBackoff,
    FailureClass,
    RetryPolicy,
    SignatureRule,
    SignatureTable,
    Sleeper,
    ThreadSleeper,
};

pub use sanitize::WarningFilter;
