//! Top-level error types for ksadmin.

use thiserror::Error;

use crate::invoker::CommandError;
use crate::resolve::ResolveError;

/// Top-level error type encompassing all ksadmin errors.
#[derive(Debug, Error)]
pub enum KsAdminError {
    /// The admin token or endpoint could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The admin command failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}
