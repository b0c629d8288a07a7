//! Domain types for admin access.
//!
//! - [`AdminToken`] - The administrative credential, redacted in logs
//! - [`AdminEndpoint`] - The admin API URL derived from the bind settings

use serde::Serialize;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The administrative token read from `admin_token`.
///
/// The inner value is only accessible via [`expose()`](AdminToken::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the memory is cleared when the token is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AdminToken(String);

impl AdminToken {
    /// Wrap a token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the token value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdminToken([REDACTED])")
    }
}

impl fmt::Display for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for AdminToken {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for AdminToken {}

/// Admin API endpoint, always of the form `http://{host}:{port}/v2.0/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AdminEndpoint(String);

impl AdminEndpoint {
    pub(crate) fn new(url: String) -> Self {
        Self(url)
    }

    /// Get the endpoint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdminEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AdminEndpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for AdminEndpoint {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
