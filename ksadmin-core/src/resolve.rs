//! Deriving the admin token and endpoint from a [`ParsedConfig`].
//!
//! These functions are pure; caching lives in
//! [`AdminContext`](crate::AdminContext).

use std::net::Ipv6Addr;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::config::{ConfigError, DEFAULT_SECTION, ParsedConfig};
use crate::model::{AdminEndpoint, AdminToken};

/// Key holding the admin token.
pub const ADMIN_TOKEN_KEY: &str = "admin_token";

/// Key holding the admin listener address.
pub const BIND_HOST_KEY: &str = "bind_host";

/// Key holding the admin listener port.
pub const ADMIN_PORT_KEY: &str = "admin_port";

/// Host used when `bind_host` is absent or a wildcard.
pub const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";

/// Port used when `admin_port` is absent.
pub const DEFAULT_ADMIN_PORT: &str = "35357";

/// Error type for token and endpoint resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The configuration file is missing, unreadable, malformed, lacks the
    /// required section or key, or holds unusable values.
    #[error(
        "keystone admin commands will not work without a valid admin token and endpoint; \
         check {}: {source}",
        path.display()
    )]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// Extract the admin token from the `[DEFAULT]` section.
///
/// An empty value counts as missing.
pub fn admin_token(config: &ParsedConfig) -> Result<AdminToken, ConfigError> {
    let section = config.default_section()?;
    section
        .get(ADMIN_TOKEN_KEY)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(AdminToken::new)
        .ok_or_else(|| ConfigError::MissingKey {
            section: DEFAULT_SECTION.to_string(),
            key: ADMIN_TOKEN_KEY.to_string(),
        })
}

/// Compose the admin endpoint from `bind_host` and `admin_port`.
///
/// Missing values fall back to `127.0.0.1` and `35357`. A missing
/// `[DEFAULT]` section, or values that do not form a URL, are configuration
/// errors.
pub fn admin_endpoint(config: &ParsedConfig) -> Result<AdminEndpoint, ConfigError> {
    let section = config.default_section()?;

    let host = section
        .get(BIND_HOST_KEY)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ADMIN_HOST);
    let port = section
        .get(ADMIN_PORT_KEY)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ADMIN_PORT);

    let url = format!("http://{}:{}/v2.0/", connect_host(host), port);
    Url::parse(&url).map_err(|e| ConfigError::InvalidValue {
        section: DEFAULT_SECTION.to_string(),
        key: format!("{}/{}", BIND_HOST_KEY, ADMIN_PORT_KEY),
        message: format!("'{}' is not a valid URL: {}", url, e),
    })?;

    Ok(AdminEndpoint::new(url))
}

/// Map a bind address to an address a client can connect to.
///
/// Wildcards become loopback; IPv6 literals are bracketed for use in a URL.
fn connect_host(bind_host: &str) -> String {
    match bind_host {
        "0.0.0.0" => DEFAULT_ADMIN_HOST.to_string(),
        _ => match bind_host.parse::<Ipv6Addr>() {
            Ok(addr) if addr.is_unspecified() => format!("[{}]", Ipv6Addr::LOCALHOST),
            Ok(addr) => format!("[{}]", addr),
            Err(_) => bind_host.to_string(),
        },
    }
}
