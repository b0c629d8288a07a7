//! Memoized admin credentials.
//!
//! [`AdminContext`] owns a [`ConfigSource`] and caches what is derived from
//! it: the parsed configuration, the admin token and the admin endpoint. The
//! configuration is read at most once per context until [`AdminContext::reset`]
//! is called.
//!
//! # Example
//!
//! ```rust,no_run
//! use ksadmin_core::{AdminContext, IniFile};
//!
//! let context = AdminContext::new(IniFile::new("/etc/keystone/keystone.conf"));
//! let endpoint = context.admin_endpoint()?;
//! println!("admin API at {}", endpoint);
//! # Ok::<(), ksadmin_core::ResolveError>(())
//! ```

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ConfigError, ConfigSource, ParsedConfig};
use crate::model::{AdminEndpoint, AdminToken};
use crate::resolve::{self, ResolveError};

#[derive(Default)]
struct CachedState {
    config: Option<Arc<ParsedConfig>>,
    token: Option<AdminToken>,
    endpoint: Option<AdminEndpoint>,
}

/// Explicit, shareable cache of admin credentials.
///
/// # Thread Safety
///
/// Every resolution (cache lookup, file read, cache store) runs while holding
/// a single mutex, so [`reset`](Self::reset) never interleaves with an
/// in-flight resolution. The context can be shared across threads via `Arc`.
pub struct AdminContext {
    source: Box<dyn ConfigSource>,
    state: Mutex<CachedState>,
}

impl AdminContext {
    /// Create a context over the given configuration source.
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            state: Mutex::new(CachedState::default()),
        }
    }

    /// Path of the underlying configuration.
    pub fn config_path(&self) -> &Path {
        self.source.path()
    }

    /// Get the admin token, reading the configuration on first use.
    pub fn admin_token(&self) -> Result<AdminToken, ResolveError> {
        let mut state = self.state.lock();
        if let Some(token) = &state.token {
            debug!("using cached admin token");
            return Ok(token.clone());
        }

        let config = self.load(&mut state)?;
        let token = resolve::admin_token(&config).map_err(|e| self.config_error(e))?;
        state.token = Some(token.clone());
        Ok(token)
    }

    /// Get the admin endpoint, reading the configuration on first use.
    pub fn admin_endpoint(&self) -> Result<AdminEndpoint, ResolveError> {
        let mut state = self.state.lock();
        if let Some(endpoint) = &state.endpoint {
            debug!("using cached admin endpoint {}", endpoint);
            return Ok(endpoint.clone());
        }

        let config = self.load(&mut state)?;
        let endpoint = resolve::admin_endpoint(&config).map_err(|e| self.config_error(e))?;
        debug!("resolved admin endpoint {}", endpoint);
        state.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Discard every cached value so the next call re-reads the configuration.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CachedState::default();
        info!("admin credential cache cleared for {:?}", self.source.path());
    }

    fn load(&self, state: &mut CachedState) -> Result<Arc<ParsedConfig>, ResolveError> {
        if let Some(config) = &state.config {
            return Ok(Arc::clone(config));
        }

        let config = Arc::new(self.source.read().map_err(|e| self.config_error(e))?);
        state.config = Some(Arc::clone(&config));
        Ok(config)
    }

    fn config_error(&self, source: ConfigError) -> ResolveError {
        ResolveError::Config {
            path: self.source.path().to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Debug for AdminContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AdminContext")
            .field("config_path", &self.source.path())
            .field("config_cached", &state.config.is_some())
            .field("token_cached", &state.token.is_some())
            .field("endpoint_cached", &state.endpoint.is_some())
            .finish()
    }
}
