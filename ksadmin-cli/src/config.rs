//! CLI settings handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use ksadmin_core::exec::{DEFAULT_PROGRAM, DEFAULT_TOKEN_ENV};
use ksadmin_core::retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ELAPSED};
use ksadmin_core::{DEFAULT_CONFIG_PATH, RetryPolicy, SignatureRule, SignatureTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to keystone.conf.
    pub keystone_config: PathBuf,

    /// Admin CLI executable.
    pub program: String,

    /// Environment variable the admin token is exported in.
    pub token_env: String,

    /// Logging level.
    pub log_level: String,

    /// Retry behavior for admin commands.
    pub retry: RetrySettings,

    /// Path to the settings file that was loaded.
    #[serde(skip)]
    pub settings_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keystone_config: PathBuf::from(DEFAULT_CONFIG_PATH),
            program: DEFAULT_PROGRAM.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            log_level: "info".to_string(),
            retry: RetrySettings::default(),
            settings_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Seconds to wait between attempts.
    pub backoff_secs: u64,

    /// Attempt limit; 0 disables the limit.
    pub max_attempts: u32,

    /// Time limit in seconds; 0 disables the limit.
    pub max_elapsed_secs: u64,

    /// Signatures appended after the built-in ones.
    pub signatures: Vec<SignatureRule>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            backoff_secs: DEFAULT_BACKOFF.as_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_elapsed_secs: DEFAULT_MAX_ELAPSED.as_secs(),
            signatures: Vec::new(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        let mut signatures = SignatureTable::default();
        for rule in &self.signatures {
            signatures.push(rule.clone());
        }

        RetryPolicy::default()
            .with_backoff(Duration::from_secs(self.backoff_secs))
            .with_max_attempts(Some(self.max_attempts).filter(|n| *n > 0))
            .with_max_elapsed(
                Some(Duration::from_secs(self.max_elapsed_secs)).filter(|d| !d.is_zero()),
            )
            .with_signatures(signatures)
    }
}

/// Default settings location, e.g. `~/.config/ksadmin/settings.toml`.
pub fn default_settings_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("settings.toml"))
}

/// Load settings from `path`, or from the default location when `None`.
///
/// A missing default file yields defaults; an explicitly named file must
/// exist.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (settings_path, required) = match path {
        Some(p) => (Some(p.to_path_buf()), true),
        None => (default_settings_path(), false),
    };

    let Some(settings_path) = settings_path else {
        return Ok(Settings::default());
    };

    if !required && !settings_path.exists() {
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read settings from {:?}", settings_path))?;
    let mut settings: Settings = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse settings from {:?}", settings_path))?;
    settings.settings_path = Some(settings_path);

    Ok(settings)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "ksadmin")
}
