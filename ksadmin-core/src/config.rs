//! Reading `keystone.conf`.
//!
//! This module provides:
//! - [`ParsedConfig`] - Section/key/value view of an INI file
//! - [`ConfigSource`] - Trait for anything that can produce a [`ParsedConfig`]
//! - [`IniFile`] - The production source, reading an INI file from disk
//!
//! The reader performs no retry and no caching. Callers that want to avoid
//! re-reading the file (see [`AdminContext`](crate::AdminContext)) cache the
//! result themselves.

use ini::{Ini, ParseOption};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Conventional location of the identity service configuration.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/keystone/keystone.conf";

/// Name of the top-level section holding the admin settings.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Error type for configuration reading.
///
/// The variants keep the individual causes apart for logging and tests;
/// resolvers fold all of them into a single
/// [`ResolveError::Config`](crate::ResolveError::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("configuration file {} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse configuration file {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    /// A required section is absent.
    #[error("section [{section}] is missing")]
    MissingSection { section: String },

    /// A required key is absent from its section.
    #[error("key '{key}' is missing from section [{section}]")]
    MissingKey { section: String, key: String },

    /// A value is present but unusable.
    #[error("invalid value for '{key}' in section [{section}]: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

/// Parsed INI content: section name -> key -> value.
///
/// Keys that appear before the first section header are stored under the
/// empty section name. When a key repeats within a section the last value
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl ParsedConfig {
    /// Create an empty configuration (no sections at all).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text.
    ///
    /// Values are taken literally: quotes are not stripped and backslashes
    /// are not treated as escapes, so admin tokens survive unchanged.
    pub fn parse(content: &str) -> Result<Self, String> {
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, opt).map_err(|e| e.to_string())?;

        let mut parsed = Self::new();
        for (section, props) in ini.iter() {
            let entries = parsed
                .sections
                .entry(section.unwrap_or_default().to_string())
                .or_default();
            for (key, value) in props.iter() {
                entries.insert(key.to_string(), value.to_string());
            }
        }
        Ok(parsed)
    }

    /// Add a value, creating the section if needed.
    pub fn with_value(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Add an empty section.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.sections.entry(section.into()).or_default();
        self
    }

    /// Look up a whole section.
    pub fn section(&self, name: &str) -> Option<&HashMap<String, String>> {
        self.sections.get(name)
    }

    /// Look up a single value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// Check whether a section is present.
    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Return the `[DEFAULT]` section or a [`ConfigError::MissingSection`].
    pub fn default_section(&self) -> Result<&HashMap<String, String>, ConfigError> {
        self.section(DEFAULT_SECTION)
            .ok_or_else(|| ConfigError::MissingSection {
                section: DEFAULT_SECTION.to_string(),
            })
    }
}

/// A source of configuration.
///
/// [`IniFile`] is the production implementation; tests can substitute a
/// source that serves canned content or counts reads.
pub trait ConfigSource: Send + Sync {
    /// Path reported to operators in error messages.
    fn path(&self) -> &Path;

    /// Read and parse the configuration.
    fn read(&self) -> Result<ParsedConfig, ConfigError>;
}

/// INI file on disk.
#[derive(Debug, Clone)]
pub struct IniFile {
    path: PathBuf,
}

impl IniFile {
    /// Read from an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for IniFile {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ConfigSource for IniFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ParsedConfig, ConfigError> {
        debug!("reading configuration from {:?}", self.path);

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                ConfigError::Unreadable {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        ParsedConfig::parse(&content).map_err(|message| ConfigError::Malformed {
            path: self.path.clone(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_default_section() {
        let parsed = ParsedConfig::parse(
            "[DEFAULT]\nadmin_token = foo\nbind_host=0.0.0.0\n\n[database]\nconnection = sqlite://\n",
        )
        .unwrap();

        assert_eq!(parsed.get("DEFAULT", "admin_token"), Some("foo"));
        assert_eq!(parsed.get("DEFAULT", "bind_host"), Some("0.0.0.0"));
        assert_eq!(parsed.get("database", "connection"), Some("sqlite://"));
        assert_eq!(parsed.get("DEFAULT", "admin_port"), None);
    }

    #[test]
    fn test_parse_keeps_values_literal() {
        let parsed = ParsedConfig::parse("[DEFAULT]\nadmin_token = \"a\\b\"\n").unwrap();
        assert_eq!(parsed.get("DEFAULT", "admin_token"), Some("\"a\\b\""));
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let parsed =
            ParsedConfig::parse("[DEFAULT]\nadmin_port = 1\nadmin_port = 2\n").unwrap();
        assert_eq!(parsed.get("DEFAULT", "admin_port"), Some("2"));
    }

    #[test]
    fn test_parse_without_default_section() {
        let parsed = ParsedConfig::parse("[database]\nconnection = x\n").unwrap();
        assert!(!parsed.has_section("DEFAULT"));
        assert!(matches!(
            parsed.default_section(),
            Err(ConfigError::MissingSection { .. })
        ));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(ParsedConfig::parse("[DEFAULT\nadmin_token = foo\n").is_err());
    }

    #[test]
    fn test_builder() {
        let parsed = ParsedConfig::new()
            .with_value("DEFAULT", "admin_token", "foo")
            .with_section("empty");
        assert_eq!(parsed.get("DEFAULT", "admin_token"), Some("foo"));
        assert!(parsed.has_section("empty"));
        assert!(parsed.section("empty").unwrap().is_empty());
    }

    #[test]
    fn test_ini_file_missing() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();
        drop(temp);

        let result = IniFile::new(&path).read();
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_ini_file_reads_content() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[DEFAULT]").unwrap();
        writeln!(temp, "admin_token = secret").unwrap();

        let source = IniFile::new(temp.path());
        assert_eq!(source.path(), temp.path());
        let parsed = source.read().unwrap();
        assert_eq!(parsed.get("DEFAULT", "admin_token"), Some("secret"));
    }

    #[test]
    fn test_ini_file_malformed() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[DEFAULT").unwrap();

        let result = IniFile::new(temp.path()).read();
        assert!(matches!(result, Err(ConfigError::Malformed { .. })));
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            IniFile::default().path(),
            Path::new("/etc/keystone/keystone.conf")
        );
    }
}
