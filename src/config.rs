//! Configuration file handling.
//!
//! Configuration lives in an `audit.toml` next to the project being
//! audited (or wherever `--config` points). All fields are optional.
//!
//! # Example Configuration
//!
//! ```toml
//! severity = "high"
//! output_dir = ".audit"
//! concurrency = 8
//!
//! [ignore]
//! axios = ["GHSA-jr5f-v2jv-69x6"]
//! lodash = ["CVE-2021-23337", "GHSA-35jh-r3h4-6jhm"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::Severity;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "audit.toml";

/// Application configuration.
///
/// Values given on the command line take precedence over the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum advisory severity that makes the run exit non-zero.
    pub severity: Severity,

    /// Directory the report and resolved-package dump are written to.
    pub output_dir: PathBuf,

    /// Maximum number of in-flight remote lookups.
    pub concurrency: usize,

    /// Optional run timeout in seconds; the run returns partial results
    /// when it elapses.
    pub timeout_secs: Option<u64>,

    /// Advisory identifiers (GHSA or CVE) to suppress, per package name.
    /// Applied after matching, before severity evaluation.
    pub ignore: HashMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            severity: Severity::High,
            output_dir: PathBuf::from(".audit"),
            concurrency: 8,
            timeout_secs: None,
            ignore: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from `audit.toml` in the working
    /// directory when no path is given.
    ///
    /// A missing default file yields the default configuration; an explicit
    /// `path` that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config file {}", path.display()));
            }
        };

        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.severity, Severity::High);
        assert_eq!(config.output_dir, PathBuf::from(".audit"));
        assert_eq!(config.concurrency, 8);
        assert!(config.ignore.is_empty());
    }

    #[test]
    fn loads_partial_config_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
severity = "critical"

[ignore]
axios = ["GHSA-jr5f-v2jv-69x6"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.severity, Severity::Critical);
        assert_eq!(config.concurrency, 8);
        assert_eq!(
            config.ignore["axios"],
            vec!["GHSA-jr5f-v2jv-69x6".to_string()]
        );
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/audit.toml"))).is_err());
    }

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let config = Config::load(None).unwrap();
        std::env::set_current_dir(previous).unwrap();
        assert_eq!(config.severity, Severity::High);
    }
}
