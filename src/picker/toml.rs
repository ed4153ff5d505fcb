//! Project level settings read from `ftests.toml` in the test directory.
//!
//! ```toml
//! # Daemon under test, relative to the project directory.
//! daemon = "src/adaptived"
//! # (Optional) Extension of test unit files. Defaults to "ftest".
//! extension = "ftest"
//! # (Optional) Defaults for the --loglevel and --logfile flags.
//! log_level = 5
//! log_file = "ftests.log"
//!
//! # Suites that only run when requested by name or number.
//! [[suites]]
//! name = "sudo"
//! capabilities = ["elevated-privilege"]
//! ```
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{errors::FtestError, picker::discovery::Capability};

pub const CONFIG_FILE: &str = "ftests.toml";

/// Contents of `ftests.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path of the daemon relative to the project directory.
    pub daemon: Option<PathBuf>,
    /// Extension of test unit files.
    pub extension: Option<String>,
    /// Default log level.
    pub log_level: Option<u8>,
    /// Default log file.
    pub log_file: Option<PathBuf>,
    /// Capability tags for suites.
    #[serde(default)]
    pub suites: Vec<SuiteConfig>,
}

/// Capabilities required by the tests of one suite.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    /// Name of the suite, i.e. the second segment of its file names.
    pub name: String,
    /// What running this suite requires.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl Config {
    /// Read `ftests.toml` from `dir`. A missing file yields the defaults.
    pub fn from_dir(dir: &Path) -> Result<Self, FtestError> {
        let conf_path = dir.join(CONFIG_FILE);
        if !conf_path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(&conf_path).map_err(|err| {
            FtestError(format!("{}: {}", conf_path.to_string_lossy(), err))
        })?;

        toml::from_str(&contents).map_err(|err| {
            FtestError(format!(
                "Failed to parse {}: {}",
                conf_path.to_string_lossy(),
                err
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let conf = Config::from_dir(dir.path()).unwrap();
        assert!(conf.daemon.is_none());
        assert!(conf.suites.is_empty());
    }

    #[test]
    fn suites_carry_capabilities() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "extension = \"unit\"\n[[suites]]\nname = \"sudo\"\n\
             capabilities = [\"elevated-privilege\"]\n[[suites]]\nname = \"cause\"\n",
        )
        .unwrap();
        let conf = Config::from_dir(dir.path()).unwrap();
        assert_eq!(conf.extension.as_deref(), Some("unit"));
        assert_eq!(conf.suites.len(), 2);
        assert_eq!(conf.suites[0].capabilities, vec![Capability::ElevatedPrivilege]);
        assert!(conf.suites[1].capabilities.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "deamon = \"typo\"\n").unwrap();
        let err = Config::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }
}
