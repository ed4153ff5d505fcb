//! Test units declared in TOML.
//!
//! Most functional tests start the daemon with a rules file and check its
//! exit code and output. Such a test needs no code, only a unit file:
//! ```toml
//! # 054-effect-print_schedstat.ftest
//! config = "054-effect-print_schedstat.json"
//! max_loops = 1
//! expected_ret = 62
//! # (Optional) Compare STDOUT against this file.
//! expected_output = "054-effect-print_schedstat.expected"
//! # (Optional) Skip the test unless these paths exist.
//! requires_paths = ["/proc/schedstat"]
//! ```
//! Relative paths are resolved against the directory of the unit file.
use super::unit::{Env, Outcome, Unit};
use crate::{daemon::Daemon, errors::Fault, printer};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

/// Contents of a unit file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Rules file passed with `-c`. May be a `.token` template.
    pub config: Option<PathBuf>,
    /// Pass `-h`.
    #[serde(default)]
    pub help: bool,
    /// Main loop interval.
    pub interval: Option<u64>,
    /// Daemon log location.
    pub log_location: Option<String>,
    /// Daemon log level.
    pub log_level: Option<u8>,
    /// Number of loops before the daemon exits.
    pub max_loops: Option<u64>,
    /// Exit code that counts as success.
    pub expected_ret: Option<i32>,
    /// Seconds before the daemon is abandoned.
    pub timeout_secs: Option<u64>,
    /// File that STDOUT must match.
    pub expected_output: Option<PathBuf>,
    /// Where STDOUT is written for comparison. Defaults to the unit file
    /// with the extension `out`.
    pub out_file: Option<PathBuf>,
    /// Paths that must exist for the test to run.
    #[serde(default)]
    pub requires_paths: Vec<PathBuf>,
}

/// A unit backed by a [Manifest].
#[derive(Debug)]
pub struct ManifestUnit {
    manifest: Manifest,
    /// Path of the unit file.
    path: PathBuf,
}

impl ManifestUnit {
    pub fn from_path(path: &Path) -> Result<Self, Fault> {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("{}: {}", path.to_string_lossy(), err))?;
        let manifest = toml::from_str(&contents).map_err(|err| {
            format!("Failed to parse {}: {}", path.to_string_lossy(), err)
        })?;
        Ok(Self {
            manifest,
            path: path.to_path_buf(),
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.path.parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    fn out_file(&self) -> PathBuf {
        match &self.manifest.out_file {
            Some(out) => self.resolve(out),
            None => self.path.with_extension("out"),
        }
    }

    /// The daemon invocation this unit performs.
    pub fn daemon(&self) -> Daemon {
        let m = &self.manifest;
        Daemon {
            config: m.config.as_deref().map(|c| self.resolve(c)),
            help: m.help,
            interval: m.interval,
            log_location: m.log_location.clone(),
            log_level: m.log_level,
            max_loops: m.max_loops,
            expected_ret: m.expected_ret,
            timeout: m.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Unit for ManifestUnit {
    fn prereqs(&self, _env: &Env<'_>) -> Result<Outcome, Fault> {
        for required in &self.manifest.requires_paths {
            if !self.resolve(required).exists() {
                return Ok(Outcome::skipped(format!(
                    "{} does not exist",
                    required.to_string_lossy()
                )));
            }
        }
        Ok(Outcome::Passed)
    }

    fn test(&self, env: &Env<'_>) -> Result<Outcome, Fault> {
        let out = self.daemon().run(env)?;

        let expected = match &self.manifest.expected_output {
            Some(expected) => self.resolve(expected),
            None => return Ok(Outcome::Passed),
        };

        let out_file = self.out_file();
        fs::write(&out_file, format!("{}\n", out))?;
        let received = fs::read_to_string(&out_file)?;
        let expected_contents = fs::read_to_string(&expected)
            .map_err(|err| format!("{}: {}", expected.to_string_lossy(), err))?;

        if received != expected_contents {
            warn!(
                "{} differs from {}:\n{}",
                out_file.to_string_lossy(),
                expected.to_string_lossy(),
                printer::gen_diff(&expected_contents, &received)
            );
            return Ok(Outcome::failed(
                "Expected out file differs from received out file",
            ));
        }
        Ok(Outcome::Passed)
    }

    fn artifacts(&self, _env: &Env<'_>) -> Vec<PathBuf> {
        match self.manifest.expected_output {
            Some(_) => vec![self.out_file()],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(dir: &Path, name: &str, contents: &str) -> ManifestUnit {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        ManifestUnit::from_path(&path).unwrap()
    }

    #[test]
    fn relative_paths_resolve_next_to_the_unit() {
        let dir = TempDir::new().unwrap();
        let unit = unit(
            dir.path(),
            "001-cause-time_of_day.ftest",
            "config = \"001-cause-time_of_day.json.token\"\ninterval = 1000\n\
             max_loops = 10\nexpected_ret = 42\ntimeout_secs = 3\n",
        );
        let daemon = unit.daemon();
        assert_eq!(
            daemon.config,
            Some(dir.path().join("001-cause-time_of_day.json.token"))
        );
        assert_eq!(daemon.interval, Some(1000));
        assert_eq!(daemon.max_loops, Some(10));
        assert_eq!(daemon.expected_ret, Some(42));
        assert_eq!(daemon.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn out_file_defaults_next_to_the_unit() {
        let dir = TempDir::new().unwrap();
        let unit = unit(
            dir.path(),
            "054-effect-print.ftest",
            "expected_output = \"054-effect-print.expected\"\n",
        );
        assert_eq!(unit.out_file(), dir.path().join("054-effect-print.out"));
    }

    #[test]
    fn unknown_keys_fail_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("002-cause-typo.ftest");
        fs::write(&path, "max_loop = 3\n").unwrap();
        let err = ManifestUnit::from_path(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }
}
