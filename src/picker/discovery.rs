//! Find test units on disk and select the ones a run should execute.
//!
//! Unit files are named `<number>-<suite>-<description>.<ext>`, e.g.
//! `001-cause-time_of_day.ftest`. Files that don't follow the convention are
//! logged and ignored.
use crate::{config::RunConfig, errors::FtestError};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
};
use tracing::{debug, error};

const DELIMITER: char = '-';

/// Something a suite needs from the environment it runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Must run as root.
    ElevatedPrivilege,
}

impl Capability {
    /// Suites with this capability are left out of runs over all suites and
    /// must be selected by suite name. A test number alone is not enough.
    pub fn requires_explicit_target(self) -> bool {
        match self {
            Capability::ElevatedPrivilege => true,
        }
    }
}

/// Capabilities of each named suite.
#[derive(Debug, Clone)]
pub struct SuiteTable(HashMap<String, HashSet<Capability>>);

impl Default for SuiteTable {
    /// The `sudo` suite requires root.
    fn default() -> Self {
        let mut table = SuiteTable(HashMap::new());
        table.tag("sudo", [Capability::ElevatedPrivilege]);
        table
    }
}

impl SuiteTable {
    /// A table without any tagged suites.
    pub fn empty() -> Self {
        SuiteTable(HashMap::new())
    }

    /// Add capabilities to `suite`.
    pub fn tag<I>(&mut self, suite: &str, capabilities: I)
    where
        I: IntoIterator<Item = Capability>,
    {
        self.0
            .entry(suite.to_string())
            .or_default()
            .extend(capabilities);
    }

    pub fn capabilities(&self, suite: &str) -> impl Iterator<Item = Capability> + '_ {
        self.0.get(suite).into_iter().flatten().copied()
    }

    pub fn requires_explicit_target(&self, suite: &str) -> bool {
        self.capabilities(suite)
            .any(Capability::requires_explicit_target)
    }
}

/// A test unit file whose name follows the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full path of the unit file.
    pub path: PathBuf,
    /// File name, used when reporting.
    pub filename: String,
    /// Leading test number.
    pub ordinal: u32,
    /// Second segment of the name.
    pub suite: String,
}

impl Candidate {
    /// Parse the unit's number and suite from its file name. Returns `None`
    /// (after logging why) for names that break the convention.
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_string_lossy().to_string();
        let stem = path.file_stem()?.to_string_lossy();
        let mut segments = stem.split(DELIMITER);

        let ordinal = match segments.next().map(str::parse::<u32>) {
            Some(Ok(ordinal)) => ordinal,
            _ => {
                debug!("Skipping {}.  It doesn't start with an int", filename);
                return None;
            }
        };
        let suite = match segments.next() {
            Some(suite) => suite.to_string(),
            None => {
                error!(
                    "Skipping {}.  It doesn't conform to the filename format",
                    filename
                );
                return None;
            }
        };

        Some(Candidate {
            path: path.to_path_buf(),
            filename,
            ordinal,
            suite,
        })
    }

    /// Whether the run described by `config` should execute this unit.
    pub fn is_selected(&self, config: &RunConfig) -> bool {
        if !config.suite.matches(&self.suite) || !config.num.matches(&self.ordinal) {
            return false;
        }
        if config.suite.is_all() && config.suites.requires_explicit_target(&self.suite) {
            debug!(
                "Skipping {}.  Suite {} must be requested explicitly",
                self.filename, self.suite
            );
            return false;
        }
        if config.skip.contains(&self.ordinal) {
            return false;
        }
        if let Some(ex) = &config.exclude {
            // Matches the regex to <suite>:<filename>
            if ex.is_match(&format!("{}:{}", self.suite, self.filename)) {
                return false;
            }
        }
        true
    }
}

/// Every file under `dir` (recursively) with extension `ext`, in walk order.
/// Entries that can't be read are logged and left out.
pub fn walk(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, FtestError> {
    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(ext)
    );
    Ok(readable_files(glob::glob(&pattern)?))
}

fn readable_files<I, E>(entries: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = Result<PathBuf, E>>,
    E: fmt::Display,
{
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                debug!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect()
}

/// Parse and filter `paths`, keeping their order.
pub fn select(paths: Vec<PathBuf>, config: &RunConfig) -> Vec<Candidate> {
    paths
        .iter()
        .filter_map(|path| Candidate::from_path(path))
        .filter(|candidate| candidate.is_selected(config))
        .collect()
}

/// The units a run over `config` executes, in directory walk order.
pub fn discover(config: &RunConfig) -> Result<Vec<Candidate>, FtestError> {
    let paths = walk(&config.ftest_dir, &config.extension)?;
    Ok(select(paths, config))
}
