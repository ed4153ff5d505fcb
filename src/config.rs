use crate::{
    cli::{self, Opts},
    errors::FtestError,
    logging::{self, Sink},
    picker::{self, discovery::SuiteTable},
};
use regex::Regex;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

/// Location of the daemon relative to the project directory.
pub const DEFAULT_DAEMON: &str = "src/adaptived";

/// Extension of test unit files.
pub const DEFAULT_EXTENSION: &str = "ftest";

/// Either everything, or one specific value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(v) => v == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// Everything a run needs to know, fixed before the first test starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Suite to run.
    pub suite: Selection<String>,
    /// Test number to run.
    pub num: Selection<u32>,
    /// Test numbers that never run.
    pub skip: BTreeSet<u32>,
    /// Tests whose `<suite>:<filename>` matches are never run.
    pub exclude: Option<Regex>,
    /// Print the timing table.
    pub verbose: bool,
    /// Directory walked for test units.
    pub ftest_dir: PathBuf,
    /// Project directory housing the daemon.
    pub project_dir: PathBuf,
    /// The daemon under test.
    pub daemon: PathBuf,
    /// Extension marking test unit files.
    pub extension: String,
    /// Capabilities of named suites.
    pub suites: SuiteTable,
    /// Where log output goes.
    pub sink: Sink,
}

/// Two levels above the test directory, e.g. `<project>` for
/// `<project>/tests/ftests`.
fn project_dir(ftest_dir: &Path) -> PathBuf {
    ftest_dir
        .ancestors()
        .nth(2)
        .or_else(|| ftest_dir.parent())
        .unwrap_or(ftest_dir)
        .to_path_buf()
}

impl RunConfig {
    /// Configuration selecting every test under `ftest_dir` with default
    /// settings.
    pub fn new(ftest_dir: impl Into<PathBuf>) -> Self {
        let ftest_dir = ftest_dir.into();
        let project_dir = project_dir(&ftest_dir);
        Self {
            suite: Selection::All,
            num: Selection::All,
            skip: BTreeSet::new(),
            exclude: None,
            verbose: false,
            daemon: project_dir.join(DEFAULT_DAEMON),
            project_dir,
            ftest_dir,
            extension: DEFAULT_EXTENSION.to_string(),
            suites: SuiteTable::default(),
            sink: Sink::default(),
        }
    }

    /// Build the configuration from the command line and the optional
    /// `ftests.toml` in the test directory. Command line options win.
    pub fn from_opts(opts: &Opts) -> Result<Self, FtestError> {
        let ftest_dir = opts.dir.canonicalize().map_err(|err| {
            FtestError(format!("{}: {}", opts.dir.to_string_lossy(), err))
        })?;
        let file = picker::toml::Config::from_dir(&ftest_dir)?;
        let mut config = RunConfig::new(ftest_dir);

        config.suite = opts.suite.clone();
        config.num = opts.num.clone();
        config.skip = cli::parse_skip_list(opts.skip.as_deref().unwrap_or(""))?;
        config.verbose = opts.verbose;
        config.exclude = opts
            .exclude_filter
            .as_ref()
            .map(|reg| {
                Regex::new(reg).map_err(|err| {
                    FtestError(format!("Invalid --exclude regex: {}", err))
                })
            })
            .transpose()?;

        if let Some(daemon) = &opts.daemon {
            config.daemon = daemon.clone();
        } else if let Some(daemon) = &file.daemon {
            config.daemon = config.project_dir.join(daemon);
        }
        if let Some(ext) = &file.extension {
            config.extension = ext.trim_start_matches('.').to_string();
        }
        for suite in &file.suites {
            config.suites.tag(&suite.name, suite.capabilities.iter().copied());
        }

        let level = opts
            .loglevel
            .or(file.log_level)
            .unwrap_or(logging::DEFAULT_LOG_LEVEL);
        let path = opts
            .logfile
            .clone()
            .or_else(|| file.log_file.clone())
            .unwrap_or_else(|| PathBuf::from(logging::DEFAULT_LOG_FILE));
        config.sink = Sink::new(level, path);

        Ok(config)
    }
}
