use crate::{config::Selection, errors::FtestError};
use std::{collections::BTreeSet, path::PathBuf};
use structopt::StructOpt;

/// Sentinel accepted by `--suite` to select every suite.
pub const ALL_SUITES: &str = "allsuites";
/// Sentinel accepted by `--num` to select every test number.
pub const ALL_TESTS: &str = "-1";

/// Options for the CLI.
#[derive(StructOpt, Debug)]
#[structopt(name = "ftests", about = "Functional tests for a command-line daemon.")]
pub struct Opts {
    /// Directory containing the test units and an optional ftests.toml.
    #[structopt(short, long, parse(from_os_str), default_value = ".")]
    pub dir: PathBuf,

    /// Log level. Larger numbers are more verbose: 1 critical, 5 warning,
    /// 7 info, 8 debug.
    #[structopt(short = "l", long)]
    pub loglevel: Option<u8>,

    /// Log file. Appended to, created if missing.
    #[structopt(short = "L", long, parse(from_os_str))]
    pub logfile: Option<PathBuf>,

    /// Test number to run. If unspecified, all tests are run.
    #[structopt(short = "N", long, default_value = "-1")]
    pub num: Selection<u32>,

    /// Test number(s) to skip, separated by commas, e.g. '5,7,12'.
    #[structopt(short = "S", long)]
    pub skip: Option<String>,

    /// Test suite to run, e.g. cause or effect.
    #[structopt(short = "s", long, default_value = "allsuites")]
    pub suite: Selection<String>,

    /// Print timing information for every test.
    #[structopt(short, long)]
    pub verbose: bool,

    /// Skip tests whose `<suite>:<filename>` matches this regex.
    #[structopt(short = "x", long = "exclude")]
    pub exclude_filter: Option<String>,

    /// Path of the daemon under test. Overrides ftests.toml.
    #[structopt(long, parse(from_os_str))]
    pub daemon: Option<PathBuf>,

    /// List the selected tests without running them.
    #[structopt(long)]
    pub dry_run: bool,
}

impl std::str::FromStr for Selection<u32> {
    type Err = FtestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ALL_TESTS | "all" => Ok(Selection::All),
            num => num.parse().map(Selection::Only).map_err(|_| {
                FtestError(format!("Invalid test number: {}", s))
            }),
        }
    }
}

impl std::str::FromStr for Selection<String> {
    type Err = FtestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ALL_SUITES => Ok(Selection::All),
            "" => Err(FtestError("Suite name cannot be empty.".to_string())),
            suite => Ok(Selection::Only(suite.to_string())),
        }
    }
}

/// Parse a comma separated list of test numbers, e.g. `5,7,12`.
pub fn parse_skip_list(list: &str) -> Result<BTreeSet<u32>, FtestError> {
    list.split(',')
        .map(str::trim)
        .filter(|num| !num.is_empty())
        .map(|num| {
            num.parse().map_err(|_| {
                FtestError(format!("Invalid test number in skip list: {}", num))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_list_forms() {
        assert!(parse_skip_list("").unwrap().is_empty());
        assert_eq!(parse_skip_list("5").unwrap(), [5].into_iter().collect());
        assert_eq!(
            parse_skip_list("5,7, 12").unwrap(),
            [5, 7, 12].into_iter().collect()
        );
        assert!(parse_skip_list("5,seven").is_err());
    }

    #[test]
    fn selection_sentinels() {
        assert_eq!("-1".parse::<Selection<u32>>().unwrap(), Selection::All);
        assert_eq!("12".parse::<Selection<u32>>().unwrap(), Selection::Only(12));
        assert!("x".parse::<Selection<u32>>().is_err());
        assert_eq!(
            "allsuites".parse::<Selection<String>>().unwrap(),
            Selection::All
        );
        assert_eq!(
            "cause".parse::<Selection<String>>().unwrap(),
            Selection::Only("cause".to_string())
        );
    }

    #[test]
    fn flags_parse() {
        let opts = Opts::from_iter(vec![
            "ftests", "-s", "effect", "-N", "4", "-S", "1,2", "-v", "-l", "8",
        ]);
        assert_eq!(opts.suite, Selection::Only("effect".to_string()));
        assert_eq!(opts.num, Selection::Only(4));
        assert_eq!(opts.skip.as_deref(), Some("1,2"));
        assert!(opts.verbose);
        assert_eq!(opts.loglevel, Some(8));
        assert_eq!(opts.dir, PathBuf::from("."));
    }
}
