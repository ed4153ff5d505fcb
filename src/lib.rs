//! Ftests is a sequential functional test harness for daemons driven from
//! the command line.
//!
//! A functional test starts the daemon under test with a set of flags and a
//! rules file, waits for it to exit (or for a timeout to expire) and checks
//! its exit code and output.
//!
//! ## Test Units
//! Every file in the test directory named
//! `<number>-<suite>-<description>.ftest` is a test unit. The number selects
//! individual tests and the suite groups them. Files that don't follow the
//! naming scheme are ignored.
//!
//! Most units are declarative. The unit file is TOML describing a single
//! daemon invocation:
//! ```toml
//! # 001-cause-time_of_day.ftest
//! # Rules file. `.token` files are templates, see below.
//! config = "001-cause-time_of_day.json.token"
//! # Main loop interval and number of loops.
//! interval = 1000
//! max_loops = 10
//! # The daemon exits with 42 when the rule fires.
//! expected_ret = 42
//! # (Optional) Abandon the daemon after this many seconds.
//! timeout_secs = 30
//! ```
//! Tests that need code implement [executor::Unit] and are registered by
//! number in an [executor::Registry]:
//! ```no_run
//! use ftests::{cli::Opts, executor::{Env, Outcome, Registry, Unit}, errors::Fault};
//! use structopt::StructOpt;
//!
//! #[derive(Default)]
//! struct Help;
//!
//! impl Unit for Help {
//!     fn test(&self, env: &Env<'_>) -> Result<Outcome, Fault> {
//!         let usage = ftests::daemon::Daemon { help: true, ..Default::default() }.run(env)?;
//!         Ok(if usage.contains("Usage") {
//!             Outcome::Passed
//!         } else {
//!             Outcome::failed("no usage text")
//!         })
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register_default::<Help>(3);
//! std::process::exit(ftests::run(&Opts::from_args(), &registry).unwrap_or(1));
//! ```
//!
//! ## Lifecycle
//! Every unit goes through `prereqs`, `setup`, `test` and `teardown`. A
//! prerequisite that doesn't pass ends the unit early, usually as skipped.
//! Teardown runs even when setup or the test fail. Errors and panics
//! escaping a unit mark it as failed and the run moves on to the next unit.
//!
//! ## Selecting Tests
//! ```bash
//! ftests -s cause          # only the `cause` suite
//! ftests -N 12             # only test number 12
//! ftests -S 5,7,12         # everything except 5, 7 and 12
//! ftests -x '^effect:.*kill'   # skip tests matching <suite>:<filename>
//! ```
//! Suites tagged with the `elevated-privilege` capability (by default the
//! `sudo` suite) only run when selected by suite name; `-N` alone
//! does not select them.
//!
//! ## Templates
//! Rules files whose name contains `.token` may contain `<< now N >>`, which
//! is replaced with the time `N` seconds from now as `HH:MM:SS` before the
//! daemon starts.
//!
//! ## Results
//! After the run, ftests prints how many tests passed, were skipped and
//! failed, with the cause of each failure. `-v` adds a timing table. The
//! exit code follows the automake test driver convention: `0` when all
//! tests passed, the number of failures (capped at 76) otherwise, `77` when
//! every test was skipped and `99` when no test was selected.
pub mod cli;
pub mod command;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod picker;
pub mod printer;
pub mod template;

use colored::*;
use config::RunConfig;
use errors::FtestError;
use executor::Registry;
use picker::Candidate;

fn dry_run(candidates: &[Candidate], registry: &Registry) {
    for candidate in candidates {
        let kind = if registry.is_registered(candidate.ordinal) {
            "registered"
        } else {
            "manifest"
        };
        println!(
            "{}{}{}\n  {}",
            candidate.suite.blue(),
            ":".blue(),
            candidate.filename.blue(),
            kind
        );
    }
}

/// Run the tests selected by `opts` and return the process exit code.
pub fn run(opts: &cli::Opts, registry: &Registry) -> Result<i32, FtestError> {
    let config = RunConfig::from_opts(opts)?;
    let _guard = config.sink.install()?;

    let candidates = picker::discover(&config)?;

    // Print out the selected units in dry run mode.
    if opts.dry_run {
        dry_run(&candidates, registry);
        return Ok(0);
    }

    let runner = command::Runner::new()?;
    let ctx = executor::Context::new(executor::Env::new(&config, &runner), registry);
    Ok(ctx.flat_summary(&candidates)?.exit_code())
}
