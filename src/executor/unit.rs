//! The lifecycle every test unit follows.
use crate::{command::Runner, config::RunConfig, errors::Fault};
use std::{fmt, fs, io, path::PathBuf};
use tracing::warn;

/// How a unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// Contains the reason for the failure.
    Failed(String),
    /// Contains the reason the unit did not run.
    Skipped(String),
}

impl Outcome {
    pub fn failed(cause: impl fmt::Display) -> Self {
        Outcome::Failed(cause.to_string())
    }

    pub fn skipped(cause: impl fmt::Display) -> Self {
        Outcome::Skipped(cause.to_string())
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed(cause) | Outcome::Skipped(cause) => Some(cause),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::Failed(_) => write!(f, "failed"),
            Outcome::Skipped(_) => write!(f, "skipped"),
        }
    }
}

/// What a unit gets to work with: the run configuration and a way to run
/// commands.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub config: &'a RunConfig,
    pub runner: &'a Runner,
}

impl<'a> Env<'a> {
    pub fn new(config: &'a RunConfig, runner: &'a Runner) -> Self {
        Self { config, runner }
    }
}

/// A functional test.
///
/// Only [Unit::test] is required. The provided [Unit::main] drives the
/// steps: `prereqs`, then `setup`, `test` and `teardown`, then removal of
/// the unit's `artifacts`. Teardown runs whenever setup was entered, even
/// if setup or test fail or panic.
pub trait Unit {
    /// Decide whether the unit can run here. Anything but
    /// [Outcome::Passed] ends the unit with that outcome.
    fn prereqs(&self, _env: &Env<'_>) -> Result<Outcome, Fault> {
        Ok(Outcome::Passed)
    }

    fn setup(&self, _env: &Env<'_>) -> Result<(), Fault> {
        Ok(())
    }

    fn test(&self, env: &Env<'_>) -> Result<Outcome, Fault>;

    fn teardown(&self, _env: &Env<'_>) -> Result<(), Fault> {
        Ok(())
    }

    /// Files the unit may leave behind. Removed after teardown; files that
    /// don't exist are ignored.
    fn artifacts(&self, _env: &Env<'_>) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Run the whole lifecycle.
    fn main(&self, env: &Env<'_>) -> Result<Outcome, Fault> {
        let outcome = self.prereqs(env)?;
        if !outcome.is_passed() {
            return Ok(outcome);
        }

        let result = (|| -> Result<Outcome, Fault> {
            let guard = TeardownGuard::new(self, env);
            self.setup(env)?;
            let outcome = self.test(env)?;
            guard.finish()?;
            Ok(outcome)
        })();

        let cleaned = remove_artifacts(&self.artifacts(env));
        let outcome = result?;
        cleaned?;
        Ok(outcome)
    }
}

/// Runs teardown when dropped unless [TeardownGuard::finish] ran it first.
struct TeardownGuard<'u, 'e, U: Unit + ?Sized> {
    unit: &'u U,
    env: &'u Env<'e>,
    armed: bool,
}

impl<'u, 'e, U: Unit + ?Sized> TeardownGuard<'u, 'e, U> {
    fn new(unit: &'u U, env: &'u Env<'e>) -> Self {
        Self {
            unit,
            env,
            armed: true,
        }
    }

    fn finish(mut self) -> Result<(), Fault> {
        self.armed = false;
        self.unit.teardown(self.env)
    }
}

impl<U: Unit + ?Sized> Drop for TeardownGuard<'_, '_, U> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.unit.teardown(self.env) {
                warn!("teardown failed: {}", err);
            }
        }
    }
}

/// Remove `paths`, treating files that are already gone as removed.
pub fn remove_artifacts(paths: &[PathBuf]) -> io::Result<()> {
    for path in paths {
        match fs::remove_file(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                return Err(io::Error::new(
                    err.kind(),
                    format!("{}: {}", path.to_string_lossy(), err),
                ))
            }
            _ => (),
        }
    }
    Ok(())
}
