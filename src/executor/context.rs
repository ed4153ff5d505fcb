use super::{
    registry::Registry,
    results::{Record, Results, Summary},
    unit::{Env, Outcome},
};
use crate::{
    daemon,
    errors::{Fault, FtestError, RichResult},
    picker::Candidate,
};
use std::{
    any::Any,
    io::{self, Write},
    panic::{self, AssertUnwindSafe},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

/// Text of a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> Fault {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {}", msg).into()
}

/// Time `step`. A failing run-level step is logged and the run goes on.
fn timed<F>(name: &str, step: F) -> Duration
where
    F: FnOnce() -> Result<(), FtestError>,
{
    let start = Instant::now();
    if let Err(err) = step() {
        debug!("{} failed: {}", name, err);
    }
    start.elapsed()
}

/// An execution context runs the selected units one after another and
/// collects their results.
pub struct Context<'a> {
    env: Env<'a>,
    registry: &'a Registry,
}

impl<'a> Context<'a> {
    pub fn new(env: Env<'a>, registry: &'a Registry) -> Self {
        Self { env, registry }
    }

    /// Remove leftovers of earlier runs.
    pub fn setup(&self) -> Duration {
        timed("setup", || self.sweep())
    }

    /// Remove files the run generated.
    pub fn teardown(&self) -> Duration {
        timed("teardown", || self.sweep())
    }

    fn sweep(&self) -> Result<(), FtestError> {
        daemon::sweep_materialized(&self.env.config.ftest_dir).map(|_| ())
    }

    /// Run one unit. Errors and panics escaping the unit become a failed
    /// outcome.
    pub fn execute(&self, candidate: &Candidate) -> Record {
        let start = Instant::now();
        debug!("Running test {}.", candidate.filename);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry
                .load(candidate)
                .and_then(|unit| unit.main(&self.env))
        }))
        .map_err(panic_message)
        .collapse();

        let outcome = result.unwrap_or_else(|fault| {
            warn!("{}: {}", candidate.filename, fault);
            Outcome::failed(fault)
        });
        let elapsed = start.elapsed();
        info!(
            "{} {} in {:.2}s",
            candidate.filename,
            outcome,
            elapsed.as_secs_f64()
        );

        Record {
            filename: candidate.filename.clone(),
            elapsed,
            outcome,
        }
    }

    /// Run every candidate in order.
    pub fn execute_all(&self, candidates: &[Candidate]) -> Results {
        let mut results = Results::default();
        for candidate in candidates {
            results.push(self.execute(candidate));
        }
        results
    }

    /// Run setup, every candidate and teardown, then print the report.
    /// Panic messages from units go to the log instead of the terminal.
    pub fn flat_summary(&self, candidates: &[Candidate]) -> Result<Summary, FtestError> {
        let setup = self.setup();

        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(|info| warn!("{}", info)));
        let mut results = self.execute_all(candidates);
        panic::set_hook(default_hook);

        results.setup = setup;
        results.teardown = self.teardown();

        let report = results.report_str(self.env.config.verbose, chrono::Local::now());
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(report.as_bytes())?;
        handle.flush()?;

        Ok(results.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, thread};

    #[test]
    fn failing_steps_are_still_timed() {
        let elapsed = timed("teardown", || {
            thread::sleep(Duration::from_millis(20));
            Err(FtestError("Permission denied".to_string()))
        });
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn steps_run_once() {
        let calls = Cell::new(0);
        timed("setup", || {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert_eq!(calls.get(), 1);
    }
}
