//! Execution engine behavior with units registered in code.

use ftests::{
    command::Runner,
    config::RunConfig,
    errors::Fault,
    executor::{Context, Env, Outcome, Registry, Unit},
    picker::{self, Candidate},
};
use std::{cell::Cell, fs, path::Path, rc::Rc};
use tempfile::TempDir;

#[derive(Default)]
struct Passes;

impl Unit for Passes {
    fn test(&self, _env: &Env<'_>) -> Result<Outcome, Fault> {
        Ok(Outcome::Passed)
    }
}

#[derive(Default)]
struct Panics;

impl Unit for Panics {
    fn test(&self, _env: &Env<'_>) -> Result<Outcome, Fault> {
        panic!("cgroup vanished")
    }
}

#[derive(Default)]
struct Errors;

impl Unit for Errors {
    fn test(&self, _env: &Env<'_>) -> Result<Outcome, Fault> {
        Err("daemon exploded".into())
    }
}

/// Counts teardowns so tests can check they happen after a panic.
struct CountsTeardown(Rc<Cell<u32>>);

impl Unit for CountsTeardown {
    fn test(&self, _env: &Env<'_>) -> Result<Outcome, Fault> {
        panic!("mid-test")
    }

    fn teardown(&self, _env: &Env<'_>) -> Result<(), Fault> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

fn candidate(ordinal: u32, suite: &str) -> Candidate {
    let filename = format!("{:03}-{}-unit.ftest", ordinal, suite);
    Candidate {
        path: Path::new("/ftests").join(&filename),
        filename,
        ordinal,
        suite: suite.to_string(),
    }
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_default::<Passes>(1)
        .register_default::<Panics>(2)
        .register_default::<Errors>(3)
        .register_default::<Passes>(4);
    registry
}

#[test]
fn faults_fail_one_unit_and_the_run_continues() {
    let config = RunConfig::new("/ftests");
    let runner = Runner::new().unwrap();
    let registry = registry();
    let ctx = Context::new(Env::new(&config, &runner), &registry);

    let candidates: Vec<_> = (1..=4).map(|n| candidate(n, "cause")).collect();
    let results = ctx.execute_all(&candidates);

    let summary = results.summary();
    assert_eq!((summary.passed, summary.failed, summary.skipped), (2, 2, 0));
    assert_eq!(summary.exit_code(), 2);

    assert_eq!(results.failed[0].filename, "002-cause-unit.ftest");
    assert_eq!(
        results.failed[0].outcome,
        Outcome::failed("panicked: cgroup vanished")
    );
    assert_eq!(results.failed[1].outcome, Outcome::failed("daemon exploded"));
    assert_eq!(results.passed[1].filename, "004-cause-unit.ftest");
}

#[test]
fn panicking_units_are_torn_down() {
    let config = RunConfig::new("/ftests");
    let runner = Runner::new().unwrap();
    let teardowns = Rc::new(Cell::new(0));
    let mut registry = Registry::new();
    let counter = Rc::clone(&teardowns);
    registry.register(9, move |_| Ok(Box::new(CountsTeardown(Rc::clone(&counter)))));

    let ctx = Context::new(Env::new(&config, &runner), &registry);
    let record = ctx.execute(&candidate(9, "effect"));

    assert_eq!(record.outcome, Outcome::failed("panicked: mid-test"));
    assert_eq!(teardowns.get(), 1);
}

#[test]
fn unregistered_units_without_files_fail() {
    let config = RunConfig::new("/ftests");
    let runner = Runner::new().unwrap();
    let registry = Registry::new();
    let ctx = Context::new(Env::new(&config, &runner), &registry);

    let record = ctx.execute(&candidate(7, "cause"));
    match record.outcome {
        Outcome::Failed(cause) => assert!(cause.contains("007-cause-unit.ftest")),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn blanket_selection_leaves_out_privileged_units() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("001-cause-normal.ftest"), "").unwrap();
    fs::write(dir.path().join("002-sudo-privileged.ftest"), "").unwrap();

    let config = RunConfig::new(dir.path());
    let selected = picker::discover(&config).unwrap();
    let names: Vec<_> = selected.iter().map(|c| c.filename.as_str()).collect();
    assert_eq!(names, ["001-cause-normal.ftest"]);

    let mut registry = Registry::new();
    registry.register_default::<Passes>(1);
    let runner = Runner::new().unwrap();
    let ctx = Context::new(Env::new(&config, &runner), &registry);
    let results = ctx.execute_all(&selected);
    assert_eq!(results.summary().exit_code(), 0);
}
