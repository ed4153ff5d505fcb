//! Pickers decide which test units a run executes.
//!
//! [discovery] walks the test directory and filters units by suite, number
//! and skip list. [toml] reads the optional `ftests.toml` that tunes the
//! harness for a particular project.

pub mod discovery;
pub mod toml;

pub use discovery::{discover, Candidate, Capability, SuiteTable};
