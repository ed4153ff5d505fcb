//! An executor is responsible for running the selected test units and
//! collecting their results.

pub mod manifest;
pub mod registry;
pub mod results;
pub mod unit;
mod context;

pub use context::Context;
pub use registry::Registry;
pub use results::{Record, Results, Summary};
pub use unit::{Env, Outcome, Unit};
