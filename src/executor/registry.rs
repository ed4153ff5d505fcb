//! Maps discovered unit files to the code that runs them.
use super::{manifest::ManifestUnit, unit::Unit};
use crate::{errors::Fault, picker::Candidate};
use std::collections::BTreeMap;

/// Builds the unit for a discovered file.
pub type Handler = Box<dyn Fn(&Candidate) -> Result<Box<dyn Unit>, Fault>>;

/// Handlers registered in code, keyed by test number. Files whose number has
/// no handler are loaded as [ManifestUnit]s.
#[derive(Default)]
pub struct Registry {
    handlers: BTreeMap<u32, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `handler` for files numbered `ordinal`, replacing any previous
    /// handler.
    pub fn register<F>(&mut self, ordinal: u32, handler: F) -> &mut Self
    where
        F: Fn(&Candidate) -> Result<Box<dyn Unit>, Fault> + 'static,
    {
        self.handlers.insert(ordinal, Box::new(handler));
        self
    }

    /// Use a fresh `U::default()` for files numbered `ordinal`.
    pub fn register_default<U>(&mut self, ordinal: u32) -> &mut Self
    where
        U: Unit + Default + 'static,
    {
        self.register(ordinal, |_| Ok(Box::new(U::default())))
    }

    pub fn is_registered(&self, ordinal: u32) -> bool {
        self.handlers.contains_key(&ordinal)
    }

    /// Build the unit for `candidate`.
    pub fn load(&self, candidate: &Candidate) -> Result<Box<dyn Unit>, Fault> {
        match self.handlers.get(&candidate.ordinal) {
            Some(handler) => handler(candidate),
            None => Ok(Box::new(ManifestUnit::from_path(&candidate.path)?)),
        }
    }
}
