//! Per-subject handler context.
//!
//! A [`Session`] is what every action handler receives: the subject's fact
//! store, the inherited citation locator, and the side-effecting tools. One
//! session lives for exactly one subject.

use crate::core::facts::FactStore;
use crate::core::locator::resolve_locator;
use crate::io::explorer::Explorer;
use crate::io::images::ImageStore;

/// Side-effecting collaborators shared by every session of a batch.
#[derive(Clone, Copy)]
pub struct Tools<'t> {
    pub explorer: &'t dyn Explorer,
    pub images: &'t dyn ImageStore,
    /// Bytes of an explored page kept as the source excerpt.
    pub excerpt_bytes: usize,
}

pub struct Session<'t> {
    facts: FactStore,
    current_locator: Option<String>,
    tools: Tools<'t>,
}

impl<'t> Session<'t> {
    pub fn new(facts: FactStore, tools: Tools<'t>) -> Self {
        Self {
            facts,
            current_locator: None,
            tools,
        }
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn facts_mut(&mut self) -> &mut FactStore {
        &mut self.facts
    }

    pub fn into_facts(self) -> FactStore {
        self.facts
    }

    pub fn tools(&self) -> Tools<'t> {
        self.tools
    }

    /// Locator of the most recent successful exploration, if any.
    pub fn current_locator(&self) -> Option<&str> {
        self.current_locator.as_deref()
    }

    pub fn set_current_locator(&mut self, locator: impl Into<String>) {
        self.current_locator = Some(locator.into());
    }

    /// Resolve `raw` against the subject website.
    pub fn resolve_url(&self, raw: &str) -> String {
        resolve_locator(raw, &self.facts.subject().website)
    }

    /// Locator to cite: the explicit one when non-blank, else the inherited one.
    pub fn citation_locator(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.map(str::trim).filter(|l| !l.is_empty()) {
            Some(locator) => Some(self.resolve_url(locator)),
            None => self.current_locator.clone(),
        }
    }
}
