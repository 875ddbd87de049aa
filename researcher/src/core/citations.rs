//! Per-subject citation ledger.
//!
//! Maps each distinct source locator to a stable footnote number. Numbers are
//! assigned in first-seen order starting at 1 and are never reassigned while
//! the ledger lives. A fresh ledger is created for every subject.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Footnote number of a cited source locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationId(u32);

impl CitationId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CitationLedger {
    by_locator: HashMap<String, CitationId>,
    locators: Vec<String>,
}

impl CitationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a locator to its citation id, assigning the next id on first sight.
    ///
    /// Absent or blank locators resolve to `None` and leave the ledger untouched.
    /// Matching is exact: two locators that differ in any character get two ids.
    pub fn resolve(&mut self, locator: Option<&str>) -> Option<CitationId> {
        let locator = locator.filter(|l| !l.trim().is_empty())?;
        if let Some(id) = self.by_locator.get(locator) {
            return Some(*id);
        }
        let id = CitationId(self.locators.len() as u32 + 1);
        self.by_locator.insert(locator.to_string(), id);
        self.locators.push(locator.to_string());
        Some(id)
    }

    /// Look up an already-assigned id without assigning one.
    pub fn get(&self, locator: &str) -> Option<CitationId> {
        self.by_locator.get(locator).copied()
    }

    /// Full id → locator mapping in ascending id order, for footnotes.
    pub fn export(&self) -> BTreeMap<CitationId, String> {
        self.locators
            .iter()
            .enumerate()
            .map(|(idx, locator)| (CitationId(idx as u32 + 1), locator.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_locator_gets_id_one() {
        let mut ledger = CitationLedger::new();
        let id = ledger.resolve(Some("https://acme.example/about"));
        assert_eq!(id.map(CitationId::get), Some(1));
    }

    #[test]
    fn repeated_locator_returns_same_id_without_growing() {
        let mut ledger = CitationLedger::new();
        let first = ledger.resolve(Some("https://acme.example/team"));
        for _ in 0..5 {
            assert_eq!(ledger.resolve(Some("https://acme.example/team")), first);
        }
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn distinct_locators_get_distinct_sequential_ids() {
        let mut ledger = CitationLedger::new();
        let a = ledger.resolve(Some("https://a.example")).expect("a");
        let b = ledger.resolve(Some("https://b.example")).expect("b");
        let a_again = ledger.resolve(Some("https://a.example")).expect("a again");
        let c = ledger.resolve(Some("https://a.example/")).expect("c");

        assert_ne!(a, b);
        assert_eq!(a, a_again);
        assert_eq!((a.get(), b.get(), c.get()), (1, 2, 3));
    }

    #[test]
    fn empty_locators_never_create_entries() {
        let mut ledger = CitationLedger::new();
        assert_eq!(ledger.resolve(None), None);
        assert_eq!(ledger.resolve(Some("")), None);
        assert_eq!(ledger.resolve(Some("   ")), None);
        assert!(ledger.is_empty());

        let id = ledger.resolve(Some("https://acme.example")).expect("id");
        assert_eq!(id.get(), 1);
    }

    #[test]
    fn export_maps_ids_back_to_locators() {
        let mut ledger = CitationLedger::new();
        ledger.resolve(Some("https://acme.example"));
        ledger.resolve(Some("LinkedIn: Acme"));
        ledger.resolve(Some("https://acme.example"));

        let exported = ledger.export();
        let entries: Vec<(u32, &str)> = exported
            .iter()
            .map(|(id, locator)| (id.get(), locator.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![(1, "https://acme.example"), (2, "LinkedIn: Acme")]
        );
        assert_eq!(ledger.get("LinkedIn: Acme").map(CitationId::get), Some(2));
    }
}
