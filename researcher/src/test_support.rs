//! Test-only fakes for the oracle, explorer, and image store.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::decision::DecisionError;
use crate::io::explorer::{Explorer, Page};
use crate::io::images::ImageStore;
use crate::io::oracle::Oracle;
use crate::io::prompt::DecisionPrompt;

/// Image store that accepts everything and keeps nothing.
pub use crate::io::images::DisabledImageStore as NullImageStore;

/// Oracle that replays a fixed list of responses and records every prompt.
///
/// Once the script runs out every further call fails with a request error.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: RefCell<VecDeque<Result<String, DecisionError>>>,
    requests: RefCell<Vec<DecisionPrompt>>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<Result<String, DecisionError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Script made of decision objects, serialized as the oracle would answer.
    pub fn decisions(decisions: Vec<Value>) -> Self {
        Self::new(decisions.into_iter().map(|d| Ok(d.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<DecisionPrompt> {
        self.requests.borrow().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, prompt: &DecisionPrompt) -> Result<String, DecisionError> {
        self.requests.borrow_mut().push(prompt.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(DecisionError::Request("script exhausted".to_string())))
    }
}

/// Explorer serving pages from memory. Unknown URLs fail.
#[derive(Debug, Default)]
pub struct StaticExplorer {
    pages: HashMap<String, String>,
    visits: RefCell<Vec<String>>,
}

impl StaticExplorer {
    pub fn page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.borrow().clone()
    }
}

impl Explorer for StaticExplorer {
    fn explore(&self, url: &str, _reason: &str) -> Result<Page> {
        self.visits.borrow_mut().push(url.to_string());
        let content = self
            .pages
            .get(url)
            .ok_or_else(|| anyhow!("no page at {url}"))?;
        Ok(Page {
            url: url.to_string(),
            content: content.clone(),
            cached: false,
        })
    }
}

/// Image store whose downloads always fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingImageStore;

impl ImageStore for FailingImageStore {
    fn store(&self, url: &str, _subject: &str) -> Result<Option<PathBuf>> {
        Err(anyhow!("download {url}: connection refused"))
    }
}
