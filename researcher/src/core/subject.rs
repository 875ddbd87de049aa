//! The company under research.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Immutable input attributes for one research run.
///
/// Field aliases accept the column names of the lead exports the subject
/// lists are usually generated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, alias = "Title")]
    pub name: String,
    #[serde(default, alias = "WebsiteURL")]
    pub website: String,
    #[serde(default, alias = "Address")]
    pub address: String,
    #[serde(default, alias = "Phone")]
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubjectError {
    #[error("subject name must not be blank")]
    BlankName,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    /// A subject without a name cannot own a fact store.
    pub fn validate(&self) -> Result<(), SubjectError> {
        if self.name.trim().is_empty() {
            return Err(SubjectError::BlankName);
        }
        Ok(())
    }

    /// Starting locator for the run, if the subject has a website.
    pub fn homepage(&self) -> Option<&str> {
        let website = self.website.trim();
        (!website.is_empty()).then_some(website)
    }
}
