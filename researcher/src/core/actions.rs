//! Known action kinds and their parameter contracts.
//!
//! The oracle names actions with free-form strings. Names are resolved into
//! [`ActionName`]: either one of the [`ActionKind`]s this crate knows about or
//! an `Unknown` name that the registry counts as not implemented.
//!
//! Parameter structs reject unknown fields so a mistyped or invented argument
//! surfaces as a parameter error instead of being silently dropped. Optional
//! string fields accept `null`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::citations::CitationId;
use crate::core::validation::ValidationRejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SaveContact,
    SavePainPoint,
    ExtractTechStack,
    SaveNews,
    DownloadImage,
    ExplorePage,
    SearchLinkedin,
    SearchNews,
    SaveCompanyInfo,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::SaveContact,
        ActionKind::SavePainPoint,
        ActionKind::ExtractTechStack,
        ActionKind::SaveNews,
        ActionKind::DownloadImage,
        ActionKind::ExplorePage,
        ActionKind::SearchLinkedin,
        ActionKind::SearchNews,
        ActionKind::SaveCompanyInfo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::SaveContact => "save_contact",
            ActionKind::SavePainPoint => "save_pain_point",
            ActionKind::ExtractTechStack => "extract_tech_stack",
            ActionKind::SaveNews => "save_news",
            ActionKind::DownloadImage => "download_image",
            ActionKind::ExplorePage => "explore_page",
            ActionKind::SearchLinkedin => "search_linkedin",
            ActionKind::SearchNews => "search_news",
            ActionKind::SaveCompanyInfo => "save_company_info",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action name as requested by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionName {
    Known(ActionKind),
    /// Not part of the vocabulary; dispatch records it as missing.
    Unknown(String),
}

impl ActionName {
    pub fn parse(name: &str) -> Self {
        match ActionKind::parse(name) {
            Some(kind) => ActionName::Known(kind),
            None => ActionName::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionName::Known(kind) => kind.as_str(),
            ActionName::Unknown(name) => name,
        }
    }
}

/// What a successful handler did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutput {
    /// Facts were appended to the store.
    Recorded {
        facts: usize,
        citation: Option<CitationId>,
    },
    /// The candidate failed a quality gate; the store is unchanged.
    Rejected { reason: String },
    /// A page was fetched and became the inherited citation source.
    Explored {
        url: String,
        bytes: usize,
        cached: bool,
    },
}

impl From<ValidationRejection> for ActionOutput {
    fn from(rejection: ValidationRejection) -> Self {
        ActionOutput::Rejected {
            reason: rejection.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveContactParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SavePainPointParams {
    pub description: String,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractTechStackParams {
    pub technologies: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveNewsParams {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadImageParams {
    pub url: String,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorePageParams {
    pub url: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveCompanyInfoParams {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}
