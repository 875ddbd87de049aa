//! Prompt rendering for the decision oracle and the page scraper.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::actions::ActionKind;
use crate::core::facts::Snapshot;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const USER_TEMPLATE: &str = include_str!("prompts/user.md");
const SCRAPE_TEMPLATE: &str = include_str!("prompts/scrape.md");

/// The two messages of one decision request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionPrompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDoc {
    name: &'static str,
    params: &'static str,
    note: Option<&'static str>,
}

fn function_doc(kind: ActionKind) -> FunctionDoc {
    let (params, note) = match kind {
        ActionKind::SaveContact => (
            r#"{"name": "...", "title": "...", "email": "...", "phone": "...", "source": "...", "source_url": "..."}"#,
            Some("needs a name or an email"),
        ),
        ActionKind::SavePainPoint => (
            r#"{"description": "...", "evidence": "...", "source": "...", "source_url": "..."}"#,
            None,
        ),
        ActionKind::ExtractTechStack => (
            r#"{"technologies": ["..."], "category": "...", "source_url": "..."}"#,
            None,
        ),
        ActionKind::SaveNews => (
            r#"{"title": "...", "summary": "...", "date": "...", "url": "..."}"#,
            None,
        ),
        ActionKind::DownloadImage => (
            r#"{"url": "...", "person_name": "...", "context": "..."}"#,
            Some("photos of people only"),
        ),
        ActionKind::ExplorePage => (r#"{"url": "...", "reason": "..."}"#, None),
        ActionKind::SearchLinkedin => (r#"{"company": "...", "person": "..."}"#, None),
        ActionKind::SearchNews => (r#"{"company": "...", "topics": ["..."]}"#, None),
        ActionKind::SaveCompanyInfo => (
            r#"{"key": "...", "value": "...", "source_url": "..."}"#,
            Some("industry, size, founding year, locations"),
        ),
    };
    FunctionDoc {
        name: kind.as_str(),
        params,
        note,
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("user", USER_TEMPLATE)
            .expect("user template should be valid");
        env.add_template("scrape", SCRAPE_TEMPLATE)
            .expect("scrape template should be valid");
        Self { env }
    }

    /// Render the system and user messages for the current state.
    pub fn render_decision(
        &self,
        snapshot: &Snapshot<'_>,
        max_iterations: u32,
    ) -> Result<DecisionPrompt> {
        let functions: Vec<FunctionDoc> = ActionKind::ALL.into_iter().map(function_doc).collect();
        let system = self
            .env
            .get_template("system")?
            .render(context! { functions => functions })
            .context("render system prompt")?;

        let accumulated =
            serde_json::to_string_pretty(snapshot).context("serialize accumulated facts")?;
        let user = self
            .env
            .get_template("user")?
            .render(context! {
                company => snapshot.company,
                iteration => snapshot.metadata.iterations,
                max_iterations => max_iterations,
                accumulated => accumulated,
            })
            .context("render user prompt")?;

        Ok(DecisionPrompt { system, user })
    }

    pub fn render_scrape(&self, url: &str) -> Result<String> {
        let rendered = self
            .env
            .get_template("scrape")?
            .render(context! { url => url })
            .context("render scrape prompt")?;
        Ok(rendered)
    }
}
