//! Decision engine: prompt, consult, parse.

use tracing::{debug, warn};

use crate::core::decision::{Decision, DecisionError, parse_decision};
use crate::core::facts::Snapshot;
use crate::core::text::preview;
use crate::io::oracle::Oracle;
use crate::io::prompt::{DecisionPrompt, PromptEngine};

/// Everything one consultation produced, kept for iteration records.
#[derive(Debug)]
pub struct Consultation {
    /// `None` when the prompt could not be rendered.
    pub prompt: Option<DecisionPrompt>,
    /// `None` when the oracle produced no text.
    pub response: Option<String>,
    pub decision: Result<Decision, DecisionError>,
}

/// Turns fact snapshots into decisions through an [`Oracle`].
pub struct DecisionEngine<O> {
    oracle: O,
    prompts: PromptEngine,
    max_iterations: u32,
}

impl<O: Oracle> DecisionEngine<O> {
    /// `max_iterations` is shown to the oracle so it can pace the research.
    pub fn new(oracle: O, max_iterations: u32) -> Self {
        Self {
            oracle,
            prompts: PromptEngine::new(),
            max_iterations,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn decide(&self, snapshot: &Snapshot<'_>) -> Result<Decision, DecisionError> {
        self.consult(snapshot).decision
    }

    pub fn consult(&self, snapshot: &Snapshot<'_>) -> Consultation {
        let prompt = match self.prompts.render_decision(snapshot, self.max_iterations) {
            Ok(prompt) => prompt,
            Err(err) => {
                return Consultation {
                    prompt: None,
                    response: None,
                    decision: Err(render_failure(&err)),
                };
            }
        };
        debug!(
            system_bytes = prompt.system.len(),
            user_bytes = prompt.user.len(),
            "consulting oracle"
        );

        let response = match self.oracle.complete(&prompt) {
            Ok(response) => response,
            Err(err) => {
                return Consultation {
                    prompt: Some(prompt),
                    response: None,
                    decision: Err(err),
                };
            }
        };

        let decision = parse_decision(&response);
        if let Err(err) = &decision {
            warn!(error = %err, response = %preview(&response, 200), "unusable oracle response");
        }
        Consultation {
            prompt: Some(prompt),
            response: Some(response),
            decision,
        }
    }
}

fn render_failure(err: &anyhow::Error) -> DecisionError {
    warn!(error = %format!("{err:#}"), "could not render decision prompt");
    DecisionError::Prompt(format!("{err:#}"))
}
