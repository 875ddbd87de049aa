//! Oracle decisions: the wire contract, its validation, and dispatch order.
//!
//! The oracle answers in loosely formatted text. [`parse_decision`] digs the
//! first JSON object out of it, checks it against the embedded decision
//! schema, and converts it into a [`Decision`]. Anything that does not fit the
//! contract is a [`DecisionError::Malformed`]: a degraded response must stop
//! the subject instead of being read as "keep going".

use std::sync::LazyLock;
use std::time::Duration;

use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::text::truncate_on_char_boundary;

const DECISION_SCHEMA: &str = include_str!("../../schemas/decision.schema.json");

/// Bytes of the raw response kept in a `Malformed` error.
const RESPONSE_EXCERPT_BYTES: usize = 500;

/// Failure to obtain a usable decision. Aborts the current subject only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("oracle timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("oracle returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("oracle request failed: {0}")]
    Request(String),
    /// The prompt could not be built locally; the oracle was never called.
    #[error("could not render prompt: {0}")]
    Prompt(String),
    #[error("malformed decision ({reason}); response began: {excerpt}")]
    Malformed { reason: String, excerpt: String },
}

impl DecisionError {
    pub fn malformed(reason: impl Into<String>, response: &str) -> Self {
        Self::Malformed {
            reason: reason.into(),
            excerpt: truncate_on_char_boundary(response, RESPONSE_EXCERPT_BYTES).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Continue,
    Complete,
}

/// One requested action: a name plus a flat parameter object.
///
/// A `params` value that is not an object does not reject the decision. It is
/// kept in `invalid_params` so the call alone fails with a parameter error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionCall {
    #[serde(rename = "function")]
    pub name: String,
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Value>,
}

impl ActionCall {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        let (params, invalid_params) = match params {
            Value::Object(map) => (map, None),
            Value::Null => (Map::new(), None),
            other => (Map::new(), Some(other)),
        };
        Self {
            name: name.into(),
            params,
            invalid_params,
        }
    }
}

/// Which list of a decision an action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    /// Save-type actions (`actions`).
    Action,
    /// Exploration requests (`next_steps`).
    FollowUp,
}

/// Structured output of one oracle consultation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Advisory notes about the current state; never acted on.
    pub relevant_facts: Vec<String>,
    pub actions: Vec<ActionCall>,
    pub follow_up_actions: Vec<ActionCall>,
    pub status: DecisionStatus,
}

impl Decision {
    /// Every call in dispatch order: all `actions` first, then all follow-ups.
    pub fn planned(&self) -> impl Iterator<Item = (DispatchPhase, &ActionCall)> {
        self.actions
            .iter()
            .map(|call| (DispatchPhase::Action, call))
            .chain(
                self.follow_up_actions
                    .iter()
                    .map(|call| (DispatchPhase::FollowUp, call)),
            )
    }

    pub fn is_complete(&self) -> bool {
        self.status == DecisionStatus::Complete
    }
}

#[derive(Debug, Deserialize)]
struct WireDecision {
    #[serde(default)]
    relevant_data: Vec<Value>,
    actions: Vec<WireAction>,
    next_steps: Vec<WireAction>,
    status: DecisionStatus,
}

#[derive(Debug, Deserialize)]
struct WireAction {
    function: String,
    #[serde(default)]
    params: Value,
}

impl WireAction {
    fn into_call(self) -> Option<ActionCall> {
        let name = self.function.trim();
        if name.is_empty() {
            return None;
        }
        Some(ActionCall::new(name, self.params))
    }
}

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(DECISION_SCHEMA).expect("decision schema should be valid json");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("decision schema should compile")
});

/// Parse an oracle response into a validated [`Decision`].
///
/// Tolerates fenced code blocks and prose around a single JSON object. If no
/// well-formed object can be found the whole candidate text is parsed as-is,
/// which fails for anything that is not JSON.
pub fn parse_decision(response: &str) -> Result<Decision, DecisionError> {
    let candidate = fenced_block(response).unwrap_or(response);
    let value = match first_json_object(candidate) {
        Some(value) => value,
        None => serde_json::from_str::<Value>(candidate.trim())
            .map_err(|err| DecisionError::malformed(format!("invalid json: {err}"), response))?,
    };
    decision_from_value(value, response)
}

fn decision_from_value(value: Value, response: &str) -> Result<Decision, DecisionError> {
    let violations: Vec<String> = SCHEMA
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(DecisionError::malformed(
            format!("schema violations: {}", violations.join("; ")),
            response,
        ));
    }

    let wire: WireDecision = serde_json::from_value(value)
        .map_err(|err| DecisionError::malformed(format!("unexpected shape: {err}"), response))?;

    Ok(Decision {
        relevant_facts: wire
            .relevant_data
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect(),
        actions: wire
            .actions
            .into_iter()
            .filter_map(WireAction::into_call)
            .collect(),
        follow_up_actions: wire
            .next_steps
            .into_iter()
            .filter_map(WireAction::into_call)
            .collect(),
        status: wire.status,
    })
}

/// Body of the first fenced code block that looks like it holds an object.
fn fenced_block(text: &str) -> Option<&str> {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap());

    FENCE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str())
        .find(|body| body.contains('{'))
}

/// First span starting at a `{` that parses as a complete JSON object.
///
/// Uses a streaming deserializer so braces inside strings and trailing prose
/// do not confuse the scan.
fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => Some(value),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"{
        "relevant_data": ["CEO is Jane Doe"],
        "actions": [{"function": "save_contact", "params": {"name": "Jane Doe"}}],
        "next_steps": [{"function": "explore_page", "params": {"url": "/about"}}],
        "status": "continue"
    }"#;

    #[test]
    fn parses_plain_json() {
        let decision = parse_decision(PLAIN).expect("parse");
        assert_eq!(decision.relevant_facts, vec!["CEO is Jane Doe"]);
        assert_eq!(decision.actions[0].name, "save_contact");
        assert_eq!(decision.actions[0].params["name"], "Jane Doe");
        assert_eq!(decision.follow_up_actions[0].name, "explore_page");
        assert_eq!(decision.status, DecisionStatus::Continue);
    }

    #[test]
    fn parses_fenced_json_with_surrounding_prose() {
        let response = format!("Here is my analysis:\n```json\n{PLAIN}\n```\nLet me know!");
        let decision = parse_decision(&response).expect("parse");
        assert_eq!(decision.actions.len(), 1);
    }

    #[test]
    fn parses_object_embedded_in_prose_with_braces_in_strings() {
        let response = r#"Sure {not json} here you go: {"actions": [], "next_steps": [], "status": "complete", "relevant_data": ["uses {curly} braces"]} trailing {"#;
        let decision = parse_decision(response).expect("parse");
        assert!(decision.is_complete());
        assert_eq!(decision.relevant_facts, vec!["uses {curly} braces"]);
    }

    #[test]
    fn ignores_unknown_keys_and_defaults_relevant_data() {
        let response =
            r#"{"actions": [], "next_steps": [], "status": "continue", "priority": "high"}"#;
        let decision = parse_decision(response).expect("parse");
        assert!(decision.relevant_facts.is_empty());
    }

    #[test]
    fn rejects_text_without_json() {
        let err = parse_decision("I could not decide.").unwrap_err();
        assert!(matches!(err, DecisionError::Malformed { .. }));
        assert!(err.to_string().contains("I could not decide."));
    }

    #[test]
    fn rejects_missing_required_keys() {
        let err = parse_decision(r#"{"relevant_data": [], "actions": []}"#).unwrap_err();
        match err {
            DecisionError::Malformed { reason, .. } => assert!(reason.contains("schema")),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unrecognized_status() {
        let err = parse_decision(r#"{"actions": [], "next_steps": [], "status": "done"}"#)
            .unwrap_err();
        assert!(matches!(err, DecisionError::Malformed { .. }));
    }

    #[test]
    fn drops_blank_function_names_and_tolerates_null_params() {
        let response = r#"{
            "actions": [{"function": "  "}, {"function": "save_pain_point", "params": null}],
            "next_steps": [],
            "status": "continue"
        }"#;
        let decision = parse_decision(response).expect("parse");
        assert_eq!(decision.actions.len(), 1);
        assert!(decision.actions[0].params.is_empty());
        assert_eq!(decision.actions[0].invalid_params, None);
    }

    #[test]
    fn non_object_params_stay_with_their_call() {
        let response = r#"{
            "actions": [
                {"function": "save_contact", "params": {"name": "Jane"}},
                {"function": "save_pain_point", "params": ["slow onboarding"]}
            ],
            "next_steps": [],
            "status": "continue"
        }"#;
        let decision = parse_decision(response).expect("parse");
        assert_eq!(decision.actions.len(), 2);
        assert_eq!(decision.actions[0].invalid_params, None);
        assert_eq!(
            decision.actions[1].invalid_params,
            Some(serde_json::json!(["slow onboarding"]))
        );
        assert!(decision.actions[1].params.is_empty());
    }

    #[test]
    fn planned_yields_actions_before_follow_ups() {
        let response = r#"{
            "actions": [{"function": "save_contact"}, {"function": "explore_page"}],
            "next_steps": [{"function": "save_pain_point"}],
            "status": "continue"
        }"#;
        let decision = parse_decision(response).expect("parse");
        let order: Vec<(DispatchPhase, &str)> = decision
            .planned()
            .map(|(phase, call)| (phase, call.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (DispatchPhase::Action, "save_contact"),
                (DispatchPhase::Action, "explore_page"),
                (DispatchPhase::FollowUp, "save_pain_point"),
            ]
        );
    }
}
