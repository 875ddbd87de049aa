//! Transport to the decision oracle.
//!
//! [`Oracle`] is the seam between the research loop and a language model:
//! one request in, raw text out, with every failure classified as a
//! [`DecisionError`]. [`ChatCompletionsOracle`] speaks the OpenAI-compatible
//! `/chat/completions` protocol.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::decision::DecisionError;
use crate::core::text::truncate_on_char_boundary;
use crate::io::config::OracleConfig;
use crate::io::prompt::DecisionPrompt;

/// Bytes of an error response body kept in `DecisionError::Status`.
const ERROR_BODY_BYTES: usize = 500;

pub trait Oracle {
    fn complete(&self, prompt: &DecisionPrompt) -> Result<String, DecisionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
}

impl ChatCompletionsOracle {
    pub fn new(config: &OracleConfig, api_key: String) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build oracle http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> DecisionError {
        if err.is_timeout() {
            DecisionError::Timeout(self.timeout)
        } else {
            DecisionError::Request(err.to_string())
        }
    }
}

impl Oracle for ChatCompletionsOracle {
    #[instrument(skip_all, fields(model = %self.model))]
    fn complete(&self, prompt: &DecisionPrompt) -> Result<String, DecisionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        let body = response.text().map_err(|err| self.classify(err))?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "oracle responded"
        );
        if !status.is_success() {
            return Err(DecisionError::Status {
                code: status.as_u16(),
                body: truncate_on_char_boundary(&body, ERROR_BODY_BYTES).to_string(),
            });
        }

        extract_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
pub fn extract_content(body: &str) -> Result<String, DecisionError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|err| DecisionError::malformed(format!("invalid completion body: {err}"), body))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| DecisionError::malformed("completion has no message content", body))
}
