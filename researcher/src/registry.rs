//! Action dispatch.
//!
//! Maps [`ActionKind`]s to handlers and executes oracle-requested actions by
//! name. Nothing a handler does escapes [`FunctionRegistry::execute`]: unknown
//! names, bad parameters, handler errors, and handler panics all come back as
//! a [`DispatchError`] so the research loop can log them and move on.
//!
//! Names outside the vocabulary, and known kinds nobody registered a handler
//! for, are counted in the [`MissingActionLog`] as a to-do list of actions
//! worth implementing.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::actions::{ActionKind, ActionName, ActionOutput};
use crate::core::decision::ActionCall;
use crate::io::missing_log::MissingActionLog;

/// Flat parameter object of one action call.
pub type Params = Map<String, Value>;

/// A handler bound to a context type `C` (normally the per-subject session).
pub type Handler<C> = Box<dyn Fn(&mut C, &Params) -> Result<ActionOutput, ActionError>>;

/// Failure reported by a handler.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Missing, extra, or wrongly typed arguments.
    #[error("{0}")]
    Parameters(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::Parameters(err.to_string())
    }
}

/// Why an action could not be carried out. Recovered locally, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("'{name}' not implemented")]
    NotImplemented { name: String },
    #[error("'{name}' parameter error: {message}")]
    Parameters { name: String, message: String },
    #[error("'{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// Deserialize handler parameters into their typed contract.
pub fn parse_params<T: DeserializeOwned>(params: &Params) -> Result<T, ActionError> {
    Ok(serde_json::from_value(Value::Object(params.clone()))?)
}

pub struct FunctionRegistry<C> {
    handlers: BTreeMap<ActionKind, Handler<C>>,
    missing: MissingActionLog,
}

impl<C> FunctionRegistry<C> {
    pub fn new(missing: MissingActionLog) -> Self {
        Self {
            handlers: BTreeMap::new(),
            missing,
        }
    }

    /// Bind `handler` to `kind`. A later registration for the same kind replaces the earlier one.
    pub fn register<F>(&mut self, kind: ActionKind, handler: F)
    where
        F: Fn(&mut C, &Params) -> Result<ActionOutput, ActionError> + 'static,
    {
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            debug!(action = %kind, "replaced action handler");
        } else {
            debug!(action = %kind, "registered action handler");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        match ActionName::parse(name) {
            ActionName::Known(kind) => self.handlers.contains_key(&kind),
            ActionName::Unknown(_) => false,
        }
    }

    /// Registered kinds in vocabulary order.
    pub fn registered(&self) -> Vec<ActionKind> {
        self.handlers.keys().copied().collect()
    }

    /// Run the action called `name` against `ctx`.
    pub fn execute(
        &mut self,
        name: &str,
        params: &Params,
        ctx: &mut C,
    ) -> Result<ActionOutput, DispatchError> {
        let handler = match ActionName::parse(name) {
            ActionName::Known(kind) => self.handlers.get(&kind),
            ActionName::Unknown(_) => None,
        };
        let Some(handler) = handler else {
            self.record_missing(name);
            return Err(DispatchError::NotImplemented {
                name: name.to_string(),
            });
        };

        debug!(action = name, params = params.len(), "dispatching action");
        match catch_unwind(AssertUnwindSafe(|| handler(ctx, params))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(ActionError::Parameters(message))) => Err(DispatchError::Parameters {
                name: name.to_string(),
                message,
            }),
            Ok(Err(ActionError::Failed(err))) => Err(DispatchError::Failed {
                name: name.to_string(),
                message: format!("{err:#}"),
            }),
            Err(_) => Err(DispatchError::Failed {
                name: name.to_string(),
                message: "handler panicked".to_string(),
            }),
        }
    }

    /// Run a decoded oracle call. Parameters that were not an object fail
    /// this call only; unimplemented names are still counted as missing.
    pub fn dispatch(
        &mut self,
        call: &ActionCall,
        ctx: &mut C,
    ) -> Result<ActionOutput, DispatchError> {
        match &call.invalid_params {
            Some(value) if self.is_registered(&call.name) => Err(DispatchError::Parameters {
                name: call.name.clone(),
                message: format!("params must be an object, got {}", json_type(value)),
            }),
            _ => self.execute(&call.name, &call.params, ctx),
        }
    }

    fn record_missing(&mut self, name: &str) {
        match self.missing.record(name) {
            Ok(count) => warn!(action = name, count, "missing action (logged)"),
            Err(err) => {
                warn!(action = name, error = %format!("{err:#}"), "missing action (could not log)");
            }
        }
    }

    pub fn missing(&self) -> &MissingActionLog {
        &self.missing
    }

    pub fn missing_mut(&mut self) -> &mut MissingActionLog {
        &mut self.missing
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
