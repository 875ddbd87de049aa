//! Research loop for one subject.
//!
//! Each pass consults the oracle with the full current fact snapshot,
//! dispatches every requested action (recording actions first, then
//! follow-ups), and stops when the oracle reports the profile complete, when
//! the iteration budget runs out, or when no usable decision can be obtained.
//! Action failures are logged and never stop the loop.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::decision::{Decision, DecisionStatus};
use crate::core::facts::{FactCounts, FactStore, SourceKind};
use crate::core::subject::Subject;
use crate::core::text::sanitize_filename;
use crate::io::iteration_log::{
    DispatchRecord, IterationMeta, IterationStatus, IterationWriteRequest, write_iteration,
};
use crate::io::oracle::Oracle;
use crate::io::prompt::DecisionPrompt;
use crate::oracle::{Consultation, DecisionEngine};
use crate::registry::FunctionRegistry;
use crate::session::{Session, Tools};

/// Why [`research_subject`] stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ResearchStop {
    /// The oracle reported `complete` on this iteration.
    Complete { iteration: u32 },
    /// Every allowed iteration ran without a `complete` status.
    BudgetExhausted { max_iterations: u32 },
    /// No usable decision on this iteration; facts gathered so far are kept.
    Aborted { iteration: u32, error: String },
}

#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub max_iterations: u32,
    /// Root for iteration records; `None` disables them.
    pub record_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ResearchOutcome {
    pub facts: FactStore,
    pub stop: ResearchStop,
}

/// Progress summary handed to the observer after every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub iteration: u32,
    pub max_iterations: u32,
    /// `None` when the iteration aborted.
    pub status: Option<DecisionStatus>,
    pub relevant_facts: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub counts: FactCounts,
}

/// Research `subject` until completion, budget exhaustion, or abort.
///
/// Returns `Err` only when the subject itself is unusable (blank name).
pub fn research_subject<'t, O, F>(
    subject: Subject,
    engine: &DecisionEngine<O>,
    registry: &mut FunctionRegistry<Session<'t>>,
    tools: Tools<'t>,
    settings: &ResearchSettings,
    on_iteration: F,
) -> Result<ResearchOutcome>
where
    O: Oracle,
    F: FnMut(&IterationReport),
{
    let slug = sanitize_filename(&subject.name);
    research_subject_as(subject, &slug, engine, registry, tools, settings, on_iteration)
}

/// [`research_subject`] with iteration records filed under `slug`.
#[instrument(skip_all, fields(subject = %subject.name, slug = %slug))]
pub fn research_subject_as<'t, O, F>(
    subject: Subject,
    slug: &str,
    engine: &DecisionEngine<O>,
    registry: &mut FunctionRegistry<Session<'t>>,
    tools: Tools<'t>,
    settings: &ResearchSettings,
    mut on_iteration: F,
) -> Result<ResearchOutcome>
where
    O: Oracle,
    F: FnMut(&IterationReport),
{
    subject.validate().context("invalid subject")?;
    let name = subject.name.clone();

    let mut session = Session::new(FactStore::new(subject), tools);
    if let Some(homepage) = session.facts().subject().homepage() {
        let homepage = session.resolve_url(homepage);
        session
            .facts_mut()
            .add_explored_source(&homepage, SourceKind::Homepage, None);
    }
    info!(max_iterations = settings.max_iterations, "starting research");

    for iteration in 1..=settings.max_iterations {
        let started = Instant::now();
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        session.facts_mut().increment_iteration();
        info!(iteration, max_iterations = settings.max_iterations, "iteration started");

        let Consultation {
            prompt,
            response,
            decision,
        } = engine.consult(&session.facts().snapshot());

        let decision = match decision {
            Ok(decision) => decision,
            Err(err) => {
                warn!(iteration, error = %err, "no usable decision, aborting subject");
                let record = Record {
                    prompt: prompt.as_ref(),
                    response: response.as_deref(),
                    decision: None,
                    dispatches: &[],
                };
                let meta = IterationMeta {
                    subject: name.clone(),
                    iteration,
                    status: IterationStatus::Aborted,
                    dispatched: 0,
                    failed: 0,
                    error: Some(err.to_string()),
                    counts: session.facts().counts(),
                    started_at,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                save_record(settings, slug, &meta, &record);
                on_iteration(&IterationReport {
                    iteration,
                    max_iterations: settings.max_iterations,
                    status: None,
                    relevant_facts: 0,
                    dispatched: 0,
                    failed: 0,
                    counts: meta.counts,
                });
                return Ok(ResearchOutcome {
                    facts: session.into_facts(),
                    stop: ResearchStop::Aborted {
                        iteration,
                        error: err.to_string(),
                    },
                });
            }
        };

        let dispatches = dispatch_all(&decision, registry, &mut session);
        let failed = dispatches.iter().filter(|d| d.failed()).count();
        let counts = session.facts().counts();
        info!(
            iteration,
            status = ?decision.status,
            dispatched = dispatches.len(),
            failed,
            %counts,
            "iteration finished"
        );

        let meta = IterationMeta {
            subject: name.clone(),
            iteration,
            status: if decision.is_complete() {
                IterationStatus::Complete
            } else {
                IterationStatus::Continue
            },
            dispatched: dispatches.len(),
            failed,
            error: None,
            counts,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let record = Record {
            prompt: prompt.as_ref(),
            response: response.as_deref(),
            decision: Some(&decision),
            dispatches: &dispatches,
        };
        save_record(settings, slug, &meta, &record);
        on_iteration(&IterationReport {
            iteration,
            max_iterations: settings.max_iterations,
            status: Some(decision.status),
            relevant_facts: decision.relevant_facts.len(),
            dispatched: dispatches.len(),
            failed,
            counts,
        });

        if decision.is_complete() {
            info!(iteration, "oracle reports research complete");
            return Ok(ResearchOutcome {
                facts: session.into_facts(),
                stop: ResearchStop::Complete { iteration },
            });
        }
    }

    info!(max_iterations = settings.max_iterations, "iteration budget exhausted");
    Ok(ResearchOutcome {
        facts: session.into_facts(),
        stop: ResearchStop::BudgetExhausted {
            max_iterations: settings.max_iterations,
        },
    })
}

fn dispatch_all<'t>(
    decision: &Decision,
    registry: &mut FunctionRegistry<Session<'t>>,
    session: &mut Session<'t>,
) -> Vec<DispatchRecord> {
    decision
        .planned()
        .map(|(phase, call)| {
            let result = registry.dispatch(call, session);
            if let Err(err) = &result {
                warn!(action = %call.name, error = %err, "action failed");
            }
            DispatchRecord::new(phase, call, &result)
        })
        .collect()
}

struct Record<'a> {
    prompt: Option<&'a DecisionPrompt>,
    response: Option<&'a str>,
    decision: Option<&'a Decision>,
    dispatches: &'a [DispatchRecord],
}

/// Iteration records are diagnostics; failing to write one never stops research.
fn save_record(settings: &ResearchSettings, slug: &str, meta: &IterationMeta, record: &Record<'_>) {
    let Some(root) = &settings.record_dir else {
        return;
    };
    let request = IterationWriteRequest {
        root,
        subject_slug: slug,
        meta,
        prompt: record.prompt,
        response: record.response,
        decision: record.decision,
        dispatches: record.dispatches,
    };
    if let Err(err) = write_iteration(&request) {
        warn!(iteration = meta.iteration, error = %format!("{err:#}"), "could not write iteration record");
    }
}
