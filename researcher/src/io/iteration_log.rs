//! Per-iteration records under `<output>/iterations/<subject>/<n>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::actions::ActionOutput;
use crate::core::decision::{ActionCall, Decision, DispatchPhase};
use crate::core::facts::FactCounts;
use crate::io::prompt::DecisionPrompt;
use crate::registry::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Continue,
    Complete,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub subject: String,
    pub iteration: u32,
    pub status: IterationStatus,
    pub dispatched: usize,
    pub failed: usize,
    pub error: Option<String>,
    pub counts: FactCounts,
    pub started_at: String,
    pub duration_ms: u64,
}

/// One dispatched action and what came of it.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub phase: DispatchPhase,
    #[serde(flatten)]
    pub call: ActionCall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ActionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
}

impl DispatchRecord {
    pub fn new(
        phase: DispatchPhase,
        call: &ActionCall,
        result: &Result<ActionOutput, DispatchError>,
    ) -> Self {
        let (output, error) = match result {
            Ok(output) => (Some(output.clone()), None),
            Err(err) => (None, Some(err.clone())),
        };
        Self {
            phase,
            call: call.clone(),
            output,
            error,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub prompt_path: PathBuf,
    pub response_path: PathBuf,
    pub decision_path: PathBuf,
    pub dispatch_path: PathBuf,
}

impl IterationPaths {
    pub fn new(root: &Path, subject_slug: &str, iteration: u32) -> Self {
        let dir = root
            .join("iterations")
            .join(subject_slug)
            .join(iteration.to_string());
        Self {
            dir: dir.clone(),
            meta_path: dir.join("meta.json"),
            prompt_path: dir.join("prompt.md"),
            response_path: dir.join("response.txt"),
            decision_path: dir.join("decision.json"),
            dispatch_path: dir.join("dispatch.json"),
        }
    }
}

pub struct IterationWriteRequest<'a> {
    pub root: &'a Path,
    pub subject_slug: &'a str,
    pub meta: &'a IterationMeta,
    pub prompt: Option<&'a DecisionPrompt>,
    pub response: Option<&'a str>,
    pub decision: Option<&'a Decision>,
    pub dispatches: &'a [DispatchRecord],
}

/// Write every artifact that exists for the iteration. Absent ones are skipped.
pub fn write_iteration(request: &IterationWriteRequest<'_>) -> Result<IterationPaths> {
    let paths = IterationPaths::new(request.root, request.subject_slug, request.meta.iteration);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create iteration dir {}", paths.dir.display()))?;

    write_json(&paths.meta_path, request.meta)?;
    if let Some(prompt) = request.prompt {
        let rendered = format!(
            "<!-- system -->\n{}\n\n<!-- user -->\n{}\n",
            prompt.system.trim_end(),
            prompt.user.trim_end()
        );
        write_text(&paths.prompt_path, &rendered)?;
    }
    if let Some(response) = request.response {
        write_text(&paths.response_path, response)?;
    }
    if let Some(decision) = request.decision {
        write_json(&paths.decision_path, decision)?;
    }
    if !request.dispatches.is_empty() {
        write_json(&paths.dispatch_path, &request.dispatches)?;
    }

    Ok(paths)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_text(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::decision::DecisionStatus;
    use serde_json::json;

    fn meta(status: IterationStatus) -> IterationMeta {
        IterationMeta {
            subject: "Acme".to_string(),
            iteration: 2,
            status,
            dispatched: 2,
            failed: 1,
            error: None,
            counts: FactCounts::default(),
            started_at: "2026-01-01T00:00:00Z".to_string(),
            duration_ms: 12,
        }
    }

    #[test]
    fn iteration_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = IterationPaths::new(temp.path(), "Acme_Dental", 3);

        assert!(paths.dir.ends_with(Path::new("iterations/Acme_Dental/3")));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.prompt_path.ends_with("prompt.md"));
        assert!(paths.response_path.ends_with("response.txt"));
        assert!(paths.decision_path.ends_with("decision.json"));
        assert!(paths.dispatch_path.ends_with("dispatch.json"));
    }

    #[test]
    fn writes_full_iteration() {
        let temp = tempfile::tempdir().expect("tempdir");
        let prompt = DecisionPrompt {
            system: "system text".to_string(),
            user: "user text".to_string(),
        };
        let save = ActionCall::new("save_contact", json!({"name": "Jane"}));
        let search = ActionCall::new("search_news", json!({}));
        let decision = Decision {
            relevant_facts: vec!["team page lists a CEO".to_string()],
            actions: vec![save.clone()],
            follow_up_actions: vec![search.clone()],
            status: DecisionStatus::Continue,
        };
        let dispatches = vec![
            DispatchRecord::new(
                DispatchPhase::Action,
                &save,
                &Ok(ActionOutput::Recorded {
                    facts: 1,
                    citation: None,
                }),
            ),
            DispatchRecord::new(
                DispatchPhase::FollowUp,
                &search,
                &Err(DispatchError::NotImplemented {
                    name: "search_news".to_string(),
                }),
            ),
        ];

        let paths = write_iteration(&IterationWriteRequest {
            root: temp.path(),
            subject_slug: "Acme",
            meta: &meta(IterationStatus::Continue),
            prompt: Some(&prompt),
            response: Some("{...}"),
            decision: Some(&decision),
            dispatches: &dispatches,
        })
        .expect("write");

        let prompt_text = fs::read_to_string(&paths.prompt_path).expect("read prompt");
        assert!(prompt_text.contains("system text"));
        assert!(prompt_text.contains("user text"));

        let dispatch: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.dispatch_path).expect("read"))
                .expect("parse");
        assert_eq!(dispatch[0]["function"], "save_contact");
        assert_eq!(dispatch[0]["output"]["outcome"], "recorded");
        assert_eq!(dispatch[1]["phase"], "follow_up");
        assert_eq!(dispatch[1]["error"]["error"], "not_implemented");
        assert!(dispatches[1].failed());
    }

    #[test]
    fn aborted_iteration_skips_missing_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut meta = meta(IterationStatus::Aborted);
        meta.error = Some("oracle timed out after 120s".to_string());

        let paths = write_iteration(&IterationWriteRequest {
            root: temp.path(),
            subject_slug: "Acme",
            meta: &meta,
            prompt: None,
            response: None,
            decision: None,
            dispatches: &[],
        })
        .expect("write");

        assert!(paths.meta_path.is_file());
        assert!(!paths.response_path.exists());
        assert!(!paths.decision_path.exists());
        assert!(!paths.dispatch_path.exists());
    }
}
