//! Batch driver: research a list of subjects one at a time.
//!
//! Subjects are isolated from each other: each gets a fresh fact store and
//! citation ledger, and a failure becomes a `failed` entry in the summary
//! instead of stopping the batch. The missing-action log inside the registry
//! is the only state carried from one subject to the next.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::facts::FactCounts;
use crate::core::subject::Subject;
use crate::core::text::sanitize_filename;
use crate::io::oracle::Oracle;
use crate::io::report::write_report;
use crate::oracle::DecisionEngine;
use crate::registry::FunctionRegistry;
use crate::research::{IterationReport, ResearchSettings, ResearchStop, research_subject_as};
use crate::session::{Session, Tools};

/// File name of the batch summary inside the output directory.
pub const BATCH_SUMMARY_FILE: &str = "_batch_summary.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubjectResult {
    Succeeded {
        subject: String,
        stop: ResearchStop,
        counts: FactCounts,
        report: PathBuf,
    },
    Failed {
        subject: String,
        error: String,
    },
}

impl SubjectResult {
    pub fn subject(&self) -> &str {
        match self {
            SubjectResult::Succeeded { subject, .. } | SubjectResult::Failed { subject, .. } => {
                subject
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, SubjectResult::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub timestamp: DateTime<Utc>,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<SubjectResult>,
}

impl BatchSummary {
    fn from_results(results: Vec<SubjectResult>) -> Self {
        let successful = results.iter().filter(|r| r.succeeded()).count();
        Self {
            timestamp: Utc::now(),
            total_processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// File slugs that stay unique within one batch.
///
/// Names that sanitize to the same slug get `_2`, `_3`, ... appended so their
/// reports and iteration records do not overwrite each other.
#[derive(Debug, Default)]
struct FileSlugs {
    taken: HashSet<String>,
}

impl FileSlugs {
    fn claim(&mut self, name: &str) -> String {
        let base = sanitize_filename(name);
        let mut slug = base.clone();
        let mut suffix = 1;
        while !self.taken.insert(slug.clone()) {
            suffix += 1;
            slug = format!("{base}_{suffix}");
        }
        if slug != base {
            warn!(subject = name, slug = %slug, "file name already used in this batch");
        }
        slug
    }
}

/// Everything a batch needs besides the subjects.
pub struct Batch<'a, 't, O> {
    pub engine: &'a DecisionEngine<O>,
    pub registry: &'a mut FunctionRegistry<Session<'t>>,
    pub tools: Tools<'t>,
    pub settings: &'a ResearchSettings,
    /// Reports and the summary are written here.
    pub output_dir: &'a Path,
}

impl<O: Oracle> Batch<'_, '_, O> {
    /// Research every subject, then write the batch summary.
    ///
    /// Only a failure to write the summary itself is returned as an error.
    #[instrument(skip_all, fields(subjects = subjects.len()))]
    pub fn run<F>(&mut self, subjects: &[Subject], mut on_iteration: F) -> Result<BatchSummary>
    where
        F: FnMut(&str, &IterationReport),
    {
        let total = subjects.len();
        let mut results = Vec::with_capacity(total);
        let mut slugs = FileSlugs::default();
        for (index, subject) in subjects.iter().enumerate() {
            info!(index = index + 1, total, subject = %subject.name, "researching subject");
            let slug = slugs.claim(&subject.name);
            let result = self.run_one(subject, &slug, &mut on_iteration);
            match &result {
                SubjectResult::Succeeded { stop, counts, .. } => {
                    info!(subject = %subject.name, ?stop, %counts, "subject finished");
                }
                SubjectResult::Failed { error, .. } => {
                    warn!(subject = %subject.name, error = %error, "subject failed");
                }
            }
            results.push(result);
        }

        let summary = BatchSummary::from_results(results);
        let path = self.output_dir.join(BATCH_SUMMARY_FILE);
        write_summary(&path, &summary)?;
        info!(
            path = %path.display(),
            successful = summary.successful,
            failed = summary.failed,
            "batch summary written"
        );
        Ok(summary)
    }

    fn run_one<F>(&mut self, subject: &Subject, slug: &str, on_iteration: &mut F) -> SubjectResult
    where
        F: FnMut(&str, &IterationReport),
    {
        let name = subject.name.clone();
        let outcome = research_subject_as(
            subject.clone(),
            slug,
            self.engine,
            self.registry,
            self.tools,
            self.settings,
            |report| on_iteration(&name, report),
        );
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                return SubjectResult::Failed {
                    subject: name,
                    error: format!("{err:#}"),
                };
            }
        };

        match write_report(self.output_dir, slug, &outcome.facts, &outcome.stop) {
            Ok(report) => SubjectResult::Succeeded {
                subject: name,
                counts: outcome.facts.counts(),
                stop: outcome.stop,
                report,
            },
            Err(err) => SubjectResult::Failed {
                subject: name,
                error: format!("{err:#}"),
            },
        }
    }
}

/// Atomically write the summary (temp file + rename).
pub fn write_summary(path: &Path, summary: &BatchSummary) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("summary path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(summary).context("serialize batch summary")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp summary {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace summary {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_successes_and_failures() {
        let summary = BatchSummary::from_results(vec![
            SubjectResult::Succeeded {
                subject: "Acme".to_string(),
                stop: ResearchStop::Complete { iteration: 2 },
                counts: FactCounts::default(),
                report: PathBuf::from("Acme_INTELLIGENT_RESEARCH.md"),
            },
            SubjectResult::Failed {
                subject: String::new(),
                error: "invalid subject".to_string(),
            },
        ]);
        assert_eq!(summary.total_processed, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);

        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["results"][0]["status"], "succeeded");
        assert_eq!(json["results"][0]["stop"]["reason"], "complete");
        assert_eq!(json["results"][1]["status"], "failed");
    }

    #[test]
    fn colliding_names_get_distinct_slugs() {
        let mut slugs = FileSlugs::default();
        assert_eq!(slugs.claim("Acme Dental"), "Acme_Dental");
        assert_eq!(slugs.claim("Acme, Dental"), "Acme_Dental_2");
        assert_eq!(slugs.claim("Acme_Dental_2"), "Acme_Dental_2_2");
        assert_eq!(slugs.claim("Acme Dental!"), "Acme_Dental_3");
        assert_eq!(slugs.claim("Globex"), "Globex");
    }
}
