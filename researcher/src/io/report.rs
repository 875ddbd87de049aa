//! Markdown research report with footnote citations.
//!
//! Facts carrying a citation get a `[^n]` marker; all footnote definitions
//! live in one trailing `## Citations` section, one line per ledger entry in
//! ascending id order.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::core::citations::CitationId;
use crate::core::facts::{Fact, FactStore};
use crate::core::text::sanitize_filename;
use crate::research::ResearchStop;

/// `<sanitized name>_INTELLIGENT_RESEARCH.md`
pub fn report_file_name(subject_name: &str) -> String {
    format!("{}_INTELLIGENT_RESEARCH.md", sanitize_filename(subject_name))
}

/// Render and write the report into `dir`, named after `slug`.
pub fn write_report(
    dir: &Path,
    slug: &str,
    facts: &FactStore,
    stop: &ResearchStop,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let path = dir.join(report_file_name(slug));
    let report = render_report(facts, stop, Utc::now());
    fs::write(&path, report).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

fn marker<T>(fact: &Fact<T>) -> String {
    fact.citation_id
        .map(|id| format!("[^{id}]"))
        .unwrap_or_default()
}

/// Table-cell-safe text: pipes escaped, line breaks flattened.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn cited(text: &str, marker: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{}{marker}", cell(text))
    }
}

fn stop_line(stop: &ResearchStop) -> String {
    match stop {
        ResearchStop::Complete { iteration } => format!("complete after {iteration} iterations"),
        ResearchStop::BudgetExhausted { max_iterations } => {
            format!("stopped at the {max_iterations}-iteration budget")
        }
        ResearchStop::Aborted { iteration, error } => {
            format!("aborted on iteration {iteration}: {error}")
        }
    }
}

pub fn render_report(facts: &FactStore, stop: &ResearchStop, generated_at: DateTime<Utc>) -> String {
    let subject = facts.subject();
    let citations: BTreeMap<CitationId, String> = facts.citations().export();
    let mut out = String::new();

    let _ = writeln!(out, "# Intelligent Research Report: {}", subject.name);
    out.push('\n');
    let _ = writeln!(out, "**Generated:** {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "**Research Iterations:** {}", facts.iteration_count());
    let _ = writeln!(out, "**Outcome:** {}", stop_line(stop));
    let _ = writeln!(out, "**Citations Tracked:** {}", citations.len());
    out.push_str("\n---\n\n## Company Overview\n\n");
    let _ = writeln!(out, "- **Name:** {}", subject.name);
    for (label, value) in [
        ("Website", &subject.website),
        ("Address", &subject.address),
        ("Phone", &subject.phone),
    ] {
        if !value.trim().is_empty() {
            let _ = writeln!(out, "- **{label}:** {value}");
        }
    }
    for detail in facts.company_details() {
        let _ = writeln!(
            out,
            "- **{}:** {}{}",
            detail.data.key,
            detail.data.value,
            marker(detail)
        );
    }

    let contacts = facts.contacts();
    let _ = write!(out, "\n---\n\n## Contacts Identified ({})\n\n", contacts.len());
    if contacts.is_empty() {
        out.push_str("*No contacts identified during research.*\n");
    } else {
        out.push_str("| Name | Title | Email | Phone | Source |\n");
        out.push_str("|------|-------|-------|-------|--------|\n");
        for contact in contacts {
            let m = marker(contact);
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                cited(&contact.data.name, &m),
                cited(&contact.data.title, &m),
                cited(&contact.data.email, &m),
                cited(&contact.data.phone, &m),
                cell(&contact.source)
            );
        }
    }

    let pain_points = facts.pain_points();
    let _ = write!(out, "\n---\n\n## Pain Points Identified ({})\n\n", pain_points.len());
    if pain_points.is_empty() {
        out.push_str("*No pain points identified during research.*\n");
    } else {
        for (i, pain) in pain_points.iter().enumerate() {
            let m = marker(pain);
            let _ = writeln!(out, "### {}. {}{m}\n", i + 1, pain.data.description);
            if !pain.data.evidence.is_empty() {
                let _ = writeln!(out, "**Evidence:** {}{m}\n", pain.data.evidence);
            }
            let _ = writeln!(out, "**Source:** {}\n", pain.source);
        }
    }

    let technologies = facts.technologies();
    if !technologies.is_empty() {
        let _ = write!(out, "\n---\n\n## Technology Stack ({})\n\n", technologies.len());
        let mut by_category: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for tech in technologies {
            let category = match tech.data.category.as_str() {
                "" => "Other",
                category => category,
            };
            by_category.entry(category).or_default().push(tech);
        }
        for (category, items) in by_category {
            let _ = writeln!(out, "### {category}\n");
            for tech in items {
                let _ = writeln!(out, "- {}{}", tech.data.name, marker(tech));
            }
            out.push('\n');
        }
    }

    let news = facts.news();
    if !news.is_empty() {
        let _ = write!(out, "\n---\n\n## News ({})\n\n", news.len());
        for item in news {
            let date = if item.data.date.is_empty() {
                String::new()
            } else {
                format!(" ({})", item.data.date)
            };
            let _ = writeln!(out, "- **{}**{date}{}", item.data.title, marker(item));
            if !item.data.summary.is_empty() {
                let _ = writeln!(out, "  {}", item.data.summary);
            }
        }
    }

    let images = facts.images();
    if !images.is_empty() {
        let _ = write!(out, "\n---\n\n## Images ({})\n\n", images.len());
        for image in images {
            let who = if image.data.person_name.is_empty() {
                "Unknown"
            } else {
                image.data.person_name.as_str()
            };
            let saved = image
                .data
                .local_path
                .as_deref()
                .map(|p| format!(" (saved to `{p}`)"))
                .unwrap_or_default();
            let _ = writeln!(out, "- {who}: <{}>{saved}{}", image.data.url, marker(image));
        }
    }

    let sources = facts.explored_sources();
    if !sources.is_empty() {
        let _ = write!(out, "\n---\n\n## Sources Explored ({})\n\n", sources.len());
        for source in sources {
            let _ = writeln!(
                out,
                "- {} ({})",
                source.data.location,
                source.data.kind.as_str()
            );
        }
    }

    if !citations.is_empty() {
        out.push_str("\n---\n\n## Citations\n\n");
        for (id, locator) in &citations {
            let _ = writeln!(out, "[^{id}]: {locator}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::facts::{Contact, PainPoint, Provenance, SourceKind, Technology};
    use crate::core::subject::Subject;

    fn generated_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn populated() -> FactStore {
        let mut facts = FactStore::new(
            Subject::new("Acme Dental").with_website("https://acme.example"),
        );
        facts.increment_iteration();
        facts.add_explored_source("https://acme.example", SourceKind::Homepage, None);
        facts.add_contact(
            Contact {
                name: "Jane Doe".to_string(),
                title: "CEO".to_string(),
                ..Contact::default()
            },
            Provenance::new("team page").at(Some("https://acme.example/team")),
        );
        facts.add_pain_point(
            PainPoint {
                description: "Manual scheduling".to_string(),
                evidence: "Phone-only booking".to_string(),
            },
            Provenance::new("AI analysis").at(Some("https://acme.example/team")),
        );
        facts.add_technology(
            Technology {
                name: "WordPress".to_string(),
                category: String::new(),
            },
            Provenance::new("AI extraction").at(Some("https://acme.example/")),
        );
        facts
    }

    #[test]
    fn each_citation_appears_once_in_the_footnotes() {
        let report = render_report(
            &populated(),
            &ResearchStop::Complete { iteration: 1 },
            generated_at(),
        );

        assert!(report.contains("| Jane Doe[^1] | CEO[^1] |  |  | team page |"));
        assert!(report.contains("### 1. Manual scheduling[^1]"));
        assert!(report.contains("### Other\n\n- WordPress[^2]"));
        let footnotes = report.split("## Citations").nth(1).expect("citations section");
        assert_eq!(footnotes.matches("[^1]:").count(), 1);
        assert!(footnotes.contains("[^1]: https://acme.example/team"));
        assert!(footnotes.contains("[^2]: https://acme.example/"));
        assert_eq!(report.matches("## Citations").count(), 1);
    }

    #[test]
    fn empty_store_renders_placeholders_without_citations() {
        let facts = FactStore::new(Subject::new("Acme"));
        let report = render_report(
            &facts,
            &ResearchStop::Aborted {
                iteration: 1,
                error: "oracle timed out after 120s".to_string(),
            },
            generated_at(),
        );
        assert!(report.contains("*No contacts identified during research.*"));
        assert!(report.contains("aborted on iteration 1: oracle timed out after 120s"));
        assert!(!report.contains("## Citations"));
        assert!(!report.contains("**Website:**"));
    }

    #[test]
    fn table_cells_escape_pipes() {
        let mut facts = FactStore::new(Subject::new("Acme"));
        facts.add_contact(
            Contact {
                name: "Sales | Support".to_string(),
                ..Contact::default()
            },
            Provenance::new("footer"),
        );
        let report = render_report(
            &facts,
            &ResearchStop::BudgetExhausted { max_iterations: 3 },
            generated_at(),
        );
        assert!(report.contains("| Sales \\| Support |"));
    }

    #[test]
    fn writes_report_under_sanitized_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_report(
            temp.path(),
            "Acme Dental",
            &populated(),
            &ResearchStop::Complete { iteration: 1 },
        )
        .expect("write");
        assert!(path.ends_with("Acme_Dental_INTELLIGENT_RESEARCH.md"));
        assert!(fs::read_to_string(path).expect("read").contains("# Intelligent Research Report: Acme Dental"));
    }
}
