//! Per-subject fact store.
//!
//! Every collection is append-only: facts are stamped with provenance and a
//! creation time when added and are never edited afterwards. The store is a
//! pure data sink and accepts whatever its callers hand it; quality gates
//! (see [`crate::core::validation`]) live in the action handlers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::citations::{CitationId, CitationLedger};
use crate::core::subject::Subject;

/// One immutable, provenance-tagged data point.
///
/// Invariant: `source_locator` is `Some` exactly when `citation_id` is `Some`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact<T> {
    #[serde(flatten)]
    pub data: T,
    pub source: String,
    pub source_locator: Option<String>,
    pub citation_id: Option<CitationId>,
    pub added_at: DateTime<Utc>,
}

/// Where a fact came from: a free-text description plus an optional locator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub source: String,
    pub locator: Option<String>,
}

impl Provenance {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            locator: None,
        }
    }

    /// Attach a locator; blank locators are treated as absent.
    pub fn at(mut self, locator: Option<&str>) -> Self {
        self.locator = locator
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PainPoint {
    pub description: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Technology {
    #[serde(rename = "technology")]
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub url: String,
    pub person_name: String,
    pub context: String,
    /// Where the image was stored, when it was downloaded.
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Homepage,
    Webpage,
    Social,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Homepage => "homepage",
            SourceKind::Webpage => "webpage",
            SourceKind::Social => "social",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExploredSource {
    pub location: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Leading slice of the fetched page, shown to the oracle on later iterations.
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompanyDetail {
    pub key: String,
    pub value: String,
}

/// All facts collected for one subject.
#[derive(Debug, Clone)]
pub struct FactStore {
    subject: Subject,
    contacts: Vec<Fact<Contact>>,
    pain_points: Vec<Fact<PainPoint>>,
    technologies: Vec<Fact<Technology>>,
    news: Vec<Fact<NewsItem>>,
    images: Vec<Fact<ImageRecord>>,
    explored_sources: Vec<Fact<ExploredSource>>,
    company_details: Vec<Fact<CompanyDetail>>,
    citations: CitationLedger,
    iteration_count: u32,
    started_at: DateTime<Utc>,
}

impl FactStore {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            contacts: Vec::new(),
            pain_points: Vec::new(),
            technologies: Vec::new(),
            news: Vec::new(),
            images: Vec::new(),
            explored_sources: Vec::new(),
            company_details: Vec::new(),
            citations: CitationLedger::new(),
            iteration_count: 0,
            started_at: Utc::now(),
        }
    }

    fn stamp<T>(&mut self, data: T, provenance: Provenance) -> Fact<T> {
        let citation_id = self.citations.resolve(provenance.locator.as_deref());
        Fact {
            data,
            source: provenance.source,
            source_locator: provenance.locator,
            citation_id,
            added_at: Utc::now(),
        }
    }

    pub fn add_contact(&mut self, contact: Contact, provenance: Provenance) -> Option<CitationId> {
        let fact = self.stamp(contact, provenance);
        let id = fact.citation_id;
        self.contacts.push(fact);
        id
    }

    pub fn add_pain_point(
        &mut self,
        pain_point: PainPoint,
        provenance: Provenance,
    ) -> Option<CitationId> {
        let fact = self.stamp(pain_point, provenance);
        let id = fact.citation_id;
        self.pain_points.push(fact);
        id
    }

    pub fn add_technology(
        &mut self,
        technology: Technology,
        provenance: Provenance,
    ) -> Option<CitationId> {
        let fact = self.stamp(technology, provenance);
        let id = fact.citation_id;
        self.technologies.push(fact);
        id
    }

    pub fn add_news(&mut self, item: NewsItem, provenance: Provenance) -> Option<CitationId> {
        let fact = self.stamp(item, provenance);
        let id = fact.citation_id;
        self.news.push(fact);
        id
    }

    pub fn add_image(&mut self, image: ImageRecord, provenance: Provenance) -> Option<CitationId> {
        let fact = self.stamp(image, provenance);
        let id = fact.citation_id;
        self.images.push(fact);
        id
    }

    pub fn add_company_detail(
        &mut self,
        detail: CompanyDetail,
        provenance: Provenance,
    ) -> Option<CitationId> {
        let fact = self.stamp(detail, provenance);
        let id = fact.citation_id;
        self.company_details.push(fact);
        id
    }

    /// Track an explored source. Explored sources never take part in citations.
    pub fn add_explored_source(
        &mut self,
        location: &str,
        kind: SourceKind,
        excerpt: Option<String>,
    ) {
        self.explored_sources.push(Fact {
            data: ExploredSource {
                location: location.to_string(),
                kind,
                excerpt,
            },
            source: String::new(),
            source_locator: None,
            citation_id: None,
            added_at: Utc::now(),
        });
    }

    /// Advance the iteration counter. The loop controller calls this exactly once per pass.
    pub fn increment_iteration(&mut self) {
        self.iteration_count += 1;
    }

    /// Borrowed view of the full current state.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            company: &self.subject,
            contacts: &self.contacts,
            pain_points: &self.pain_points,
            tech_stack: &self.technologies,
            news: &self.news,
            images: &self.images,
            sources_explored: &self.explored_sources,
            company_details: &self.company_details,
            metadata: SnapshotMetadata {
                started_at: self.started_at,
                iterations: self.iteration_count,
                citations: self.citations.len(),
            },
        }
    }

    pub fn counts(&self) -> FactCounts {
        FactCounts {
            contacts: self.contacts.len(),
            pain_points: self.pain_points.len(),
            technologies: self.technologies.len(),
            news: self.news.len(),
            images: self.images.len(),
            sources_explored: self.explored_sources.len(),
            citations: self.citations.len(),
            iterations: self.iteration_count,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn contacts(&self) -> &[Fact<Contact>] {
        &self.contacts
    }

    pub fn pain_points(&self) -> &[Fact<PainPoint>] {
        &self.pain_points
    }

    pub fn technologies(&self) -> &[Fact<Technology>] {
        &self.technologies
    }

    pub fn news(&self) -> &[Fact<NewsItem>] {
        &self.news
    }

    pub fn images(&self) -> &[Fact<ImageRecord>] {
        &self.images
    }

    pub fn explored_sources(&self) -> &[Fact<ExploredSource>] {
        &self.explored_sources
    }

    pub fn company_details(&self) -> &[Fact<CompanyDetail>] {
        &self.company_details
    }

    pub fn citations(&self) -> &CitationLedger {
        &self.citations
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Read-only view handed to the decision oracle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<'a> {
    pub company: &'a Subject,
    pub contacts: &'a [Fact<Contact>],
    pub pain_points: &'a [Fact<PainPoint>],
    pub tech_stack: &'a [Fact<Technology>],
    pub news: &'a [Fact<NewsItem>],
    pub images: &'a [Fact<ImageRecord>],
    pub sources_explored: &'a [Fact<ExploredSource>],
    pub company_details: &'a [Fact<CompanyDetail>],
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SnapshotMetadata {
    pub started_at: DateTime<Utc>,
    pub iterations: u32,
    pub citations: usize,
}

/// Collection sizes, used for progress logging and the batch summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FactCounts {
    pub contacts: usize,
    pub pain_points: usize,
    pub technologies: usize,
    pub news: usize,
    pub images: usize,
    pub sources_explored: usize,
    pub citations: usize,
    pub iterations: u32,
}

impl fmt::Display for FactCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contacts={} pain_points={} technologies={} news={} images={} sources={} citations={} iterations={}",
            self.contacts,
            self.pain_points,
            self.technologies,
            self.news,
            self.images,
            self.sources_explored,
            self.citations,
            self.iterations
        )
    }
}
