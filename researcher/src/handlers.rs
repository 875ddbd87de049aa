//! Built-in action handlers.
//!
//! Every handler receives the subject's [`Session`]. Facts are cited to the
//! explicit `source_url` when one is given and to the session's inherited
//! locator (the page explored most recently) otherwise.
//!
//! `search_linkedin` and `search_news` are deliberately left unregistered so
//! that demand for them shows up in the missing-action log.

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::core::actions::{
    ActionKind, ActionOutput, DownloadImageParams, ExplorePageParams, ExtractTechStackParams,
    SaveCompanyInfoParams, SaveContactParams, SaveNewsParams, SavePainPointParams,
};
use crate::core::citations::CitationId;
use crate::core::facts::{
    CompanyDetail, Contact, ImageRecord, NewsItem, PainPoint, Provenance, SourceKind, Technology,
};
use crate::core::text::truncate_on_char_boundary;
use crate::core::validation::validate_contact;
use crate::registry::{ActionError, FunctionRegistry, Params, parse_params};
use crate::session::Session;

type HandlerResult = Result<ActionOutput, ActionError>;

/// Register every built-in handler.
pub fn register_defaults(registry: &mut FunctionRegistry<Session<'_>>) {
    registry.register(ActionKind::SaveContact, save_contact);
    registry.register(ActionKind::SavePainPoint, save_pain_point);
    registry.register(ActionKind::ExtractTechStack, extract_tech_stack);
    registry.register(ActionKind::SaveNews, save_news);
    registry.register(ActionKind::DownloadImage, download_image);
    registry.register(ActionKind::ExplorePage, explore_page);
    registry.register(ActionKind::SaveCompanyInfo, save_company_info);
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn source_or(value: Option<String>, fallback: &str) -> String {
    let value = trimmed(value);
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn recorded(citation: Option<CitationId>) -> ActionOutput {
    ActionOutput::Recorded { facts: 1, citation }
}

pub fn save_contact(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: SaveContactParams = parse_params(params)?;
    let contact = Contact {
        name: trimmed(p.name),
        title: trimmed(p.title),
        email: trimmed(p.email),
        phone: trimmed(p.phone),
    };
    if let Err(rejection) = validate_contact(&contact.name, &contact.email) {
        info!(phone = %contact.phone, reason = %rejection, "contact rejected");
        return Ok(rejection.into());
    }

    let locator = session.citation_locator(p.source_url.as_deref());
    let source = source_or(p.source, "AI analysis");
    debug!(name = %contact.name, email = %contact.email, "saving contact");
    let citation = session
        .facts_mut()
        .add_contact(contact, Provenance::new(source).at(locator.as_deref()));
    Ok(recorded(citation))
}

pub fn save_pain_point(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: SavePainPointParams = parse_params(params)?;
    let description = p.description.trim().to_string();
    if description.is_empty() {
        return Err(ActionError::Parameters("description must not be blank".to_string()));
    }
    let locator = session.citation_locator(p.source_url.as_deref());
    let citation = session.facts_mut().add_pain_point(
        PainPoint {
            description,
            evidence: trimmed(p.evidence),
        },
        Provenance::new(source_or(p.source, "AI analysis")).at(locator.as_deref()),
    );
    Ok(recorded(citation))
}

pub fn extract_tech_stack(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: ExtractTechStackParams = parse_params(params)?;
    let locator = session.citation_locator(p.source_url.as_deref());
    let category = trimmed(p.category);
    let source = source_or(p.source, "AI extraction");

    let mut facts = 0;
    let mut citation = None;
    for name in p.technologies.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        citation = session.facts_mut().add_technology(
            Technology {
                name: name.to_string(),
                category: category.clone(),
            },
            Provenance::new(source.clone()).at(locator.as_deref()),
        );
        facts += 1;
    }
    Ok(ActionOutput::Recorded { facts, citation })
}

pub fn save_news(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: SaveNewsParams = parse_params(params)?;
    let title = p.title.trim().to_string();
    if title.is_empty() {
        return Err(ActionError::Parameters("title must not be blank".to_string()));
    }
    let locator = session.citation_locator(p.url.as_deref());
    let citation = session.facts_mut().add_news(
        NewsItem {
            title,
            summary: trimmed(p.summary),
            date: trimmed(p.date),
        },
        Provenance::new(source_or(p.source, "AI analysis")).at(locator.as_deref()),
    );
    Ok(recorded(citation))
}

/// Download an image and record it. A failed download records nothing.
pub fn download_image(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: DownloadImageParams = parse_params(params)?;
    if p.url.trim().is_empty() {
        return Err(ActionError::Parameters("url must not be blank".to_string()));
    }
    let url = session.resolve_url(&p.url);
    let subject = session.facts().subject().name.clone();

    let local_path = session.tools().images.store(&url, &subject)?;
    let locator = session.current_locator().map(str::to_string);
    let citation = session.facts_mut().add_image(
        ImageRecord {
            url,
            person_name: trimmed(p.person_name),
            context: trimmed(p.context),
            local_path: local_path.map(|path| path.display().to_string()),
        },
        Provenance::new("image").at(locator.as_deref()),
    );
    Ok(recorded(citation))
}

/// Fetch a page and make it the inherited citation source.
///
/// On failure the inherited locator is left as it was.
pub fn explore_page(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: ExplorePageParams = parse_params(params)?;
    if p.url.trim().is_empty() {
        return Err(ActionError::Parameters("url must not be blank".to_string()));
    }
    let url = session.resolve_url(&p.url);
    let reason = trimmed(p.reason);
    let tools = session.tools();

    let page = match tools.explorer.explore(&url, &reason) {
        Ok(page) => page,
        Err(err) => {
            warn!(url = %url, error = %format!("{err:#}"), "exploration failed");
            return Err(ActionError::Failed(err.context(format!("explore {url}"))));
        }
    };
    if page.content.trim().is_empty() {
        return Err(ActionError::Failed(anyhow!("explore {url}: page is empty")));
    }

    let bytes = page.content.len();
    let excerpt = truncate_on_char_boundary(&page.content, tools.excerpt_bytes).to_string();
    session.set_current_locator(url.clone());
    session
        .facts_mut()
        .add_explored_source(&url, SourceKind::Webpage, Some(excerpt));
    info!(url = %url, bytes, cached = page.cached, "page explored");
    Ok(ActionOutput::Explored {
        url,
        bytes,
        cached: page.cached,
    })
}

pub fn save_company_info(session: &mut Session<'_>, params: &Params) -> HandlerResult {
    let p: SaveCompanyInfoParams = parse_params(params)?;
    let key = p.key.trim().to_string();
    if key.is_empty() {
        return Err(ActionError::Parameters("key must not be blank".to_string()));
    }
    let locator = session.citation_locator(p.source_url.as_deref());
    let citation = session.facts_mut().add_company_detail(
        CompanyDetail {
            key,
            value: p.value.trim().to_string(),
        },
        Provenance::new(source_or(p.source, "AI analysis")).at(locator.as_deref()),
    );
    Ok(recorded(citation))
}
