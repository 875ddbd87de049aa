//! Normalization of source locators requested by the oracle.
//!
//! The oracle often names pages relative to the company website (`/about`) or
//! without a scheme (`acme.example/team`). Citations must point at the page
//! that was actually fetched, so both forms are resolved against the subject
//! website. Handles such as `LinkedIn: Acme` pass through untouched.

use url::Url;

/// Absolute URL for the subject website, adding `https://` when the scheme is missing.
pub fn base_url(website: &str) -> Option<Url> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }
    Url::parse(website)
        .ok()
        .filter(|url| url.has_host())
        .or_else(|| Url::parse(&format!("https://{website}")).ok())
}

/// Resolve `raw` against the subject website where that is meaningful.
pub fn resolve_locator(raw: &str, website: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || Url::parse(raw).is_ok_and(|url| url.has_host()) {
        return raw.to_string();
    }
    if is_relative_path(raw)
        && let Some(base) = base_url(website)
        && let Ok(joined) = base.join(raw)
    {
        return joined.to_string();
    }
    if looks_like_host(raw)
        && let Ok(url) = Url::parse(&format!("https://{raw}"))
    {
        return url.to_string();
    }
    raw.to_string()
}

fn is_relative_path(raw: &str) -> bool {
    raw.starts_with('/') || raw.starts_with("./") || raw.starts_with("../")
}

fn looks_like_host(raw: &str) -> bool {
    if raw.contains(char::is_whitespace) || raw.contains("://") {
        return false;
    }
    let host = raw.split('/').next().unwrap_or_default();
    host.contains('.') && !host.starts_with('.') && !host.ends_with('.')
}
