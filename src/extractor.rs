//! Turning result-page payloads into structured leads.
//!
//! Extraction is an injected dependency: the runner only relies on the
//! [`ResultExtractor`] contract, so parsing logic can change without
//! touching the execution engine.

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::ExtractionError;

/// One structured record extracted from a result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    /// Target URL.
    pub url: String,
    /// Result title.
    pub title: String,
    /// Result snippet, possibly empty.
    pub snippet: String,
    /// Host part of `url`.
    pub domain: String,
}

impl Lead {
    /// Creates a lead, deriving `domain` from the URL host.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let domain = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
            .unwrap_or_default();
        Self {
            url,
            title: title.into(),
            snippet: snippet.into(),
            domain,
        }
    }
}

/// Converts a raw result-page payload into leads.
///
/// Implementations must be pure and must fail on unparseable input
/// instead of returning partial results.
pub trait ResultExtractor: Send + Sync {
    /// Extracts leads from `payload`.
    fn extract(&self, payload: &str) -> Result<Vec<Lead>, ExtractionError>;
}

/// Adapts a closure into a [`ResultExtractor`].
pub struct FnExtractor<F> {
    f: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(&str) -> Result<Vec<Lead>, ExtractionError> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ResultExtractor for FnExtractor<F>
where
    F: Fn(&str) -> Result<Vec<Lead>, ExtractionError> + Send + Sync,
{
    fn extract(&self, payload: &str) -> Result<Vec<Lead>, ExtractionError> {
        (self.f)(payload)
    }
}

/// Markers of bot-check pages served instead of results.
const BLOCK_MARKERS: &[&str] = &["/sorry/index", "recaptcha", "unusual traffic from your computer"];

/// Extracts organic results from a Google-style HTML result page.
#[derive(Debug, Clone, Default)]
pub struct HtmlLeadExtractor;

impl HtmlLeadExtractor {
    /// Creates the extractor.
    pub fn new() -> Self {
        Self
    }
}

impl ResultExtractor for HtmlLeadExtractor {
    fn extract(&self, payload: &str) -> Result<Vec<Lead>, ExtractionError> {
        if payload.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }

        let lower = payload.to_lowercase();
        if !lower.contains("<html") && !lower.contains("<body") {
            return Err(ExtractionError::Malformed("payload is not an HTML document".into()));
        }
        if BLOCK_MARKERS.iter().any(|m| lower.contains(m)) {
            return Err(ExtractionError::Blocked);
        }

        let document = Html::parse_document(payload);
        let container_selector = selector("div.g")?;
        let title_selector = selector("h3")?;
        let link_selector = selector("a[href]")?;
        let snippet_selector = selector("div[data-sncf], div.VwiC3b")?;

        let mut seen = HashSet::new();
        let mut leads = Vec::new();

        for element in document.select(&container_selector) {
            let title = match element.select(&title_selector).next() {
                Some(el) => el.text().collect::<String>().trim().to_string(),
                None => continue,
            };

            let url = match element.select(&link_selector).next() {
                Some(el) => match resolve_href(el.value().attr("href").unwrap_or_default()) {
                    Some(url) => url,
                    None => continue,
                },
                None => continue,
            };

            let snippet = element
                .select(&snippet_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            if !title.is_empty() && seen.insert(url.clone()) {
                leads.push(Lead::new(url, title, snippet));
            }
        }

        Ok(leads)
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css)
        .map_err(|e| ExtractionError::Malformed(format!("Failed to parse selector: {:?}", e)))
}

/// Returns the external target of a result link, unwrapping `/url?q=`
/// redirects. Internal links yield `None`.
fn resolve_href(href: &str) -> Option<String> {
    if let Some(rest) = href.strip_prefix("/url?q=") {
        let target = rest.split('&').next().unwrap_or(rest);
        let decoded = urlencoding::decode(target).ok()?;
        return Some(decoded.into_owned()).filter(|u| u.starts_with("http"));
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    None
}
