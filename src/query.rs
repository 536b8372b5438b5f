//! Search queries and the niche-driven query generator.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{DorkError, Result};

/// Placeholder substituted with the niche term in every template.
pub const NICHE_PLACEHOLDER: &str = "{niche}";

/// Templates used when none are configured.
pub const DEFAULT_TEMPLATES: &[&str] = &[
    r#"site:{niche} "affiliate program" -pinterest"#,
    r#"site:{niche} "become an affiliate" -pinterest"#,
    r#"site:{niche} "affiliate partners" -pinterest"#,
    "site:{niche} inurl:affiliate intitle:program",
];

/// One search request to issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The search terms sent to the engine.
    pub text: String,
    /// Niche the query was generated from.
    pub niche: String,
    /// Zero-based position in the generated sequence.
    pub position: usize,
}

impl Query {
    /// Creates a query.
    pub fn new(text: impl Into<String>, niche: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            niche: niche.into(),
            position,
        }
    }
}

/// Derives a fixed, ordered set of queries from a niche term.
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    templates: Vec<String>,
}

impl QueryGenerator {
    /// Creates a generator with the default affiliate-program templates.
    pub fn new() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Creates a generator with custom templates.
    ///
    /// Every template must contain [`NICHE_PLACEHOLDER`].
    pub fn with_templates<I, S>(templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let templates: Vec<String> = templates.into_iter().map(Into::into).collect();
        if templates.is_empty() {
            return Err(DorkError::InvalidTemplate("no templates given".into()));
        }
        if let Some(bad) = templates.iter().find(|t| !t.contains(NICHE_PLACEHOLDER)) {
            return Err(DorkError::InvalidTemplate(format!(
                "'{}' has no {} placeholder",
                bad, NICHE_PLACEHOLDER
            )));
        }
        Ok(Self { templates })
    }

    /// Returns the templates in generation order.
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Generates one query per template, in template order.
    pub fn generate(&self, niche: &str) -> Result<Vec<Query>> {
        let niche = validate_niche(niche)?;
        Ok(self
            .templates
            .iter()
            .enumerate()
            .map(|(position, template)| {
                Query::new(template.replace(NICHE_PLACEHOLDER, niche), niche, position)
            })
            .collect())
    }
}

impl Default for QueryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn niche_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\p{L}\p{N}._-]+$").expect("valid niche pattern"))
}

fn validate_niche(niche: &str) -> Result<&str> {
    let niche = niche.trim();
    if niche.is_empty() {
        return Err(DorkError::InvalidNiche("niche cannot be empty".into()));
    }
    if !niche_pattern().is_match(niche) {
        return Err(DorkError::InvalidNiche(format!(
            "'{}' may only contain letters, digits, '.', '-' and '_'",
            niche
        )));
    }
    Ok(niche)
}
