//! Monograph index page extractor
//!
//! Two pure stages over raw markup text, no document tree:
//! 1. scan every link target ending in the document extension and rank the
//!    candidates (language tokens, canonical domain);
//! 2. if a link was found, look for a labeled revision date.
//!
//! Malformed markup never fails; it yields an empty result.

use regex::Regex;
use tracing::debug;
use url::Url;

use super::config::MonographParsingConfig;
use super::revision_date::parse_revision_date;
use crate::domain::monograph::DiscoveryResult;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// A link candidate with its score; `position` is first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub url: String,
    pub score: i32,
    pub position: usize,
}

pub struct MonographPageParser {
    config: MonographParsingConfig,
    base_url: Option<Url>,
    link_pattern: Regex,
    label_patterns: Vec<Regex>,
}

impl MonographPageParser {
    /// Create a parser with default configuration
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(MonographParsingConfig::default())
    }

    /// Create a parser with custom configuration
    pub fn with_config(config: MonographParsingConfig) -> ParsingResult<Self> {
        config.validate()?;

        // Quoted values may contain spaces; each quote style ends at its own quote
        let extension = regex::escape(config.document_extension.trim().trim_start_matches('.'));
        let link_source = format!(
            r#"(?i)href\s*=\s*(?:"([^"]+?\.{extension}(?:[?#][^"]*)?)"|'([^']+?\.{extension}(?:[?#][^']*)?)')"#
        );
        let link_pattern = Regex::new(&link_source)
            .map_err(|e| ParsingError::invalid_pattern("document_extension", &link_source, e))?;

        let label_patterns = config
            .revision_labels
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .map(|label| {
                let source = format!(
                    r"(?i){}[^<:>]*(?:[:>]\s*(?:<[^>]*>\s*)*|(?:<[^>]*>\s*)+)([A-Za-z0-9/\- ]{{6,30}})",
                    regex::escape(label)
                );
                Regex::new(&source).map_err(|e| ParsingError::invalid_pattern("revision_labels", &source, e))
            })
            .collect::<ParsingResult<Vec<_>>>()?;

        let base_url = directory_url(&config.base_url);
        if base_url.is_none() {
            debug!("Base URL '{}' is not absolute; relative links stay relative", config.base_url);
        }

        Ok(Self {
            config,
            base_url,
            link_pattern,
            label_patterns,
        })
    }

    pub const fn config(&self) -> &MonographParsingConfig {
        &self.config
    }

    /// Extract from markup whose location is unknown; relative links
    /// resolve against the configured base directory
    pub fn extract(&self, markup: &str) -> DiscoveryResult {
        self.extract_with_base(markup, self.base_url.as_ref())
    }

    /// Extract from a fetched index page; relative links resolve against
    /// the page's own URL, as a browser would
    pub fn extract_from_page(&self, markup: &str, page_url: &str) -> DiscoveryResult {
        match Url::parse(page_url) {
            Ok(page) => self.extract_with_base(markup, Some(&page)),
            Err(e) => {
                debug!("Page URL '{}' unusable as base ({}); using configured base", page_url, e);
                self.extract(markup)
            }
        }
    }

    fn extract_with_base(&self, markup: &str, base: Option<&Url>) -> DiscoveryResult {
        let Some(best) = rank(self.candidates_against(markup, base), |url| self.score(url))
            .into_iter()
            .next()
        else {
            return DiscoveryResult::empty();
        };

        let revision_date = self.find_revision_date(markup);
        debug!(
            "Selected monograph candidate {} (score {}, revision {:?})",
            best.url, best.score, revision_date
        );

        DiscoveryResult {
            reference_url: Some(best.url),
            revision_date,
        }
    }

    /// Every matching link target in document order, resolved against the base URL
    pub fn candidate_urls(&self, markup: &str) -> Vec<String> {
        self.candidates_against(markup, self.base_url.as_ref())
    }

    fn candidates_against(&self, markup: &str, base: Option<&Url>) -> Vec<String> {
        self.link_pattern
            .captures_iter(markup)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().trim().replace("&amp;", "&"))
            .filter(|href| !href.is_empty())
            .map(|href| resolve_url(&href, base))
            .collect()
    }

    /// Candidates sorted by descending score; ties keep first-seen order
    pub fn rank_candidates(&self, markup: &str) -> Vec<ScoredCandidate> {
        rank(self.candidate_urls(markup), |url| self.score(url))
    }

    /// Language tokens are matched in path and query; domain on the host
    pub fn score(&self, candidate: &str) -> i32 {
        let scoring = &self.config.scoring;

        let (location, host) = match Url::parse(candidate) {
            Ok(parsed) => {
                let mut location = parsed.path().to_lowercase();
                if let Some(query) = parsed.query() {
                    location.push('?');
                    location.push_str(&query.to_lowercase());
                }
                (location, parsed.host_str().map(str::to_lowercase))
            }
            Err(_) => (candidate.to_lowercase(), None),
        };

        let mut score = 0;
        if contains_token(&location, &scoring.preferred_language_token) {
            score += scoring.preferred_language_weight;
        }
        if contains_token(&location, &scoring.alternate_language_token) {
            score += scoring.alternate_language_weight;
        }
        if host.is_some_and(|h| h.eq_ignore_ascii_case(scoring.canonical_domain.trim())) {
            score += scoring.canonical_domain_weight;
        }
        score
    }

    /// Labels are tried in priority order; only the first occurrence of a
    /// label counts, and an unparseable value moves on to the next label
    pub fn find_revision_date(&self, markup: &str) -> Option<String> {
        self.label_patterns.iter().find_map(|pattern| {
            let value = pattern.captures(markup)?.get(1)?;
            parse_revision_date(
                value.as_str(),
                &self.config.date_formats,
                self.config.min_year,
                self.config.max_year,
            )
        })
    }
}

fn rank<F>(urls: Vec<String>, score: F) -> Vec<ScoredCandidate>
where
    F: Fn(&str) -> i32,
{
    let mut ranked: Vec<ScoredCandidate> = urls
        .into_iter()
        .enumerate()
        .map(|(position, url)| ScoredCandidate {
            score: score(&url),
            url,
            position,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.position.cmp(&b.position)));
    ranked
}

/// A base without a trailing slash names a directory, not a file
fn directory_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let directory = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&directory).ok()
}

fn resolve_url(href: &str, base: Option<&Url>) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    base.and_then(|base| base.join(href).ok())
        .map_or_else(|| href.to_string(), |u| u.to_string())
}

fn contains_token(haystack: &str, token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && haystack.contains(&token.to_lowercase())
}
