//! Keyword queries: compilation of raw query strings and evaluation against
//! normalized product identifiers.
//!
//! Query grammar (after lowercasing and whitespace collapsing):
//!
//! - `+term` starts an inclusive clause, `-term` an exclusive clause and
//!   `/a/b` an OR-group clause.
//! - A clause runs until the next word starting with a delimiter, so
//!   `+air max -kids` yields the inclusive term `air max`.
//! - Leading words without a delimiter form an inclusive clause.
//! - An inclusive clause containing `/` is an OR-group: `+red/blue` is
//!   satisfied by either color.

use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseKind {
    Inclusive,
    Exclusive,
    OrGroup,
}

/// A compiled keyword query. Immutable after construction; equality and
/// hashing use only the normalized raw string.
#[derive(Debug, Clone)]
pub struct KeywordQuery {
    raw: String,
    inclusive: Vec<String>,
    exclusive: Vec<String>,
    or_groups: Vec<Vec<String>>,
}

impl KeywordQuery {
    /// Compile a raw query string.
    pub fn compile(raw: &str) -> Self {
        let raw = collapse_whitespace(&raw.trim().to_lowercase());

        let mut query = Self {
            raw: raw.clone(),
            inclusive: Vec::new(),
            exclusive: Vec::new(),
            or_groups: Vec::new(),
        };

        for (kind, text) in split_clauses(&raw) {
            match kind {
                ClauseKind::Exclusive => {
                    let term = clean_term(&text);
                    if !term.is_empty() {
                        query.exclusive.push(term);
                    }
                }
                ClauseKind::Inclusive if !text.contains('/') => {
                    let term = clean_term(&text);
                    if !term.is_empty() {
                        query.inclusive.push(term);
                    }
                }
                ClauseKind::Inclusive | ClauseKind::OrGroup => {
                    let group: Vec<String> = text
                        .split('/')
                        .map(clean_term)
                        .filter(|t| !t.is_empty())
                        .collect();
                    if !group.is_empty() {
                        query.or_groups.push(group);
                    }
                }
            }
        }

        query
    }

    /// Normalized raw query string.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Terms that must all be present.
    #[must_use]
    pub fn inclusive_terms(&self) -> &[String] {
        &self.inclusive
    }

    /// Terms that must all be absent.
    #[must_use]
    pub fn exclusive_terms(&self) -> &[String] {
        &self.exclusive
    }

    /// Groups of which at least one member must be present.
    #[must_use]
    pub fn or_groups(&self) -> &[Vec<String>] {
        &self.or_groups
    }

    /// Evaluate the query against a normalized identifier string.
    #[must_use]
    pub fn matches(&self, identifier: &str) -> bool {
        self.inclusive.iter().all(|t| identifier.contains(t.as_str()))
            && !self.exclusive.iter().any(|t| identifier.contains(t.as_str()))
            && self
                .or_groups
                .iter()
                .all(|group| group.iter().any(|t| identifier.contains(t.as_str())))
    }
}

impl PartialEq for KeywordQuery {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for KeywordQuery {}

impl Hash for KeywordQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for KeywordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Normalize free text into an identifier string for keyword matching:
/// lowercase, punctuation replaced by spaces, whitespace collapsed.
pub fn normalize_identifier(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&replaced)
}

/// Build an identifier from brand, title and color, removing the SKU from
/// the title when the shop embeds it there.
pub fn build_identifier(brand: &str, title: &str, color: &str, sku: &str) -> String {
    let title = if sku.is_empty() {
        title.to_owned()
    } else {
        title.replace(sku, "")
    };
    normalize_identifier(&format!("{brand} {title} {color}"))
}

fn split_clauses(raw: &str) -> Vec<(ClauseKind, String)> {
    let mut clauses = Vec::new();
    let mut current: Option<(ClauseKind, String)> = None;

    for word in raw.split(' ').filter(|w| !w.is_empty()) {
        let started = match word.as_bytes()[0] {
            b'+' => Some((ClauseKind::Inclusive, &word[1..])),
            b'-' => Some((ClauseKind::Exclusive, &word[1..])),
            b'/' => Some((ClauseKind::OrGroup, word)),
            _ => None,
        };

        if let Some((kind, text)) = started {
            if let Some(done) = current.take() {
                clauses.push(done);
            }
            current = Some((kind, text.to_owned()));
        } else if let Some((_, text)) = current.as_mut() {
            text.push(' ');
            text.push_str(word);
        } else {
            current = Some((ClauseKind::Inclusive, word.to_owned()));
        }
    }

    if let Some(done) = current {
        clauses.push(done);
    }
    clauses
}

/// Delimiter characters inside a term act as word separators, mirroring how
/// identifiers are normalized.
fn clean_term(term: &str) -> String {
    collapse_whitespace(&term.replace(['+', '-'], " "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
