//! Request path parsing.
//!
//! A query path has the form `EVENTS[/QUANTITIES[/ATTRIBUTES]]`, where each
//! segment is a `+`- or space-delimited list of names. The event segment
//! may instead be `all` (every catalog) or `catalog` (the local catalog).
//! Parsing never consults the catalog: unknown names pass straight through.

use crate::errors::QueryError;

/// Escape standing for a literal `+` inside an event name.
pub const PLUS_ESCAPE: &str = "$PLUS$";

const MAX_SEGMENTS: usize = 3;

/// Which events a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    /// Explicitly named events, in request order.
    Named(Vec<String>),

    /// Every event of every catalog.
    All,

    /// Every event of the local catalog.
    Catalog,
}

impl EventScope {
    /// Whether the scope scans whole catalogs rather than named events.
    pub fn is_wide(&self) -> bool {
        !matches!(self, EventScope::Named(_))
    }
}

/// The three parsed path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub scope: EventScope,
    pub quantities: Vec<String>,
    pub attributes: Vec<String>,
}

impl ParsedPath {
    /// Parse a request path.
    ///
    /// A single leading `/` is tolerated; a trailing one is not.
    pub fn parse(path: &str) -> Result<Self, QueryError> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        Self::from_segments(&segments)
    }

    /// Build from already-split segments (event, quantity, attribute).
    pub fn from_segments(segments: &[&str]) -> Result<Self, QueryError> {
        if segments.is_empty() {
            return Err(QueryError::BadPath("no event specified".to_string()));
        }
        if segments.len() > MAX_SEGMENTS {
            return Err(QueryError::BadPath(format!(
                "expected at most {} segments, got {}",
                MAX_SEGMENTS,
                segments.len()
            )));
        }

        let mut lists = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            let trimmed = segment.trim();
            if trimmed.is_empty() {
                return Err(QueryError::BadPath(format!(
                    "segment {} is empty",
                    index + 1
                )));
            }
            validate_alphabet(trimmed)?;
            let names = split_names(trimmed);
            if names.is_empty() {
                return Err(QueryError::BadPath(format!(
                    "segment {} contains no names",
                    index + 1
                )));
            }
            lists.push(names);
        }

        let mut lists = lists.into_iter();
        let events = lists.next().unwrap_or_default();
        let scope = scope_from_names(events);
        let quantities = lists.next().unwrap_or_default();
        let attributes = lists.next().unwrap_or_default();

        Ok(Self {
            scope,
            quantities,
            attributes,
        })
    }
}

fn scope_from_names(names: Vec<String>) -> EventScope {
    if names.len() == 1 {
        match names[0].to_lowercase().as_str() {
            "all" => return EventScope::All,
            "catalog" => return EventScope::Catalog,
            _ => {}
        }
    }
    EventScope::Named(names)
}

/// Split a `+`/space delimited list, unescaping `$PLUS$`.
pub fn split_names(segment: &str) -> Vec<String> {
    segment
        .split(|c: char| c == '+' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.replace(PLUS_ESCAPE, "+"))
        .collect()
}

fn validate_alphabet(segment: &str) -> Result<(), QueryError> {
    let unescaped = segment.replace(PLUS_ESCAPE, "");
    if let Some(bad) = unescaped.chars().find(|c| !is_name_char(*c)) {
        return Err(QueryError::BadPath(format!(
            "character '{}' is not allowed in '{}'",
            bad, segment
        )));
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric()
        || c == ' '
        || matches!(
            c,
            '_' | '-' | '.' | ':' | '(' | ')' | '[' | ']' | '\'' | ',' | '*' | '+' | '#'
        )
}
