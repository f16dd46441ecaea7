//! Query argument resolution.
//!
//! Arguments split into three categories, resolved in this precedence
//! order when a key appears in more than one form:
//!
//! 1. Directives (`closest`, `complete`, `first`, `item`, `radius`, ...),
//!    consumed here and never treated as filters.
//! 2. Presence filters: a bare key (`&redshift`) or a key with an empty
//!    value (`&redshift=`).
//! 3. Equality filters: `key=value`.

use serde_json::Value;

use crate::errors::QueryError;
use crate::types::parse_finite;

/// One raw `key[=value]` pair, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArg {
    pub key: String,
    pub value: Option<String>,
}

impl QueryArg {
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Decode a raw query string (`a=1&b&c=x+y`) into ordered pairs.
///
/// `+` decodes to a space and percent-escapes are decoded; invalid UTF-8
/// escapes are kept verbatim. A leading `+` on an `ra`/`dec` value is a
/// sign and is kept.
pub fn parse_query_string(raw: &str) -> Vec<QueryArg> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => {
                    let key = decode_component(k);
                    let value = if is_coordinate_key(&key) {
                        decode_signed(v)
                    } else {
                        decode_component(v)
                    };
                    (key, Some(value))
                }
                None => (decode_component(part), None),
            };
            let key = key.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(QueryArg { key, value })
            }
        })
        .collect()
}

fn is_coordinate_key(key: &str) -> bool {
    let key = key.trim();
    key.eq_ignore_ascii_case("ra") || key.eq_ignore_ascii_case("dec")
}

fn decode_signed(raw: &str) -> String {
    match raw.strip_prefix('+') {
        Some(rest) => format!("+{}", decode_component(rest)),
        None => decode_component(raw),
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Convert a JSON request body into ordered pairs.
///
/// `null` and empty strings become bare keys, arrays are `+`-joined and
/// other scalars are stringified. Non-object bodies yield nothing.
pub fn args_from_json(body: &Value) -> Vec<QueryArg> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };

    map.iter()
        .map(|(key, value)| match value {
            Value::Null => QueryArg::bare(key.clone()),
            Value::String(s) if s.is_empty() => QueryArg::bare(key.clone()),
            Value::String(s) => QueryArg::pair(key.clone(), s.clone()),
            Value::Array(items) => {
                let joined: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                QueryArg::pair(key.clone(), joined.join("+"))
            }
            other => QueryArg::pair(key.clone(), other.to_string()),
        })
        .collect()
}

/// Parsed special directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    /// Nearest-value selection on numeric equality filters.
    pub closest: bool,

    /// Require every requested attribute on each surviving observation.
    pub complete: bool,

    /// Keep only the first surviving observation.
    pub first: bool,

    /// Resolve against full per-event detail records.
    pub full: bool,

    /// Serve the body as an attachment.
    pub download: bool,

    /// Keep only the n-th surviving observation (0-indexed).
    pub item: Option<usize>,

    /// Cone radius in arcseconds.
    pub radius: Option<f64>,

    /// Box half-width along RA in arcseconds.
    pub width: Option<f64>,

    /// Box half-height along Dec in arcseconds.
    pub height: Option<f64>,

    /// Attribute to sort delimited output by (lower-cased).
    pub sortby: Option<String>,

    /// Raw right ascension.
    pub ra: Option<String>,

    /// Raw declination.
    pub dec: Option<String>,

    /// Event list supplied as an argument instead of a path segment.
    pub event: Option<String>,

    /// Quantity list supplied as an argument instead of a path segment.
    pub quantity: Option<String>,

    /// Attribute list supplied as an argument instead of a path segment.
    pub attribute: Option<String>,
}

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// The key must be present.
    Presence,

    /// The key, when present, must equal the value.
    Equals(String),

    /// Like `Equals`, but compared as written: trimmed, case-sensitive and
    /// never numerically.
    Verbatim(String),
}

/// Presence and equality filters in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: Vec<(String, FilterKind)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a presence filter. Presence overrides an equality on the same key.
    pub fn add_presence(&mut self, key: impl Into<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = FilterKind::Presence,
            None => self.entries.push((key, FilterKind::Presence)),
        }
    }

    /// Add an equality filter. Ignored when the key is already a presence
    /// filter; a later equality replaces an earlier one.
    pub fn add_equals(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.add_comparison(key.into(), FilterKind::Equals(value.into()));
    }

    /// Add an exact, as-written equality filter with the same precedence
    /// rules as [`Filters::add_equals`].
    pub fn add_verbatim(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.add_comparison(key.into(), FilterKind::Verbatim(value.into()));
    }

    fn add_comparison(&mut self, key: String, kind: FilterKind) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, FilterKind::Presence)) => {}
            Some(slot) => slot.1 = kind,
            None => self.entries.push((key, kind)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FilterKind> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterKind)> {
        self.entries.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Directives and filters extracted from a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArguments {
    pub directives: Directives,
    pub filters: Filters,
}

/// Split raw pairs into directives and filters.
///
/// `max_angle_arcsec` bounds `radius`, `width` and `height`.
pub fn resolve_arguments(
    args: &[QueryArg],
    max_angle_arcsec: f64,
) -> Result<ResolvedArguments, QueryError> {
    let mut directives = Directives::default();
    let mut filters = Filters::new();

    for arg in args {
        let lowered = arg.key.to_lowercase();
        let value = arg.value.as_deref();
        match lowered.as_str() {
            "closest" => directives.closest = true,
            "complete" => directives.complete = true,
            "first" => directives.first = true,
            "full" => directives.full = true,
            "download" => directives.download = true,
            "item" => directives.item = Some(parse_index(&arg.key, value)?),
            "radius" => directives.radius = Some(parse_angle(&arg.key, value, max_angle_arcsec)?),
            "width" => directives.width = Some(parse_angle(&arg.key, value, max_angle_arcsec)?),
            "height" => directives.height = Some(parse_angle(&arg.key, value, max_angle_arcsec)?),
            "sortby" => directives.sortby = non_empty(value).map(|s| s.to_lowercase()),
            // Negotiated together with the Accept header by the service.
            "format" => {}
            "ra" => directives.ra = non_empty(value).map(str::to_string),
            "dec" => directives.dec = non_empty(value).map(str::to_string),
            "event" => directives.event = non_empty(value).map(str::to_string),
            "quantity" => directives.quantity = non_empty(value).map(str::to_string),
            "attribute" => directives.attribute = non_empty(value).map(str::to_string),
            _ => match non_empty(value) {
                Some(v) => filters.add_equals(arg.key.clone(), v),
                None => filters.add_presence(arg.key.clone()),
            },
        }
    }

    Ok(ResolvedArguments {
        directives,
        filters,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(key: &str, value: Option<&str>) -> Result<f64, QueryError> {
    let raw = value.unwrap_or("");
    parse_finite(raw).ok_or_else(|| QueryError::invalid_argument(key, raw, "expected a number"))
}

fn parse_index(key: &str, value: Option<&str>) -> Result<usize, QueryError> {
    let number = parse_number(key, value)?;
    if number < 0.0 || number.fract() != 0.0 {
        return Err(QueryError::invalid_argument(
            key,
            value.unwrap_or(""),
            "expected a non-negative integer",
        ));
    }
    Ok(number as usize)
}

fn parse_angle(key: &str, value: Option<&str>, max_angle_arcsec: f64) -> Result<f64, QueryError> {
    let number = parse_number(key, value)?;
    if number < 0.0 {
        return Err(QueryError::invalid_argument(
            key,
            value.unwrap_or(""),
            "angles must be non-negative",
        ));
    }
    if number >= max_angle_arcsec {
        return Err(QueryError::invalid_argument(
            key,
            value.unwrap_or(""),
            format!(
                "must be less than {} arcseconds ({} degrees)",
                max_angle_arcsec,
                max_angle_arcsec / 3600.0
            ),
        ));
    }
    Ok(number)
}
