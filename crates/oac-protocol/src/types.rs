//! Core record types shared by every stage of query resolution.
//!
//! Catalog records are semi-structured: two observations of the same
//! quantity rarely share the same set of attributes. Observations are
//! therefore modelled as ordered open mappings from attribute name to a
//! tagged [`AttrValue`], never as fixed structs.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Attribute holding the primary value of an observation.
pub const VALUE_ATTRIBUTE: &str = "value";

/// Attribute holding the comma-joined, 1-based source ids of an observation.
pub const SOURCE_ATTRIBUTE: &str = "source";

/// Quantity listing an event's sources in id order.
pub const SOURCES_QUANTITY: &str = "sources";

/// A single attribute value inside an observation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Free text (most catalog values, including numbers, arrive as text).
    Text(String),

    /// A JSON number.
    Number(f64),

    /// A JSON boolean flag (e.g. `upperlimit`).
    Bool(bool),

    /// A list of values (e.g. spectrum `data` rows).
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Convert a JSON value. Returns `None` for `null`.
    ///
    /// Nested objects have no scalar representation and are kept as their
    /// compact JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(AttrValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(AttrValue::Number),
            Value::String(s) => Some(AttrValue::Text(s.clone())),
            Value::Array(items) => Some(AttrValue::List(
                items.iter().filter_map(AttrValue::from_json).collect(),
            )),
            Value::Object(_) => Some(AttrValue::Text(value.to_string())),
        }
    }

    /// Numeric interpretation of a scalar value.
    ///
    /// Text is accepted when it parses as a finite number. Lists and
    /// booleans are never numeric here; see [`AttrValue::numeric_mean`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) if n.is_finite() => Some(*n),
            AttrValue::Text(s) => parse_finite(s),
            _ => None,
        }
    }

    /// Mean of the numeric interpretation, averaging list members.
    ///
    /// A list qualifies only when every member is numeric.
    pub fn numeric_mean(&self) -> Option<f64> {
        match self {
            AttrValue::List(items) if !items.is_empty() => {
                let values: Option<Vec<f64>> = items.iter().map(|v| v.as_number()).collect();
                let values = values?;
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
            AttrValue::List(_) => None,
            other => other.as_number(),
        }
    }

    /// Compare against a requested filter value.
    ///
    /// Numeric-looking values on both sides compare numerically, so `8e-4`
    /// matches `0.0008`; everything else compares case-insensitively.
    pub fn matches(&self, expected: &str) -> bool {
        let expected = expected.trim();
        if !matches!(self, AttrValue::List(_)) {
            if let (Some(actual), Some(target)) = (self.as_number(), parse_finite(expected)) {
                return actual == target;
            }
        }
        self.to_string().trim().to_lowercase() == expected.to_lowercase()
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::Number(n) => write!(f, "{}", n),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::Text(s) => serializer.serialize_str(s),
            AttrValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            AttrValue::Bool(b) => serializer.serialize_bool(*b),
            AttrValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Number(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// Parse text as a finite number (rejects `inf`/`nan` spellings).
pub(crate) fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// One measured instance within a quantity: an ordered attribute bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    attributes: Vec<(String, AttrValue)>,
}

impl Observation {
    /// Create an empty observation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value.into());
        self
    }

    /// Insert or replace an attribute, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) {
        let key = key.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Look up an attribute by exact key.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Whether the attribute is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The primary `value` attribute, if any.
    pub fn value(&self) -> Option<&AttrValue> {
        self.get(VALUE_ATTRIBUTE)
    }

    /// Attribute names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(k, _)| k.as_str())
    }

    /// Attribute pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Trim to the requested attributes, ordered as requested.
    ///
    /// Requested attributes absent from the observation are omitted.
    pub fn project(&self, attributes: &[String]) -> Observation {
        let mut projected = Observation::new();
        for name in attributes {
            if let Some(value) = self.get(name) {
                projected.insert(name.clone(), value.clone());
            }
        }
        projected
    }

    /// Build from a JSON element of a quantity array.
    ///
    /// Objects map attribute-by-attribute (nulls dropped); any other value
    /// becomes a single `value` attribute.
    pub fn from_json(value: &Value) -> Option<Observation> {
        match value {
            Value::Null => None,
            Value::Object(map) => {
                let mut obs = Observation::new();
                for (key, v) in map {
                    if let Some(attr) = AttrValue::from_json(v) {
                        obs.insert(key.clone(), attr);
                    }
                }
                Some(obs)
            }
            other => AttrValue::from_json(other)
                .map(|attr| Observation::new().with(VALUE_ATTRIBUTE, attr)),
        }
    }
}

impl Serialize for Observation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A named, ordered sequence of observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quantity {
    /// Quantity name (e.g. `redshift`, `photometry`).
    pub name: String,

    /// Observations in source order.
    pub observations: Vec<Observation>,
}

impl Quantity {
    pub fn new(name: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            name: name.into(),
            observations,
        }
    }

    /// Normalise a raw JSON quantity.
    ///
    /// Arrays yield one observation per element, everything else a single
    /// observation. `null` yields `None`.
    pub fn from_json(name: &str, value: &Value) -> Option<Quantity> {
        let observations = match value {
            Value::Null => return None,
            Value::Array(items) => items.iter().filter_map(Observation::from_json).collect(),
            other => Observation::from_json(other).into_iter().collect(),
        };
        Some(Quantity::new(name, observations))
    }
}

/// A named astronomical transient owned by one catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Canonical event name.
    pub name: String,

    /// Id of the catalog this copy came from.
    pub catalog: String,

    quantities: Vec<Quantity>,
}

impl Event {
    pub fn new(name: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            catalog: catalog.into(),
            quantities: Vec::new(),
        }
    }

    /// Builder-style quantity insert.
    pub fn with_quantity(mut self, name: impl Into<String>, observations: Vec<Observation>) -> Self {
        self.push_quantity(Quantity::new(name, observations));
        self
    }

    /// Add a quantity, replacing any existing one with the same name.
    pub fn push_quantity(&mut self, quantity: Quantity) {
        match self.quantities.iter_mut().find(|q| q.name == quantity.name) {
            Some(slot) => *slot = quantity,
            None => self.quantities.push(quantity),
        }
    }

    /// Look up a quantity. Exact names win over case-insensitive matches.
    pub fn quantity(&self, name: &str) -> Option<&Quantity> {
        self.quantities
            .iter()
            .find(|q| q.name == name)
            .or_else(|| self.quantities.iter().find(|q| q.name.eq_ignore_ascii_case(name)))
    }

    pub fn has_quantity(&self, name: &str) -> bool {
        self.quantity(name).is_some()
    }

    pub fn quantities(&self) -> &[Quantity] {
        &self.quantities
    }

    pub fn quantity_names(&self) -> impl Iterator<Item = &str> {
        self.quantities.iter().map(|q| q.name.as_str())
    }

    /// The `value` of the first observation of a quantity.
    pub fn first_value(&self, quantity: &str) -> Option<&AttrValue> {
        self.quantity(quantity)?
            .observations
            .first()
            .and_then(|o| o.value())
    }

    /// Values of the `alias` quantity.
    pub fn aliases(&self) -> Vec<String> {
        self.quantity("alias")
            .map(|q| {
                q.observations
                    .iter()
                    .filter_map(|o| o.value())
                    .map(|v| v.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Citable reference for each entry of the `sources` quantity.
    ///
    /// Bibcodes are preferred, then arXiv ids, then source names. Entries
    /// with none of these yield an empty string so positions stay aligned
    /// with source ids.
    pub fn source_references(&self) -> Vec<String> {
        self.quantity(SOURCES_QUANTITY)
            .map(|q| {
                q.observations
                    .iter()
                    .map(|o| {
                        ["bibcode", "arxivid", "name"]
                            .iter()
                            .find_map(|key| o.get(key))
                            .map(|v| v.to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Build an event from its JSON record.
    ///
    /// The record must be an object with a string `name`; every key
    /// (including `name`) becomes a quantity.
    pub fn from_json(catalog: &str, value: &Value) -> Option<Event> {
        let map = value.as_object()?;
        let name = map.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }

        let mut event = Event::new(name, catalog);
        for (key, raw) in map {
            if let Some(quantity) = Quantity::from_json(key, raw) {
                event.push_quantity(quantity);
            }
        }
        Some(event)
    }
}
