//! Immutable catalog snapshots and their lookup indexes.
//!
//! A [`CatalogSnapshot`] is built once, shared behind an `Arc`, and never
//! mutated. Refreshing the data means building a new snapshot and swapping
//! it in; queries already running keep the snapshot they started with.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::coordinates::SkyPosition;
use crate::types::Event;

/// Position of an event copy inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventRef {
    pub catalog: usize,
    pub event: usize,
}

/// One source collection of events.
#[derive(Debug, Clone)]
pub struct Catalog {
    id: String,
    events: Vec<Event>,
    positions: Vec<Option<SkyPosition>>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog. Events are sorted case-insensitively by name and a
    /// repeated name keeps only its first record.
    pub fn new(id: impl Into<String>, mut events: Vec<Event>) -> Self {
        let id = id.into();
        events.sort_by_cached_key(|e| name_key(&e.name));
        events.dedup_by(|later, earlier| name_key(&later.name) == name_key(&earlier.name));

        let positions = events.iter().map(event_position).collect();
        let by_name = events
            .iter()
            .enumerate()
            .map(|(i, e)| (name_key(&e.name), i))
            .collect();

        Self {
            id,
            events,
            positions,
            by_name,
        }
    }

    /// Build from a catalog summary document.
    ///
    /// Accepts either an array of event records or an object keyed by
    /// event name. Records without a usable name are skipped.
    pub fn from_json(id: &str, document: &Value) -> Self {
        let records: Vec<&Value> = match document {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => Vec::new(),
        };

        let mut events = Vec::with_capacity(records.len());
        let mut skipped = 0usize;
        for record in records {
            match Event::from_json(id, record) {
                Some(event) => events.push(event),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(catalog = %id, skipped, "Skipped catalog records without a name");
        }

        Self::new(id, events)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Find an event by canonical name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name_key(name)).copied()
    }

    /// Parsed sky position of an event, when its catalog coordinates parse.
    pub fn position(&self, index: usize) -> Option<SkyPosition> {
        self.positions.get(index).copied().flatten()
    }

    /// Number of distinct quantity names across all events.
    pub fn quantity_count(&self) -> usize {
        let mut names: Vec<&str> = self.events.iter().flat_map(|e| e.quantity_names()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

/// Case-folded event name used for ordering, deduplication and lookup.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

fn event_position(event: &Event) -> Option<SkyPosition> {
    let ra = event.first_value("ra")?.to_string();
    let dec = event.first_value("dec")?.to_string();
    SkyPosition::parse(&ra, &dec).ok()
}

/// Normalise a name for alias lookup: lower-cased, whitespace removed.
pub fn alias_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn alias_variants(name: &str, keys: &mut Vec<String>) {
    let key = alias_key(name);
    if key.is_empty() {
        return;
    }
    if key.len() > 2 && (key.starts_with("sn") || key.starts_with("at")) {
        keys.push(key[2..].to_string());
    }
    let dashless: String = key.chars().filter(|c| *c != '-' && *c != '–').collect();
    if dashless != key && !dashless.is_empty() {
        keys.push(dashless);
    }
    keys.push(key);
}

/// Immutable, versioned set of catalogs with derived indexes.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    catalogs: Vec<Catalog>,
    aliases: HashMap<String, Vec<EventRef>>,
    groups: Vec<Vec<EventRef>>,
}

impl CatalogSnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Catalogs in preference order.
    pub fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }

    pub fn catalog(&self, id: &str) -> Option<&Catalog> {
        self.catalogs.iter().find(|c| c.id == id)
    }

    pub fn catalog_index(&self, id: &str) -> Option<usize> {
        self.catalogs.iter().position(|c| c.id == id)
    }

    /// Catalog ids, most preferred first.
    pub fn preference_order(&self) -> Vec<&str> {
        self.catalogs.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn event(&self, at: EventRef) -> &Event {
        &self.catalogs[at.catalog].events[at.event]
    }

    pub fn position(&self, at: EventRef) -> Option<SkyPosition> {
        self.catalogs[at.catalog].position(at.event)
    }

    pub fn total_events(&self) -> usize {
        self.catalogs.iter().map(Catalog::len).sum()
    }

    /// Whether a name (or alias) is known to any catalog.
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(&alias_key(name))
    }

    /// Resolve a requested name to one event copy.
    ///
    /// A copy in `local_catalog` wins; otherwise the most preferred catalog
    /// holding the alias is used.
    pub fn resolve(&self, name: &str, local_catalog: &str) -> Option<EventRef> {
        let candidates = self.aliases.get(&alias_key(name))?;
        let local = self.catalog_index(local_catalog);
        candidates
            .iter()
            .find(|r| Some(r.catalog) == local)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Every copy of a canonical event across catalogs, in preference order.
    pub fn copies(&self, name: &str) -> Vec<EventRef> {
        self.catalogs
            .iter()
            .enumerate()
            .filter_map(|(catalog, c)| c.find(name).map(|event| EventRef { catalog, event }))
            .collect()
    }

    /// Copies of every canonical event, grouped by name and sorted
    /// case-insensitively. Each group is in preference order.
    pub fn event_groups(&self) -> &[Vec<EventRef>] {
        &self.groups
    }
}

/// Builder for [`CatalogSnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version: u64,
    loaded_at: Option<DateTime<Utc>>,
    catalogs: Vec<Catalog>,
    preference_order: Vec<String>,
}

impl SnapshotBuilder {
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn loaded_at(mut self, loaded_at: DateTime<Utc>) -> Self {
        self.loaded_at = Some(loaded_at);
        self
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalogs.push(catalog);
        self
    }

    /// Catalog preference order. Catalogs not listed follow the listed ones
    /// in insertion order.
    pub fn preference_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preference_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> CatalogSnapshot {
        let order = self.preference_order;
        let mut catalogs = self.catalogs;
        catalogs.sort_by_key(|c| {
            order
                .iter()
                .position(|id| *id == c.id)
                .unwrap_or(usize::MAX)
        });

        let mut aliases: HashMap<String, Vec<EventRef>> = HashMap::new();
        let mut grouped: BTreeMap<String, Vec<EventRef>> = BTreeMap::new();
        for (catalog_idx, catalog) in catalogs.iter().enumerate() {
            for (event_idx, event) in catalog.events.iter().enumerate() {
                let at = EventRef {
                    catalog: catalog_idx,
                    event: event_idx,
                };

                let mut keys = Vec::new();
                alias_variants(&event.name, &mut keys);
                for alias in event.aliases() {
                    alias_variants(&alias, &mut keys);
                }
                keys.sort_unstable();
                keys.dedup();
                for key in keys {
                    aliases.entry(key).or_default().push(at);
                }

                grouped.entry(event.name.to_lowercase()).or_default().push(at);
            }
        }

        tracing::debug!(
            catalogs = catalogs.len(),
            aliases = aliases.len(),
            "Built catalog snapshot indexes"
        );

        CatalogSnapshot {
            version: self.version,
            loaded_at: self.loaded_at.unwrap_or_else(Utc::now),
            catalogs,
            aliases,
            groups: grouped.into_values().collect(),
        }
    }
}

/// Source of full per-event detail records.
pub trait DetailStore: Send + Sync {
    /// Load the detail record of `event` from `catalog`, `None` when there
    /// is none.
    fn load(&self, catalog: &str, event: &str) -> Option<Event>;
}

/// A store without any detail records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDetailStore;

impl DetailStore for NoDetailStore {
    fn load(&self, _catalog: &str, _event: &str) -> Option<Event> {
        None
    }
}

/// Detail records held in memory, keyed by catalog and lower-cased name.
#[derive(Debug, Default, Clone)]
pub struct MemoryDetailStore {
    records: HashMap<(String, String), Event>,
}

impl MemoryDetailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: Event) {
        let key = (event.catalog.clone(), event.name.to_lowercase());
        self.records.insert(key, event);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DetailStore for MemoryDetailStore {
    fn load(&self, catalog: &str, event: &str) -> Option<Event> {
        self.records
            .get(&(catalog.to_string(), event.to_lowercase()))
            .cloned()
    }
}
