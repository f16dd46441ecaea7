//! Candidate event collection across catalogs.
//!
//! Named requests resolve each name through the alias index. The `catalog`
//! scope walks the local catalog and the `all` scope walks every canonical
//! event once, merging the copies held by different catalogs.

use std::borrow::Cow;

use crate::coordinates::SkyPosition;
use crate::path::EventScope;
use crate::snapshot::CatalogSnapshot;
use crate::types::{Event, Quantity};

/// An event considered by a query, with its catalog position.
#[derive(Debug, Clone)]
pub struct Candidate<'s> {
    pub event: Cow<'s, Event>,
    pub position: Option<SkyPosition>,
}

/// Iterate the candidate events of a scope, in output order.
pub fn candidates<'s>(
    snapshot: &'s CatalogSnapshot,
    scope: &EventScope,
    local_catalog: &str,
) -> Box<dyn Iterator<Item = Candidate<'s>> + 's> {
    match scope {
        EventScope::Named(names) => Box::new(named_candidates(snapshot, names, local_catalog).into_iter()),
        EventScope::Catalog => match snapshot.catalog_index(local_catalog) {
            Some(index) => {
                let catalog = &snapshot.catalogs()[index];
                Box::new(catalog.events().iter().enumerate().map(move |(i, event)| Candidate {
                    event: Cow::Borrowed(event),
                    position: catalog.position(i),
                }))
            }
            None => all_candidates(snapshot),
        },
        EventScope::All => all_candidates(snapshot),
    }
}

/// Resolve explicitly named events.
///
/// Adjacent names whose `+`-join is a known alias are treated as one
/// name. Names resolving to an already listed event are dropped, as are
/// unknown names.
pub fn named_candidates<'s>(
    snapshot: &'s CatalogSnapshot,
    names: &[String],
    local_catalog: &str,
) -> Vec<Candidate<'s>> {
    let mut resolved = Vec::new();
    let mut seen = Vec::new();
    for name in join_alias_pairs(snapshot, names) {
        let Some(at) = snapshot.resolve(&name, local_catalog) else {
            tracing::debug!(name = %name, "Unknown event name");
            continue;
        };
        if seen.contains(&at) {
            continue;
        }
        seen.push(at);
        resolved.push(Candidate {
            event: Cow::Borrowed(snapshot.event(at)),
            position: snapshot.position(at),
        });
    }
    resolved
}

/// Re-join names that were split on a `+` belonging to an alias.
pub fn join_alias_pairs(snapshot: &CatalogSnapshot, names: &[String]) -> Vec<String> {
    let mut joined = Vec::with_capacity(names.len());
    let mut i = 0;
    while i < names.len() {
        if i + 1 < names.len() {
            let pair = format!("{}+{}", names[i], names[i + 1]);
            if snapshot.is_alias(&pair) {
                joined.push(pair);
                i += 2;
                continue;
            }
        }
        joined.push(names[i].clone());
        i += 1;
    }
    joined
}

fn all_candidates<'s>(snapshot: &'s CatalogSnapshot) -> Box<dyn Iterator<Item = Candidate<'s>> + 's> {
    Box::new(snapshot.event_groups().iter().filter_map(move |group| {
        let (first, rest) = group.split_first()?;
        let preferred = snapshot.event(*first);
        let position = group.iter().find_map(|at| snapshot.position(*at));
        let event = if rest.is_empty() {
            Cow::Borrowed(preferred)
        } else {
            let others: Vec<&Event> = rest.iter().map(|at| snapshot.event(*at)).collect();
            Cow::Owned(merge_copies(preferred, &others))
        };
        Some(Candidate { event, position })
    }))
}

/// Merge copies of one canonical event, most preferred first.
///
/// A quantity whose copies each hold at most one observation is scalar and
/// the most preferred non-empty copy wins. Otherwise observations are
/// unioned in preference order with exact duplicates removed.
pub fn merge_copies(preferred: &Event, others: &[&Event]) -> Event {
    let copies: Vec<&Event> = std::iter::once(preferred).chain(others.iter().copied()).collect();

    let mut names: Vec<&str> = Vec::new();
    for copy in &copies {
        for name in copy.quantity_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut merged = Event::new(preferred.name.clone(), preferred.catalog.clone());
    for name in names {
        let versions: Vec<&Quantity> = copies
            .iter()
            .filter_map(|c| c.quantities().iter().find(|q| q.name == name))
            .collect();

        let scalar = versions.iter().all(|q| q.observations.len() <= 1);
        let quantity = if scalar {
            versions
                .iter()
                .find(|q| !q.observations.is_empty())
                .or_else(|| versions.first())
                .map(|q| (*q).clone())
        } else {
            let mut observations = Vec::new();
            for version in &versions {
                for obs in &version.observations {
                    if !observations.contains(obs) {
                        observations.push(obs.clone());
                    }
                }
            }
            Some(Quantity::new(name, observations))
        };

        if let Some(quantity) = quantity {
            merged.push_quantity(quantity);
        }
    }
    merged
}
