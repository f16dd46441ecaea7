//! Attribute filtering and projection.
//!
//! Filter keys are bound per event. A key naming one of the event's
//! quantities is event-level: an equality on it requires some observation
//! of that quantity to carry a matching `value`. Every other key is
//! observation-level and is checked against the attributes of each row.
//!
//! A filter value applies to every requested quantity whose rows carry the
//! key, so one equality can empty unrelated quantities at once. Whenever
//! any filter is present an event is only returned if every explicitly
//! requested quantity keeps at least one row.

use crate::arguments::{FilterKind, Filters};
use crate::coordinates::{SearchRegion, SkyPosition};
use crate::types::{AttrValue, Event, Observation, Quantity, SOURCE_ATTRIBUTE};

/// Per-request filtering options.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec<'a> {
    /// Requested attributes; empty means whole observations.
    pub attributes: &'a [String],
    pub filters: &'a Filters,
    /// ALL instead of ANY for the attribute and presence policies.
    pub complete: bool,
    /// Numeric observation-level equalities become selection targets.
    pub closest: bool,
    pub region: Option<&'a SearchRegion>,
    /// Rows carrying any of these are dropped from attribute queries.
    pub excluded_attributes: &'a [String],
}

/// The value an equality filter expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expected<'f> {
    /// Numeric when both sides parse, otherwise case-insensitive.
    Loose(&'f str),
    /// Trimmed text, case-sensitive.
    Verbatim(&'f str),
}

impl Expected<'_> {
    pub fn holds(&self, actual: &AttrValue) -> bool {
        match self {
            Expected::Loose(expected) => actual.matches(expected),
            Expected::Verbatim(expected) => actual.to_string().trim() == expected.trim(),
        }
    }
}

/// Filter keys bound against one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyBindings<'f> {
    pub event_equals: Vec<(&'f str, Expected<'f>)>,
    pub event_presence: Vec<&'f str>,
    pub row_equals: Vec<(&'f str, Expected<'f>)>,
    pub row_presence: Vec<&'f str>,
    pub closest_targets: Vec<(&'f str, f64)>,
}

impl<'f> KeyBindings<'f> {
    /// Classify every filter key for `event`.
    pub fn classify(event: &Event, filters: &'f Filters, closest: bool) -> Self {
        let mut bindings = KeyBindings::default();
        for (key, kind) in filters.iter() {
            let event_level = event.has_quantity(key);
            match (kind, event_level) {
                (FilterKind::Presence, true) => bindings.event_presence.push(key),
                (FilterKind::Presence, false) => bindings.row_presence.push(key),
                (FilterKind::Equals(value), true) => {
                    bindings.event_equals.push((key, Expected::Loose(value)))
                }
                (FilterKind::Equals(value), false) => {
                    let target = value.trim().parse::<f64>().ok().filter(|n| n.is_finite());
                    match target {
                        Some(target) if closest => bindings.closest_targets.push((key, target)),
                        _ => bindings.row_equals.push((key, Expected::Loose(value))),
                    }
                }
                (FilterKind::Verbatim(value), true) => {
                    bindings.event_equals.push((key, Expected::Verbatim(value)))
                }
                (FilterKind::Verbatim(value), false) => {
                    bindings.row_equals.push((key, Expected::Verbatim(value)))
                }
            }
        }
        bindings
    }

    fn row_keys(&self) -> impl Iterator<Item = &'f str> + '_ {
        self.row_equals
            .iter()
            .map(|(k, _)| *k)
            .chain(self.row_presence.iter().copied())
            .chain(self.closest_targets.iter().map(|(k, _)| *k))
    }
}

/// Surviving rows of one quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityRows<'e> {
    pub name: String,
    pub rows: Vec<&'e Observation>,
}

/// Result of filtering one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMatch<'e> {
    pub quantities: Vec<QuantityRows<'e>>,
    /// Numeric targets for nearest-value selection, in filter order.
    pub closest_targets: Vec<(String, f64)>,
}

/// Filter the requested quantities of one event.
///
/// With `quantities` empty every quantity of the event is considered and
/// quantities left without rows are simply omitted. Returns `None` when
/// the event contributes nothing.
pub fn filter_event<'e>(
    event: &'e Event,
    quantities: &[String],
    spec: &FilterSpec<'_>,
) -> Option<EventMatch<'e>> {
    let bindings = KeyBindings::classify(event, spec.filters, spec.closest);
    let explicit = !quantities.is_empty();

    let requested: Vec<Option<&'e Quantity>> = if explicit {
        let mut seen: Vec<String> = Vec::new();
        quantities
            .iter()
            .filter(|name| {
                let lowered = name.to_lowercase();
                if seen.contains(&lowered) {
                    false
                } else {
                    seen.push(lowered);
                    true
                }
            })
            .map(|name| event.quantity(name))
            .collect()
    } else {
        event.quantities().iter().map(Some).collect()
    };

    for (key, expected) in &bindings.event_equals {
        let matched = event.quantity(key).map_or(false, |q| {
            q.observations
                .iter()
                .any(|o| o.value().map_or(false, |v| expected.holds(v)))
        });
        if !matched {
            return None;
        }
    }

    for key in bindings.row_keys() {
        let bound = requested
            .iter()
            .flatten()
            .any(|q| q.observations.iter().any(|o| o.contains(key)));
        if !bound {
            return None;
        }
    }

    let mut kept = Vec::with_capacity(requested.len());
    for quantity in requested {
        let rows: Vec<&'e Observation> = match quantity {
            Some(q) => q
                .observations
                .iter()
                .filter(|o| row_passes(o, &q.name, &bindings, spec))
                .collect(),
            None => Vec::new(),
        };

        match quantity {
            Some(q) if !rows.is_empty() => kept.push(QuantityRows {
                name: q.name.clone(),
                rows,
            }),
            _ if explicit && !spec.filters.is_empty() => return None,
            _ => {}
        }
    }

    if kept.is_empty() {
        return None;
    }

    Some(EventMatch {
        quantities: kept,
        closest_targets: bindings
            .closest_targets
            .iter()
            .map(|(k, t)| (k.to_string(), *t))
            .collect(),
    })
}

fn row_passes(
    obs: &Observation,
    quantity: &str,
    bindings: &KeyBindings<'_>,
    spec: &FilterSpec<'_>,
) -> bool {
    if !spec.attributes.is_empty() && spec.excluded_attributes.iter().any(|e| obs.contains(e)) {
        return false;
    }

    // A requested `source` column is never left blank.
    if spec.attributes.iter().any(|a| a == SOURCE_ATTRIBUTE) && !obs.contains(SOURCE_ATTRIBUTE) {
        return false;
    }

    if let (Some(region), Some(position)) = (spec.region, observation_position(obs)) {
        if !region.contains(&position) {
            return false;
        }
    }

    let row_equals_ok = bindings
        .row_equals
        .iter()
        .all(|(key, expected)| obs.get(key).map_or(true, |v| expected.holds(v)));
    if !row_equals_ok {
        return false;
    }

    let own_value_ok = bindings
        .event_equals
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(quantity))
        .all(|(_, expected)| obs.value().map_or(false, |v| expected.holds(v)));
    if !own_value_ok {
        return false;
    }

    policy_holds(obs, spec.attributes, spec.complete)
        && policy_holds(obs, &bindings.row_presence, spec.complete)
}

/// ALL (`complete`) or ANY presence of `keys`; vacuously true when empty.
fn policy_holds<S: AsRef<str>>(obs: &Observation, keys: &[S], complete: bool) -> bool {
    if keys.is_empty() {
        return true;
    }
    if complete {
        keys.iter().all(|k| obs.contains(k.as_ref()))
    } else {
        keys.iter().any(|k| obs.contains(k.as_ref()))
    }
}

/// Position carried by a row's own `ra`/`dec` attributes.
pub fn observation_position(obs: &Observation) -> Option<SkyPosition> {
    let ra = obs.get("ra")?.to_string();
    let dec = obs.get("dec")?.to_string();
    SkyPosition::parse(&ra, &dec).ok()
}

/// Trim a surviving row to the requested attributes.
pub fn project(obs: &Observation, attributes: &[String]) -> Observation {
    if attributes.is_empty() {
        obs.clone()
    } else {
        obs.project(attributes)
    }
}

/// Replace the source ids of a projected row with citable references.
///
/// `references` are indexed by 1-based source id. Ids without a usable
/// reference are kept unchanged.
pub fn cite_sources(obs: &mut Observation, references: &[String]) {
    let Some(ids) = obs.get(SOURCE_ATTRIBUTE) else {
        return;
    };
    let cited: Vec<String> = ids
        .to_string()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| references.get(i))
                .filter(|r| !r.is_empty())
                .cloned()
                .unwrap_or_else(|| id.to_string())
        })
        .collect();
    obs.insert(SOURCE_ATTRIBUTE, AttrValue::Text(cited.join(",")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::{parse_query_string, resolve_arguments};

    fn sn2014j() -> Event {
        Event::new("SN2014J", "sne")
            .with_quantity(
                "lumdist",
                vec![
                    Observation::new().with("value", "3.3").with("u_value", "Mpc"),
                    Observation::new().with("value", "3.5").with("u_value", "Mpc"),
                ],
            )
            .with_quantity(
                "claimedtype",
                vec![
                    Observation::new().with("value", "Ia"),
                    Observation::new().with("value", "Ia-norm"),
                ],
            )
            .with_quantity(
                "photometry",
                vec![
                    Observation::new()
                        .with("time", "56669.6")
                        .with("magnitude", "10.6")
                        .with("band", "B"),
                    Observation::new().with("time", "56670.1").with("magnitude", "10.2"),
                    Observation::new()
                        .with("time", "56671.0")
                        .with("magnitude", "10.1")
                        .with("e_magnitude", "0.02")
                        .with("band", "V")
                        .with("realization", "1"),
                ],
            )
    }

    fn filters(raw: &str) -> Filters {
        resolve_arguments(&parse_query_string(raw), 36000.0)
            .unwrap()
            .filters
    }

    fn spec<'a>(attributes: &'a [String], filters: &'a Filters, complete: bool) -> FilterSpec<'a> {
        FilterSpec {
            attributes,
            filters,
            complete,
            closest: false,
            region: None,
            excluded_attributes: &[],
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn row_count(matched: &EventMatch<'_>, quantity: &str) -> usize {
        matched
            .quantities
            .iter()
            .find(|q| q.name == quantity)
            .map_or(0, |q| q.rows.len())
    }

    #[test]
    fn test_classify_keys() {
        let event = sn2014j();
        let f = filters("lumdist&claimedtype=ia&band=B&e_magnitude&time=56670&redshift");
        let bindings = KeyBindings::classify(&event, &f, true);
        assert_eq!(bindings.event_presence, vec!["lumdist"]);
        assert_eq!(bindings.event_equals, vec![("claimedtype", Expected::Loose("ia"))]);
        assert_eq!(bindings.row_equals, vec![("band", Expected::Loose("B"))]);
        assert_eq!(bindings.row_presence, vec!["e_magnitude", "redshift"]);
        assert_eq!(bindings.closest_targets, vec![("time", 56670.0)]);
    }

    #[test]
    fn test_no_filters_returns_everything() {
        let event = sn2014j();
        let f = Filters::new();
        let matched = filter_event(&event, &names(&["photometry"]), &spec(&[], &f, false)).unwrap();
        assert_eq!(row_count(&matched, "photometry"), 3);
    }

    #[test]
    fn test_attribute_policy_any_and_all() {
        let event = sn2014j();
        let f = Filters::new();
        let attrs = names(&["magnitude", "e_magnitude", "band"]);

        let any = filter_event(&event, &names(&["photometry"]), &spec(&attrs, &f, false)).unwrap();
        assert_eq!(row_count(&any, "photometry"), 3);

        let all = filter_event(&event, &names(&["photometry"]), &spec(&attrs, &f, true)).unwrap();
        assert_eq!(row_count(&all, "photometry"), 1);
    }

    #[test]
    fn test_observation_equality_absence_is_not_mismatch() {
        let event = sn2014j();
        let f = filters("band=b");
        let matched = filter_event(&event, &names(&["photometry"]), &spec(&[], &f, false)).unwrap();
        // The B row and the row without a band survive; the V row does not.
        assert_eq!(row_count(&matched, "photometry"), 2);
    }

    #[test]
    fn test_value_filter_intersects_quantities() {
        let event = sn2014j();
        let f = filters("value=ia");
        let result = filter_event(&event, &names(&["lumdist", "claimedtype"]), &spec(&[], &f, false));
        assert!(result.is_none());
    }

    #[test]
    fn test_event_level_filters() {
        let event = sn2014j();
        let f = filters("lumdist&claimedtype=ia");
        let matched =
            filter_event(&event, &names(&["lumdist", "claimedtype"]), &spec(&[], &f, false)).unwrap();
        assert_eq!(row_count(&matched, "lumdist"), 2);
        assert_eq!(row_count(&matched, "claimedtype"), 1);

        let f = filters("claimedtype=II");
        assert!(filter_event(&event, &names(&["lumdist"]), &spec(&[], &f, false)).is_none());
    }

    #[test]
    fn test_unbound_key_excludes_event() {
        let event = sn2014j();
        let f = filters("redshift");
        assert!(filter_event(&event, &names(&["photometry"]), &spec(&[], &f, false)).is_none());
    }

    #[test]
    fn test_presence_policy_follows_complete() {
        let event = sn2014j();
        let f = filters("band&e_magnitude");
        let any = filter_event(&event, &names(&["photometry"]), &spec(&[], &f, false)).unwrap();
        assert_eq!(row_count(&any, "photometry"), 2);

        let all = filter_event(&event, &names(&["photometry"]), &spec(&[], &f, true)).unwrap();
        assert_eq!(row_count(&all, "photometry"), 1);
    }

    #[test]
    fn test_excluded_attributes_only_for_attribute_queries() {
        let event = sn2014j();
        let f = Filters::new();
        let excluded = names(&["realization"]);
        let attrs = names(&["magnitude"]);

        let mut with_attrs = spec(&attrs, &f, false);
        with_attrs.excluded_attributes = &excluded;
        let matched = filter_event(&event, &names(&["photometry"]), &with_attrs).unwrap();
        assert_eq!(row_count(&matched, "photometry"), 2);

        let mut whole = spec(&[], &f, false);
        whole.excluded_attributes = &excluded;
        let matched = filter_event(&event, &names(&["photometry"]), &whole).unwrap();
        assert_eq!(row_count(&matched, "photometry"), 3);
    }

    #[test]
    fn test_missing_quantity_without_filters_is_omitted() {
        let event = sn2014j();
        let f = Filters::new();
        let matched =
            filter_event(&event, &names(&["redshift", "lumdist"]), &spec(&[], &f, false)).unwrap();
        assert_eq!(matched.quantities.len(), 1);
        assert!(filter_event(&event, &names(&["redshift"]), &spec(&[], &f, false)).is_none());
    }

    #[test]
    fn test_all_quantities_when_none_requested() {
        let event = sn2014j();
        let f = filters("band=V");
        let matched = filter_event(&event, &[], &spec(&[], &f, false)).unwrap();
        assert_eq!(matched.quantities.len(), 3);
        assert_eq!(row_count(&matched, "photometry"), 2);
    }

    #[test]
    fn test_region_filters_rows_with_coordinates() {
        let event = Event::new("Host", "sne").with_quantity(
            "hostoffset",
            vec![
                Observation::new().with("ra", "10.0").with("dec", "0.0"),
                Observation::new().with("ra", "20.0").with("dec", "0.0"),
                Observation::new().with("value", "3"),
            ],
        );
        let region = SearchRegion::Cone {
            center: SkyPosition::new(10.0, 0.0),
            radius_arcsec: 60.0,
        };
        let f = Filters::new();
        let mut s = spec(&[], &f, false);
        s.region = Some(&region);
        let matched = filter_event(&event, &names(&["hostoffset"]), &s).unwrap();
        assert_eq!(row_count(&matched, "hostoffset"), 2);
    }

    #[test]
    fn test_verbatim_filter_compares_text() {
        let event = Event::new("SN2014J", "sne")
            .with_quantity("ra", vec![Observation::new().with("value", "09:55:42.14")])
            .with_quantity("dec", vec![Observation::new().with("value", "+69:40:26.0")]);
        let quantities = names(&["ra"]);

        let mut f = Filters::new();
        f.add_verbatim("ra", "09:55:42.14");
        f.add_verbatim("dec", " +69:40:26.0 ");
        assert!(filter_event(&event, &quantities, &spec(&[], &f, false)).is_some());

        let mut f = Filters::new();
        f.add_verbatim("dec", "69:40:26.0");
        assert!(filter_event(&event, &quantities, &spec(&[], &f, false)).is_none());

        let numeric = Event::new("SN2020a", "sne")
            .with_quantity("ra", vec![Observation::new().with("value", "10.0")]);
        let mut f = Filters::new();
        f.add_verbatim("ra", "10");
        assert!(filter_event(&numeric, &quantities, &spec(&[], &f, false)).is_none());
        let mut f = Filters::new();
        f.add_equals("ra", "10");
        assert!(filter_event(&numeric, &quantities, &spec(&[], &f, false)).is_some());
    }

    #[test]
    fn test_requested_source_must_be_present() {
        let event = Event::new("SN2014J", "sne").with_quantity(
            "redshift",
            vec![
                Observation::new().with("value", "0.0008").with("source", "1"),
                Observation::new().with("value", "0.0007"),
            ],
        );
        let f = Filters::new();
        let attrs = names(&["value", "source"]);
        let matched = filter_event(&event, &names(&["redshift"]), &spec(&attrs, &f, false)).unwrap();
        assert_eq!(row_count(&matched, "redshift"), 1);

        let attrs = names(&["value"]);
        let matched = filter_event(&event, &names(&["redshift"]), &spec(&attrs, &f, false)).unwrap();
        assert_eq!(row_count(&matched, "redshift"), 2);
    }

    #[test]
    fn test_cite_sources() {
        let references = names(&["2014MNRAS.443.2887F", "1402.0849", ""]);

        let mut obs = Observation::new().with("value", "Ia").with("source", "1,2");
        cite_sources(&mut obs, &references);
        assert_eq!(obs.get("source").unwrap().to_string(), "2014MNRAS.443.2887F,1402.0849");
        assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["value", "source"]);

        // Unknown, blank and non-numeric ids pass through.
        let mut obs = Observation::new().with("source", "3, 7,x");
        cite_sources(&mut obs, &references);
        assert_eq!(obs.get("source").unwrap().to_string(), "3,7,x");

        let mut obs = Observation::new().with("value", "1");
        cite_sources(&mut obs, &references);
        assert!(!obs.contains("source"));
    }

    #[test]
    fn test_project() {
        let obs = Observation::new().with("a", "1").with("b", "2");
        assert_eq!(project(&obs, &[]).len(), 2);
        assert_eq!(project(&obs, &names(&["b"])).keys().collect::<Vec<_>>(), vec!["b"]);
    }
}
