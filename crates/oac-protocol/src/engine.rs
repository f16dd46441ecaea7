//! Query pipeline: request parsing and execution over a snapshot.
//!
//! A request is parsed up front so that every malformed-request error is
//! raised before any filtering runs. Execution is pure computation over an
//! immutable snapshot. It only fails when a request covers more events
//! than its cost guard allows; unknown events and empty matches produce an
//! empty result, and limit truncation is reported as metadata.

use std::borrow::Cow;
use std::time::Instant;

use crate::aggregate::{self, Candidate};
use crate::arguments::{resolve_arguments, Directives, Filters, QueryArg};
use crate::coordinates::{parse_declination, parse_right_ascension, SearchRegion};
use crate::errors::QueryError;
use crate::filter::{cite_sources, filter_event, project, FilterSpec};
use crate::limits::{ResourceLimitExceeded, ResourceLimits};
use crate::path::{EventScope, ParsedPath};
use crate::select::Selection;
use crate::snapshot::{CatalogSnapshot, DetailStore};
use crate::types::{Event, Observation, SOURCE_ATTRIBUTE};

/// Attribute excluded from attribute-projected queries by default.
pub const DEFAULT_EXCLUDED_ATTRIBUTE: &str = "realization";

/// Quantity/attribute pairs too large to serve for many events at once.
pub const EXPENSIVE_ATTRIBUTES: &[(&str, &str)] = &[("spectra", "data")];

/// A fully validated query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Catalog the request was addressed to.
    pub local_catalog: String,
    pub scope: EventScope,
    pub quantities: Vec<String>,
    pub attributes: Vec<String>,
    pub directives: Directives,
    /// Presence and equality filters, including exact-match `ra`/`dec`.
    pub filters: Filters,
    /// Positional constraint from `ra`/`dec` with `radius`/`width`/`height`.
    pub region: Option<SearchRegion>,
}

impl QueryRequest {
    /// Parse and validate a request.
    ///
    /// `path` holds up to three segments; the `event`, `quantity` and
    /// `attribute` arguments fill in segments the path leaves out.
    pub fn parse(
        local_catalog: &str,
        path: &str,
        args: &[QueryArg],
        limits: &ResourceLimits,
    ) -> Result<Self, QueryError> {
        let resolved = resolve_arguments(args, limits.max_angle_arcsec)?;
        let directives = resolved.directives;
        let mut filters = resolved.filters;

        let trimmed = path.trim().trim_start_matches('/');
        let mut segments: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').map(str::to_string).collect()
        };
        let supplied = [&directives.event, &directives.quantity, &directives.attribute];
        for (slot, value) in supplied.into_iter().enumerate() {
            if let (true, Some(value)) = (segments.len() == slot, value) {
                segments.push(value.clone());
            }
        }
        if segments.is_empty() {
            return Err(QueryError::BadPath("no event specified".to_string()));
        }
        if let (Some(attribute), true) = (&directives.attribute, segments.len() < 3) {
            return Err(QueryError::invalid_argument(
                "attribute",
                attribute.as_str(),
                "attributes need a quantity segment or a quantity argument",
            ));
        }
        let segment_refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let parsed = ParsedPath::from_segments(&segment_refs)?;

        let region = SearchRegion::resolve(
            directives.ra.as_deref(),
            directives.dec.as_deref(),
            directives.radius,
            directives.width,
            directives.height,
        )?;
        if region.is_none() {
            if let Some(ra) = &directives.ra {
                parse_right_ascension(ra)?;
                filters.add_verbatim("ra", ra.clone());
            }
            if let Some(dec) = &directives.dec {
                parse_declination(dec)?;
                filters.add_verbatim("dec", dec.clone());
            }
        }

        Ok(Self {
            local_catalog: local_catalog.to_string(),
            scope: parsed.scope,
            quantities: parsed.quantities,
            attributes: parsed.attributes,
            directives,
            filters,
            region,
        })
    }

    /// Whether the request asks for an attribute listed in
    /// [`EXPENSIVE_ATTRIBUTES`].
    pub fn is_expensive(&self) -> bool {
        EXPENSIVE_ATTRIBUTES.iter().any(|(quantity, attribute)| {
            self.quantities.iter().any(|q| q.eq_ignore_ascii_case(quantity))
                && self.attributes.iter().any(|a| a == attribute)
        })
    }

    /// The tightest event-count guard that applies, if any.
    fn event_guard(&self, limits: &ResourceLimits) -> Option<ResourceLimitExceeded> {
        let full = (self.directives.full && !self.scope.is_wide()).then_some(
            ResourceLimitExceeded::FullEvents {
                limit: limits.max_full_events,
            },
        );
        let expensive = self.is_expensive().then_some(ResourceLimitExceeded::ExpensiveEvents {
            limit: limits.max_expensive_events,
        });
        full.into_iter().chain(expensive).min_by_key(|g| g.limit())
    }
}

/// One surviving, projected observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Canonical event name.
    pub event: String,
    pub quantity: String,
    pub observation: Observation,
}

/// Rows of an executed query plus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows grouped by event, in output order.
    pub rows: Vec<ResultRow>,
    /// Requested quantities.
    pub quantities: Vec<String>,
    /// Requested attributes (table columns).
    pub attributes: Vec<String>,
    /// Set when a resource limit cut the result short.
    pub truncation: Option<ResourceLimitExceeded>,
    pub events_scanned: usize,
    pub snapshot_version: u64,
}

impl QueryResult {
    /// Number of distinct events with at least one row.
    pub fn event_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<&str> = None;
        for row in &self.rows {
            if last != Some(row.event.as_str()) {
                count += 1;
                last = Some(row.event.as_str());
            }
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Engine settings owned by the deploying service.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub limits: ResourceLimits,
    pub excluded_attributes: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            excluded_attributes: vec![DEFAULT_EXCLUDED_ATTRIBUTE.to_string()],
        }
    }
}

/// Executes requests against one snapshot.
pub struct QueryEngine<'a> {
    snapshot: &'a CatalogSnapshot,
    details: &'a dyn DetailStore,
    options: &'a EngineOptions,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        snapshot: &'a CatalogSnapshot,
        details: &'a dyn DetailStore,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            snapshot,
            details,
            options,
        }
    }

    /// Run a request to completion.
    ///
    /// Fails with [`QueryError::TooExpensive`] when a `full` request names
    /// more events than `max_full_events`, or a request for an expensive
    /// attribute covers more than `max_expensive_events` events.
    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResult, QueryError> {
        let started = Instant::now();
        let limits = &self.options.limits;
        let wide = request.scope.is_wide();
        let guard = request.event_guard(limits);
        let spec = FilterSpec {
            attributes: &request.attributes,
            filters: &request.filters,
            complete: request.directives.complete,
            closest: request.directives.closest,
            region: request.region.as_ref(),
            excluded_attributes: &self.options.excluded_attributes,
        };

        let mut result = QueryResult {
            quantities: request.quantities.clone(),
            attributes: request.attributes.clone(),
            snapshot_version: self.snapshot.version(),
            ..Default::default()
        };
        let mut detail_loads = 0usize;
        let mut admitted = 0usize;

        let candidates = aggregate::candidates(self.snapshot, &request.scope, &request.local_catalog);
        for candidate in candidates {
            if wide && result.events_scanned >= limits.max_events_scanned {
                result.truncation = Some(ResourceLimitExceeded::EventsScanned {
                    limit: limits.max_events_scanned,
                });
                break;
            }
            result.events_scanned += 1;

            if let Some(region) = &request.region {
                match candidate.position {
                    Some(position) if region.contains(&position) => {}
                    _ => continue,
                }
            }

            admitted += 1;
            if let Some(guard) = &guard {
                if admitted > guard.limit() {
                    tracing::debug!(guard = guard.kind(), "Rejected query over its event guard");
                    return Err(QueryError::TooExpensive(guard.clone()));
                }
            }

            let (event, detailed) = if request.directives.full && wide {
                if detail_loads >= limits.max_detail_events {
                    result.truncation = Some(ResourceLimitExceeded::DetailEvents {
                        limit: limits.max_detail_events,
                    });
                    break;
                }
                detail_loads += 1;
                self.with_details(candidate)
            } else if request.directives.full || self.lacks_requested(&candidate.event, request) {
                self.with_details(candidate)
            } else {
                (candidate.event, false)
            };

            self.collect_rows(&event, detailed, request, &spec, &mut result.rows);

            if wide && result.rows.len() > limits.max_rows {
                result.rows.truncate(limits.max_rows);
                result.truncation = Some(ResourceLimitExceeded::Rows {
                    limit: limits.max_rows,
                });
                break;
            }
        }

        tracing::debug!(
            scope = ?request.scope,
            scanned = result.events_scanned,
            rows = result.rows.len(),
            truncated = result.truncation.is_some(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Executed query"
        );

        Ok(result)
    }

    /// Swap in the detail record when the store has one. The flag reports
    /// whether the swap happened.
    fn with_details(&self, candidate: Candidate<'a>) -> (Cow<'a, Event>, bool) {
        match self.details.load(&candidate.event.catalog, &candidate.event.name) {
            Some(detail) => (Cow::Owned(detail), true),
            None => (candidate.event, false),
        }
    }

    /// A named event missing an explicitly requested quantity.
    fn lacks_requested(&self, event: &Event, request: &QueryRequest) -> bool {
        !request.scope.is_wide() && request.quantities.iter().any(|q| !event.has_quantity(q))
    }

    /// Filter, select and project one event. Source ids of detail records
    /// are replaced with references when `source` is a requested attribute.
    fn collect_rows(
        &self,
        event: &Event,
        detailed: bool,
        request: &QueryRequest,
        spec: &FilterSpec<'_>,
        rows: &mut Vec<ResultRow>,
    ) {
        let Some(matched) = filter_event(event, &request.quantities, spec) else {
            return;
        };
        let references = if detailed && request.attributes.iter().any(|a| a == SOURCE_ATTRIBUTE) {
            event.source_references()
        } else {
            Vec::new()
        };

        let selection = Selection::choose(&request.directives, matched.closest_targets);
        for quantity in matched.quantities {
            for obs in selection.apply(&quantity.rows) {
                let mut observation = project(obs, &request.attributes);
                if !references.is_empty() {
                    cite_sources(&mut observation, &references);
                }
                rows.push(ResultRow {
                    event: event.name.clone(),
                    quantity: quantity.name.clone(),
                    observation,
                });
            }
        }
    }
}
